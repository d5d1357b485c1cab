use anyhow::anyhow;
use async_trait::async_trait;
use lettre::message::{MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::instrument;

use crate::config::email::EmailConfig;
use crate::utils::errors::AppError;

/// Delivery seam for outbound mail. The SMTP implementation below is used in
/// production; the test suite substitutes a recording implementation.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(
        &self,
        to_email: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), AppError>;
}

pub struct SmtpEmailSender {
    config: EmailConfig,
}

impl SmtpEmailSender {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    #[instrument(skip(self, text_body, html_body))]
    async fn send(
        &self,
        to_email: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), AppError> {
        if !self.config.enabled {
            tracing::debug!(to = %to_email, subject = %subject, "SMTP disabled, skipping email");
            return Ok(());
        }

        let from = format!("{} <{}>", self.config.from_name, self.config.from_email);

        let email = Message::builder()
            .from(
                from.parse()
                    .map_err(|e| AppError::internal(anyhow!("Invalid from email: {}", e)))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| AppError::internal(anyhow!("Invalid to email: {}", e)))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AppError::internal(anyhow!("Failed to build email: {}", e)))?;

        let mailer = if self.config.smtp_username.is_empty() {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
                .port(self.config.smtp_port)
                .build()
        } else {
            let creds = Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            );

            SmtpTransport::relay(&self.config.smtp_host)
                .map_err(|e| AppError::internal(anyhow!("Failed to create SMTP relay: {}", e)))?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build()
        };

        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::internal(anyhow!("Task join error: {}", e)))?
            .map_err(|e| AppError::internal(anyhow!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

/// Subject and bodies for the account confirmation email sent after user
/// creation. `confirm_link` carries the tenant, user id and single-use code.
pub fn confirmation_email(first_name: &str, confirm_link: &str) -> (String, String, String) {
    let subject = "Confirm your email address".to_string();
    let text = format!(
        "Hi {},\n\n\
         An account has been created for you.\n\n\
         Confirm your email address by opening the link below:\n\
         {}\n\n\
         If you didn't expect this email, please ignore it.\n\n\
         Best regards,\n\
         Clinicore Team",
        first_name, confirm_link
    );
    let html = simple_template(
        "Confirm your email address",
        first_name,
        "An account has been created for you. Confirm your email address to activate it:",
        confirm_link,
        "Confirm email",
    );
    (subject, text, html)
}

/// Subject and bodies for the password reset email.
pub fn password_reset_email(first_name: &str, reset_link: &str) -> (String, String, String) {
    let subject = "Password Reset Request".to_string();
    let text = format!(
        "Hi {},\n\n\
         You requested to reset your password.\n\n\
         Click the link below to reset your password:\n\
         {}\n\n\
         This link will expire in 1 hour.\n\n\
         If you didn't request this, please ignore this email.\n\n\
         Best regards,\n\
         Clinicore Team",
        first_name, reset_link
    );
    let html = simple_template(
        "Password Reset Request",
        first_name,
        "We received a request to reset your password. Click the button below to create a new password:",
        reset_link,
        "Reset Password",
    );
    (subject, text, html)
}

fn simple_template(title: &str, name: &str, lead: &str, link: &str, button: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
</head>
<body style="margin: 0; padding: 0; font-family: Arial, sans-serif; background-color: #f4f4f4;">
    <table width="100%" cellpadding="0" cellspacing="0" style="padding: 20px;">
        <tr>
            <td align="center">
                <table width="600" cellpadding="0" cellspacing="0" style="background-color: #ffffff; border-radius: 8px; overflow: hidden;">
                    <tr>
                        <td style="background-color: #0E7490; padding: 30px; text-align: center;">
                            <h1 style="margin: 0; color: #ffffff; font-size: 28px;">Clinicore</h1>
                        </td>
                    </tr>
                    <tr>
                        <td style="padding: 40px 30px;">
                            <h2 style="margin: 0 0 20px 0; color: #333333; font-size: 24px;">{title}</h2>
                            <p style="margin: 0 0 20px 0; color: #666666; font-size: 16px;">Hi <strong>{name}</strong>,</p>
                            <p style="margin: 0 0 20px 0; color: #666666; font-size: 16px;">{lead}</p>
                            <table width="100%" cellpadding="0" cellspacing="0" style="margin: 30px 0;">
                                <tr>
                                    <td align="center">
                                        <a href="{link}" style="display: inline-block; padding: 14px 40px; background-color: #0E7490; color: #ffffff; text-decoration: none; border-radius: 6px; font-size: 16px; font-weight: bold;">{button}</a>
                                    </td>
                                </tr>
                            </table>
                            <p style="margin: 0 0 10px 0; color: #666666; font-size: 14px;">Or copy and paste this link into your browser:</p>
                            <p style="margin: 0 0 20px 0; color: #0E7490; font-size: 14px; word-break: break-all;">{link}</p>
                        </td>
                    </tr>
                    <tr>
                        <td style="background-color: #f8f9fa; padding: 20px 30px; text-align: center; border-top: 1px solid #e9ecef;">
                            <p style="margin: 0; color: #999999; font-size: 12px;">This is an automated email from Clinicore. Please do not reply.</p>
                        </td>
                    </tr>
                </table>
            </td>
        </tr>
    </table>
</body>
</html>"#
    )
}
