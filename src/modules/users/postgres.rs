use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::config::jwt::JwtConfig;
use crate::middleware::tenant::TenantId;
use crate::modules::roles::model::BASIC_ROLE;
use crate::utils::email::{EmailSender, confirmation_email, password_reset_email};
use crate::utils::errors::AppError;
use crate::utils::jwt::{create_reset_token, verify_reset_token};
use crate::utils::password::{hash_password, verify_password};

use super::model::{
    AuthenticatedUser, CreateUserRequest, ForgotPasswordRequest, ResetPasswordRequest,
    ToggleUserStatusRequest, User, UserDetailsDto, UserRoleDto, UserRolesRequest,
    generate_confirmation_code,
};
use super::service::{FORGOT_PASSWORD_MESSAGE, UserService};

const USER_COLUMNS: &str = "id, tenant_id, email, username, first_name, last_name, phone_number, \
     password_hash, active, email_confirmed, phone_number_confirmed, \
     email_confirmation_code, phone_confirmation_code, created_at, updated_at";

/// PostgreSQL-backed [`UserService`]. Role-set replacement locks the user row
/// so concurrent assignments to the same user serialize; confirmation email
/// dispatch is spawned and never blocks the creating request.
pub struct PgUserService {
    db: PgPool,
    email_sender: Arc<dyn EmailSender>,
    jwt_config: JwtConfig,
}

impl PgUserService {
    pub fn new(db: PgPool, email_sender: Arc<dyn EmailSender>, jwt_config: JwtConfig) -> Self {
        Self {
            db,
            email_sender,
            jwt_config,
        }
    }

    async fn fetch_user(&self, tenant: &TenantId, id: Uuid) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant.as_str())
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("User not found")))
    }

    async fn fetch_user_by_id(&self, id: Uuid) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("User not found")))
    }
}

#[async_trait]
impl UserService for PgUserService {
    #[instrument(skip(self))]
    async fn list(&self, tenant: &TenantId) -> Result<Vec<UserDetailsDto>, AppError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 ORDER BY username"
        ))
        .bind(tenant.as_str())
        .fetch_all(&self.db)
        .await?;

        Ok(users.into_iter().map(UserDetailsDto::from_user).collect())
    }

    #[instrument(skip(self))]
    async fn get(&self, tenant: &TenantId, id: Uuid) -> Result<UserDetailsDto, AppError> {
        let user = self.fetch_user(tenant, id).await?;
        Ok(UserDetailsDto::from_user(user))
    }

    #[instrument(skip(self))]
    async fn get_roles(&self, tenant: &TenantId, id: Uuid) -> Result<Vec<UserRoleDto>, AppError> {
        // Existence check first so a missing user is a 404, not an empty list.
        let user = self.fetch_user(tenant, id).await?;

        let roles = sqlx::query_as::<_, UserRoleDto>(
            "SELECT r.id AS role_id, r.name AS role_name, (ur.user_id IS NOT NULL) AS enabled
             FROM roles r
             LEFT JOIN user_roles ur ON ur.role_id = r.id AND ur.user_id = $2
             WHERE r.tenant_id = $1
             ORDER BY r.name",
        )
        .bind(tenant.as_str())
        .bind(user.id)
        .fetch_all(&self.db)
        .await?;

        Ok(roles)
    }

    #[instrument(skip(self, request))]
    async fn assign_roles(
        &self,
        tenant: &TenantId,
        id: Uuid,
        request: UserRolesRequest,
    ) -> Result<String, AppError> {
        let mut role_ids = request.role_ids;
        role_ids.sort();
        role_ids.dedup();

        let mut tx = self.db.begin().await?;

        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM users WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(tenant.as_str())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let user_id = user_id.ok_or_else(|| AppError::not_found(anyhow!("User not found")))?;

        let known: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM roles WHERE tenant_id = $1 AND id = ANY($2)",
        )
        .bind(tenant.as_str())
        .bind(&role_ids)
        .fetch_one(&mut *tx)
        .await?;

        if known != role_ids.len() as i64 {
            return Err(AppError::not_found(anyhow!("One or more roles not found")));
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for role_id in &role_ids {
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok("User roles updated successfully.".to_string())
    }

    #[instrument(skip(self, request))]
    async fn create(
        &self,
        tenant: &TenantId,
        request: CreateUserRequest,
        origin: &str,
    ) -> Result<String, AppError> {
        let password_hash = hash_password(&request.password)?;
        let confirmation_code = generate_confirmation_code();

        let mut tx = self.db.begin().await?;

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE tenant_id = $1 AND (email = $2 OR username = $3))",
        )
        .bind(tenant.as_str())
        .bind(&request.email)
        .bind(&request.username)
        .fetch_one(&mut *tx)
        .await?;

        if taken {
            return Err(AppError::conflict(anyhow!(
                "A user with this email or username already exists"
            )));
        }

        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (tenant_id, email, username, first_name, last_name, phone_number, \
             password_hash, email_confirmation_code)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(tenant.as_str())
        .bind(&request.email)
        .bind(&request.username)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.phone_number)
        .bind(&password_hash)
        .bind(&confirmation_code)
        .fetch_one(&mut *tx)
        .await?;

        // New users start with the tenant's basic role when it exists.
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id)
             SELECT $1, id FROM roles WHERE tenant_id = $2 AND name = $3",
        )
        .bind(user_id)
        .bind(tenant.as_str())
        .bind(BASIC_ROLE)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let confirm_link = format!(
            "{origin}/users/confirm-email?tenant={}&userId={}&code={}",
            tenant, user_id, confirmation_code
        );
        let (subject, text, html) = confirmation_email(&request.first_name, &confirm_link);
        let email_sender = Arc::clone(&self.email_sender);
        let to = request.email.clone();
        tokio::spawn(async move {
            if let Err(e) = email_sender.send(&to, &subject, &text, &html).await {
                tracing::error!(error = %e.error, "failed to send confirmation email");
            }
        });

        Ok(user_id.to_string())
    }

    #[instrument(skip(self, request))]
    async fn toggle_status(
        &self,
        tenant: &TenantId,
        request: ToggleUserStatusRequest,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET active = $1, updated_at = now() WHERE tenant_id = $2 AND id = $3",
        )
        .bind(request.activate)
        .bind(tenant.as_str())
        .bind(request.user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("User not found")));
        }

        Ok(())
    }

    #[instrument(skip(self, code))]
    async fn confirm_email(
        &self,
        tenant: &TenantId,
        user_id: Uuid,
        code: &str,
    ) -> Result<String, AppError> {
        let user = self.fetch_user(tenant, user_id).await?;

        if user.email_confirmed {
            return Ok(format!("Email {} is already confirmed.", user.email));
        }

        if user.email_confirmation_code.as_deref() != Some(code) {
            return Err(AppError::bad_request(anyhow!("Invalid confirmation code")));
        }

        sqlx::query(
            "UPDATE users SET email_confirmed = true, email_confirmation_code = NULL, \
             updated_at = now() WHERE id = $1",
        )
        .bind(user.id)
        .execute(&self.db)
        .await?;

        Ok(format!("Email {} confirmed.", user.email))
    }

    #[instrument(skip(self, code))]
    async fn confirm_phone_number(&self, user_id: Uuid, code: &str) -> Result<String, AppError> {
        let user = self.fetch_user_by_id(user_id).await?;

        let phone_number = user
            .phone_number
            .clone()
            .ok_or_else(|| AppError::bad_request(anyhow!("No phone number on record")))?;

        if user.phone_number_confirmed {
            return Ok(format!("Phone number {} is already confirmed.", phone_number));
        }

        if user.phone_confirmation_code.as_deref() != Some(code) {
            return Err(AppError::bad_request(anyhow!("Invalid confirmation code")));
        }

        sqlx::query(
            "UPDATE users SET phone_number_confirmed = true, phone_confirmation_code = NULL, \
             updated_at = now() WHERE id = $1",
        )
        .bind(user.id)
        .execute(&self.db)
        .await?;

        Ok(format!("Phone number {} confirmed.", phone_number))
    }

    #[instrument(skip(self, request))]
    async fn forgot_password(
        &self,
        tenant: &TenantId,
        request: ForgotPasswordRequest,
        origin: &str,
    ) -> Result<String, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND email = $2"
        ))
        .bind(tenant.as_str())
        .bind(&request.email)
        .fetch_optional(&self.db)
        .await?;

        // The response never varies with account existence; the email is
        // dispatched off the request path for the same reason.
        if let Some(user) = user {
            let token = create_reset_token(user.id, &user.email, &self.jwt_config)?;
            let reset_link = format!("{origin}/users/reset-password?token={token}");
            let (subject, text, html) = password_reset_email(&user.first_name, &reset_link);
            let email_sender = Arc::clone(&self.email_sender);
            tokio::spawn(async move {
                if let Err(e) = email_sender.send(&user.email, &subject, &text, &html).await {
                    tracing::error!(error = %e.error, "failed to send password reset email");
                }
            });
        } else {
            tracing::debug!(tenant = %tenant, "password reset requested for unknown email");
        }

        Ok(FORGOT_PASSWORD_MESSAGE.to_string())
    }

    #[instrument(skip(self, request))]
    async fn reset_password(&self, request: ResetPasswordRequest) -> Result<String, AppError> {
        let claims = verify_reset_token(&request.token, &self.jwt_config)?;
        let user_id = Uuid::parse_str(&claims.user_id)
            .map_err(|_| AppError::bad_request(anyhow!("Invalid or expired reset token")))?;

        let user = self.fetch_user_by_id(user_id).await.map_err(|_| {
            AppError::bad_request(anyhow!("Invalid or expired reset token"))
        })?;

        if user.email != claims.email {
            return Err(AppError::bad_request(anyhow!("Invalid or expired reset token")));
        }

        let password_hash = hash_password(&request.password)?;

        sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
            .bind(&password_hash)
            .bind(user.id)
            .execute(&self.db)
            .await?;

        Ok("Password has been reset successfully.".to_string())
    }

    #[instrument(skip(self, password))]
    async fn authenticate(
        &self,
        tenant: &TenantId,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND email = $2"
        ))
        .bind(tenant.as_str())
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::unauthorized(anyhow!("Invalid credentials")))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::unauthorized(anyhow!("Invalid credentials")));
        }

        if !user.active {
            return Err(AppError::unauthorized(anyhow!("User account is deactivated")));
        }

        let permissions = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT rp.permission
             FROM role_permissions rp
             INNER JOIN user_roles ur ON ur.role_id = rp.role_id
             WHERE ur.user_id = $1
             ORDER BY rp.permission",
        )
        .bind(user.id)
        .fetch_all(&self.db)
        .await?;

        Ok(AuthenticatedUser {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            permissions,
        })
    }
}
