use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// A user row. Users are never hard-deleted; deactivation goes through the
/// toggle-status operation.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub password_hash: String,
    pub active: bool,
    pub email_confirmed: bool,
    pub phone_number_confirmed: bool,
    pub email_confirmation_code: Option<String>,
    pub phone_confirmation_code: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// User details as returned by the API. The password hash and confirmation
/// codes never leave the service layer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserDetailsDto {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub active: bool,
    pub email_confirmed: bool,
    pub phone_number_confirmed: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl UserDetailsDto {
    pub fn from_user(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            phone_number: user.phone_number,
            active: user.active,
            email_confirmed: user.email_confirmed,
            phone_number_confirmed: user.phone_number_confirmed,
            created_at: user.created_at,
        }
    }
}

/// A role of the tenant together with whether it is assigned to the user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserRoleDto {
    pub role_id: Uuid,
    pub role_name: String,
    pub enabled: bool,
}

/// Credential check result used for token issuance.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub permissions: Vec<String>,
}

// DTOs

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username must be between 3 and 50 characters"
    ))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    pub phone_number: Option<String>,
}

/// Full replacement of a user's assigned role set.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UserRolesRequest {
    pub role_ids: Vec<Uuid>,
}

/// The `user_id` must equal the path id; the dispatcher rejects the request
/// before any service call when they disagree.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ToggleUserStatusRequest {
    pub user_id: Uuid,
    pub activate: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmEmailParams {
    pub tenant: String,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPhoneNumberParams {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub code: String,
}

/// Single-use code embedded in confirmation links.
pub fn generate_confirmation_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
