use async_trait::async_trait;
use uuid::Uuid;

use crate::middleware::tenant::TenantId;
use crate::utils::errors::AppError;

use super::model::{
    AuthenticatedUser, CreateUserRequest, ForgotPasswordRequest, ResetPasswordRequest,
    ToggleUserStatusRequest, UserDetailsDto, UserRoleDto, UserRolesRequest,
};

/// User lifecycle operations, scoped to the tenant passed with every call.
/// Confirmation and password reset flows take the tenant (or resolve the user
/// by its globally-unique id) explicitly because their callers are anonymous.
///
/// Implementations: [`super::postgres::PgUserService`] for production and
/// [`crate::memory::InMemoryUserService`] for the test suite and the
/// development backend.
#[async_trait]
pub trait UserService: Send + Sync {
    async fn list(&self, tenant: &TenantId) -> Result<Vec<UserDetailsDto>, AppError>;

    async fn get(&self, tenant: &TenantId, id: Uuid) -> Result<UserDetailsDto, AppError>;

    /// Every role of the tenant with an `enabled` flag for the user.
    async fn get_roles(&self, tenant: &TenantId, id: Uuid) -> Result<Vec<UserRoleDto>, AppError>;

    /// Replaces the user's whole assigned role set, all-or-nothing.
    async fn assign_roles(
        &self,
        tenant: &TenantId,
        id: Uuid,
        request: UserRolesRequest,
    ) -> Result<String, AppError>;

    /// Creates the user and dispatches the confirmation email as an async
    /// side effect; the returned id does not wait for delivery. `origin` is
    /// the request origin used to build the confirmation link.
    async fn create(
        &self,
        tenant: &TenantId,
        request: CreateUserRequest,
        origin: &str,
    ) -> Result<String, AppError>;

    async fn toggle_status(
        &self,
        tenant: &TenantId,
        request: ToggleUserStatusRequest,
    ) -> Result<(), AppError>;

    /// Idempotent-safe: confirming an already-confirmed email is a benign
    /// success, never an error that could relock the account.
    async fn confirm_email(
        &self,
        tenant: &TenantId,
        user_id: Uuid,
        code: &str,
    ) -> Result<String, AppError>;

    async fn confirm_phone_number(&self, user_id: Uuid, code: &str) -> Result<String, AppError>;

    /// Always answers with the same success-shaped message whether or not the
    /// email belongs to an account.
    async fn forgot_password(
        &self,
        tenant: &TenantId,
        request: ForgotPasswordRequest,
        origin: &str,
    ) -> Result<String, AppError>;

    async fn reset_password(&self, request: ResetPasswordRequest) -> Result<String, AppError>;

    /// Credential check for token issuance.
    async fn authenticate(
        &self,
        tenant: &TenantId,
        email: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AppError>;
}

/// Uniform response of the forgot-password flow; returned for existing and
/// unknown accounts alike.
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists with that email, a password reset link has been sent.";
