use anyhow::anyhow;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
};
use tracing::instrument;
use uuid::Uuid;

use crate::middleware::auth::{
    RequireUserRolesUpdate, RequireUserRolesView, RequireUsersCreate, RequireUsersUpdate,
    RequireUsersView,
};
use crate::middleware::tenant::{TenantFromHeader, TenantId};
use crate::modules::tokens::controller::ErrorResponse;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::validator::ValidatedJson;

use super::model::{
    ConfirmEmailParams, ConfirmPhoneNumberParams, CreateUserRequest, ForgotPasswordRequest,
    ResetPasswordRequest, ToggleUserStatusRequest, UserDetailsDto, UserRoleDto, UserRolesRequest,
};

/// Get list of all users
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Users of the tenant", body = Vec<UserDetailsDto>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth))]
pub async fn get_users(
    State(state): State<AppState>,
    RequireUsersView(auth): RequireUsersView,
) -> Result<Json<Vec<UserDetailsDto>>, AppError> {
    let users = state.users.list(&auth.tenant()).await?;
    Ok(Json(users))
}

/// Get a user's details
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = UserDetailsDto),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth))]
pub async fn get_user_by_id(
    State(state): State<AppState>,
    RequireUsersView(auth): RequireUsersView,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDetailsDto>, AppError> {
    let user = state.users.get(&auth.tenant(), id).await?;
    Ok(Json(user))
}

/// Get a user's roles
#[utoipa::path(
    get,
    path = "/users/{id}/roles",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Tenant roles with assignment flags", body = Vec<UserRoleDto>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth))]
pub async fn get_user_roles(
    State(state): State<AppState>,
    RequireUserRolesView(auth): RequireUserRolesView,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<UserRoleDto>>, AppError> {
    let roles = state.users.get_roles(&auth.tenant(), id).await?;
    Ok(Json(roles))
}

/// Update a user's assigned roles
#[utoipa::path(
    post,
    path = "/users/{id}/roles",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UserRolesRequest,
    responses(
        (status = 200, description = "Role set replaced", body = String),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "User or role not found", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth, request))]
pub async fn assign_user_roles(
    State(state): State<AppState>,
    RequireUserRolesUpdate(auth): RequireUserRolesUpdate,
    Path(id): Path<Uuid>,
    Json(request): Json<UserRolesRequest>,
) -> Result<Json<String>, AppError> {
    let result = state.users.assign_roles(&auth.tenant(), id, request).await?;
    Ok(Json(result))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Id of the created user", body = String),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 409, description = "Duplicate email or username", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth, headers, request))]
pub async fn create_user(
    State(state): State<AppState>,
    RequireUsersCreate(auth): RequireUsersCreate,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<Json<String>, AppError> {
    let origin = origin_from_request(&headers);
    let id = state
        .users
        .create(&auth.tenant(), request, &origin)
        .await?;
    Ok(Json(id))
}

/// Anonymous user creates a user
#[utoipa::path(
    post,
    path = "/users/self-register",
    request_body = CreateUserRequest,
    params(
        ("tenant" = String, Header, description = "Tenant identifier")
    ),
    responses(
        (status = 200, description = "Id of the registered user", body = String),
        (status = 400, description = "Missing tenant header", body = ErrorResponse),
        (status = 403, description = "Self-registration disabled", body = ErrorResponse),
        (status = 409, description = "Duplicate email or username", body = ErrorResponse)
    ),
    tag = "Users"
)]
#[instrument(skip(state, headers, request))]
pub async fn self_register(
    State(state): State<AppState>,
    TenantFromHeader(tenant): TenantFromHeader,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<Json<String>, AppError> {
    if !state.registration_config.self_registration_enabled {
        return Err(AppError::forbidden(anyhow!(
            "Self-registration is disabled"
        )));
    }

    let origin = origin_from_request(&headers);
    let id = state.users.create(&tenant, request, &origin).await?;
    Ok(Json(id))
}

/// Toggle a user's active status
#[utoipa::path(
    post,
    path = "/users/{id}/toggle-status",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = ToggleUserStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Path and body user id disagree", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth, request))]
pub async fn toggle_user_status(
    State(state): State<AppState>,
    RequireUsersUpdate(auth): RequireUsersUpdate,
    Path(id): Path<Uuid>,
    Json(request): Json<ToggleUserStatusRequest>,
) -> Result<(), AppError> {
    // Boundary invariant: the service is never consulted when the path and
    // body disagree about which user is being toggled.
    if id != request.user_id {
        return Err(AppError::bad_request(anyhow!(
            "Path user id does not match request body"
        )));
    }

    state.users.toggle_status(&auth.tenant(), request).await?;
    Ok(())
}

/// Confirm email address for a user
#[utoipa::path(
    get,
    path = "/users/confirm-email",
    params(
        ("tenant" = String, Query, description = "Tenant identifier"),
        ("userId" = Uuid, Query, description = "User ID"),
        ("code" = String, Query, description = "Confirmation code")
    ),
    responses(
        (status = 200, description = "Email confirmed", body = String),
        (status = 400, description = "Invalid confirmation code", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users"
)]
#[instrument(skip(state, params))]
pub async fn confirm_email(
    State(state): State<AppState>,
    Query(params): Query<ConfirmEmailParams>,
) -> Result<Json<String>, AppError> {
    let tenant = TenantId(params.tenant);
    let result = state
        .users
        .confirm_email(&tenant, params.user_id, &params.code)
        .await?;
    Ok(Json(result))
}

/// Confirm phone number for a user
#[utoipa::path(
    get,
    path = "/users/confirm-phone-number",
    params(
        ("userId" = Uuid, Query, description = "User ID"),
        ("code" = String, Query, description = "Confirmation code")
    ),
    responses(
        (status = 200, description = "Phone number confirmed", body = String),
        (status = 400, description = "Invalid confirmation code", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users"
)]
#[instrument(skip(state, params))]
pub async fn confirm_phone_number(
    State(state): State<AppState>,
    Query(params): Query<ConfirmPhoneNumberParams>,
) -> Result<Json<String>, AppError> {
    let result = state
        .users
        .confirm_phone_number(params.user_id, &params.code)
        .await?;
    Ok(Json(result))
}

/// Request a password reset email for a user
#[utoipa::path(
    post,
    path = "/users/forgot-password",
    request_body = ForgotPasswordRequest,
    params(
        ("tenant" = String, Header, description = "Tenant identifier")
    ),
    responses(
        (status = 200, description = "Uniform response regardless of account existence", body = String),
        (status = 400, description = "Missing tenant header", body = ErrorResponse)
    ),
    tag = "Users"
)]
#[instrument(skip(state, headers, request))]
pub async fn forgot_password(
    State(state): State<AppState>,
    TenantFromHeader(tenant): TenantFromHeader,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<String>, AppError> {
    let origin = origin_from_request(&headers);
    let result = state
        .users
        .forgot_password(&tenant, request, &origin)
        .await?;
    Ok(Json(result))
}

/// Reset a user's password
#[utoipa::path(
    post,
    path = "/users/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = String),
        (status = 400, description = "Invalid or expired reset token", body = ErrorResponse)
    ),
    tag = "Users"
)]
#[instrument(skip(state, request))]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<String>, AppError> {
    let result = state.users.reset_password(request).await?;
    Ok(Json(result))
}

/// Origin used to build confirmation links, from the inbound request's
/// forwarded scheme and host.
fn origin_from_request(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_from_request_defaults() {
        let headers = HeaderMap::new();
        assert_eq!(origin_from_request(&headers), "http://localhost");
    }

    #[test]
    fn test_origin_from_request_forwarded_proto() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "clinic.example.com".parse().unwrap());
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        assert_eq!(
            origin_from_request(&headers),
            "https://clinic.example.com"
        );
    }
}
