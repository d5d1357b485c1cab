use axum::{Json, extract::State};
use tracing::instrument;
use utoipa::ToSchema;

use crate::middleware::tenant::TenantFromHeader;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::jwt::create_access_token;
use crate::validator::ValidatedJson;

use super::model::{TokenRequest, TokenResponse};

#[derive(ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Issue an access token for a tenant user
#[utoipa::path(
    post,
    path = "/tokens",
    request_body = TokenRequest,
    params(
        ("tenant" = String, Header, description = "Tenant identifier")
    ),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Missing tenant header", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "Tokens"
)]
#[instrument(skip(state, dto))]
pub async fn create_token(
    State(state): State<AppState>,
    TenantFromHeader(tenant): TenantFromHeader,
    ValidatedJson(dto): ValidatedJson<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .users
        .authenticate(&tenant, &dto.email, &dto.password)
        .await?;

    let access_token = create_access_token(
        user.id,
        &user.email,
        tenant.as_str(),
        user.permissions,
        &state.jwt_config,
    )?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_config.access_token_expiry,
    }))
}
