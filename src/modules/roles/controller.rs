use anyhow::anyhow;
use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;
use uuid::Uuid;

use crate::middleware::auth::{
    RequireRoleClaimsUpdate, RequireRoleClaimsView, RequireRolesCreate, RequireRolesDelete,
    RequireRolesView,
};
use crate::modules::tokens::controller::ErrorResponse;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::validator::ValidatedJson;

use super::model::{CreateOrUpdateRoleRequest, RoleDto, UpdateRolePermissionsRequest};

/// Get a list of all roles
#[utoipa::path(
    get,
    path = "/roles",
    responses(
        (status = 200, description = "Roles of the tenant, ordered by name", body = Vec<RoleDto>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth))]
pub async fn get_roles(
    State(state): State<AppState>,
    RequireRolesView(auth): RequireRolesView,
) -> Result<Json<Vec<RoleDto>>, AppError> {
    let roles = state.roles.list(&auth.tenant()).await?;
    Ok(Json(roles))
}

/// Get role details
#[utoipa::path(
    get,
    path = "/roles/{id}",
    params(
        ("id" = Uuid, Path, description = "Role ID")
    ),
    responses(
        (status = 200, description = "Role details", body = RoleDto),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Role not found", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth))]
pub async fn get_role_by_id(
    State(state): State<AppState>,
    RequireRolesView(auth): RequireRolesView,
    Path(id): Path<Uuid>,
) -> Result<Json<RoleDto>, AppError> {
    let role = state.roles.get(&auth.tenant(), id).await?;
    Ok(Json(role))
}

/// Get role details with its permissions
#[utoipa::path(
    get,
    path = "/roles/{id}/permissions",
    params(
        ("id" = Uuid, Path, description = "Role ID")
    ),
    responses(
        (status = 200, description = "Role details including permission grants", body = RoleDto),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Role not found", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth))]
pub async fn get_role_with_permissions(
    State(state): State<AppState>,
    RequireRoleClaimsView(auth): RequireRoleClaimsView,
    Path(id): Path<Uuid>,
) -> Result<Json<RoleDto>, AppError> {
    let role = state.roles.get_with_permissions(&auth.tenant(), id).await?;
    Ok(Json(role))
}

/// Update a role's permissions
#[utoipa::path(
    put,
    path = "/roles/{id}/permissions",
    params(
        ("id" = Uuid, Path, description = "Role ID")
    ),
    request_body = UpdateRolePermissionsRequest,
    responses(
        (status = 200, description = "Permissions replaced", body = String),
        (status = 400, description = "Path and body role id disagree", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Role not found", body = ErrorResponse),
        (status = 409, description = "Admin role permissions are immutable", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth, request))]
pub async fn update_role_permissions(
    State(state): State<AppState>,
    RequireRoleClaimsUpdate(auth): RequireRoleClaimsUpdate,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRolePermissionsRequest>,
) -> Result<Json<String>, AppError> {
    // Boundary invariant: the service is never consulted when the path and
    // body disagree about which role is being updated.
    if id != request.role_id {
        return Err(AppError::bad_request(anyhow!(
            "Path role id does not match request body"
        )));
    }

    let result = state
        .roles
        .update_permissions(&auth.tenant(), request)
        .await?;
    Ok(Json(result))
}

/// Create or update a role
#[utoipa::path(
    post,
    path = "/roles",
    request_body = CreateOrUpdateRoleRequest,
    responses(
        (status = 200, description = "Id of the created or updated role", body = String),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Role id set but not found", body = ErrorResponse),
        (status = 409, description = "Duplicate role name", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth, request))]
pub async fn create_or_update_role(
    State(state): State<AppState>,
    RequireRolesCreate(auth): RequireRolesCreate,
    ValidatedJson(request): ValidatedJson<CreateOrUpdateRoleRequest>,
) -> Result<Json<String>, AppError> {
    let id = state.roles.create_or_update(&auth.tenant(), request).await?;
    Ok(Json(id))
}

/// Delete a role
#[utoipa::path(
    delete,
    path = "/roles/{id}",
    params(
        ("id" = Uuid, Path, description = "Role ID")
    ),
    responses(
        (status = 200, description = "Role deleted", body = String),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Role not found", body = ErrorResponse),
        (status = 409, description = "Protected role", body = ErrorResponse)
    ),
    tag = "Roles",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth))]
pub async fn delete_role(
    State(state): State<AppState>,
    RequireRolesDelete(auth): RequireRolesDelete,
    Path(id): Path<Uuid>,
) -> Result<Json<String>, AppError> {
    let result = state.roles.delete(&auth.tenant(), id).await?;
    Ok(Json(result))
}
