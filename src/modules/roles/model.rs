use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Name of the seeded tenant administrator role. Carries the full wildcard
/// grant; its permission set cannot be edited and it cannot be deleted.
pub const ADMIN_ROLE: &str = "admin";

/// Name of the seeded default role for newly registered users.
pub const BASIC_ROLE: &str = "basic";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub protected: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Role as returned by the API. `permissions` is only populated by the
/// `{id}/permissions` endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl RoleDto {
    pub fn from_role(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
            protected: role.protected,
            permissions: None,
        }
    }

    pub fn from_role_with_permissions(role: Role, permissions: Vec<String>) -> Self {
        Self {
            permissions: Some(permissions),
            ..Self::from_role(role)
        }
    }
}

// DTOs

/// Upsert payload: with `id` set the named role is updated, otherwise a new
/// role is created.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrUpdateRoleRequest {
    pub id: Option<Uuid>,
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,
    #[validate(length(max = 500, message = "Description must not exceed 500 characters"))]
    pub description: Option<String>,
}

/// Full replacement of a role's permission grants. The `role_id` must equal
/// the path id; the dispatcher rejects the request before any service call
/// when they disagree.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateRolePermissionsRequest {
    pub role_id: Uuid,
    pub permissions: Vec<String>,
}
