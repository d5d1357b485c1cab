use async_trait::async_trait;
use uuid::Uuid;

use crate::middleware::tenant::TenantId;
use crate::utils::errors::AppError;

use super::model::{CreateOrUpdateRoleRequest, RoleDto, UpdateRolePermissionsRequest};

/// Role lifecycle operations, scoped to the tenant passed with every call.
///
/// Implementations: [`super::postgres::PgRoleService`] for production and
/// [`crate::memory::InMemoryRoleService`] for the test suite and the
/// development backend.
#[async_trait]
pub trait RoleService: Send + Sync {
    /// All roles of the tenant, ordered by name.
    async fn list(&self, tenant: &TenantId) -> Result<Vec<RoleDto>, AppError>;

    async fn get(&self, tenant: &TenantId, id: Uuid) -> Result<RoleDto, AppError>;

    /// Role details including the full permission grant list.
    async fn get_with_permissions(&self, tenant: &TenantId, id: Uuid)
    -> Result<RoleDto, AppError>;

    /// Replaces the role's whole grant set (never a merge). Unknown grant
    /// strings are rejected, as is editing the admin role's grants.
    async fn update_permissions(
        &self,
        tenant: &TenantId,
        request: UpdateRolePermissionsRequest,
    ) -> Result<String, AppError>;

    /// Upsert keyed by the optional id; applying the same payload twice
    /// leaves the role unchanged after the second call. Returns the role id.
    async fn create_or_update(
        &self,
        tenant: &TenantId,
        request: CreateOrUpdateRoleRequest,
    ) -> Result<String, AppError>;

    /// Deletes the role. Protected roles are rejected with a conflict,
    /// never silently ignored.
    async fn delete(&self, tenant: &TenantId, id: Uuid) -> Result<String, AppError>;
}
