use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::middleware::tenant::TenantId;
use crate::permissions;
use crate::utils::errors::AppError;

use super::model::{ADMIN_ROLE, CreateOrUpdateRoleRequest, Role, RoleDto, UpdateRolePermissionsRequest};
use super::service::RoleService;

const ROLE_COLUMNS: &str = "id, tenant_id, name, description, protected, created_at, updated_at";

/// PostgreSQL-backed [`RoleService`]. Permission grants live in a separate
/// `role_permissions` table; mutations that read-check-write take a `FOR
/// UPDATE` row lock so concurrent updates to the same role serialize.
#[derive(Clone)]
pub struct PgRoleService {
    db: PgPool,
}

impl PgRoleService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_role(&self, tenant: &TenantId, id: Uuid) -> Result<Role, AppError> {
        sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant.as_str())
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))
    }

    async fn fetch_permissions(&self, role_id: Uuid) -> Result<Vec<String>, AppError> {
        let permissions = sqlx::query_scalar::<_, String>(
            "SELECT permission FROM role_permissions WHERE role_id = $1 ORDER BY permission",
        )
        .bind(role_id)
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }
}

#[async_trait]
impl RoleService for PgRoleService {
    #[instrument(skip(self))]
    async fn list(&self, tenant: &TenantId) -> Result<Vec<RoleDto>, AppError> {
        let roles = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE tenant_id = $1 ORDER BY name"
        ))
        .bind(tenant.as_str())
        .fetch_all(&self.db)
        .await?;

        Ok(roles.into_iter().map(RoleDto::from_role).collect())
    }

    #[instrument(skip(self))]
    async fn get(&self, tenant: &TenantId, id: Uuid) -> Result<RoleDto, AppError> {
        let role = self.fetch_role(tenant, id).await?;
        Ok(RoleDto::from_role(role))
    }

    #[instrument(skip(self))]
    async fn get_with_permissions(
        &self,
        tenant: &TenantId,
        id: Uuid,
    ) -> Result<RoleDto, AppError> {
        let role = self.fetch_role(tenant, id).await?;
        let permissions = self.fetch_permissions(role.id).await?;
        Ok(RoleDto::from_role_with_permissions(role, permissions))
    }

    #[instrument(skip(self, request))]
    async fn update_permissions(
        &self,
        tenant: &TenantId,
        request: UpdateRolePermissionsRequest,
    ) -> Result<String, AppError> {
        for grant in &request.permissions {
            if !permissions::is_known(grant) {
                return Err(AppError::bad_request(anyhow!(
                    "Unknown permission: {}",
                    grant
                )));
            }
        }

        let mut tx = self.db.begin().await?;

        let role = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(tenant.as_str())
        .bind(request.role_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))?;

        if role.name == ADMIN_ROLE {
            return Err(AppError::conflict(anyhow!(
                "Permissions of the admin role cannot be modified"
            )));
        }

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role.id)
            .execute(&mut *tx)
            .await?;

        let mut grants = request.permissions.clone();
        grants.sort();
        grants.dedup();

        for grant in &grants {
            sqlx::query("INSERT INTO role_permissions (role_id, permission) VALUES ($1, $2)")
                .bind(role.id)
                .bind(grant)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE roles SET updated_at = now() WHERE id = $1")
            .bind(role.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(format!("Permissions of role {} updated.", role.name))
    }

    #[instrument(skip(self, request))]
    async fn create_or_update(
        &self,
        tenant: &TenantId,
        request: CreateOrUpdateRoleRequest,
    ) -> Result<String, AppError> {
        match request.id {
            Some(id) => {
                let mut tx = self.db.begin().await?;

                let role = sqlx::query_as::<_, Role>(&format!(
                    "SELECT {ROLE_COLUMNS} FROM roles WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
                ))
                .bind(tenant.as_str())
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::not_found(anyhow!("Role not found")))?;

                if role.protected && role.name != request.name {
                    return Err(AppError::conflict(anyhow!(
                        "Protected role {} cannot be renamed",
                        role.name
                    )));
                }

                sqlx::query(
                    "UPDATE roles SET name = $1, description = $2, updated_at = now() WHERE id = $3",
                )
                .bind(&request.name)
                .bind(&request.description)
                .bind(role.id)
                .execute(&mut *tx)
                .await
                .map_err(map_duplicate_name)?;

                tx.commit().await?;

                Ok(role.id.to_string())
            }
            None => {
                let id: Uuid = sqlx::query_scalar(
                    "INSERT INTO roles (tenant_id, name, description) VALUES ($1, $2, $3) RETURNING id",
                )
                .bind(tenant.as_str())
                .bind(&request.name)
                .bind(&request.description)
                .fetch_one(&self.db)
                .await
                .map_err(map_duplicate_name)?;

                Ok(id.to_string())
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, tenant: &TenantId, id: Uuid) -> Result<String, AppError> {
        let role = self.fetch_role(tenant, id).await?;

        if role.protected {
            return Err(AppError::conflict(anyhow!(
                "Protected role {} cannot be deleted",
                role.name
            )));
        }

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role.id)
            .execute(&self.db)
            .await?;

        Ok(format!("Role {} deleted.", role.name))
    }
}

fn map_duplicate_name(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::conflict(anyhow!("A role with this name already exists"));
        }
    }
    AppError::from(e)
}
