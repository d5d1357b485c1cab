//! Bootstrap commands that must not be reachable over HTTP.
//!
//! Tenant admin accounts are created from the command line only, so a fresh
//! deployment can be provisioned without any pre-existing credentials.

use anyhow::{Result, anyhow};
use sqlx::PgPool;
use uuid::Uuid;

use crate::modules::roles::model::{ADMIN_ROLE, BASIC_ROLE};
use crate::permissions;
use crate::utils::password::hash_password;

/// Creates the tenant (with its protected admin and basic roles) when it does
/// not exist yet, then creates an active, email-confirmed admin user.
pub async fn create_tenant_admin(
    pool: &PgPool,
    tenant: &str,
    first_name: &str,
    last_name: &str,
    email: &str,
    password: &str,
) -> Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow!(e.error))?;

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO tenants (id, name) VALUES ($1, $1) ON CONFLICT (id) DO NOTHING")
        .bind(tenant)
        .execute(&mut *tx)
        .await?;

    let admin_role_id: Uuid = upsert_role(
        &mut tx,
        tenant,
        ADMIN_ROLE,
        "Tenant administrator",
        &[permissions::ALL_WILDCARD],
    )
    .await?;

    upsert_role(
        &mut tx,
        tenant,
        BASIC_ROLE,
        "Default role",
        permissions::BASIC_GRANTS,
    )
    .await?;

    let existing: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM users WHERE tenant_id = $1 AND email = $2")
            .bind(tenant)
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;
    if existing.is_some() {
        return Err(anyhow!("A user with this email already exists in tenant {tenant}"));
    }

    let user_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (tenant_id, email, username, first_name, last_name, password_hash, \
         active, email_confirmed)
         VALUES ($1, $2, $2, $3, $4, $5, true, true)
         RETURNING id",
    )
    .bind(tenant)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(admin_role_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(user_id)
}

async fn upsert_role(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    tenant: &str,
    name: &str,
    description: &str,
    grants: &[&str],
) -> Result<Uuid> {
    let role_id: Uuid = sqlx::query_scalar(
        "INSERT INTO roles (tenant_id, name, description, protected)
         VALUES ($1, $2, $3, true)
         ON CONFLICT (tenant_id, name) DO UPDATE SET description = EXCLUDED.description
         RETURNING id",
    )
    .bind(tenant)
    .bind(name)
    .bind(description)
    .fetch_one(&mut **tx)
    .await?;

    for grant in grants {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(grant)
        .execute(&mut **tx)
        .await?;
    }

    Ok(role_id)
}
