use anyhow::anyhow;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::middleware::tenant::{TENANT_HEADER, TenantId};
use crate::modules::tokens::model::Claims;
use crate::permissions::ALL_WILDCARD;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::jwt::verify_token;

/// Extractor that validates the bearer JWT and provides the caller's claims.
///
/// The claims carry the tenant id and the flattened permission grants, so
/// authorization decisions need no database lookups. If the request also
/// carries a `tenant` header it must agree with the token's tenant.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// Check if the caller holds `permission`, honoring wildcard grants.
    pub fn has_permission(&self, permission: &str) -> bool {
        has_grant(&self.0.permissions, permission)
    }

    /// The tenant context this principal is scoped to.
    pub fn tenant(&self) -> TenantId {
        TenantId(self.0.tenant.clone())
    }

    /// Get the user ID as UUID
    pub fn user_id(&self) -> Result<uuid::Uuid, AppError> {
        uuid::Uuid::parse_str(&self.0.sub)
            .map_err(|_| AppError::unauthorized(anyhow!("Invalid user ID in token")))
    }

    /// Get the user's email
    pub fn email(&self) -> &str {
        &self.0.email
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized(anyhow!("Missing authorization header")))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized(anyhow!("Invalid authorization header format")))?;

        let claims = verify_token(token, &state.jwt_config)?;

        // A tenant header on an authenticated request must agree with the
        // token; silently preferring one over the other would let a caller
        // aim a request at the wrong tenant.
        if let Some(header_tenant) = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            if header_tenant != claims.tenant {
                return Err(AppError::bad_request(anyhow!(
                    "Tenant header does not match the authenticated tenant"
                )));
            }
        }

        Ok(AuthUser(claims))
    }
}

/// The permission evaluator: allow when the grant set contains the exact
/// requirement, the full wildcard, or a per-resource wildcard. Pure decision;
/// denials are logged for audit before the forbidden response is produced.
pub fn authorize(claims: &Claims, required: &str) -> Result<(), AppError> {
    if has_grant(&claims.permissions, required) {
        return Ok(());
    }

    tracing::warn!(
        subject = %claims.sub,
        tenant = %claims.tenant,
        required = %required,
        "permission denied"
    );

    Err(AppError::forbidden(anyhow!(
        "Access denied. Missing required permission: {}",
        required
    )))
}

fn has_grant(grants: &[String], required: &str) -> bool {
    if grants.iter().any(|g| g == required || g == ALL_WILDCARD) {
        return true;
    }

    if let Some((resource, _)) = required.split_once(':') {
        return grants
            .iter()
            .any(|g| g.split_once(':') == Some((resource, "*")));
    }

    false
}

/// Declares the permission requirement of an endpoint as an extractor type,
/// so the requirement sits in the handler signature next to the route it
/// guards and is checked once at dispatch, before the handler body runs.
#[macro_export]
macro_rules! require_permission {
    ($name:ident, $permission:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name(pub $crate::middleware::auth::AuthUser);

        impl axum::extract::FromRequestParts<$crate::state::AppState> for $name {
            type Rejection = $crate::utils::errors::AppError;

            async fn from_request_parts(
                parts: &mut axum::http::request::Parts,
                state: &$crate::state::AppState,
            ) -> Result<Self, Self::Rejection> {
                let auth_user =
                    $crate::middleware::auth::AuthUser::from_request_parts(parts, state).await?;

                $crate::middleware::auth::authorize(&auth_user.0, $permission)?;

                Ok($name(auth_user))
            }
        }
    };
}

// Pre-defined permission extractors for the identity endpoints

require_permission!(RequireUsersView, crate::permissions::USERS_VIEW);
require_permission!(RequireUsersCreate, crate::permissions::USERS_CREATE);
require_permission!(RequireUsersUpdate, crate::permissions::USERS_UPDATE);

require_permission!(RequireUserRolesView, crate::permissions::USER_ROLES_VIEW);
require_permission!(RequireUserRolesUpdate, crate::permissions::USER_ROLES_UPDATE);

require_permission!(RequireRolesView, crate::permissions::ROLES_VIEW);
require_permission!(RequireRolesCreate, crate::permissions::ROLES_CREATE);
require_permission!(RequireRolesDelete, crate::permissions::ROLES_DELETE);

require_permission!(RequireRoleClaimsView, crate::permissions::ROLE_CLAIMS_VIEW);
require_permission!(RequireRoleClaimsUpdate, crate::permissions::ROLE_CLAIMS_UPDATE);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions;

    fn create_test_claims(grants: Vec<String>) -> Claims {
        Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            tenant: "root".to_string(),
            permissions: grants,
            exp: 9999999999,
            iat: 1234567890,
        }
    }

    #[test]
    fn test_exact_grant_allows() {
        let claims = create_test_claims(vec![
            permissions::USERS_VIEW.to_string(),
            permissions::ROLES_VIEW.to_string(),
        ]);

        assert!(authorize(&claims, permissions::USERS_VIEW).is_ok());
        assert!(authorize(&claims, permissions::ROLES_VIEW).is_ok());
    }

    #[test]
    fn test_missing_grant_denies() {
        let claims = create_test_claims(vec![permissions::USERS_VIEW.to_string()]);

        let err = authorize(&claims, permissions::USERS_CREATE).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_full_wildcard_allows_everything() {
        let claims = create_test_claims(vec![permissions::ALL_WILDCARD.to_string()]);

        for permission in permissions::ALL {
            assert!(authorize(&claims, permission).is_ok());
        }
    }

    #[test]
    fn test_resource_wildcard_scoped_to_resource() {
        let claims = create_test_claims(vec!["roles:*".to_string()]);

        assert!(authorize(&claims, permissions::ROLES_VIEW).is_ok());
        assert!(authorize(&claims, permissions::ROLES_DELETE).is_ok());
        assert!(authorize(&claims, permissions::USERS_VIEW).is_err());
        assert!(authorize(&claims, permissions::ROLE_CLAIMS_VIEW).is_err());
    }

    #[test]
    fn test_empty_grants_deny() {
        let claims = create_test_claims(vec![]);
        assert!(authorize(&claims, permissions::USERS_VIEW).is_err());
    }

    #[test]
    fn test_has_permission_helper() {
        let auth_user = AuthUser(create_test_claims(vec![
            permissions::USER_ROLES_UPDATE.to_string(),
        ]));

        assert!(auth_user.has_permission(permissions::USER_ROLES_UPDATE));
        assert!(!auth_user.has_permission(permissions::USER_ROLES_VIEW));
    }

    #[test]
    fn test_tenant_accessor() {
        let auth_user = AuthUser(create_test_claims(vec![]));
        assert_eq!(auth_user.tenant().0, "root");
    }
}
