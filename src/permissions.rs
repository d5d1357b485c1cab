//! Permission constants for the Clinicore identity API.
//!
//! Permissions are `"resource:action"` strings. Every protected endpoint
//! declares exactly one of them; roles carry sets of them. Two wildcard forms
//! are recognized by the evaluator in [`crate::middleware::auth`]:
//!
//! - [`ALL_WILDCARD`] (`*:*`) grants every action on every resource and is
//!   carried by the seeded tenant admin role.
//! - A per-resource wildcard such as `users:*` grants every action on that
//!   resource.
//!
//! Using these constants instead of string literals keeps the endpoint
//! attributes, the seeded roles, and the evaluator in agreement.

// =============================================================================
// Users permissions
// =============================================================================

/// Permission to create users
pub const USERS_CREATE: &str = "users:create";
/// Permission to view users
pub const USERS_VIEW: &str = "users:view";
/// Permission to update users (status toggles)
pub const USERS_UPDATE: &str = "users:update";

// =============================================================================
// User role assignment permissions
// =============================================================================

/// Permission to view a user's role assignments
pub const USER_ROLES_VIEW: &str = "user_roles:view";
/// Permission to replace a user's role assignments
pub const USER_ROLES_UPDATE: &str = "user_roles:update";

// =============================================================================
// Roles permissions
// =============================================================================

/// Permission to create or update roles
pub const ROLES_CREATE: &str = "roles:create";
/// Permission to view roles
pub const ROLES_VIEW: &str = "roles:view";
/// Permission to delete roles
pub const ROLES_DELETE: &str = "roles:delete";

// =============================================================================
// Role claims permissions
// =============================================================================

/// Permission to view a role together with its permission grants
pub const ROLE_CLAIMS_VIEW: &str = "role_claims:view";
/// Permission to replace a role's permission grants
pub const ROLE_CLAIMS_UPDATE: &str = "role_claims:update";

// =============================================================================
// Wildcards
// =============================================================================

/// Grants every action on every resource
pub const ALL_WILDCARD: &str = "*:*";

/// Every concrete (non-wildcard) permission known to the system.
pub const ALL: &[&str] = &[
    USERS_CREATE,
    USERS_VIEW,
    USERS_UPDATE,
    USER_ROLES_VIEW,
    USER_ROLES_UPDATE,
    ROLES_CREATE,
    ROLES_VIEW,
    ROLES_DELETE,
    ROLE_CLAIMS_VIEW,
    ROLE_CLAIMS_UPDATE,
];

/// Grants of the seeded, non-deletable "basic" role.
pub const BASIC_GRANTS: &[&str] = &[USERS_VIEW];

/// Whether `grant` is a permission string the system understands: a known
/// concrete permission, the full wildcard, or a per-resource wildcard over a
/// known resource.
pub fn is_known(grant: &str) -> bool {
    if grant == ALL_WILDCARD {
        return true;
    }
    if let Some((resource, action)) = grant.split_once(':') {
        if action == "*" {
            return ALL
                .iter()
                .any(|p| p.split_once(':').is_some_and(|(r, _)| r == resource));
        }
        return ALL.contains(&grant) && !resource.is_empty();
    }
    false
}
