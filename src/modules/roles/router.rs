use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{
    create_or_update_role, delete_role, get_role_by_id, get_role_with_permissions, get_roles,
    update_role_permissions,
};

pub fn init_roles_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_roles).post(create_or_update_role))
        .route("/{id}", get(get_role_by_id).delete(delete_role))
        .route(
            "/{id}/permissions",
            get(get_role_with_permissions).put(update_role_permissions),
        )
}
