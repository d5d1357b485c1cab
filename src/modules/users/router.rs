use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    assign_user_roles, confirm_email, confirm_phone_number, create_user, forgot_password,
    get_user_by_id, get_user_roles, get_users, reset_password, self_register, toggle_user_status,
};

/// Permission-gated user administration routes.
pub fn init_users_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_users).post(create_user))
        .route("/{id}", get(get_user_by_id))
        .route("/{id}/roles", get(get_user_roles).post(assign_user_roles))
        .route("/{id}/toggle-status", post(toggle_user_status))
}

/// Anonymous user routes: registration, confirmations and password reset.
/// These bypass the permission evaluator but still resolve tenant context
/// where it is required.
pub fn init_users_public_router() -> Router<AppState> {
    Router::new()
        .route("/self-register", post(self_register))
        .route("/confirm-email", get(confirm_email))
        .route("/confirm-phone-number", get(confirm_phone_number))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}
