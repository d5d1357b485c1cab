use axum::{Router, routing::post};

use crate::state::AppState;

use super::controller::create_token;

pub fn init_tokens_router() -> Router<AppState> {
    Router::new().route("/", post(create_token))
}
