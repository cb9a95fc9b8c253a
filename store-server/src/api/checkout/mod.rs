//! Checkout API 模块

mod handler;

use axum::{
    routing::{get, post},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/checkout", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/sessions", post(handler::create_session))
        .route(
            "/sessions/{id}",
            get(handler::get_session).delete(handler::release_session),
        )
        .route("/sessions/{id}/complete", post(handler::complete_order))
        .route("/credit-notes/validate", post(handler::validate_credit_note))
        .route("/shipping", get(handler::shipping_quote))
}
