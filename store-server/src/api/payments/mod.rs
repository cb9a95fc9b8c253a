//! Payments API 模块

mod handler;

use axum::{routing::post, Router};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/payments", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/request", post(handler::create_payment_request))
        .route("/notify", post(handler::notify))
}
