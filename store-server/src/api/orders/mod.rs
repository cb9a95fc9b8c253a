//! Orders API 模块

mod handler;

use axum::{
    routing::{get, post},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/actions", get(handler::available_actions))
        .route("/{id}/process", post(handler::start_processing))
        .route("/{id}/ship", post(handler::ship))
        .route("/{id}/deliver", post(handler::deliver))
        .route("/{id}/cancel", post(handler::cancel))
        .route("/{id}/refund", post(handler::refund))
        .route("/{id}/pickup-otp", post(handler::generate_pickup_otp))
        .route("/{id}/pickup", post(handler::process_pickup))
}
