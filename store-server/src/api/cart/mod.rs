//! Cart API 模块

mod handler;

use axum::{
    routing::{get, put},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/cart", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::get_cart).post(handler::add_item))
        .route(
            "/items/{sku_id}",
            put(handler::update_quantity).delete(handler::remove_item),
        )
}
