//! Credit note API 模块
//!
//! 签发/查询/作废，以及给外部调度器用的清扫端点。

mod handler;

use axum::{
    routing::{get, post},
    Router,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .nest("/api/credit-notes", routes())
        .route(
            "/api/admin/sweeps/credit-notes",
            post(handler::expire_sweep),
        )
        .route("/api/admin/sweeps/webhooks", post(handler::webhook_sweep))
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::issue))
        .route("/{code}", get(handler::get_by_code))
        .route("/{code}/cancel", post(handler::cancel))
}
