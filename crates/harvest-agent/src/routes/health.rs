use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
