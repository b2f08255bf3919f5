pub mod chat;
pub mod content;
pub mod health;
pub mod schedule;

use axum::http::StatusCode;
use axum::Json;
use porter_memory::StoreError;
use serde_json::json;

/// Store failures are opaque 500s; details go to the log, not the wire.
pub(crate) fn store_failure(err: StoreError) -> (StatusCode, Json<serde_json::Value>) {
    tracing::error!(error = %err, "store failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal storage error" })),
    )
}
