pub mod migrations;
pub mod session_lock;
pub mod store;

use thiserror::Error;

pub use session_lock::{SessionLockGuard, SessionLockManager};
pub use store::{SessionRecord, Store};

/// Persistence failure. Unlike gateway errors this is fatal to the
/// request: conversation state is required to proceed, so the HTTP layer
/// maps it to a 500.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("sqlite connection lock poisoned")]
    LockPoisoned,

    #[error("store task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}
