//! Structured error types for the storage core.
//!
//! Retries and offline waits never escape as errors; everything else does.

use thiserror::Error;

/// Errors surfaced across transport, transfer, and directory operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("exceeded max retries for {method} {endpoint}: {detail}")]
    MaxRetries {
        method: String,
        endpoint: String,
        detail: String,
    },

    #[error("session invalidated: api key rejected by server")]
    SessionInvalidated,

    #[error("storage quota exhausted: {0}")]
    MaxStorageReached(String),

    #[error("server error{}: {message}", code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    ServerError {
        message: String,
        code: Option<String>,
    },

    #[error("transport error during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: crate::transport::sender::SendError,
    },

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{what} is not implemented")]
    NotImplemented { what: &'static str },

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// `folder_not_found` / `file_not_found` are swallowed by callers of
    /// rename/move/trash because the mutation is idempotent on an
    /// already-absent item. Trash/rename/move call sites check this before
    /// propagating.
    pub fn is_not_found_idempotent(code: Option<&str>) -> bool {
        matches!(code, Some("folder_not_found") | Some("file_not_found"))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
