//! Error types for the global state store.
//!
//! None of these ever escape a store write or read. They surface from the
//! fallible edges (storage backends, configuration, the async restore path)
//! and through the store's diagnostic listeners.

use thiserror::Error;

/// Result type alias for fallible store edges.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur around the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read storage key {key}: {source}")]
    StorageRead {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write storage key {key}: {source}")]
    StorageWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("persisted state is not valid JSON: {0}")]
    MalformedSnapshot(#[source] serde_json::Error),

    #[error("persisted state is not a JSON object (found {0})")]
    NotAnObject(&'static str),

    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("owner dropped the re-render completion before running it")]
    RenderDropped,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether this error came from reading the persisted snapshot at startup.
    pub fn is_hydration(&self) -> bool {
        matches!(
            self,
            StoreError::StorageRead { .. }
                | StoreError::MalformedSnapshot(_)
                | StoreError::NotAnObject(_)
        )
    }
}
