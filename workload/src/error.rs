use thiserror::Error;

use crate::client::ClientError;

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("Connect failed: {target} after {tries} attempts ({reason})")]
    Connect {
        target: String,
        tries: u32,
        reason: String,
    },

    #[error("PING failed: {target}: {source}")]
    Probe {
        target: String,
        #[source]
        source: ClientError,
    },

    #[error("Preload failed at key index {index} ({key}): {source}")]
    Preload {
        index: usize,
        key: String,
        #[source]
        source: ClientError,
    },

    #[error("KeySpace error: {0}")]
    KeySpace(#[from] key_space::error::KeySpaceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("Interrupted")]
    Cancelled,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("key count must be greater than 0")]
    NoKeys,

    #[error("at least one {0} is required")]
    EmptyList(&'static str),

    #[error("{0} must be greater than 0")]
    Zero(&'static str),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}
