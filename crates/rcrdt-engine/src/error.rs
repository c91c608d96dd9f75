//! Error types for the replicated engine.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    #[error("conflicting type: expected {expected}, found {found}")]
    ConflictingType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("update function failed: {0}")]
    ModifyFailure(String),

    #[error("value already deleted")]
    DataDeleted,

    #[error("replication update failed: {0}")]
    ReplicationUpdateFailure(String),

    #[error("replication delete failed: {0}")]
    ReplicationDeleteFailure(String),

    #[error("read failed to reach requested consistency: {0}")]
    GetFailure(String),

    #[error("key not found")]
    NotFound,

    #[error("network error: {0}")]
    Network(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
