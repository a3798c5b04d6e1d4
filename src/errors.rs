//! errors.rs
//! Error taxonomy for the scheduling engine. A lost claim race is not an
//! error (the claimer returns `None`), so there is no variant for it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    /// No active sender with remaining daily quota.
    #[error("no active sender with remaining daily quota")]
    Capacity,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("template render error: {0}")]
    Render(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored timestamp is malformed: {0}")]
    Timestamp(#[from] chrono::ParseError),
}
