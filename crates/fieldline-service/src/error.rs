use thiserror::Error;

/// Service layer errors
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A caller-supplied guarded operation failed. The underlying error is
    /// passed through untouched; retry policy stays with the caller.
    #[error(transparent)]
    Operation(anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// This caller joined an in-flight execution for the same key and that
    /// execution failed. The key is immediately retryable.
    #[error("Joined in-flight execution failed: {0}")]
    JoinedFlightFailed(String),

    /// The in-flight execution this caller joined was dropped before
    /// reporting a result.
    #[error("In-flight execution was dropped before completing")]
    FlightAbandoned,

    #[error(transparent)]
    Db(#[from] fieldline_db::error::DbError),

    #[error(transparent)]
    Core(#[from] fieldline_core::error::CoreError),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
