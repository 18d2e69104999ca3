use thiserror::Error;

/// Database layer errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("Pool error: {0}")]
    PoolError(#[from] diesel_async::pooled_connection::bb8::RunError),

    #[error(transparent)]
    CoreError(#[from] fieldline_core::error::CoreError),
}

impl DbError {
    /// ## Summary
    /// Whether this error means the durable store could not be reached at
    /// all, as opposed to a query-level failure. Webhook dedup fails closed
    /// on unreachable storage.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::PoolError(_) => true,
            Self::DatabaseError(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::ClosedConnection,
                _,
            )) => true,
            Self::DatabaseError(_) | Self::CoreError(_) => false,
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
