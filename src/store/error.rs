use crate::store::PoolState;

/// Failures raised by the data-access layer.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Transaction not started")]
    TransactionNotStarted,
    #[error("Transaction already started")]
    AlreadyOpen,
    #[error("Repository type '{0}' not found")]
    RepositoryNotFound(String),
    #[error("Repository type '{0}' registered twice")]
    DuplicateRepository(String),
    #[error("Connection pool is {0}")]
    PoolUnavailable(PoolState),
    #[error("Unsupported statement: {0}")]
    Statement(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
