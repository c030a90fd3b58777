use serde_json::Value;

use crate::model::Record;
use crate::store::traits::{Connection, ConnectionPool};
use crate::store::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Unopened,
    Open,
    Closed,
}

enum UnitState {
    Unopened,
    Open(Box<dyn Connection>),
    Closed,
}

/// One connection, one transaction, one logical operation.
///
/// `Unopened -> Open -> Closed`. Closing commits; dropping an open unit rolls
/// the transaction back.
pub struct UnitOfWork {
    repository: String,
    state: UnitState,
}

impl UnitOfWork {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            state: UnitState::Unopened,
        }
    }

    /// Name of the repository this unit was created for
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn status(&self) -> UnitStatus {
        match self.state {
            UnitState::Unopened => UnitStatus::Unopened,
            UnitState::Open(_) => UnitStatus::Open,
            UnitState::Closed => UnitStatus::Closed,
        }
    }

    /// Acquire a connection from `pool` and start the transaction
    pub async fn open(&mut self, pool: &dyn ConnectionPool) -> Result<(), DataError> {
        if !matches!(self.state, UnitState::Unopened) {
            return Err(DataError::AlreadyOpen);
        }
        let connection = pool.acquire().await?;
        self.state = UnitState::Open(connection);
        Ok(())
    }

    pub async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, DataError> {
        self.connection()?.query(sql, params).await
    }

    /// First row of `query`, if any
    pub async fn query_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Record>, DataError> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }

    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        self.connection()?.execute(sql, params).await
    }

    /// Commit and release the connection
    pub async fn close(&mut self) -> Result<(), DataError> {
        match std::mem::replace(&mut self.state, UnitState::Closed) {
            UnitState::Open(connection) => connection.commit().await,
            previous => {
                self.state = previous;
                Err(DataError::TransactionNotStarted)
            }
        }
    }

    /// Discard the transaction and release the connection
    pub async fn rollback(&mut self) -> Result<(), DataError> {
        match std::mem::replace(&mut self.state, UnitState::Closed) {
            UnitState::Open(connection) => connection.rollback().await,
            previous => {
                self.state = previous;
                Err(DataError::TransactionNotStarted)
            }
        }
    }

    fn connection(&mut self) -> Result<&mut Box<dyn Connection>, DataError> {
        match &mut self.state {
            UnitState::Open(connection) => Ok(connection),
            _ => Err(DataError::TransactionNotStarted),
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if matches!(self.state, UnitState::Open(_)) {
            log::warn!(
                "Unit of work for '{}' dropped while open, rolling back",
                self.repository
            );
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("repository", &self.repository)
            .field("status", &self.status())
            .finish()
    }
}
