use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::model::Record;
use crate::store::DataError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lifecycle of a connection pool: created once at startup, torn down once at shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Initializing,
    Ready,
    Draining,
    Closed,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PoolState::Initializing => "initializing",
            PoolState::Ready => "ready",
            PoolState::Draining => "draining",
            PoolState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// A bounded pool of database connections.
///
/// Acquisition beyond capacity waits until a connection is released; there is
/// no timeout.
#[async_trait::async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Acquire a connection with an open transaction
    async fn acquire(&self) -> Result<Box<dyn Connection>, DataError>;
    /// Current lifecycle state
    fn state(&self) -> PoolState;
    /// Maximum number of outstanding connections
    fn capacity(&self) -> u32;
    /// Stop handing out connections and release every idle one
    async fn close(&self);
}

/// One acquired connection carrying one transaction.
///
/// Dropping a connection without calling `commit` rolls the transaction back.
#[async_trait::async_trait]
pub trait Connection: Send {
    /// Run a statement and return its rows
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, DataError>;
    /// Run a statement and return the number of affected rows
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DataError>;
    /// Commit the transaction and release the connection to its pool
    async fn commit(self: Box<Self>) -> Result<(), DataError>;
    /// Roll the transaction back and release the connection to its pool
    async fn rollback(self: Box<Self>) -> Result<(), DataError>;
}
