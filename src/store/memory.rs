use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::model::Record;
use crate::store::traits::{Connection, ConnectionPool, PoolState};
use crate::store::DataError;

/// What happened on a connection handed out by a [`MemoryPool`]
#[derive(Debug, Clone, PartialEq)]
pub enum JournalEvent {
    Query { sql: String, params: Vec<Value> },
    Execute { sql: String, params: Vec<Value> },
    Commit,
    Rollback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub connection: u64,
    pub event: JournalEvent,
}

/// In-process connection pool with the same capacity and transaction
/// semantics as the PostgreSQL pool, but no SQL engine behind it.
///
/// Statements are recorded in a journal; result rows are scripted per SQL
/// text. Useful for running the pipeline without a database.
#[derive(Debug, Clone)]
pub struct MemoryPool {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    capacity: u32,
    permits: Arc<Semaphore>,
    state: RwLock<PoolState>,
    next_id: AtomicU64,
    journal: Mutex<Vec<JournalEntry>>,
    scripted: Mutex<HashMap<String, Vec<Record>>>,
    failing: Mutex<HashSet<String>>,
}

impl Shared {
    fn record(&self, connection: u64, event: JournalEvent) {
        self.journal.lock().push(JournalEntry { connection, event });
    }
}

impl MemoryPool {
    /// A pool that is ready immediately
    pub fn new(capacity: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                capacity,
                permits: Arc::new(Semaphore::new(capacity as usize)),
                state: RwLock::new(PoolState::Ready),
                next_id: AtomicU64::new(1),
                journal: Mutex::new(Vec::new()),
                scripted: Mutex::new(HashMap::new()),
                failing: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Return `rows` whenever `sql` is queried
    pub fn script(&self, sql: &str, rows: Vec<Record>) {
        self.shared.scripted.lock().insert(sql.to_string(), rows);
    }

    /// Make every statement with this exact text fail
    pub fn fail_on(&self, sql: &str) {
        self.shared.failing.lock().insert(sql.to_string());
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.shared.journal.lock().clone()
    }

    /// Events recorded for a single connection, in order
    pub fn events_for(&self, connection: u64) -> Vec<JournalEvent> {
        self.shared
            .journal
            .lock()
            .iter()
            .filter(|entry| entry.connection == connection)
            .map(|entry| entry.event.clone())
            .collect()
    }

    /// Number of connections currently checked out
    pub fn outstanding(&self) -> usize {
        self.shared.capacity as usize - self.shared.permits.available_permits()
    }

    /// Number of connections handed out so far
    pub fn acquired(&self) -> u64 {
        self.shared.next_id.load(Ordering::SeqCst) - 1
    }
}

#[async_trait::async_trait]
impl ConnectionPool for MemoryPool {
    async fn acquire(&self) -> Result<Box<dyn Connection>, DataError> {
        let state = self.state();
        if state != PoolState::Ready {
            return Err(DataError::PoolUnavailable(state));
        }

        let permit = self
            .shared
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DataError::PoolUnavailable(PoolState::Closed))?;
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryConnection {
            id,
            shared: Arc::clone(&self.shared),
            finished: false,
            _permit: permit,
        }))
    }

    fn state(&self) -> PoolState {
        *self.shared.state.read()
    }

    fn capacity(&self) -> u32 {
        self.shared.capacity
    }

    async fn close(&self) {
        {
            let mut state = self.shared.state.write();
            if matches!(*state, PoolState::Draining | PoolState::Closed) {
                return;
            }
            *state = PoolState::Draining;
        }

        // wait for every outstanding connection to come back
        if let Ok(all) = self.shared.permits.acquire_many(self.shared.capacity).await {
            all.forget();
        }
        self.shared.permits.close();
        *self.shared.state.write() = PoolState::Closed;
    }
}

struct MemoryConnection {
    id: u64,
    shared: Arc<Shared>,
    finished: bool,
    _permit: OwnedSemaphorePermit,
}

impl MemoryConnection {
    fn check(&self, sql: &str) -> Result<(), DataError> {
        if self.shared.failing.lock().contains(sql) {
            return Err(DataError::Statement(format!("scripted failure for '{}'", sql)));
        }
        Ok(())
    }

    fn rows_for(&self, sql: &str) -> Vec<Record> {
        self.shared
            .scripted
            .lock()
            .get(sql)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Connection for MemoryConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, DataError> {
        self.shared.record(
            self.id,
            JournalEvent::Query {
                sql: sql.to_string(),
                params: params.to_vec(),
            },
        );
        self.check(sql)?;
        Ok(self.rows_for(sql))
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        self.shared.record(
            self.id,
            JournalEvent::Execute {
                sql: sql.to_string(),
                params: params.to_vec(),
            },
        );
        self.check(sql)?;
        Ok(self.rows_for(sql).len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), DataError> {
        let mut connection = self;
        connection.finished = true;
        connection.shared.record(connection.id, JournalEvent::Commit);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DataError> {
        let mut connection = self;
        connection.finished = true;
        connection.shared.record(connection.id, JournalEvent::Rollback);
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.record(self.id, JournalEvent::Rollback);
        }
    }
}
