use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, Transaction, TypeInfo};

use crate::model::{format_timestamp, Record};
use crate::store::traits::{Connection, ConnectionPool, PoolState};
use crate::store::DataError;

/// PostgreSQL-backed connection pool.
///
/// Every acquired connection starts a transaction, which is what a
/// [`UnitOfWork`](crate::store::UnitOfWork) binds to.
#[derive(Debug)]
pub struct PgConnectionPool {
    pool: PgPool,
    capacity: u32,
    state: RwLock<PoolState>,
}

impl PgConnectionPool {
    /// Create the pool without touching the network; call [`start`](Self::start) before use
    pub fn new(options: PgConnectOptions, capacity: u32) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(capacity)
            .connect_lazy_with(options);

        Self {
            pool,
            capacity,
            state: RwLock::new(PoolState::Initializing),
        }
    }

    /// Verify the database is reachable and start handing out connections
    pub async fn start(&self) -> Result<()> {
        let connection = self
            .pool
            .acquire()
            .await
            .context("Failed to create PostgreSQL connection pool")?;
        drop(connection);

        *self.state.write() = PoolState::Ready;
        log::info!("PostgreSQL pool ready (capacity {})", self.capacity);
        Ok(())
    }

    /// Get a reference to the underlying sqlx pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl ConnectionPool for PgConnectionPool {
    async fn acquire(&self) -> Result<Box<dyn Connection>, DataError> {
        let state = self.state();
        if state != PoolState::Ready {
            return Err(DataError::PoolUnavailable(state));
        }

        let tx = self.pool.begin().await?;
        Ok(Box::new(PgConnection { tx }))
    }

    fn state(&self) -> PoolState {
        *self.state.read()
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    async fn close(&self) {
        {
            let mut state = self.state.write();
            if matches!(*state, PoolState::Draining | PoolState::Closed) {
                return;
            }
            *state = PoolState::Draining;
        }

        log::info!("Draining PostgreSQL pool");
        self.pool.close().await;
        *self.state.write() = PoolState::Closed;
        log::info!("PostgreSQL pool closed");
    }
}

struct PgConnection {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl Connection for PgConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>, DataError> {
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter().map(decode_row).collect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        let result = bind_params(sqlx::query(sql), params)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), DataError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DataError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(flag) => query.bind(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => query.bind(integer),
                None => query.bind(number.as_f64()),
            },
            Value::String(text) => query.bind(text.as_str()),
            other => query.bind(sqlx::types::Json(other)),
        };
    }
    query
}

fn decode_row(row: &PgRow) -> Result<Record, DataError> {
    let mut record = Record::new();

    for column in row.columns() {
        let index = column.ordinal();
        let value = match column.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::from),
            "INT2" => row.try_get::<Option<i16>, _>(index)?.map(Value::from),
            "INT4" => row.try_get::<Option<i32>, _>(index)?.map(Value::from),
            "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
            "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(Value::from),
            "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::from),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
                row.try_get::<Option<String>, _>(index)?.map(Value::from)
            }
            "UUID" => row
                .try_get::<Option<uuid::Uuid>, _>(index)?
                .map(|id| Value::from(id.to_string())),
            "TIMESTAMPTZ" => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?
                .map(|ts| Value::from(format_timestamp(&ts))),
            "TIMESTAMP" => row
                .try_get::<Option<chrono::NaiveDateTime>, _>(index)?
                .map(|ts| Value::from(ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())),
            "DATE" => row
                .try_get::<Option<chrono::NaiveDate>, _>(index)?
                .map(|date| Value::from(date.to_string())),
            "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index)?,
            other => {
                return Err(DataError::Statement(format!(
                    "column '{}' has unsupported type {}",
                    column.name(),
                    other
                )))
            }
        };

        record.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }

    Ok(record)
}
