use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::model::{Contact, Model, Record};
use crate::store::registry::Repository;
use crate::store::sql::{defined_values, insert_columns, insert_placeholders, update_columns};
use crate::store::traits::{BoxFuture, Connection};
use crate::store::unit_of_work::UnitOfWork;
use crate::store::DataError;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS contacts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT,
    birthday TEXT,
    tags JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at TEXT NOT NULL
)";

pub const LIST_CONTACTS: &str =
    "SELECT id, name, email, phone, birthday, tags, created_at FROM contacts ORDER BY created_at, id";
pub const FIND_CONTACT: &str =
    "SELECT id, name, email, phone, birthday, tags, created_at FROM contacts WHERE id = $1";
pub const DELETE_CONTACT: &str = "DELETE FROM contacts WHERE id = $1";

pub struct ContactRepository {
    unit: UnitOfWork,
}

impl Repository for ContactRepository {
    const NAME: &'static str = "contacts";

    fn bootstrap(conn: &mut dyn Connection) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            conn.execute(CREATE_TABLE, &[])
                .await
                .context("Failed to create contacts table")?;
            Ok(())
        })
    }

    fn bind(unit: UnitOfWork) -> Self {
        Self { unit }
    }

    fn unit(&mut self) -> &mut UnitOfWork {
        &mut self.unit
    }
}

impl ContactRepository {
    pub async fn list(&mut self) -> Result<Vec<Contact>> {
        let rows = self
            .unit
            .query(LIST_CONTACTS, &[])
            .await
            .context("Failed to list contacts")?;
        rows.into_iter().map(Contact::from_record).collect()
    }

    pub async fn find(&mut self, id: &str) -> Result<Option<Contact>> {
        let row = self
            .unit
            .query_one(FIND_CONTACT, &[json!(id)])
            .await
            .with_context(|| format!("Failed to fetch contact {}", id))?;
        row.map(Contact::from_record).transpose()
    }

    pub async fn insert(&mut self, contact: &Contact) -> Result<()> {
        let record = contact.to_record()?;
        let sql = format!(
            "INSERT INTO contacts ({}) VALUES ({})",
            insert_columns(&record),
            insert_placeholders(&record, 1)
        );
        self.unit
            .execute(&sql, &defined_values(&record))
            .await
            .with_context(|| format!("Failed to insert contact {}", contact.id))?;
        Ok(())
    }

    /// Write every stored field except the key and creation time
    pub async fn update(&mut self, contact: &Contact) -> Result<bool> {
        let record: Record = contact
            .to_record()?
            .into_iter()
            .filter(|(column, _)| column != "id" && column != "created_at")
            .collect();

        let mut params = defined_values(&record);
        let sql = format!(
            "UPDATE contacts SET {} WHERE id = ${}",
            update_columns(&record, 1),
            params.len() + 1
        );
        params.push(Value::String(contact.id.clone()));

        let updated = self
            .unit
            .execute(&sql, &params)
            .await
            .with_context(|| format!("Failed to update contact {}", contact.id))?;
        Ok(updated > 0)
    }

    pub async fn delete(&mut self, id: &str) -> Result<bool> {
        let deleted = self
            .unit
            .execute(DELETE_CONTACT, &[json!(id)])
            .await
            .with_context(|| format!("Failed to delete contact {}", id))?;
        Ok(deleted > 0)
    }

    /// Commit everything done through this repository
    pub async fn commit(mut self) -> Result<(), DataError> {
        self.unit.close().await
    }
}
