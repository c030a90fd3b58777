use anyhow::{bail, Context};
use axum::http::{header, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::context::{HttpMethod, Reply, RequestBody, RequestCache, RequestContext};
use crate::api::error::error_reply;
use crate::api::route::ApiRoute;
use crate::model::{Contact, FieldSpec, FieldType, Model, Record, Schema};
use crate::store::{ContactRepository, RepositoryRegistry};

pub type AppState = Arc<RepositoryRegistry>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub pool: String,
    pub timestamp: String,
}

pub struct HealthCheck {
    state: AppState,
}

impl HealthCheck {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl ApiRoute for HealthCheck {
    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> &str {
        "/health"
    }

    async fn handle_request(
        &self,
        _ctx: &mut RequestContext,
        _body: RequestBody,
        _cache: &mut RequestCache,
    ) -> anyhow::Result<Reply> {
        let health = HealthResponse {
            status: "healthy".to_string(),
            pool: self.state.pool().state().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        Ok(Reply::success(serde_json::to_value(health)?))
    }
}

/// Body schema for contacts; creation requires name and email
pub fn contact_schema(creating: bool) -> Schema {
    let required = |field_type: FieldType| {
        if creating {
            FieldSpec::required(field_type)
        } else {
            FieldSpec::optional(field_type)
        }
    };

    Schema::new()
        .field("name", required(FieldType::String))
        .field("email", required(FieldType::Email))
        .field("phone", FieldSpec::optional(FieldType::Phone))
        .field("birthday", FieldSpec::optional(FieldType::Date))
        .field("tags", FieldSpec::array_of(FieldType::String))
}

fn into_record(body: RequestBody) -> anyhow::Result<Record> {
    let value = match body {
        RequestBody::Json(value) => value,
        RequestBody::Raw(bytes) => serde_json::from_slice(&bytes).context("Failed to read request body")?,
        RequestBody::Empty => bail!("request body is empty"),
    };
    match value {
        Value::Object(record) => Ok(record),
        other => bail!("expected an object body, got {}", other),
    }
}

fn contact_id(ctx: &RequestContext) -> anyhow::Result<String> {
    ctx.param("id")
        .map(str::to_string)
        .context("route is missing the 'id' parameter")
}

fn contact_not_found(ctx: &mut RequestContext, id: &str) -> Reply {
    error_reply(ctx, StatusCode::NOT_FOUND, format!("Contact '{}' not found", id))
}

pub struct ListContacts {
    state: AppState,
}

impl ListContacts {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl ApiRoute for ListContacts {
    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> &str {
        "/contacts"
    }

    async fn handle_request(
        &self,
        _ctx: &mut RequestContext,
        _body: RequestBody,
        _cache: &mut RequestCache,
    ) -> anyhow::Result<Reply> {
        let mut contacts = self.state.acquire_as::<ContactRepository>().await?;
        let list = contacts.list().await?;
        contacts.commit().await?;

        let data = list
            .iter()
            .map(Contact::to_client)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Reply::success(Value::Array(data)))
    }
}

pub struct CreateContact {
    state: AppState,
}

impl CreateContact {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl ApiRoute for CreateContact {
    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn path(&self) -> &str {
        "/contacts"
    }

    fn schema(&self) -> Option<Schema> {
        Some(contact_schema(true))
    }

    async fn handle_request(
        &self,
        ctx: &mut RequestContext,
        body: RequestBody,
        _cache: &mut RequestCache,
    ) -> anyhow::Result<Reply> {
        let record = Contact::normalize_patch(into_record(body)?);
        let name = record.get("name").and_then(Value::as_str).unwrap_or_default();
        let email = record.get("email").and_then(Value::as_str).unwrap_or_default();

        let mut contact = Contact::new(name.to_string(), email.to_string());
        contact.update(&record)?;

        let mut contacts = self.state.acquire_as::<ContactRepository>().await?;
        contacts.insert(&contact).await?;
        contacts.commit().await?;

        log::info!("Created contact {}", contact.id);
        ctx.set_status(StatusCode::CREATED);
        Ok(Reply::success(contact.to_client()?))
    }
}

pub struct GetContact {
    state: AppState,
}

impl GetContact {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl ApiRoute for GetContact {
    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> &str {
        "/contacts/:id"
    }

    async fn handle_request(
        &self,
        ctx: &mut RequestContext,
        _body: RequestBody,
        _cache: &mut RequestCache,
    ) -> anyhow::Result<Reply> {
        let id = contact_id(ctx)?;
        let mut contacts = self.state.acquire_as::<ContactRepository>().await?;
        let found = contacts.find(&id).await?;
        contacts.commit().await?;

        match found {
            Some(contact) => Ok(Reply::success(contact.to_client()?)),
            None => Ok(contact_not_found(ctx, &id)),
        }
    }
}

pub struct UpdateContact {
    state: AppState,
}

impl UpdateContact {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl ApiRoute for UpdateContact {
    fn method(&self) -> HttpMethod {
        HttpMethod::Patch
    }

    fn path(&self) -> &str {
        "/contacts/:id"
    }

    fn schema(&self) -> Option<Schema> {
        Some(contact_schema(false))
    }

    async fn handle_request(
        &self,
        ctx: &mut RequestContext,
        body: RequestBody,
        _cache: &mut RequestCache,
    ) -> anyhow::Result<Reply> {
        let id = contact_id(ctx)?;
        let patch = Contact::normalize_patch(into_record(body)?);

        let mut contacts = self.state.acquire_as::<ContactRepository>().await?;
        let Some(mut contact) = contacts.find(&id).await? else {
            contacts.commit().await?;
            return Ok(contact_not_found(ctx, &id));
        };

        contact.update(&patch)?;
        contacts.update(&contact).await?;
        contacts.commit().await?;

        Ok(Reply::success(contact.to_client()?))
    }
}

pub struct DeleteContact {
    state: AppState,
}

impl DeleteContact {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl ApiRoute for DeleteContact {
    fn method(&self) -> HttpMethod {
        HttpMethod::Delete
    }

    fn path(&self) -> &str {
        "/contacts/:id"
    }

    async fn handle_request(
        &self,
        ctx: &mut RequestContext,
        _body: RequestBody,
        _cache: &mut RequestCache,
    ) -> anyhow::Result<Reply> {
        let id = contact_id(ctx)?;
        let mut contacts = self.state.acquire_as::<ContactRepository>().await?;
        let deleted = contacts.delete(&id).await?;
        contacts.commit().await?;

        if !deleted {
            return Ok(contact_not_found(ctx, &id));
        }
        Ok(Reply::success(json!({ "id": id })))
    }
}

/// The contact as a vCard download
pub struct ContactCard {
    state: AppState,
}

impl ContactCard {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl ApiRoute for ContactCard {
    fn method(&self) -> HttpMethod {
        HttpMethod::Get
    }

    fn path(&self) -> &str {
        "/contacts/:id/card"
    }

    async fn handle_request(
        &self,
        ctx: &mut RequestContext,
        _body: RequestBody,
        _cache: &mut RequestCache,
    ) -> anyhow::Result<Reply> {
        let id = contact_id(ctx)?;
        let mut contacts = self.state.acquire_as::<ContactRepository>().await?;
        let found = contacts.find(&id).await?;
        contacts.commit().await?;

        let Some(contact) = found else {
            return Ok(contact_not_found(ctx, &id));
        };

        ctx.set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/vcard"));
        Ok(Reply::raw(contact.to_vcard()))
    }
}
