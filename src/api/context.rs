use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::MethodFilter,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// HTTP methods a route can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }

    pub fn filter(&self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Patch => MethodFilter::PATCH,
            HttpMethod::Delete => MethodFilter::DELETE,
            HttpMethod::Options => MethodFilter::OPTIONS,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(format!("unsupported HTTP method '{}'", other)),
        }
    }
}

impl TryFrom<&Method> for HttpMethod {
    type Error = String;

    fn try_from(method: &Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

/// Request body after content negotiation
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `Content-Type` contained `application/json`
    Json(Value),
    /// Any other declared content type
    Raw(Bytes),
    /// No `Content-Type` header
    Empty,
}

impl RequestBody {
    /// Negotiate the body by its `Content-Type` header
    pub fn parse(headers: &HeaderMap, bytes: Bytes) -> Result<Self, serde_json::Error> {
        let Some(content_type) = headers.get(header::CONTENT_TYPE) else {
            return Ok(RequestBody::Empty);
        };

        let is_json = content_type
            .to_str()
            .map(|value| value.contains("application/json"))
            .unwrap_or(false);

        if is_json {
            Ok(RequestBody::Json(serde_json::from_slice(&bytes)?))
        } else {
            Ok(RequestBody::Raw(bytes))
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// What a handler or a terminating middleware produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(Value),
    Raw(Bytes),
}

impl Reply {
    pub fn json<T: Serialize>(value: &T) -> anyhow::Result<Self> {
        Ok(Reply::Json(serde_json::to_value(value)?))
    }

    /// `{success: true, data}`
    pub fn success(data: Value) -> Self {
        Reply::Json(json!({ "success": true, "data": data }))
    }

    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Reply::Raw(bytes.into())
    }
}

/// Per-request scratch space shared by the middleware chain and the handler.
///
/// Created empty for every request and dropped with the response.
#[derive(Default)]
pub struct RequestCache {
    entries: HashMap<String, Box<dyn Any + Send>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Box::new(value));
    }

    /// Entry under `key`, if present and of type `T`
    pub fn get<T: Any + Send>(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|value| value.downcast_ref())
    }

    pub fn remove<T: Any + Send>(&mut self, key: &str) -> Option<T> {
        let value = self.entries.remove(key)?;
        value.downcast().ok().map(|boxed| *boxed)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCache")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Everything known about the request being dispatched, plus the response
/// status and headers.
///
/// Status and headers are a side channel: whoever produces a terminal error
/// sets the status here before returning the body.
#[derive(Debug)]
pub struct RequestContext {
    method: HttpMethod,
    path: String,
    params: HashMap<String, String>,
    headers: HeaderMap,
    status: StatusCode,
    response_headers: HeaderMap,
}

impl RequestContext {
    pub fn new(
        method: HttpMethod,
        path: impl Into<String>,
        params: HashMap<String, String>,
        headers: HeaderMap,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            params,
            headers,
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Path as requested, not the route pattern
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path parameter captured by the route pattern
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.insert(name, value);
    }

    /// Serialize `reply` with the status and headers collected on this context
    pub fn respond(self, reply: Reply) -> Response {
        let mut headers = self.response_headers;
        match reply {
            Reply::Json(value) => (self.status, headers, Json(value)).into_response(),
            Reply::Raw(bytes) => {
                if !headers.contains_key(header::CONTENT_TYPE) {
                    headers.insert(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/octet-stream"),
                    );
                }
                (self.status, headers, bytes).into_response()
            }
        }
    }
}
