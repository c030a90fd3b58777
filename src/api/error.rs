use axum::{
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use std::any::Any;

use crate::api::context::{Reply, RequestContext};

pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// `{success: false, message}`
pub fn error_body(message: impl Into<String>) -> Value {
    json!({ "success": false, "message": message.into() })
}

/// Set the response status on the context and return the error envelope
pub fn error_reply(ctx: &mut RequestContext, status: StatusCode, message: impl Into<String>) -> Reply {
    ctx.set_status(status);
    Reply::Json(error_body(message))
}

/// Fallback for requests no route matches
pub async fn not_found(method: Method, uri: Uri) -> Response {
    let message = format!("the route '{} {}' is not implemented", method, uri.path());
    (StatusCode::NOT_FOUND, Json(error_body(message))).into_response()
}

fn panic_detail(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload")
}

fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(error_body(INTERNAL_SERVER_ERROR)),
    )
        .into_response()
}

/// Response used when a panic escapes outside any route
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    log::error!("Request handler panicked: {}", panic_detail(panic.as_ref()));
    internal_error_response()
}

/// Response used when the handler for `identity` (`METHOD path`) panics
pub fn route_panic_response(identity: &str, panic: Box<dyn Any + Send + 'static>) -> Response {
    log::error!(
        "Failed to handle '{}': handler panicked: {}",
        identity,
        panic_detail(panic.as_ref())
    );
    internal_error_response()
}

/// Response used when the task running `identity` was cancelled
pub fn route_aborted_response(identity: &str, error: impl std::fmt::Display) -> Response {
    log::error!("Failed to handle '{}': {}", identity, error);
    internal_error_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_route_panic_response_is_opaque() {
        let response = route_panic_response("GET /explode", Box::new("database password leaked"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"success": false, "message": "Internal Server Error"}));
    }

    #[test]
    fn test_panic_detail_reads_common_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_detail(owned.as_ref()), "owned");
        assert_eq!(panic_detail(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_detail(other.as_ref()), "unknown panic payload");
    }
}
