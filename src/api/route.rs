use std::fmt;
use std::sync::Arc;

use crate::api::context::{HttpMethod, Reply, RequestBody, RequestCache, RequestContext};
use crate::api::middleware::Middleware;
use crate::api::schema_middleware::SchemaMiddleware;
use crate::model::Schema;

/// An endpoint plugged into the dispatcher.
///
/// `schema` and `middleware` are read once, when the route is turned into a
/// [`RouteDescriptor`].
#[async_trait::async_trait]
pub trait ApiRoute: Send + Sync + 'static {
    fn method(&self) -> HttpMethod;

    /// Path pattern, e.g. `/contacts/:id`
    fn path(&self) -> &str;

    /// Closed-world schema for the JSON body
    fn schema(&self) -> Option<Schema> {
        None
    }

    /// Middleware to run before the handler, in order
    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        Vec::new()
    }

    async fn handle_request(
        &self,
        ctx: &mut RequestContext,
        body: RequestBody,
        cache: &mut RequestCache,
    ) -> anyhow::Result<Reply>;
}

/// Immutable registration record for one `(method, path)` pair.
///
/// The middleware list is final: a [`SchemaMiddleware`] comes first when the
/// route declares a schema.
pub struct RouteDescriptor {
    method: HttpMethod,
    path: String,
    schema: Option<Schema>,
    middleware: Vec<Arc<dyn Middleware>>,
    handler: Arc<dyn ApiRoute>,
}

impl RouteDescriptor {
    pub fn new(route: impl ApiRoute) -> Self {
        Self::from_arc(Arc::new(route))
    }

    pub fn from_arc(route: Arc<dyn ApiRoute>) -> Self {
        let method = route.method();
        let path = route.path().to_string();
        let schema = route.schema();

        let mut middleware: Vec<Arc<dyn Middleware>> = Vec::new();
        if let Some(schema) = &schema {
            for (field, tag) in schema.unknown_types() {
                log::warn!(
                    "Route '{} {}': field '{}' uses unknown type '{}', any value will be accepted",
                    method,
                    path,
                    field,
                    tag
                );
            }
            middleware.push(Arc::new(SchemaMiddleware::new(schema.clone())));
        }
        middleware.extend(route.middleware());

        Self {
            method,
            path,
            schema,
            middleware,
            handler: route,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    pub fn handler(&self) -> &Arc<dyn ApiRoute> {
        &self.handler
    }

    /// `METHOD path`, as used in logs
    pub fn identity(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("schema", &self.schema)
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
