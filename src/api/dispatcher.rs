use axum::{
    body::Body,
    extract::{Path, Request},
    http::StatusCode,
    response::Response,
    routing::MethodRouter,
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::api::context::{HttpMethod, Reply, RequestBody, RequestCache, RequestContext};
use crate::api::error::{
    error_reply, not_found, panic_response, route_aborted_response, route_panic_response,
    INTERNAL_SERVER_ERROR,
};
use crate::api::middleware::{run_chain, Flow};
use crate::api::route::{ApiRoute, RouteDescriptor};

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route '{method} {path}' is registered twice")]
    Duplicate { method: HttpMethod, path: String },
    #[error("route path '{path}' conflicts with '{existing}'")]
    Conflict { path: String, existing: String },
    #[error("route path '{0}' must start with '/'")]
    InvalidPath(String),
}

/// Routing table plus the per-request pipeline.
///
/// Routes are registered once at startup; [`into_router`](Self::into_router)
/// freezes the table into an axum [`Router`].
#[derive(Debug, Default)]
pub struct Dispatcher {
    routes: Vec<Arc<RouteDescriptor>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route; at most one route may exist per `(method, path)`
    pub fn register(&mut self, route: RouteDescriptor) -> Result<&mut Self, RouteError> {
        if !route.path().starts_with('/') {
            return Err(RouteError::InvalidPath(route.path().to_string()));
        }

        for existing in &self.routes {
            if existing.path() == route.path() {
                if existing.method() == route.method() {
                    return Err(RouteError::Duplicate {
                        method: route.method(),
                        path: route.path().to_string(),
                    });
                }
                continue;
            }
            if paths_conflict(existing.path(), route.path()) {
                return Err(RouteError::Conflict {
                    path: route.path().to_string(),
                    existing: existing.path().to_string(),
                });
            }
        }

        log::debug!("Registered route {}", route.identity());
        self.routes.push(Arc::new(route));
        Ok(self)
    }

    /// Builder-style [`register`](Self::register)
    pub fn route(mut self, route: impl ApiRoute) -> Result<Self, RouteError> {
        self.register(RouteDescriptor::new(route))?;
        Ok(self)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.routes.iter().map(|route| route.as_ref())
    }

    /// Route registered for exactly this method and path pattern
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&RouteDescriptor> {
        self.routes()
            .find(|route| route.method() == method && route.path() == path)
    }

    /// Run one request through `route`: parse the body, run the middleware
    /// chain, call the handler.
    ///
    /// Every failure along the way is logged and turned into a 500 reply.
    pub async fn handle(route: &RouteDescriptor, ctx: &mut RequestContext, body: Body) -> Reply {
        match Self::run(route, ctx, body).await {
            Ok(reply) => reply,
            Err(error) => {
                log::error!("Failed to handle '{}': {:#}", route.identity(), error);
                error_reply(ctx, StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
            }
        }
    }

    async fn run(route: &RouteDescriptor, ctx: &mut RequestContext, body: Body) -> anyhow::Result<Reply> {
        let bytes = axum::body::to_bytes(body, usize::MAX).await?;
        let body = RequestBody::parse(ctx.headers(), bytes)?;
        let mut cache = RequestCache::new();

        if let Flow::Terminate(reply) = run_chain(route.middleware(), ctx, &body, &mut cache).await? {
            return Ok(reply);
        }

        route.handler().handle_request(ctx, body, &mut cache).await
    }

    /// Freeze the routing table into a router with CORS and panic trapping
    pub fn into_router(self) -> Router {
        let mut by_path: Vec<(String, Vec<Arc<RouteDescriptor>>)> = Vec::new();
        for route in self.routes {
            match by_path.iter_mut().find(|(path, _)| path.as_str() == route.path()) {
                Some((_, group)) => group.push(route),
                None => by_path.push((route.path().to_string(), vec![route])),
            }
        }

        let mut router = Router::new();
        for (path, group) in by_path {
            let mut method_router = MethodRouter::new();
            for route in group {
                let filter = route.method().filter();
                let handler = move |params: Option<Path<HashMap<String, String>>>, request: Request| {
                    let route = Arc::clone(&route);
                    async move { forward(route, params, request).await }
                };
                method_router = method_router.on(filter, handler);
            }
            router = router.route(&path, method_router.fallback(not_found));
        }

        router
            .fallback(not_found)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(CorsLayer::permissive())
    }
}

async fn forward(
    route: Arc<RouteDescriptor>,
    params: Option<Path<HashMap<String, String>>>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let params = params.map(|Path(params)| params).unwrap_or_default();
    let mut ctx = RequestContext::new(route.method(), parts.uri.path(), params, parts.headers);

    // own task: a panic is reported with the route and a dropped client
    // connection does not abort work in flight
    let identity = route.identity();
    let handled = tokio::spawn(async move {
        let reply = Dispatcher::handle(&route, &mut ctx, body).await;
        ctx.respond(reply)
    })
    .await;

    match handled {
        Ok(response) => response,
        Err(error) => match error.try_into_panic() {
            Ok(panic) => route_panic_response(&identity, panic),
            Err(error) => route_aborted_response(&identity, error),
        },
    }
}

fn is_dynamic(segment: &str) -> bool {
    segment.starts_with(':') || segment.starts_with('*')
}

/// Whether two different patterns capture different parameters at the same
/// position after a common prefix, which the router cannot tell apart.
///
/// A wildcard also conflicts with any other segment at its position.
/// `/a/:id` vs `/a/:key` and `/files/:id` vs `/files/*rest` conflict;
/// `/a/:id` vs `/a/:id/b` and `/a/:id` vs `/a/new` do not.
fn paths_conflict(left: &str, right: &str) -> bool {
    for (a, b) in left.split('/').zip(right.split('/')) {
        if a == b {
            continue;
        }
        if a.starts_with('*') || b.starts_with('*') {
            return true;
        }
        return is_dynamic(a) && is_dynamic(b);
    }
    false
}
