use std::sync::Arc;

use crate::api::context::{Reply, RequestBody, RequestCache, RequestContext};

/// Outcome of one middleware step
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Hand the request to the next middleware, or the handler
    Continue,
    /// Stop here and answer with this reply
    Terminate(Reply),
}

/// Inspects a request before its handler runs and may answer it instead.
///
/// A middleware that terminates is expected to set the response status on
/// the context.
#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn handle_request(
        &self,
        ctx: &mut RequestContext,
        body: &RequestBody,
        cache: &mut RequestCache,
    ) -> anyhow::Result<Flow>;
}

/// Run `chain` in order; the first middleware to terminate wins.
pub async fn run_chain(
    chain: &[Arc<dyn Middleware>],
    ctx: &mut RequestContext,
    body: &RequestBody,
    cache: &mut RequestCache,
) -> anyhow::Result<Flow> {
    for middleware in chain {
        if let Flow::Terminate(reply) = middleware.handle_request(ctx, body, cache).await? {
            log::debug!(
                "{} {} stopped by middleware '{}' with {}",
                ctx.method(),
                ctx.path(),
                middleware.name(),
                ctx.status()
            );
            return Ok(Flow::Terminate(reply));
        }
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::context::HttpMethod;
    use crate::api::error::error_reply;
    use axum::http::{HeaderMap, StatusCode};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        terminate: bool,
    }

    #[async_trait::async_trait]
    impl Middleware for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle_request(
            &self,
            ctx: &mut RequestContext,
            _body: &RequestBody,
            cache: &mut RequestCache,
        ) -> anyhow::Result<Flow> {
            self.log.lock().push(self.name);
            cache.insert(self.name, true);
            if self.terminate {
                return Ok(Flow::Terminate(error_reply(ctx, StatusCode::FORBIDDEN, self.name)));
            }
            Ok(Flow::Continue)
        }
    }

    fn chain(log: &Arc<Mutex<Vec<&'static str>>>, spec: &[(&'static str, bool)]) -> Vec<Arc<dyn Middleware>> {
        spec.iter()
            .map(|&(name, terminate)| {
                Arc::new(Recorder {
                    name,
                    log: Arc::clone(log),
                    terminate,
                }) as Arc<dyn Middleware>
            })
            .collect()
    }

    fn context() -> RequestContext {
        RequestContext::new(HttpMethod::Get, "/items", HashMap::new(), HeaderMap::new())
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let middleware = chain(&log, &[("first", false), ("second", false)]);
        let mut ctx = context();
        let mut cache = RequestCache::new();

        let flow = run_chain(&middleware, &mut ctx, &RequestBody::Empty, &mut cache)
            .await
            .unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert!(cache.contains("first") && cache.contains("second"));
    }

    #[tokio::test]
    async fn test_first_terminator_wins() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let middleware = chain(&log, &[("first", false), ("guard", true), ("never", true)]);
        let mut ctx = context();
        let mut cache = RequestCache::new();

        let flow = run_chain(&middleware, &mut ctx, &RequestBody::Empty, &mut cache)
            .await
            .unwrap();

        assert!(matches!(flow, Flow::Terminate(_)));
        assert_eq!(*log.lock(), vec!["first", "guard"]);
        assert_eq!(ctx.status(), StatusCode::FORBIDDEN);
    }
}
