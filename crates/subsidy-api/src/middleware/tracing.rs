//! Per-request logging for the subsidy API.
//!
//! Every request runs inside a `subsidy_request` span. POST routes submit a
//! ledger transaction and wait for its confirmation, so they are flagged as
//! `ledger_write` to tell slow confirmations apart from slow reads. Server
//! errors are logged at `warn`.

use axum::{body::Body, http::Method, http::Request, response::Response};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{info, info_span, warn, Instrument, Span};

/// Wraps the router so every request gets its own span
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = RequestSpan<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestSpan { inner }
    }
}

#[derive(Clone)]
pub struct RequestSpan<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestSpan<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let span = request_span(&req);

        Box::pin(
            async move {
                let started = Instant::now();
                let result = inner.call(req).await;

                if let Ok(response) = &result {
                    let status = response.status();
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    Span::current().record("status", status.as_u16());
                    if status.is_server_error() {
                        warn!(status = status.as_u16(), elapsed_ms, "request failed");
                    } else {
                        info!(status = status.as_u16(), elapsed_ms, "request handled");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

fn request_span<B>(req: &Request<B>) -> Span {
    let span = info_span!(
        "subsidy_request",
        method = %req.method(),
        path = %req.uri().path(),
        ledger_write = is_ledger_write(req.method()),
        status = tracing::field::Empty,
    );
    if let Some((trace_id, parent_id)) = traceparent(req) {
        span.follows_from(info_span!("upstream", trace_id, parent_id));
    }
    span
}

fn is_ledger_write(method: &Method) -> bool {
    *method == Method::POST
}

// W3C `version-traceid-parentid-flags`
fn traceparent<B>(req: &Request<B>) -> Option<(&str, &str)> {
    let value = req.headers().get("traceparent")?.to_str().ok()?;
    let mut parts = value.split('-');
    let (_version, trace_id, parent_id, _flags) =
        (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || trace_id.len() != 32 || parent_id.len() != 16 {
        return None;
    }
    Some((trace_id, parent_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_traceparent(value: &str) -> Request<Body> {
        Request::builder()
            .header("traceparent", value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_upstream_trace_ids_extracted() {
        let req = with_traceparent("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01");
        assert_eq!(
            traceparent(&req),
            Some(("0af7651916cd43dd8448eb211c80319c", "b7ad6b7169203331"))
        );
    }

    #[test]
    fn test_malformed_traceparent_ignored() {
        assert!(traceparent(&with_traceparent("garbage")).is_none());
        assert!(traceparent(&with_traceparent("00-abc-def-01")).is_none());
        assert!(traceparent(&Request::builder().body(Body::empty()).unwrap()).is_none());
    }

    #[test]
    fn test_post_routes_flagged_as_ledger_writes() {
        assert!(is_ledger_write(&Method::POST));
        assert!(!is_ledger_write(&Method::GET));
    }
}
