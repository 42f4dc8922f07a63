//! Request tracing middleware.
//!
//! Wraps every request in an `api_request` span tagged with the topic it
//! addresses, and logs the outcome with its latency. A long-poll receive
//! shows up here with its full wait time.

use axum::{body::Body, http::Request, response::Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, info_span, warn, Instrument, Span};

/// Header a caller may set to correlate its logs with ours.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tracing layer that creates spans for each request
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

/// Tracing service
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        let path = req.uri().path().to_string();
        let span = info_span!(
            "api_request",
            http.method = %req.method(),
            http.target = %path,
            topic = topic_of(&path).unwrap_or("-"),
            request_id = %request_id(&req).unwrap_or_default(),
            http.status_code = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let started = Instant::now();
                let result = inner.call(req).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let span = Span::current();

                match &result {
                    Ok(response) => {
                        let status = response.status();
                        span.record("http.status_code", status.as_u16());
                        span.record(
                            "otel.status_code",
                            if status.is_server_error() { "ERROR" } else { "OK" },
                        );
                        if status.is_server_error() {
                            warn!(status = status.as_u16(), elapsed_ms, "Request failed");
                        } else {
                            debug!(status = status.as_u16(), elapsed_ms, "Request completed");
                        }
                    }
                    Err(_) => {
                        span.record("otel.status_code", "ERROR");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

/// Topic name of a `/topics/{topic}...` path, action suffix stripped.
fn topic_of(path: &str) -> Option<&str> {
    let segment = path.strip_prefix("/topics/")?.split('/').next()?;
    let topic = crate::routes::split_action(segment).map_or(segment, |(topic, _)| topic);
    (!topic.is_empty()).then_some(topic)
}

/// Caller-supplied request id, if present and printable.
fn request_id<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(REQUEST_ID_HEADER)?
        .to_str()
        .ok()
        .map(str::to_string)
}
