//! Request observability middleware.
//!
//! # Responsibilities
//! - Attach a [`RequestContext`] to every request
//! - Run the handler inside a `request` span carrying the correlation ids
//! - Start an OpenTelemetry server span parented on the inbound trace context
//! - Emit exactly one access-log event per request, leveled by status
//!
//! # Design Decisions
//! - One event per request, emitted after the handler returns
//! - Correlation ids are fields of the `request` span; the JSON formatter
//!   lifts them onto this event and onto every event the handler logs
//! - Handler failures surface through [`ErrorAnnotations`], not the status alone
//! - The response status is never rewritten here

use axum::{
    extract::{Request, State},
    http::{header, HeaderName},
    middleware::Next,
    response::Response,
};
use opentelemetry::{
    global,
    trace::{SpanBuilder, SpanKind, Status, TraceContextExt, Tracer},
    KeyValue,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::config::ObservabilityConfig;
use crate::http::response::ErrorAnnotations;
use crate::observability::context::{client_ip, RequestContext, X_REQUEST_ID};
use crate::observability::propagation::extract_remote_context;

/// Instrumentation scope of spans started by this middleware.
pub const TRACER_NAME: &str = "service-observability";

/// Message of access-log events for requests without handler errors.
const DEFAULT_MESSAGE: &str = "Request";

/// Shared state of [`observe_request`].
#[derive(Debug, Clone)]
pub struct RequestObserver {
    request_id_header: HeaderName,
}

impl Default for RequestObserver {
    fn default() -> Self {
        Self::new(HeaderName::from_static(X_REQUEST_ID))
    }
}

impl RequestObserver {
    pub fn new(request_id_header: HeaderName) -> Self {
        Self { request_id_header }
    }

    /// Falls back to `x-request-id` when the configured header is not a valid name.
    pub fn from_config(config: &ObservabilityConfig) -> Self {
        match HeaderName::try_from(config.request_id_header.as_str()) {
            Ok(name) => Self::new(name),
            Err(_) => {
                tracing::warn!(
                    header = %config.request_id_header,
                    "Invalid request id header, using x-request-id"
                );
                Self::default()
            }
        }
    }

    pub fn request_id_header(&self) -> &HeaderName {
        &self.request_id_header
    }
}

/// Access-log and trace every request.
///
/// Install with `axum::middleware::from_fn_with_state(Arc<RequestObserver>, observe_request)`.
pub async fn observe_request(
    State(observer): State<Arc<RequestObserver>>,
    mut req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let ctx = RequestContext::from_headers(req.headers(), &observer.request_id_header);
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let ip = client_ip(&req);
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let span = tracing::info_span!(
        "request",
        request_id = %ctx.request_id,
        trace.id = ctx.trace_id.as_deref(),
        span.id = ctx.span_id.as_deref(),
    );

    let parent_cx = extract_remote_context(req.headers());
    let otel_span = global::tracer(TRACER_NAME).build_with_context(
        SpanBuilder::from_name(format!("{} {}", method, path))
            .with_kind(SpanKind::Server)
            .with_attributes([
                KeyValue::new("http.request.method", method.to_string()),
                KeyValue::new("url.path", path.clone()),
                KeyValue::new("request_id", ctx.request_id.clone()),
            ]),
        &parent_cx,
    );
    let otel_cx = parent_cx.with_span(otel_span);

    req.extensions_mut().insert(ctx);
    req.extensions_mut().insert(otel_cx.clone());

    let response = next.run(req).instrument(span.clone()).await;

    let latency = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status();
    let message = match response.extensions().get::<ErrorAnnotations>() {
        Some(errors) if !errors.is_empty() => errors.to_string(),
        _ => DEFAULT_MESSAGE.to_string(),
    };

    span.in_scope(|| {
        macro_rules! access_log {
            ($level:ident) => {
                tracing::$level!(
                    status = status.as_u16(),
                    method = %method,
                    path = %path,
                    ip = %ip,
                    latency = latency,
                    "user-agent" = %user_agent,
                    "{}",
                    message
                )
            };
        }

        if status.is_server_error() {
            access_log!(error);
        } else if status.is_client_error() {
            access_log!(warn);
        } else {
            access_log!(info);
        }
    });

    let otel_span = otel_cx.span();
    otel_span.set_attribute(KeyValue::new(
        "http.response.status_code",
        i64::from(status.as_u16()),
    ));
    if status.is_server_error() {
        otel_span.set_status(Status::error(message));
    }
    otel_span.end();

    response
}
