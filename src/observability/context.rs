//! Per-request correlation context.
//!
//! # Responsibilities
//! - Take the request id from the configured header, or generate one
//! - Take trace and span ids from B3 headers when an upstream sent them
//! - Resolve the client IP the way reverse proxies report it

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, HeaderName, Request},
};
use std::net::SocketAddr;
use uuid::Uuid;

/// Default request id header.
pub const X_REQUEST_ID: &str = "x-request-id";
/// B3 trace id header.
pub const X_B3_TRACE_ID: &str = "x-b3-traceid";
/// B3 span id header.
pub const X_B3_SPAN_ID: &str = "x-b3-spanid";

/// Correlation identifiers of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

impl RequestContext {
    /// Build the context from inbound headers.
    ///
    /// The request id is taken verbatim, so it matches the id echoed in the
    /// response. Only a missing or empty header triggers generation.
    pub fn from_headers(headers: &HeaderMap, request_id_header: &HeaderName) -> Self {
        let request_id = headers
            .get(request_id_header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map_or_else(generate_request_id, String::from);

        Self {
            request_id,
            trace_id: header_str(headers, X_B3_TRACE_ID),
            span_id: header_str(headers, X_B3_SPAN_ID),
        }
    }
}

/// Generate a request id: a hyphenated UUID v4, the same form the server's
/// request-id layer generates.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Client IP: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer.
pub fn client_ip<B>(request: &Request<B>) -> String {
    let headers = request.headers();
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        return real_ip;
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}
