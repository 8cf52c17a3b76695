//! `GET /healthz` endpoint.

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::health::aggregator::{HealthAggregator, Mode};

/// Shared state of the health endpoint.
#[derive(Clone)]
pub struct HealthState {
    pub aggregator: Arc<HealthAggregator>,
    pub liveness_header: HeaderName,
}

impl HealthState {
    pub fn new(aggregator: HealthAggregator, liveness_header: HeaderName) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            liveness_header,
        }
    }
}

/// Serve readiness, or liveness when the marker header is set.
///
/// Kubernetes selects the mode per check: the liveness check sends
/// `LIVENESS: 1`, the readiness check sends nothing.
///
/// ```yaml
/// httpGet:
///   path: /healthz
///   port: 8080
///   httpHeaders:
///   - name: LIVENESS
///     value: "1"
/// ```
///
/// The built-in runtime check reports `message: readiness_NumTasks` with the
/// metadata keys `TaskThreshold` and `NumTasks`. It counts live Tokio tasks,
/// so the goroutine names (`readiness_NumGoroutine`, `GoroutineThreshold`,
/// `NumGoroutine`) never appear in the body. Alerting rules keyed on those
/// names must match the new ones.
pub async fn healthz(State(state): State<HealthState>, headers: HeaderMap) -> Response {
    let mode = Mode::from_headers(&headers, &state.liveness_header);

    match state.aggregator.evaluate(mode) {
        Ok((body, status)) => (status, Json(body)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Health endpoint failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
