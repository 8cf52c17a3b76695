//! Shared utilities for integration tests.

use axum::{body::Body, http::Request, Router};
use serde_json::Value;
use service_observability::observability::logging::FlatJson;
use std::io;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::{format::JsonFields, MakeWriter};

/// In-memory sink for JSON log lines.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[allow(dead_code)]
impl CapturedLogs {
    /// Every captured line, parsed.
    pub fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    /// Access-log events: the lines carrying a `status` field.
    pub fn access_logs(&self) -> Vec<Value> {
        self.lines()
            .into_iter()
            .filter(|line| line.get("status").is_some())
            .collect()
    }

    /// The single access-log event of the test.
    pub fn access_log(&self) -> Value {
        let mut logs = self.access_logs();
        assert_eq!(logs.len(), 1, "expected exactly one access log, got {logs:?}");
        logs.remove(0)
    }
}

/// Subscriber writing JSON lines into `logs`, in the production layout.
#[allow(dead_code)]
pub fn json_subscriber(logs: &CapturedLogs) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .fmt_fields(JsonFields::new())
        .event_format(FlatJson)
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs.clone())
        .finish()
}

/// Route JSON logs of the current thread into a buffer.
///
/// Use with a current-thread runtime.
#[allow(dead_code)]
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing::subscriber::set_default(json_subscriber(&logs));
    (logs, guard)
}

/// Send one request through `app` in-process.
#[allow(dead_code)]
pub async fn send(app: Router, request: Request<Body>) -> axum::response::Response {
    app.oneshot(request).await.unwrap()
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
