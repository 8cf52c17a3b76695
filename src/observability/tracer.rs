//! Distributed tracing lifecycle.
//!
//! # Responsibilities
//! - Decide from the environment whether a trace collector is reachable
//! - Install the B3 propagator and an OTLP/HTTP export pipeline once
//! - Flush and shut the pipeline down exactly once at exit
//!
//! # Design Decisions
//! - No collector means no globals are touched; request headers keep their
//!   plain semantics and the OpenTelemetry API stays a no-op
//! - Exporter failures after startup are reported through `tracing`
//!   (OpenTelemetry internal logs) and never reach request handling
//! - Every span is sampled; sampling belongs to the collector

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{Sampler, SdkTracerProvider},
    Resource,
};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::config::schema::executable_name;
use crate::health::{HostnameProvider, SystemHostname};
use crate::observability::propagation::B3Propagator;

pub const ENDPOINT_VAR: &str = "JAEGER_ENDPOINT";
pub const SERVICE_NAME_VAR: &str = "JAEGER_SERVICE_NAME";
pub const COLLECTOR_HOST_VAR: &str = "JAEGER_COLLECTOR_SERVICE_HOST";
pub const COLLECTOR_PORT_VAR: &str = "JAEGER_COLLECTOR_SERVICE_PORT_JAEGER_COLLECTOR_HTTP";

/// Downward-API variables copied into the resource when present.
pub const METADATA_VARS: [&str; 3] = ["METADATA_NAME", "METADATA_NAMESPACE", "METADATA_UID"];

/// Path of the OTLP/HTTP trace receiver on a collector.
const TRACES_PATH: &str = "/v1/traces";

#[derive(Debug, Error)]
pub enum TracerError {
    #[error("failed to build span exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),
}

/// Tracing inputs read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TracerSettings {
    /// Collector endpoint; `None` disables tracing.
    pub endpoint: Option<String>,
    pub service_name: String,
    /// Present `METADATA_*` variables, in declaration order.
    pub metadata: Vec<(String, String)>,
}

impl TracerSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENDPOINT_VAR).or_else(|| {
            lookup(COLLECTOR_HOST_VAR).map(|host| {
                let port = lookup(COLLECTOR_PORT_VAR).unwrap_or_default();
                format!("http://{}:{}{}", host, port, TRACES_PATH)
            })
        });

        let metadata = METADATA_VARS
            .iter()
            .filter_map(|var| lookup(var).map(|value| (var.to_string(), value)))
            .collect();

        Self {
            endpoint: endpoint.filter(|e| !e.is_empty()),
            service_name: lookup(SERVICE_NAME_VAR).unwrap_or_else(executable_name),
            metadata,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }
}

/// Process tags attached to every exported span.
pub fn process_tags(
    settings: &TracerSettings,
    app_info: &BTreeMap<String, String>,
    hostname: &dyn HostnameProvider,
) -> Vec<KeyValue> {
    let hostname = hostname.hostname().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "hostname lookup failure; using \"localhost\"");
        "localhost".to_string()
    });

    let mut tags = vec![
        KeyValue::new("cmd", executable_name()),
        KeyValue::new("args", std::env::args().skip(1).collect::<Vec<_>>().join(" ")),
        KeyValue::new("hostname", hostname),
    ];
    tags.extend(
        app_info
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
    );
    tags.extend(
        settings
            .metadata
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
    );
    tags
}

/// Set up tracing for the process.
///
/// Returns a no-op guard when no collector is configured.
pub fn init_tracer(
    settings: &TracerSettings,
    app_info: &BTreeMap<String, String>,
) -> Result<TracerGuard, TracerError> {
    let Some(endpoint) = settings.endpoint.as_deref() else {
        tracing::info!("no trace collector found");
        return Ok(TracerGuard::disabled());
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()?;

    let resource = Resource::builder()
        .with_service_name(settings.service_name.clone())
        .with_attributes(process_tags(settings, app_info, &SystemHostname))
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(resource)
        .build();

    global::set_text_map_propagator(B3Propagator::new());
    global::set_tracer_provider(provider.clone());

    tracing::info!(
        otel.endpoint = %endpoint,
        otel.service_name = %settings.service_name,
        "Trace export pipeline installed"
    );

    Ok(TracerGuard {
        provider: Some(provider),
    })
}

/// Owner of the export pipeline.
///
/// [`release`](Self::release) flushes buffered spans and shuts the exporter
/// down. Dropping the guard does the same if it was not released.
#[must_use = "dropping the guard shuts the trace pipeline down"]
pub struct TracerGuard {
    provider: Option<SdkTracerProvider>,
}

impl TracerGuard {
    /// Guard with nothing to release.
    pub fn disabled() -> Self {
        Self { provider: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Flush and shut down. Blocks until the exporter is done.
    pub fn release(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        match provider.shutdown() {
            Ok(()) => tracing::info!("Trace export pipeline shut down"),
            Err(e) => tracing::error!(error = %e, "Trace export pipeline shutdown failed"),
        }
    }
}

impl fmt::Debug for TracerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracerGuard")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl Drop for TracerGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_no_collector_is_disabled() {
        let settings = TracerSettings::from_lookup(lookup(&[]));
        assert!(!settings.is_enabled());
        assert_eq!(settings.service_name, executable_name());
        assert!(settings.metadata.is_empty());
    }

    #[test]
    fn test_explicit_endpoint_wins() {
        let settings = TracerSettings::from_lookup(lookup(&[
            (ENDPOINT_VAR, "http://collector:4318/v1/traces"),
            (COLLECTOR_HOST_VAR, "ignored"),
            (SERVICE_NAME_VAR, "orders"),
        ]));
        assert_eq!(settings.endpoint.as_deref(), Some("http://collector:4318/v1/traces"));
        assert_eq!(settings.service_name, "orders");
    }

    #[test]
    fn test_endpoint_from_collector_service() {
        let settings = TracerSettings::from_lookup(lookup(&[
            (COLLECTOR_HOST_VAR, "10.0.0.5"),
            (COLLECTOR_PORT_VAR, "4318"),
        ]));
        assert_eq!(settings.endpoint.as_deref(), Some("http://10.0.0.5:4318/v1/traces"));
    }

    #[test]
    fn test_empty_endpoint_is_disabled() {
        let settings = TracerSettings::from_lookup(lookup(&[(ENDPOINT_VAR, "")]));
        assert!(!settings.is_enabled());
    }

    fn tag(tags: &[KeyValue], key: &str) -> Option<String> {
        tags.iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.to_string())
    }

    #[test]
    fn test_process_tags_share_the_health_hostname() {
        let expected = SystemHostname
            .hostname()
            .unwrap_or_else(|_| "localhost".to_string());
        let tags = process_tags(&TracerSettings::default(), &BTreeMap::new(), &SystemHostname);

        let hostname = tag(&tags, "hostname").unwrap();
        assert!(!hostname.is_empty());
        assert_eq!(hostname, expected);
    }

    #[test]
    fn test_process_tags() {
        let settings = TracerSettings::from_lookup(lookup(&[
            ("METADATA_UID", "1234"),
            ("METADATA_NAME", "orders-7d9f"),
        ]));
        let app_info = BTreeMap::from([("version".to_string(), "1.2.3".to_string())]);

        let no_uts = || -> std::io::Result<String> { Err(std::io::Error::other("no uts")) };
        let tags = process_tags(&settings, &app_info, &no_uts);
        let find = |key: &str| tag(&tags, key);

        assert_eq!(find("hostname").as_deref(), Some("localhost"));
        assert_eq!(find("cmd"), Some(executable_name()));
        assert_eq!(find("version").as_deref(), Some("1.2.3"));
        assert_eq!(find("METADATA_NAME").as_deref(), Some("orders-7d9f"));
        assert_eq!(find("METADATA_UID").as_deref(), Some("1234"));
        assert!(find("METADATA_NAMESPACE").is_none());
    }

    #[test]
    fn test_disabled_init_is_noop() {
        use crate::observability::propagation::extract_remote_context;
        use axum::http::{HeaderMap, HeaderValue};
        use opentelemetry::trace::TraceContextExt;

        let guard = init_tracer(&TracerSettings::default(), &BTreeMap::new()).unwrap();
        assert!(!guard.is_enabled());

        let mut headers = HeaderMap::new();
        headers.insert("x-b3-traceid", HeaderValue::from_static("80f198ee56343ba864fe8b2a57d3eff7"));
        headers.insert("x-b3-spanid", HeaderValue::from_static("e457b5a2e4d86bd1"));
        headers.insert("x-b3-sampled", HeaderValue::from_static("1"));
        assert!(!extract_remote_context(&headers).span().span_context().is_valid());

        guard.release();
    }
}
