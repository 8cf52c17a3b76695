//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default live-task threshold for the readiness check.
pub const DEFAULT_TASK_THRESHOLD: u64 = 1000;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listen port.
    pub port: u16,

    /// Externally reachable base URL. Derived from the port and service
    /// identity when unset.
    pub base_url: Option<String>,

    /// Workload name; defaults to the executable name.
    pub k8s_app_name: Option<String>,

    /// Workload namespace; defaults to `default`.
    pub k8s_namespace: Option<String>,

    /// Maximum number of live runtime tasks before readiness fails.
    #[serde(alias = "goroutine_threshold")]
    pub task_threshold: u64,

    /// Logging and request-correlation settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            base_url: None,
            k8s_app_name: None,
            k8s_namespace: None,
            task_threshold: DEFAULT_TASK_THRESHOLD,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Effective workload name.
    pub fn app_name(&self) -> String {
        self.k8s_app_name
            .clone()
            .unwrap_or_else(executable_name)
    }

    /// Effective workload namespace.
    pub fn namespace(&self) -> String {
        self.k8s_namespace
            .clone()
            .unwrap_or_else(|| "default".to_string())
    }

    /// Effective base URL.
    ///
    /// An explicit value wins. Otherwise a configured workload identity yields
    /// the in-cluster service address, and a bare config yields localhost.
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.clone();
        }
        if self.k8s_app_name.is_some() || self.k8s_namespace.is_some() {
            format!(
                "http://{}.{}.svc.cluster.local:{}",
                self.app_name(),
                self.namespace(),
                self.port
            )
        } else {
            format!("http://localhost:{}", self.port)
        }
    }

    /// Bind address for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Output format of the structured logger.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty output on a terminal, JSON otherwise.
    #[default]
    Auto,
    /// Human-readable output.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parse a log format name; unknown names fall back to `Auto`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Auto,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Level applied to OpenTelemetry's internal diagnostics.
    pub otel_log_level: String,

    /// Header carrying the inbound request id.
    pub request_id_header: String,

    /// Header selecting liveness mode on the health endpoint.
    pub liveness_header: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Auto,
            otel_log_level: "warn".to_string(),
            request_id_header: "x-request-id".to_string(),
            liveness_header: "liveness".to_string(),
        }
    }
}

/// Base name of the running executable.
pub fn executable_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .and_then(|arg| Path::new(arg).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.task_threshold, 1000);
        assert_eq!(config.namespace(), "default");
        assert_eq!(config.base_url(), "http://localhost:8080");
        assert_eq!(config.observability.request_id_header, "x-request-id");
    }

    #[test]
    fn test_cluster_base_url() {
        let config = ServiceConfig {
            port: 9000,
            k8s_app_name: Some("orders".into()),
            ..Default::default()
        };
        assert_eq!(
            config.base_url(),
            "http://orders.default.svc.cluster.local:9000"
        );

        let explicit = ServiceConfig {
            base_url: Some("https://orders.example.com".into()),
            k8s_app_name: Some("orders".into()),
            ..Default::default()
        };
        assert_eq!(explicit.base_url(), "https://orders.example.com");
    }

    #[test]
    fn test_goroutine_threshold_alias() {
        let config: ServiceConfig = toml::from_str("goroutine_threshold = 42").unwrap();
        assert_eq!(config.task_threshold, 42);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("whatever"), LogFormat::Auto);
    }
}
