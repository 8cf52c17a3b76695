//! Health aggregation.
//!
//! # Responsibilities
//! - Own the registry of checks for one aggregator instance
//! - Short-circuit liveness requests without running checks
//! - Run every readiness check in registration order (no fail-fast)
//! - Fold the results into one response and status code

use axum::http::{HeaderMap, HeaderName, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::health::check::{CheckError, HealthCheck};
use crate::health::tasks::TaskCountCheck;

/// Health mode, decided once at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Process is alive; checks are skipped.
    Liveness,
    /// Process can serve traffic; all checks run.
    Readiness,
}

impl Mode {
    /// Liveness if `marker` carries a non-empty value, readiness otherwise.
    pub fn from_headers(headers: &HeaderMap, marker: &HeaderName) -> Self {
        match headers.get(marker) {
            Some(value) if !value.is_empty() => Mode::Liveness,
            _ => Mode::Readiness,
        }
    }
}

/// Aggregate health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub hostname: String,
    pub metadata: BTreeMap<String, String>,
    pub errors: Vec<CheckError>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn status(&self) -> StatusCode {
        if self.is_healthy() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Failure of the health endpoint itself.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("error getting hostname: {0}")]
    Hostname(#[source] io::Error),
}

/// Source of the local host identity.
pub trait HostnameProvider: Send + Sync {
    fn hostname(&self) -> io::Result<String>;
}

/// Hostname from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostname;

impl HostnameProvider for SystemHostname {
    fn hostname(&self) -> io::Result<String> {
        hostname::get()?
            .into_string()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "hostname is not valid UTF-8"))
    }
}

impl<F> HostnameProvider for F
where
    F: Fn() -> io::Result<String> + Send + Sync,
{
    fn hostname(&self) -> io::Result<String> {
        self()
    }
}

/// Runs registered checks and renders the verdict.
pub struct HealthAggregator {
    checks: Vec<Box<dyn HealthCheck>>,
    metadata: BTreeMap<String, String>,
    hostname: Box<dyn HostnameProvider>,
}

impl HealthAggregator {
    pub fn builder() -> HealthAggregatorBuilder {
        HealthAggregatorBuilder::default()
    }

    /// Aggregator with the built-in task check and service identity metadata.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::builder()
            .metadata("app", config.app_name())
            .metadata("namespace", config.namespace())
            .metadata("version", env!("CARGO_PKG_VERSION"))
            .check(TaskCountCheck::new(config.task_threshold))
            .build()
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Evaluate in the given mode.
    pub fn evaluate(&self, mode: Mode) -> Result<(HealthResponse, StatusCode), HealthError> {
        let hostname = self.hostname.hostname().map_err(HealthError::Hostname)?;

        let errors = match mode {
            Mode::Liveness => Vec::new(),
            Mode::Readiness => self.run_checks(),
        };

        let response = HealthResponse {
            hostname,
            metadata: self.metadata.clone(),
            errors,
        };
        let status = response.status();
        Ok((response, status))
    }

    fn run_checks(&self) -> Vec<CheckError> {
        self.checks
            .iter()
            .filter_map(|check| {
                let result = check.check();
                tracing::debug!(check = check.name(), healthy = result.is_none(), "Health check evaluated");
                result
            })
            .collect()
    }
}

impl fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("checks", &self.checks.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Builder for [`HealthAggregator`].
pub struct HealthAggregatorBuilder {
    checks: Vec<Box<dyn HealthCheck>>,
    metadata: BTreeMap<String, String>,
    hostname: Box<dyn HostnameProvider>,
}

impl Default for HealthAggregatorBuilder {
    fn default() -> Self {
        Self {
            checks: Vec::new(),
            metadata: BTreeMap::new(),
            hostname: Box::new(SystemHostname),
        }
    }
}

impl HealthAggregatorBuilder {
    /// Register a check. Checks run in registration order.
    pub fn check(mut self, check: impl HealthCheck + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Add a service identity entry to every response.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn hostname_provider(mut self, provider: impl HostnameProvider + 'static) -> Self {
        self.hostname = Box::new(provider);
        self
    }

    pub fn build(self) -> HealthAggregator {
        HealthAggregator {
            checks: self.checks,
            metadata: self.metadata,
            hostname: self.hostname,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::check::{CheckKind, CheckTemplate, FnCheck};
    use axum::http::HeaderValue;

    const DOWN: CheckTemplate = CheckTemplate::new("readiness_Down", CheckKind::Readiness, "down");
    const STALE: CheckTemplate = CheckTemplate::new("liveness_Stale", CheckKind::Liveness, "stale");

    fn fixed_host() -> io::Result<String> {
        Ok("test-host".to_string())
    }

    fn failing(template: CheckTemplate) -> FnCheck<impl Fn() -> Option<CheckError> + Send + Sync> {
        FnCheck::new(template.message, move || {
            Some(template.build([("observed", "1")]))
        })
    }

    fn passing() -> FnCheck<impl Fn() -> Option<CheckError> + Send + Sync> {
        FnCheck::new("ok", || None)
    }

    #[test]
    fn test_no_checks_is_healthy() {
        let aggregator = HealthAggregator::builder().hostname_provider(fixed_host).build();
        let (response, status) = aggregator.evaluate(Mode::Readiness).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.hostname, "test-host");
        assert!(response.errors.is_empty());
    }

    #[test]
    fn test_collects_every_failure_in_order() {
        let aggregator = HealthAggregator::builder()
            .hostname_provider(fixed_host)
            .check(failing(STALE))
            .check(passing())
            .check(failing(DOWN))
            .build();

        let (response, status) = aggregator.evaluate(Mode::Readiness).unwrap();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let messages: Vec<_> = response.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["liveness_Stale", "readiness_Down"]);
        assert_eq!(response.errors[0].kind, CheckKind::Liveness);
        assert_eq!(response.errors[1].kind, CheckKind::Readiness);
    }

    #[test]
    fn test_k_of_n_failures() {
        for n in 0..6usize {
            for k in 0..=n {
                let mut builder = HealthAggregator::builder().hostname_provider(fixed_host);
                for i in 0..n {
                    builder = if i < k {
                        builder.check(failing(DOWN))
                    } else {
                        builder.check(passing())
                    };
                }
                let (response, status) = builder.build().evaluate(Mode::Readiness).unwrap();
                assert_eq!(response.errors.len(), k);
                let expected = if k > 0 {
                    StatusCode::INTERNAL_SERVER_ERROR
                } else {
                    StatusCode::OK
                };
                assert_eq!(status, expected);
            }
        }
    }

    #[test]
    fn test_liveness_skips_checks() {
        let aggregator = HealthAggregator::builder()
            .hostname_provider(fixed_host)
            .check(FnCheck::new("must-not-run", || panic!("check ran in liveness mode")))
            .build();

        let (response, status) = aggregator.evaluate(Mode::Liveness).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(response.errors.is_empty());
    }

    #[test]
    fn test_hostname_failure() {
        let aggregator = HealthAggregator::builder()
            .hostname_provider(|| -> io::Result<String> { Err(io::Error::other("no uts namespace")) })
            .build();

        let err = aggregator.evaluate(Mode::Readiness).unwrap_err();
        assert!(matches!(err, HealthError::Hostname(_)));
    }

    #[test]
    fn test_repeated_evaluation_is_stable() {
        let aggregator = HealthAggregator::builder()
            .hostname_provider(fixed_host)
            .metadata("app", "orders")
            .check(failing(DOWN))
            .build();

        let first = aggregator.evaluate(Mode::Readiness).unwrap();
        let second = aggregator.evaluate(Mode::Readiness).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mode_from_headers() {
        let marker = HeaderName::from_static("liveness");
        let mut headers = HeaderMap::new();
        assert_eq!(Mode::from_headers(&headers, &marker), Mode::Readiness);

        headers.insert("liveness", HeaderValue::from_static(""));
        assert_eq!(Mode::from_headers(&headers, &marker), Mode::Readiness);

        headers.insert("liveness", HeaderValue::from_static("1"));
        assert_eq!(Mode::from_headers(&headers, &marker), Mode::Liveness);
    }

    #[test]
    fn test_from_config_registers_task_check() {
        let config = ServiceConfig {
            k8s_app_name: Some("orders".into()),
            ..Default::default()
        };
        let aggregator = HealthAggregator::from_config(&config);
        assert_eq!(aggregator.len(), 1);
        assert_eq!(aggregator.metadata["app"], "orders");
        assert_eq!(aggregator.metadata["namespace"], "default");
    }
}
