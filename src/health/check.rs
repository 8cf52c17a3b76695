//! Health check capability and result model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Category of a failed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckKind {
    Readiness,
    Liveness,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Readiness => f.write_str("READINESS"),
            CheckKind::Liveness => f.write_str("LIVENESS"),
        }
    }
}

/// One failed check instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckError {
    /// Stable identifier of the failing check.
    pub message: String,
    /// Check category.
    #[serde(rename = "type")]
    pub kind: CheckKind,
    /// Human-readable explanation.
    pub description: String,
    /// Check-specific diagnostic values.
    pub metadata: BTreeMap<String, String>,
}

/// Immutable error shape of a check type.
///
/// The template is shared across requests; every failure gets its own
/// [`CheckError`] from [`CheckTemplate::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckTemplate {
    pub message: &'static str,
    pub kind: CheckKind,
    pub description: &'static str,
}

impl CheckTemplate {
    pub const fn new(message: &'static str, kind: CheckKind, description: &'static str) -> Self {
        Self {
            message,
            kind,
            description,
        }
    }

    /// Produce a fresh error carrying `metadata`.
    pub fn build<I, K, V>(&self, metadata: I) -> CheckError
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        CheckError {
            message: self.message.to_string(),
            kind: self.kind,
            description: self.description.to_string(),
            metadata: metadata
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A pluggable health evaluator.
///
/// Implementations must be cheap to call concurrently; the aggregator holds
/// them behind shared references for the life of the process.
pub trait HealthCheck: Send + Sync {
    /// Name used in debug logs.
    fn name(&self) -> &str;

    /// Evaluate once. `None` means healthy.
    fn check(&self) -> Option<CheckError>;
}

/// Adapts a closure into a [`HealthCheck`].
pub struct FnCheck<F> {
    name: String,
    f: F,
}

impl<F> FnCheck<F>
where
    F: Fn() -> Option<CheckError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> HealthCheck for FnCheck<F>
where
    F: Fn() -> Option<CheckError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> Option<CheckError> {
        (self.f)()
    }
}

impl<F> fmt::Debug for FnCheck<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCheck").field("name", &self.name).finish()
    }
}
