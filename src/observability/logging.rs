//! Structured logging.
//!
//! # Responsibilities
//! - Install the process-wide `tracing` subscriber
//! - Choose pretty or JSON output
//! - Apply the configured level, with `RUST_LOG` taking precedence
//!
//! # Design Decisions
//! - JSON lines for production, pretty output on a terminal
//! - JSON lines are flat: fields of the enclosing spans are lifted onto every
//!   event, so the request id and B3 ids of the `request` span appear at the
//!   top level of each line logged while serving the request
//! - Dotted field names nest (`trace.id` becomes `{"trace":{"id":..}}`)
//! - OpenTelemetry's own diagnostics use a separate level (`otel_log_level`)

use serde_json::{Map, Number, Value};
use std::fmt;
use std::io::IsTerminal;
use thiserror::Error;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, JsonFields, Writer};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormattedFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(config: &ObservabilityConfig) -> String {
    format!(
        "{},opentelemetry={}",
        config.log_level, config.otel_log_level
    )
}

/// Resolve `Auto` against the current stdout.
pub fn effective_format(format: LogFormat) -> LogFormat {
    match format {
        LogFormat::Auto if std::io::stdout().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Json,
        other => other,
    }
}

/// One JSON object per event.
///
/// Span fields are merged root first, then the event's own fields, so an
/// event field overrides a span field of the same name. Pair with
/// [`JsonFields`] as the field formatter, which is what stores span fields
/// as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatJson;

impl<S> FormatEvent<S, JsonFields> for FlatJson
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, JsonFields>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut timestamp = String::new();
        SystemTime.format_time(&mut Writer::new(&mut timestamp))?;

        let meta = event.metadata();
        let mut line = Map::new();
        line.insert("timestamp".into(), Value::String(timestamp));
        line.insert("level".into(), Value::String(meta.level().to_string()));
        line.insert("target".into(), Value::String(meta.target().to_string()));

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                let Some(formatted) = extensions.get::<FormattedFields<JsonFields>>() else {
                    continue;
                };
                // Spans without fields store an empty string.
                if let Ok(Value::Object(fields)) = serde_json::from_str(&formatted.fields) {
                    for (key, value) in fields {
                        insert_path(&mut line, &key, value);
                    }
                }
            }
        }

        let mut fields = Map::new();
        event.record(&mut JsonVisitor(&mut fields));
        for (key, value) in fields {
            insert_path(&mut line, &key, value);
        }

        writeln!(writer, "{}", Value::Object(line))
    }
}

/// Insert `value` under a dotted path, creating objects on the way.
///
/// A path that runs into a non-object value is stored under the literal key.
fn insert_path(map: &mut Map<String, Value>, key: &str, value: Value) {
    if let Some((head, rest)) = key
        .split_once('.')
        .filter(|(head, rest)| !head.is_empty() && !rest.is_empty())
    {
        let entry = map
            .entry(head.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(inner) = entry {
            insert_path(inner, rest, value);
            return;
        }
    }
    map.insert(key.to_string(), value);
}

struct JsonVisitor<'a>(&'a mut Map<String, Value>);

impl Visit for JsonVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.0.insert(field.name().to_string(), value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.0.insert(field.name().to_string(), value.to_string().into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_string(), format!("{value:?}").into());
    }
}

/// Install the global subscriber.
///
/// Fails instead of panicking if a subscriber is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)));

    let registry = tracing_subscriber::registry().with(env_filter);
    let format = effective_format(config.log_format);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .fmt_fields(JsonFields::new())
                    .event_format(FlatJson),
            )
            .try_init()?,
        _ => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?,
    }

    tracing::debug!(
        level = %config.log_level,
        format = ?format,
        "Logging initialized"
    );
    Ok(())
}
