//! B3 trace-context propagation.
//!
//! # Responsibilities
//! - Read B3 multi-header (`x-b3-*`) and single-header (`b3`) context
//! - Write B3 multi-header context on outbound requests
//! - Adapt `HeaderMap` to OpenTelemetry's extractor/injector carriers
//!
//! # Design Decisions
//! - Multi-header wins when both encodings are present
//! - 64-bit trace ids are accepted and widened to 128 bits
//! - A missing sampling decision defers (not sampled, not debug)

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry::{
    global,
    propagation::{text_map_propagator::FieldIter, Extractor, Injector, TextMapPropagator},
    trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState},
    Context,
};

const B3_SINGLE_HEADER: &str = "b3";
const B3_TRACE_ID_HEADER: &str = "x-b3-traceid";
const B3_SPAN_ID_HEADER: &str = "x-b3-spanid";
const B3_SAMPLED_HEADER: &str = "x-b3-sampled";
const B3_DEBUG_FLAG_HEADER: &str = "x-b3-flags";

/// Zipkin B3 propagator.
#[derive(Debug)]
pub struct B3Propagator {
    fields: Vec<String>,
}

impl Default for B3Propagator {
    fn default() -> Self {
        Self::new()
    }
}

impl B3Propagator {
    pub fn new() -> Self {
        Self {
            fields: [
                B3_TRACE_ID_HEADER,
                B3_SPAN_ID_HEADER,
                B3_SAMPLED_HEADER,
                B3_DEBUG_FLAG_HEADER,
                B3_SINGLE_HEADER,
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    fn extract_multi(&self, extractor: &dyn Extractor) -> Option<SpanContext> {
        let trace_id = parse_trace_id(extractor.get(B3_TRACE_ID_HEADER)?)?;
        let span_id = parse_span_id(extractor.get(B3_SPAN_ID_HEADER)?)?;

        let debug = extractor.get(B3_DEBUG_FLAG_HEADER) == Some("1");
        let sampled = match extractor.get(B3_SAMPLED_HEADER) {
            Some(value) => parse_sampled(value)?,
            None => false,
        };

        Some(remote_context(trace_id, span_id, sampled || debug))
    }

    fn extract_single(&self, extractor: &dyn Extractor) -> Option<SpanContext> {
        let header = extractor.get(B3_SINGLE_HEADER)?.trim();
        let mut parts = header.split('-');
        let trace_id = parse_trace_id(parts.next()?)?;
        let span_id = parse_span_id(parts.next()?)?;
        let sampled = match parts.next() {
            Some("d") => true,
            Some(value) => parse_sampled(value)?,
            None => false,
        };
        // Optional fourth part is the parent span id; it does not affect the context.
        if let Some(parent) = parts.next() {
            parse_span_id(parent)?;
        }
        if parts.next().is_some() {
            return None;
        }

        Some(remote_context(trace_id, span_id, sampled))
    }
}

impl TextMapPropagator for B3Propagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        let span = cx.span();
        let span_context = span.span_context();
        if !span_context.is_valid() {
            return;
        }

        injector.set(B3_TRACE_ID_HEADER, format!("{:032x}", span_context.trace_id()));
        injector.set(B3_SPAN_ID_HEADER, format!("{:016x}", span_context.span_id()));
        let sampled = if span_context.is_sampled() { "1" } else { "0" };
        injector.set(B3_SAMPLED_HEADER, sampled.to_string());
    }

    fn extract_with_context(&self, cx: &Context, extractor: &dyn Extractor) -> Context {
        let span_context = self
            .extract_multi(extractor)
            .or_else(|| self.extract_single(extractor));

        match span_context {
            Some(sc) => cx.with_remote_span_context(sc),
            None => cx.clone(),
        }
    }

    fn fields(&self) -> FieldIter<'_> {
        FieldIter::new(self.fields.as_slice())
    }
}

fn remote_context(trace_id: TraceId, span_id: SpanId, sampled: bool) -> SpanContext {
    let flags = if sampled {
        TraceFlags::SAMPLED
    } else {
        TraceFlags::default()
    };
    SpanContext::new(trace_id, span_id, flags, true, TraceState::default())
}

fn parse_trace_id(value: &str) -> Option<TraceId> {
    let value = value.trim();
    if (value.len() != 16 && value.len() != 32) || !is_lower_hex(value) {
        return None;
    }
    TraceId::from_hex(value)
        .ok()
        .filter(|id| *id != TraceId::INVALID)
}

fn parse_span_id(value: &str) -> Option<SpanId> {
    let value = value.trim();
    if value.len() != 16 || !is_lower_hex(value) {
        return None;
    }
    SpanId::from_hex(value)
        .ok()
        .filter(|id| *id != SpanId::INVALID)
}

fn parse_sampled(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

fn is_lower_hex(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Read-only carrier over request headers.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(HeaderName::as_str).collect()
    }
}

/// Write carrier over outbound headers.
pub struct HeaderInjector<'a>(pub &'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

/// Parent context of an inbound request, per the process-wide propagator.
///
/// Until a propagator is installed this is the empty context.
pub fn extract_remote_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Write `cx` into outbound headers using the process-wide propagator.
pub fn inject_context(cx: &Context, headers: &mut HeaderMap) {
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(cx, &mut HeaderInjector(headers))
    });
}
