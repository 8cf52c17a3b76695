//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → middleware.rs (RequestContext from context.rs, `request` span)
//!         parent trace context via propagation.rs (global propagator)
//!     → handler
//!     → middleware.rs (one access-log event, leveled by status)
//!     → logging.rs subscriber (pretty or JSON lines)
//!
//! Process start/stop:
//!     → tracer.rs (B3 propagator + OTLP export pipeline, or nothing)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every log line of a request via the span,
//!   lifted to the top level of JSON lines
//! - Tracing is optional; without a collector nothing global is installed

pub mod context;
pub mod logging;
pub mod middleware;
pub mod propagation;
pub mod tracer;

pub use context::{client_ip, generate_request_id, RequestContext};
pub use logging::{init_logging, FlatJson, LoggingError};
pub use middleware::{observe_request, RequestObserver};
pub use propagation::B3Propagator;
pub use tracer::{init_tracer, TracerError, TracerGuard, TracerSettings};
