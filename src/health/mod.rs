//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /healthz (handler.rs)
//!     → Mode from the LIVENESS header
//!     → aggregator.rs
//!         Liveness:  hostname only, always 200
//!         Readiness: every check.rs implementation, in order
//!     → HealthResponse + 200 / 500
//! ```
//!
//! # Design Decisions
//! - All checks run on every readiness request; no fail-fast
//! - Any error fails the request; there is no degraded tier
//! - Check registries belong to an aggregator instance, never to globals
//! - Error shapes are constants; each failure builds a fresh value

pub mod aggregator;
pub mod check;
pub mod handler;
pub mod tasks;

pub use aggregator::{
    HealthAggregator, HealthAggregatorBuilder, HealthError, HealthResponse, HostnameProvider,
    Mode, SystemHostname,
};
pub use check::{CheckError, CheckKind, CheckTemplate, FnCheck, HealthCheck};
pub use handler::{healthz, HealthState};
pub use tasks::TaskCountCheck;
