//! Service observability library.
//!
//! Health checks, request access logging with trace correlation, and the
//! distributed-tracing lifecycle of an HTTP service.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use health::{HealthAggregator, HealthCheck};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
