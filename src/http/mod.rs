//! HTTP hosting subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id layers, observability middleware)
//!     → /healthz or application routes
//!     → response.rs (handler error annotations read back by the middleware)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use response::{ErrorAnnotations, HandlerError};
pub use server::{HttpServer, HEALTHZ_PATH};
