//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → HTTP server stops accepting → drain in-flight → exit
//!     → tracer pipeline released last
//! ```
//!
//! # Design Decisions
//! - One shutdown broadcast shared by every long-running task
//! - The tracer is released after the server drains, so request spans flush

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
