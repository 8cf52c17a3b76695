//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (PORT, BASE_URL, ...)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → passed by reference to every component at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - An invalid base URL is fatal at startup

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, resolve_from_env, ConfigError};
pub use schema::{LogFormat, ObservabilityConfig, ServiceConfig};
pub use validation::ValidationError;
