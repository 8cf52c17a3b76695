//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::schema::{LogFormat, ServiceConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Locations searched when no explicit config path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["/config/config.toml", "config.toml"];

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let config = read_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Resolve the effective configuration.
///
/// An explicit `path` must exist. Without one, the first existing entry of
/// [`DEFAULT_CONFIG_PATHS`] is used, falling back to defaults. Values from
/// `env` override file values before validation.
pub fn resolve_config<F>(path: Option<&Path>, env: F) -> Result<ServiceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => match DEFAULT_CONFIG_PATHS.iter().map(Path::new).find(|p| p.is_file()) {
            Some(found) => read_file(found)?,
            None => ServiceConfig::default(),
        },
    };

    apply_env_overrides(&mut config, env)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Resolve configuration against the process environment.
pub fn resolve_from_env(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    resolve_config(path, |var| std::env::var(var).ok())
}

fn read_file(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Apply upper-cased key overrides from the environment.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = env("PORT") {
        config.port = value.parse().map_err(|_| ConfigError::Env {
            var: "PORT",
            value,
        })?;
    }
    if let Some(value) = env("BASE_URL") {
        config.base_url = Some(value);
    }
    if let Some(value) = env("K8S_APP_NAME") {
        config.k8s_app_name = Some(value);
    }
    if let Some(value) = env("K8S_NAMESPACE") {
        config.k8s_namespace = Some(value);
    }
    for var in ["GOROUTINE_THRESHOLD", "TASK_THRESHOLD"] {
        if let Some(value) = env(var) {
            config.task_threshold = value
                .parse()
                .map_err(|_| ConfigError::Env { var, value })?;
        }
    }
    if let Some(value) = env("LOG_LEVEL") {
        config.observability.log_level = value;
    }
    if let Some(value) = env("LOG_FORMAT") {
        config.observability.log_format = LogFormat::parse(&value);
    }
    Ok(())
}
