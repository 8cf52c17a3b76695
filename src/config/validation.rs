//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the effective base URL and header names
//! - Validate value ranges (port non-zero)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid base_url {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("port must be non-zero")]
    Port,

    #[error("invalid header name for {field}: {value:?}")]
    HeaderName { field: &'static str, value: String },
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.port == 0 {
        errors.push(ValidationError::Port);
    }

    let base_url = config.base_url();
    match Url::parse(&base_url) {
        Ok(url) if url.host_str().is_none() => errors.push(ValidationError::BaseUrl {
            url: base_url,
            reason: "missing host".to_string(),
        }),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::BaseUrl {
            url: base_url,
            reason: e.to_string(),
        }),
    }

    let headers = [
        ("request_id_header", &config.observability.request_id_header),
        ("liveness_header", &config.observability.liveness_header),
    ];
    for (field, value) in headers {
        if HeaderName::try_from(value.as_str()).is_err() {
            errors.push(ValidationError::HeaderName {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig {
            port: 0,
            base_url: Some("not a url".into()),
            ..Default::default()
        };
        config.observability.request_id_header = "bad header".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Port));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::BaseUrl { .. })));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::HeaderName { field: "request_id_header", .. }
        )));
    }

    #[test]
    fn test_base_url_without_host() {
        let config = ServiceConfig {
            base_url: Some("mailto:ops@example.com".into()),
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(&errors[0], ValidationError::BaseUrl { reason, .. } if reason == "missing host"));
    }
}
