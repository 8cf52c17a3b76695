//! Handler error annotations.
//!
//! Handlers report failures by attaching [`ErrorAnnotations`] to their
//! response. The observability middleware reads them back and uses them as
//! the message of the request log line instead of a generic label.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

/// Errors recorded while handling one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorAnnotations(Vec<String>);

impl ErrorAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: impl fmt::Display) {
        self.0.push(error.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Attach `error` to a response, appending to any existing annotations.
    pub fn annotate(response: &mut Response, error: impl fmt::Display) {
        let extensions = response.extensions_mut();
        match extensions.get_mut::<ErrorAnnotations>() {
            Some(existing) => existing.push(error),
            None => {
                let mut annotations = ErrorAnnotations::new();
                annotations.push(error);
                extensions.insert(annotations);
            }
        }
    }
}

/// One numbered line per error: `Error #01: <error>`.
impl fmt::Display for ErrorAnnotations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "Error #{:02}: {}", i + 1, error)?;
        }
        Ok(())
    }
}

/// A status code plus an error, annotated onto the response.
#[derive(Debug)]
pub struct HandlerError {
    status: StatusCode,
    message: String,
}

impl HandlerError {
    pub fn new(status: StatusCode, error: impl fmt::Display) -> Self {
        Self {
            status,
            message: error.to_string(),
        }
    }

    pub fn internal(error: impl fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        ErrorAnnotations::annotate(&mut response, self.message);
        response
    }
}
