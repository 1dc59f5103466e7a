//! Error types for pyromon.

use thiserror::Error;

/// A failed poll of the status endpoint.
///
/// Every variant is recovered by the poll loop: it is counted, shown in
/// the error banner and the next poll is scheduled as usual.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} returned a body that is not JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{url} returned JSON that is not an object")]
    NotAnObject { url: String },
}

/// A snapshot field whose value does not have the shape its handler reads.
#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("field `{field}`: expected {expected}")]
    Shape {
        field: &'static str,
        expected: &'static str,
    },
}

impl FieldError {
    pub(crate) fn shape(field: &'static str, expected: &'static str) -> Self {
        FieldError::Shape { field, expected }
    }
}

/// Invalid command-line configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("--url must be an http:// or https:// URL, got {0:?}")]
    Url(String),
    #[error("--{flag} must be greater than zero")]
    Zero { flag: &'static str },
    #[error("--margin-ms ({margin}) must be at most half of --wait-ms ({wait})")]
    MarginTooLarge { margin: u64, wait: u64 },
}
