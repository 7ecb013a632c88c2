//! Error types for the recoverable failure paths.
//!
//! None of these reach a DNS client: upstream failures degrade to an empty
//! answer and fetch failures drop one source from a refresh cycle.

use thiserror::Error;

/// A single DoH exchange failed.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The HTTP request could not be completed
    #[error("DoH request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success HTTP status
    #[error("DoH provider {provider} returned HTTP {status}")]
    Status { provider: String, status: u16 },

    /// The response body was not a DoH JSON document
    #[error("malformed DoH response: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider reported a server failure for the query
    #[error("DoH provider {provider} returned SERVFAIL")]
    ServerFailure { provider: String },

    #[error("no DoH providers configured")]
    NoProviders,
}

/// Fetching a block-list source failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("reading {url} failed: {source}")]
    Read {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// A block-list extraction pattern could not be compiled.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("invalid extraction pattern `{pattern}`: {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("extraction pattern `{0}` has no capture group")]
    NoCapture(String),
}
