//! Error types for connection resolution, query building and transport calls.
//!
//! Errors are grouped by category and folded into [`QuarryError`], which is
//! what every fallible public operation returns through [`QuarryResult`].

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use serde_json::Value;
use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Error, Debug)]
pub enum QuarryError {
    /// Connection lookup and construction errors
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Query and index builder errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Errors raised by the search engine client
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Configuration loading errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl QuarryError {
    /// Returns the HTTP status carried by a transport error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            QuarryError::Transport(err) => err.status(),
            _ => None,
        }
    }
}

/// Errors related to resolving named connections.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// A connection was requested without a name and no default is set.
    #[error("no default connection configured")]
    MissingDefault,

    /// The name is neither materialized nor registered as a deferred builder.
    #[error("unknown connection: {name}")]
    UnknownConnection { name: String },

    /// The underlying client could not be constructed.
    #[error("failed to build client for connection {name}: {message}")]
    ClientBuild { name: String, message: String },
}

/// Errors raised while building or adapting a request.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A builder argument was rejected.
    #[error("invalid argument '{argument}': {message}")]
    InvalidArgument { argument: String, message: String },

    /// The operation needs a target index.
    #[error("{operation} requires an index name")]
    MissingIndex { operation: String },

    /// The operation needs a document id.
    #[error("{operation} requires a document id")]
    MissingId { operation: String },

    /// The engine response could not be adapted.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },
}

impl QueryError {
    pub(crate) fn invalid_argument(argument: &str, message: impl Into<String>) -> Self {
        QueryError::InvalidArgument {
            argument: argument.to_string(),
            message: message.into(),
        }
    }
}

/// Errors returned by the transport client.
///
/// These are surfaced to the caller unchanged; no retries happen here.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The engine answered with a non-success status that was not ignored.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: Value },

    /// The request never produced a usable response.
    #[error("request error: {message}")]
    Request {
        status: Option<u16>,
        message: String,
    },
}

impl TransportError {
    /// Returns the HTTP status associated with this error, if known.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Request { status, .. } => *status,
        }
    }
}

/// Errors related to loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration failed validation.
    #[error("invalid configuration: {}", .errors.join("; "))]
    Invalid { errors: Vec<String> },

    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {message}")]
    Parse { message: String },
}

/// Result type alias for all operations in this crate.
pub type QuarryResult<T> = Result<T, QuarryError>;

/// Result type alias for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

impl From<serde_json::Error> for QuarryError {
    fn from(err: serde_json::Error) -> Self {
        QuarryError::Query(QueryError::MalformedResponse {
            message: err.to_string(),
        })
    }
}
