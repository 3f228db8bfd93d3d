//! The boundary to the search engine client.
//!
//! Everything above this module speaks in [`RequestParams`] and raw JSON.
//! A [`SearchTransport`] turns one [`Endpoint`] call into an HTTP exchange
//! and is expected to honor the ignore list carried in the params: a
//! response whose status is listed there is returned as `Ok` instead of
//! becoming a [`TransportError`](crate::error::TransportError).

use std::collections::BTreeSet;
use std::fmt::{self, Debug};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportResult;

/// Operations the transport can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Create an index.
    IndicesCreate,
    /// Delete an index.
    IndicesDelete,
    /// Probe for an index.
    IndicesExists,
    /// Refresh an index.
    IndicesRefresh,
    /// Run a search.
    Search,
    /// Continue a scroll.
    Scroll,
    /// Release a scroll context.
    ClearScroll,
    /// Count matching documents.
    Count,
    /// Fetch one document by id.
    Get,
    /// Index (insert or replace) one document.
    Index,
    /// Partially update one document.
    Update,
    /// Delete one document.
    Delete,
    /// Update every document matching a query.
    UpdateByQuery,
    /// Delete every document matching a query.
    DeleteByQuery,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Endpoint::IndicesCreate => "indices.create",
            Endpoint::IndicesDelete => "indices.delete",
            Endpoint::IndicesExists => "indices.exists",
            Endpoint::IndicesRefresh => "indices.refresh",
            Endpoint::Search => "search",
            Endpoint::Scroll => "scroll",
            Endpoint::ClearScroll => "clear_scroll",
            Endpoint::Count => "count",
            Endpoint::Get => "get",
            Endpoint::Index => "index",
            Endpoint::Update => "update",
            Endpoint::Delete => "delete",
            Endpoint::UpdateByQuery => "update_by_query",
            Endpoint::DeleteByQuery => "delete_by_query",
        };
        write!(f, "{}", name)
    }
}

/// Client-level options attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Status codes that must not raise an error.
    pub ignore: Vec<u16>,
}

/// Parameters for one transport call.
///
/// Serializes to the client's request shape, for example an index creation:
/// `{ "index": ..., "body": { "settings": ... }, "client": { "ignore": [...] } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    /// Target index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,

    /// Target document id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Scroll keep-alive (e.g. `"60s"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<String>,

    /// Client options such as the ignore list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientOptions>,
}

impl RequestParams {
    /// Creates params targeting an index.
    pub fn for_index(index: impl Into<String>) -> Self {
        Self {
            index: Some(index.into()),
            ..Default::default()
        }
    }

    /// Sets the document id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the scroll keep-alive.
    pub fn with_scroll(mut self, scroll: impl Into<String>) -> Self {
        self.scroll = Some(scroll.into());
        self
    }

    /// Attaches the ignore list; an empty set leaves `client` unset.
    pub fn with_ignore(mut self, ignore: &BTreeSet<u16>) -> Self {
        self.client = if ignore.is_empty() {
            None
        } else {
            Some(ClientOptions {
                ignore: ignore.iter().copied().collect(),
            })
        };
        self
    }

    /// Returns the ignored status codes.
    pub fn ignored(&self) -> &[u16] {
        self.client
            .as_ref()
            .map(|c| c.ignore.as_slice())
            .unwrap_or(&[])
    }

    /// Returns true if `status` is in the ignore list.
    pub fn ignores(&self, status: u16) -> bool {
        self.ignored().contains(&status)
    }

    /// Serializes the params to JSON.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A completed exchange: the status code and the decoded body.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded JSON body (`Null` when empty).
    pub body: Value,
}

impl TransportResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Creates a `200 OK` response.
    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A capability able to execute requests against a search engine.
///
/// Implement this to plug in a custom handler; [`Connection::new`](crate::Connection::new)
/// accepts any implementation.
#[async_trait]
pub trait SearchTransport: Debug + Send + Sync {
    /// Performs one request.
    ///
    /// Implementations return `Ok` for 2xx statuses and for statuses listed in
    /// `params.client.ignore`. [`Endpoint::IndicesExists`] answers `Ok` for
    /// both 200 and 404.
    async fn perform(
        &self,
        endpoint: Endpoint,
        params: RequestParams,
    ) -> TransportResult<TransportResponse>;
}
