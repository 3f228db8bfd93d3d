//! A named pairing of one transport and one ignore list.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::QuarryResult;
use crate::index::Index;
use crate::query::Query;
use crate::transport::{Endpoint, RequestParams, SearchTransport, TransportResponse};

/// A live connection to a search cluster.
///
/// Connections are shared as `Arc<Connection>`; [`Query`] and [`Index`]
/// builders keep a handle to the connection they were created from.
#[derive(Debug)]
pub struct Connection {
    name: String,
    transport: Arc<dyn SearchTransport>,
    ignores: BTreeSet<u16>,
}

impl Connection {
    /// Creates a connection over any transport.
    pub fn new(name: impl Into<String>, transport: Arc<dyn SearchTransport>) -> Self {
        Self {
            name: name.into(),
            transport,
            ignores: BTreeSet::new(),
        }
    }

    /// Sets the status codes that must not raise transport errors.
    pub fn with_ignores(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.ignores = codes.into_iter().collect();
        self
    }

    /// Returns the connection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ignored status codes.
    pub fn ignores(&self) -> &BTreeSet<u16> {
        &self.ignores
    }

    /// Returns the underlying transport for operations not modeled by [`Query`].
    pub fn client(&self) -> &Arc<dyn SearchTransport> {
        &self.transport
    }

    /// Starts a query against `index`. The index need not exist.
    pub fn index(self: &Arc<Self>, index: impl Into<String>) -> Query {
        Query::new(Arc::clone(self), index)
    }

    /// Starts an index management builder for `index`.
    pub fn create_index(self: &Arc<Self>, index: impl Into<String>) -> Index {
        Index::new(Arc::clone(self), index)
    }

    /// Makes recent writes to `index` visible to search.
    pub async fn refresh(&self, index: &str) -> QuarryResult<()> {
        let params = RequestParams::for_index(index).with_ignore(&self.ignores);
        self.perform(Endpoint::IndicesRefresh, params).await?;
        Ok(())
    }

    /// Releases a scroll context before its keep-alive expires.
    pub async fn clear_scroll(&self, scroll_id: &str) -> QuarryResult<Value> {
        let params = RequestParams::default()
            .with_body(json!({ "scroll_id": [scroll_id] }))
            .with_ignore(&self.ignores);
        Ok(self.perform(Endpoint::ClearScroll, params).await?.body)
    }

    pub(crate) async fn perform(
        &self,
        endpoint: Endpoint,
        params: RequestParams,
    ) -> QuarryResult<TransportResponse> {
        Ok(self.transport.perform(endpoint, params).await?)
    }
}
