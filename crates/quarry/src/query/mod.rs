//! Chainable query builder.
//!
//! A [`Query`] is obtained from [`Connection::index`](crate::Connection::index)
//! and accumulates clause, sort, pagination, aggregation and scroll state.
//! Every building method takes `self` and returns it, so a query is built in
//! one expression. Terminal operations (`get`, `first`, `count`, `delete`,
//! `update`, `find`, `insert`, `paginate`) consume the builder: a query that
//! has been sent cannot be changed or sent again. Clone it first to reuse
//! the accumulated state.
//!
//! ```compile_fail
//! # async fn demo(query: quarry::Query) {
//! let _ = query.get().await;
//! let _ = query.count().await; // query was moved by get()
//! # }
//! ```

mod clause;

pub use clause::{BoolQuery, Operator, SortOrder};

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::collection::{Collection, Hit, Page};
use crate::connection::Connection;
use crate::error::{QuarryError, QuarryResult, QueryError};
use crate::scope::Scope;
use crate::transport::{Endpoint, RequestParams};

use clause::field_clause;

/// Keep-alive used when a scroll id is continued without an explicit one.
pub const DEFAULT_SCROLL: &str = "1m";

/// Painless script merging `params.doc` into each matched `_source`.
const MERGE_SCRIPT: &str = "ctx._source.putAll(params.doc)";

/// Formats a keep-alive the way the engine expects (`"90s"`, `"1500ms"`).
///
/// Sub-millisecond remainders round up, so a non-zero duration never
/// renders as `"0s"`.
pub fn keep_alive(duration: Duration) -> String {
    let millis = duration.as_nanos().div_ceil(1_000_000);
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

/// A request under construction against one index of one connection.
#[derive(Debug, Clone)]
pub struct Query {
    connection: Arc<Connection>,
    index: String,
    clauses: BoolQuery,
    sort: Vec<Value>,
    from: Option<u64>,
    size: Option<u64>,
    aggregations: Map<String, Value>,
    includes: Vec<String>,
    excludes: Vec<String>,
    scroll: Option<Duration>,
    scroll_id: Option<String>,
    ignores: BTreeSet<u16>,
    id: Option<String>,
    raw_body: Option<Value>,
    min_score: Option<f64>,
}

impl Query {
    /// Creates a query bound to `connection` and `index`.
    ///
    /// The connection's ignored statuses are copied in.
    pub fn new(connection: Arc<Connection>, index: impl Into<String>) -> Self {
        let ignores = connection.ignores().clone();
        Self {
            connection,
            index: index.into(),
            clauses: BoolQuery::new(),
            sort: Vec::new(),
            from: None,
            size: None,
            aggregations: Map::new(),
            includes: Vec::new(),
            excludes: Vec::new(),
            scroll: None,
            scroll_id: None,
            ignores,
            id: None,
            raw_body: None,
            min_score: None,
        }
    }

    /// Returns the bound index name.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Returns the bound connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Returns the ignored statuses attached to this query.
    pub fn ignores(&self) -> &BTreeSet<u16> {
        &self.ignores
    }

    /// Returns the accumulated clauses.
    pub fn clauses(&self) -> &BoolQuery {
        &self.clauses
    }

    fn with_clauses(mut self, build: impl FnOnce(BoolQuery) -> BoolQuery) -> Self {
        self.clauses = build(std::mem::take(&mut self.clauses));
        self
    }

    // -- where family --

    /// `field == value`.
    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with_clauses(|c| c.where_eq(field, value))
    }

    /// `field != value`.
    pub fn where_not(self, field: &str, value: impl Into<Value>) -> Self {
        self.with_clauses(|c| c.where_not(field, value))
    }

    /// `field <op> value`.
    pub fn where_op(self, field: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.with_clauses(|c| c.where_op(field, op, value))
    }

    /// `field` is one of `values`.
    pub fn where_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with_clauses(|c| c.where_in(field, values))
    }

    /// `field` is none of `values`.
    pub fn where_not_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with_clauses(|c| c.where_not_in(field, values))
    }

    /// `from <= field <= to`.
    pub fn where_between(self, field: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.with_clauses(|c| c.where_between(field, from, to))
    }

    /// `field` has a value.
    pub fn where_exists(self, field: &str) -> Self {
        self.with_clauses(|c| c.where_exists(field))
    }

    /// `field` has no value.
    pub fn where_not_exists(self, field: &str) -> Self {
        self.with_clauses(|c| c.where_not_exists(field))
    }

    /// Alternative `field == value` (`should`).
    pub fn or_where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with_clauses(|c| c.or_where_eq(field, value))
    }

    /// Nested bool group.
    ///
    /// ```no_run
    /// # fn demo(query: quarry::Query) -> quarry::Query {
    /// query.where_group(|g| g.or_where_eq("tag", "rust").or_where_eq("tag", "search"))
    /// # }
    /// ```
    pub fn where_group(self, build: impl FnOnce(BoolQuery) -> BoolQuery) -> Self {
        self.with_clauses(|c| c.where_group(build))
    }

    /// Raw `must` clause.
    pub fn must(self, clause: Value) -> Self {
        self.with_clauses(|c| c.must(clause))
    }

    /// Raw `must_not` clause.
    pub fn must_not(self, clause: Value) -> Self {
        self.with_clauses(|c| c.must_not(clause))
    }

    /// Raw `should` clause.
    pub fn should(self, clause: Value) -> Self {
        self.with_clauses(|c| c.should(clause))
    }

    /// Raw `filter` clause.
    pub fn filter(self, clause: Value) -> Self {
        self.with_clauses(|c| c.filter(clause))
    }

    /// Full-text `query_string` search, optionally boosted.
    pub fn search(self, text: &str, boost: Option<f64>) -> Self {
        let mut query_string = json!({ "query": text });
        if let Some(boost) = boost {
            query_string["boost"] = json!(boost);
        }
        self.must(json!({ "query_string": query_string }))
    }

    /// Keeps documents whose geo point `field` lies within `distance` of a point.
    pub fn distance(self, field: &str, lat: f64, lon: f64, distance: &str) -> Self {
        let mut geo = Map::new();
        geo.insert("distance".to_string(), json!(distance));
        geo.insert(field.to_string(), json!({ "lat": lat, "lon": lon }));
        self.filter(json!({ "geo_distance": geo }))
    }

    // -- shaping --

    /// Sorts by `field`. Calls accumulate in order.
    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        self.sort
            .push(field_clause(field, "order", json!(order.as_str())));
        self
    }

    /// Sorts by relevance, highest first.
    pub fn order_by_score(mut self) -> Self {
        self.sort.push(json!({ "_score": { "order": "desc" } }));
        self
    }

    /// Skips the first `from` hits.
    pub fn skip(mut self, from: u64) -> Self {
        self.from = Some(from);
        self
    }

    /// Returns at most `size` hits.
    pub fn take(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Requests a named aggregation.
    pub fn aggregate(mut self, name: impl Into<String>, definition: Value) -> Self {
        self.aggregations.insert(name.into(), definition);
        self
    }

    /// Restricts `_source` to `fields`.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Removes `fields` from `_source`.
    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Opens a scroll context kept alive for `keep_alive`.
    pub fn scroll(mut self, keep_alive: Duration) -> Self {
        self.scroll = Some(keep_alive);
        self
    }

    /// Continues an existing scroll context.
    pub fn scroll_id(mut self, scroll_id: impl Into<String>) -> Self {
        self.scroll_id = Some(scroll_id.into());
        self
    }

    /// Adds status codes that must not raise. Duplicates collapse.
    pub fn ignore(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.ignores.extend(codes);
        self
    }

    /// Targets a single document.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Replaces the generated search body with `body`.
    pub fn body(mut self, body: Value) -> Self {
        self.raw_body = Some(body);
        self
    }

    /// Drops hits scoring below `score`.
    pub fn min_score(mut self, score: f64) -> Self {
        self.min_score = Some(score);
        self
    }

    /// Applies one scope.
    pub fn apply_scope<M, S>(self, scope: &S, model: &M) -> Self
    where
        M: ?Sized,
        S: Scope<M> + ?Sized,
    {
        scope.apply(self, model)
    }

    /// Applies scopes in order.
    pub fn apply_scopes<M: ?Sized>(self, scopes: &[&dyn Scope<M>], model: &M) -> Self {
        scopes
            .iter()
            .fold(self, |query, scope| scope.apply(query, model))
    }

    // -- rendering --

    /// Renders the search body.
    pub fn to_body(&self) -> Value {
        if let Some(raw) = &self.raw_body {
            return raw.clone();
        }

        let mut body = Map::new();
        body.insert("query".to_string(), self.clauses.to_query());
        if !self.sort.is_empty() {
            body.insert("sort".to_string(), Value::Array(self.sort.clone()));
        }
        if let Some(from) = self.from {
            body.insert("from".to_string(), json!(from));
        }
        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }
        if !self.aggregations.is_empty() {
            body.insert(
                "aggs".to_string(),
                Value::Object(self.aggregations.clone()),
            );
        }
        if let Some(source) = self.source_filter() {
            body.insert("_source".to_string(), source);
        }
        if let Some(score) = self.min_score {
            body.insert("min_score".to_string(), json!(score));
        }
        Value::Object(body)
    }

    fn source_filter(&self) -> Option<Value> {
        match (self.includes.is_empty(), self.excludes.is_empty()) {
            (true, true) => None,
            (false, true) => Some(json!(self.includes)),
            _ => Some(json!({ "includes": self.includes, "excludes": self.excludes })),
        }
    }

    fn query_only_body(&self) -> Value {
        match &self.raw_body {
            Some(raw) => {
                let query = raw
                    .get("query")
                    .cloned()
                    .unwrap_or_else(|| json!({ "match_all": {} }));
                json!({ "query": query })
            }
            None => json!({ "query": self.clauses.to_query() }),
        }
    }

    fn params(&self) -> RequestParams {
        RequestParams::for_index(self.index.as_str()).with_ignore(&self.ignores)
    }

    fn require_index(&self, operation: &str) -> QuarryResult<()> {
        if self.index.is_empty() {
            return Err(QueryError::MissingIndex {
                operation: operation.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn scroll_request(&self, scroll_id: &str) -> RequestParams {
        let keep_alive = self
            .scroll
            .map(keep_alive)
            .unwrap_or_else(|| DEFAULT_SCROLL.to_string());
        RequestParams::default()
            .with_body(json!({ "scroll": keep_alive, "scroll_id": scroll_id }))
            .with_ignore(&self.ignores)
    }

    /// Builds the search request without sending it.
    pub fn build(&self) -> RequestParams {
        if let Some(scroll_id) = &self.scroll_id {
            return self.scroll_request(scroll_id);
        }
        let params = self.params().with_body(self.to_body());
        match self.scroll {
            Some(duration) => params.with_scroll(keep_alive(duration)),
            None => params,
        }
    }

    // -- terminal operations --

    /// Runs the search and adapts the response.
    ///
    /// With a scroll id set this continues the scroll instead.
    pub async fn get(self) -> QuarryResult<Collection> {
        let endpoint = if self.scroll_id.is_some() {
            Endpoint::Scroll
        } else {
            Endpoint::Search
        };
        let params = self.build();
        let response = self.connection.perform(endpoint, params).await?;
        if !response.is_success() {
            return Ok(Collection::default());
        }
        Collection::from_response(&response.body)
    }

    /// Returns the first hit, if any.
    ///
    /// A raw body override has its `size` forced to 1 as well.
    pub async fn first(mut self) -> QuarryResult<Option<Hit>> {
        self.scroll = None;
        self.scroll_id = None;
        if let Some(Value::Object(raw)) = self.raw_body.as_mut() {
            raw.insert("size".to_string(), json!(1));
        }
        let collection = self.take(1).get().await?;
        Ok(collection.into_iter().next())
    }

    /// Counts matching documents. An ignored failure counts as zero.
    pub async fn count(self) -> QuarryResult<u64> {
        let params = self.params().with_body(self.query_only_body());
        let response = self.connection.perform(Endpoint::Count, params).await?;
        if !response.is_success() {
            return Ok(0);
        }
        response
            .body
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                QuarryError::from(QueryError::MalformedResponse {
                    message: "count response has no integer 'count'".to_string(),
                })
            })
    }

    /// Fetches one document by id. A missing document yields `None`.
    ///
    /// 404 is always ignored here, whatever the connection's ignore set.
    pub async fn find(mut self, id: impl Into<String>) -> QuarryResult<Option<Hit>> {
        self.require_index("find")?;
        self.ignores.insert(404);
        let params = self.params().with_id(id);
        let response = self.connection.perform(Endpoint::Get, params).await?;
        if !response.is_success() || response.body.get("found") == Some(&Value::Bool(false)) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(response.body)?))
    }

    /// Indexes `document`, under the query's id if one is set.
    pub async fn insert<T: Serialize + ?Sized>(self, document: &T) -> QuarryResult<Value> {
        self.require_index("insert")?;
        let document = serde_json::to_value(document)
            .map_err(|e| QueryError::invalid_argument("document", e.to_string()))?;
        let mut params = self.params().with_body(document);
        if let Some(id) = &self.id {
            params = params.with_id(id.as_str());
        }
        tracing::debug!("Indexing document into '{}'", self.index);
        Ok(self.connection.perform(Endpoint::Index, params).await?.body)
    }

    /// Partially updates the targeted document, or every matching document
    /// when no id is set.
    pub async fn update<T: Serialize + ?Sized>(self, changes: &T) -> QuarryResult<Value> {
        self.require_index("update")?;
        let changes = serde_json::to_value(changes)
            .map_err(|e| QueryError::invalid_argument("changes", e.to_string()))?;
        if !changes.is_object() {
            return Err(QueryError::invalid_argument("changes", "expected a JSON object").into());
        }

        let (endpoint, params) = match &self.id {
            Some(id) => (
                Endpoint::Update,
                self.params().with_id(id.as_str()).with_body(json!({ "doc": changes })),
            ),
            None => {
                let mut body = self.query_only_body();
                body["script"] = json!({
                    "source": MERGE_SCRIPT,
                    "lang": "painless",
                    "params": { "doc": changes }
                });
                tracing::debug!("Updating documents by query in '{}'", self.index);
                (Endpoint::UpdateByQuery, self.params().with_body(body))
            }
        };
        Ok(self.connection.perform(endpoint, params).await?.body)
    }

    /// Deletes the targeted document, or every matching document when no
    /// id is set.
    pub async fn delete(self) -> QuarryResult<Value> {
        self.require_index("delete")?;
        let (endpoint, params) = match &self.id {
            Some(id) => (Endpoint::Delete, self.params().with_id(id.as_str())),
            None => {
                tracing::debug!("Deleting documents by query in '{}'", self.index);
                (
                    Endpoint::DeleteByQuery,
                    self.params().with_body(self.query_only_body()),
                )
            }
        };
        Ok(self.connection.perform(endpoint, params).await?.body)
    }

    /// Fetches one page. Pages are numbered from 1.
    pub async fn paginate(self, per_page: u64, page: u64) -> QuarryResult<Page> {
        if page == 0 {
            return Err(QueryError::invalid_argument("page", "pages are numbered from 1").into());
        }
        if per_page == 0 {
            return Err(QueryError::invalid_argument("per_page", "must be at least 1").into());
        }
        let from = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| QueryError::invalid_argument("page", "offset overflows"))?;

        let items = self.skip(from).take(per_page).get().await?;
        Ok(Page::new(items, per_page, page))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::TransportResult;
    use crate::transport::{SearchTransport, TransportResponse};

    #[derive(Debug)]
    struct NullTransport;

    #[async_trait]
    impl SearchTransport for NullTransport {
        async fn perform(
            &self,
            _endpoint: Endpoint,
            _params: RequestParams,
        ) -> TransportResult<TransportResponse> {
            Ok(TransportResponse::ok(Value::Null))
        }
    }

    fn query() -> Query {
        Arc::new(Connection::new("test", Arc::new(NullTransport)).with_ignores([404])).index("books")
    }

    #[test]
    fn test_keep_alive_format() {
        assert_eq!(keep_alive(Duration::from_secs(90)), "90s");
        assert_eq!(keep_alive(Duration::from_millis(1500)), "1500ms");
        assert_eq!(keep_alive(Duration::from_micros(1)), "1ms");
        assert_eq!(keep_alive(Duration::from_micros(2500)), "3ms");
        assert_eq!(keep_alive(Duration::ZERO), "0s");
    }

    #[test]
    fn test_empty_query_is_match_all() {
        assert_eq!(query().to_body(), json!({ "query": { "match_all": {} } }));
    }

    #[test]
    fn test_body_shaping() {
        let body = query()
            .where_eq("status", "published")
            .order_by("year", SortOrder::Desc)
            .order_by_score()
            .skip(20)
            .take(10)
            .aggregate("by_year", json!({ "terms": { "field": "year" } }))
            .select(["title", "year"])
            .min_score(0.5)
            .to_body();

        assert_eq!(
            body,
            json!({
                "query": { "bool": { "filter": [{ "term": { "status": "published" } }] } },
                "sort": [
                    { "year": { "order": "desc" } },
                    { "_score": { "order": "desc" } }
                ],
                "from": 20,
                "size": 10,
                "aggs": { "by_year": { "terms": { "field": "year" } } },
                "_source": ["title", "year"],
                "min_score": 0.5
            })
        );
    }

    #[test]
    fn test_source_includes_and_excludes() {
        let body = query().select(["title"]).exclude(["body"]).to_body();
        assert_eq!(
            body["_source"],
            json!({ "includes": ["title"], "excludes": ["body"] })
        );
    }

    #[test]
    fn test_search_and_distance() {
        let body = query()
            .search("rust", Some(2.0))
            .distance("location", 52.5, 13.4, "10km")
            .to_body();

        assert_eq!(
            body["query"]["bool"]["must"][0],
            json!({ "query_string": { "query": "rust", "boost": 2.0 } })
        );
        assert_eq!(
            body["query"]["bool"]["filter"][0],
            json!({ "geo_distance": { "distance": "10km", "location": { "lat": 52.5, "lon": 13.4 } } })
        );
    }

    #[test]
    fn test_raw_body_override() {
        let raw = json!({ "query": { "term": { "a": 1 } }, "size": 3 });
        assert_eq!(query().where_eq("b", 2).body(raw.clone()).to_body(), raw);
    }

    #[test]
    fn test_build_search_params() {
        let params = query()
            .ignore([409, 404, 409])
            .scroll(Duration::from_secs(60))
            .build();

        assert_eq!(params.index.as_deref(), Some("books"));
        assert_eq!(params.scroll.as_deref(), Some("60s"));
        assert_eq!(params.ignored(), &[404, 409]);
    }

    #[test]
    fn test_build_scroll_continuation() {
        let params = query().scroll_id("abc").build();
        assert!(params.index.is_none());
        assert_eq!(
            params.body,
            Some(json!({ "scroll": DEFAULT_SCROLL, "scroll_id": "abc" }))
        );
    }

    #[test]
    fn test_query_copies_connection_ignores() {
        let query = query();
        assert_eq!(query.ignores().iter().copied().collect::<Vec<_>>(), vec![404]);
        assert_eq!(query.connection().name(), "test");
    }
}
