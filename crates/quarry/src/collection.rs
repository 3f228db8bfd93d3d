//! Read-only views over search responses.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QuarryResult, QueryError};

/// One matched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Index the document lives in.
    #[serde(rename = "_index", default)]
    pub index: String,

    /// Document id.
    #[serde(rename = "_id", default)]
    pub id: String,

    /// Relevance score; absent for sorted or direct `get` results.
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,

    /// The stored document.
    #[serde(rename = "_source", default)]
    pub source: Value,

    /// Sort values, when the search was sorted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Value>>,

    /// Highlighted fragments, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Value>,
}

impl Hit {
    /// Returns a top-level `_source` field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.source.get(field)
    }

    /// Deserializes `_source` into `M`.
    pub fn to_model<M: DeserializeOwned>(&self) -> QuarryResult<M> {
        Ok(serde_json::from_value(self.source.clone())?)
    }
}

/// Reads `hits.total`, which is a plain integer on older engines and
/// `{ "value": n, "relation": ... }` on newer ones.
pub fn normalize_total(total: &Value) -> Option<u64> {
    match total {
        Value::Number(n) => n.as_u64(),
        Value::Object(obj) => obj.get("value").and_then(Value::as_u64),
        _ => None,
    }
}

/// The adapted result of a search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    hits: Vec<Hit>,
    total: u64,
    max_score: Option<f64>,
    took: Option<f64>,
    timed_out: bool,
    scroll_id: Option<String>,
    shards: Value,
    suggestions: Map<String, Value>,
    aggregations: Map<String, Value>,
}

impl Collection {
    /// Adapts a raw search or scroll response.
    ///
    /// A body without `hits` (for example an ignored error response) yields
    /// an empty collection.
    pub fn from_response(body: &Value) -> QuarryResult<Self> {
        let Some(root) = body.as_object() else {
            if body.is_null() {
                return Ok(Self::default());
            }
            return Err(malformed("search response is not an object"));
        };

        let hits_section = root.get("hits");
        let hits: Vec<Hit> = match hits_section.and_then(|h| h.get("hits")) {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|hit| serde_json::from_value(hit.clone()))
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(malformed("hits.hits is not an array")),
        };

        let total = hits_section
            .and_then(|h| h.get("total"))
            .and_then(normalize_total)
            .unwrap_or(hits.len() as u64);

        Ok(Self {
            total,
            max_score: hits_section
                .and_then(|h| h.get("max_score"))
                .and_then(Value::as_f64),
            took: root.get("took").and_then(Value::as_f64),
            timed_out: root
                .get("timed_out")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            scroll_id: root
                .get("_scroll_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            shards: root.get("_shards").cloned().unwrap_or(Value::Null),
            suggestions: object_field(root, "suggest"),
            aggregations: object_field(root, "aggregations"),
            hits,
        })
    }

    /// Returns the hits in response order.
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Returns the total number of matches (not just this page).
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Returns the highest score, if scored.
    pub fn max_score(&self) -> Option<f64> {
        self.max_score
    }

    /// Returns the engine-side duration in milliseconds.
    pub fn took(&self) -> Option<f64> {
        self.took
    }

    /// Returns true if the search timed out on some shard.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Returns the scroll cursor, when scrolling.
    pub fn scroll_id(&self) -> Option<&str> {
        self.scroll_id.as_deref()
    }

    /// Returns the `_shards` report.
    pub fn shards(&self) -> &Value {
        &self.shards
    }

    /// Returns all suggestion groups.
    pub fn suggestions(&self) -> &Map<String, Value> {
        &self.suggestions
    }

    /// Returns one suggestion group.
    pub fn suggestion(&self, name: &str) -> Option<&Value> {
        self.suggestions.get(name)
    }

    /// Returns all aggregation results.
    pub fn aggregations(&self) -> &Map<String, Value> {
        &self.aggregations
    }

    /// Returns one aggregation result.
    pub fn aggregation(&self, name: &str) -> Option<&Value> {
        self.aggregations.get(name)
    }

    /// Number of hits in this response.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if this response has no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Iterates over the hits.
    pub fn iter(&self) -> std::slice::Iter<'_, Hit> {
        self.hits.iter()
    }

    /// Returns the first hit.
    pub fn first(&self) -> Option<&Hit> {
        self.hits.first()
    }

    /// Returns the hit ids in order.
    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.id.as_str()).collect()
    }

    /// Deserializes every hit's `_source` into `M`.
    pub fn models<M: DeserializeOwned>(&self) -> QuarryResult<Vec<M>> {
        self.hits.iter().map(Hit::to_model).collect()
    }
}

impl IntoIterator for Collection {
    type Item = Hit;
    type IntoIter = std::vec::IntoIter<Hit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Hit;
    type IntoIter = std::slice::Iter<'a, Hit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

fn object_field(root: &Map<String, Value>, key: &str) -> Map<String, Value> {
    root.get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn malformed(message: &str) -> crate::error::QuarryError {
    QueryError::MalformedResponse {
        message: message.to_string(),
    }
    .into()
}

/// One page of results with its position in the full result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    items: Collection,
    per_page: u64,
    current_page: u64,
}

impl Page {
    /// Wraps a collection fetched for `current_page`.
    pub fn new(items: Collection, per_page: u64, current_page: u64) -> Self {
        Self {
            items,
            per_page,
            current_page,
        }
    }

    /// Returns the hits on this page.
    pub fn items(&self) -> &Collection {
        &self.items
    }

    /// Consumes the page, returning its hits.
    pub fn into_items(self) -> Collection {
        self.items
    }

    /// Page size.
    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// 1-based page number.
    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    /// Total matches across all pages.
    pub fn total(&self) -> u64 {
        self.items.total()
    }

    /// Number of the last page; at least 1.
    pub fn last_page(&self) -> u64 {
        self.total().div_ceil(self.per_page.max(1)).max(1)
    }

    /// Returns true if a later page exists.
    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }
}
