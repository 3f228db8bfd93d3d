//! Bool-query clause accumulation.
//!
//! [`BoolQuery`] holds the four clause lists of an Elasticsearch `bool`
//! query. The where-family helpers translate field conditions into
//! `term`/`terms`/`range`/`exists`/`match` clauses and place them in the
//! list that gives the expected semantics: exact matches and ranges go to
//! `filter`, negations to `must_not`, full-text matches to `must`.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value, json};

use crate::error::QueryError;

/// Comparison operators accepted by `where_op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Exact term match.
    Eq,
    /// Negated term match.
    NotEq,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Analyzed full-text match.
    Like,
    /// Field presence; a `false` value negates it.
    Exists,
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::NotEq),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            "like" => Ok(Operator::Like),
            "exists" => Ok(Operator::Exists),
            other => Err(QueryError::invalid_argument(
                "operator",
                format!("unsupported operator '{}'", other),
            )),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "like",
            Operator::Exists => "exists",
        };
        write!(f, "{}", symbol)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Returns the engine's spelling of the direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(QueryError::invalid_argument(
                "order",
                format!("expected 'asc' or 'desc', got '{}'", other),
            )),
        }
    }
}

/// Builds `{ kind: { field: value } }`.
pub(crate) fn field_clause(kind: &str, field: &str, value: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(field.to_string(), value);
    let mut outer = Map::new();
    outer.insert(kind.to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn range_clause(field: &str, bound: &str, value: Value) -> Value {
    let mut bounds = Map::new();
    bounds.insert(bound.to_string(), value);
    field_clause("range", field, Value::Object(bounds))
}

fn exists_clause(field: &str) -> Value {
    json!({ "exists": { "field": field } })
}

/// The four clause lists of a `bool` query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    must: Vec<Value>,
    must_not: Vec<Value>,
    should: Vec<Value>,
    filter: Vec<Value>,
    minimum_should_match: Option<u32>,
}

impl BoolQuery {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw scoring clause.
    pub fn must(mut self, clause: Value) -> Self {
        self.must.push(clause);
        self
    }

    /// Adds a raw exclusion clause.
    pub fn must_not(mut self, clause: Value) -> Self {
        self.must_not.push(clause);
        self
    }

    /// Adds a raw optional clause.
    pub fn should(mut self, clause: Value) -> Self {
        self.should.push(clause);
        self
    }

    /// Adds a raw non-scoring clause.
    pub fn filter(mut self, clause: Value) -> Self {
        self.filter.push(clause);
        self
    }

    /// Requires at least `n` of the `should` clauses to match.
    pub fn minimum_should_match(mut self, n: u32) -> Self {
        self.minimum_should_match = Some(n);
        self
    }

    /// `field == value`.
    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field_clause("term", field, value.into()))
    }

    /// `field != value`.
    pub fn where_not(self, field: &str, value: impl Into<Value>) -> Self {
        self.must_not(field_clause("term", field, value.into()))
    }

    /// `field <op> value`.
    pub fn where_op(self, field: &str, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        match op {
            Operator::Eq => self.where_eq(field, value),
            Operator::NotEq => self.where_not(field, value),
            Operator::Gt => self.filter(range_clause(field, "gt", value)),
            Operator::Gte => self.filter(range_clause(field, "gte", value)),
            Operator::Lt => self.filter(range_clause(field, "lt", value)),
            Operator::Lte => self.filter(range_clause(field, "lte", value)),
            Operator::Like => self.must(field_clause("match", field, value)),
            Operator::Exists => {
                if value.as_bool() == Some(false) {
                    self.where_not_exists(field)
                } else {
                    self.where_exists(field)
                }
            }
        }
    }

    /// `field` is one of `values`.
    pub fn where_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.filter(field_clause("terms", field, Value::Array(values)))
    }

    /// `field` is none of `values`.
    pub fn where_not_in<I, V>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.must_not(field_clause("terms", field, Value::Array(values)))
    }

    /// `from <= field <= to`.
    pub fn where_between(self, field: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.filter(field_clause(
            "range",
            field,
            json!({ "gte": from.into(), "lte": to.into() }),
        ))
    }

    /// `field` has a value.
    pub fn where_exists(self, field: &str) -> Self {
        self.filter(exists_clause(field))
    }

    /// `field` has no value.
    pub fn where_not_exists(self, field: &str) -> Self {
        self.must_not(exists_clause(field))
    }

    /// Adds `field == value` as an alternative (`should`) clause.
    pub fn or_where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.should(field_clause("term", field, value.into()))
    }

    /// Adds a nested group as a single `must` clause. Empty groups are dropped.
    pub fn where_group(self, build: impl FnOnce(BoolQuery) -> BoolQuery) -> Self {
        let group = build(BoolQuery::new());
        if group.is_empty() {
            self
        } else {
            self.must(group.to_clause())
        }
    }

    /// Returns true if no clause has been added.
    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.must_not.is_empty()
            && self.should.is_empty()
            && self.filter.is_empty()
    }

    /// Renders `{ "bool": { ... } }` with only the non-empty lists.
    pub fn to_clause(&self) -> Value {
        let mut bool_query = Map::new();
        for (key, clauses) in [
            ("must", &self.must),
            ("must_not", &self.must_not),
            ("should", &self.should),
            ("filter", &self.filter),
        ] {
            if !clauses.is_empty() {
                bool_query.insert(key.to_string(), Value::Array(clauses.clone()));
            }
        }
        if let Some(n) = self.minimum_should_match {
            bool_query.insert("minimum_should_match".to_string(), json!(n));
        }
        json!({ "bool": bool_query })
    }

    /// Renders the `query` section; an empty group matches everything.
    pub fn to_query(&self) -> Value {
        if self.is_empty() {
            json!({ "match_all": {} })
        } else {
            self.to_clause()
        }
    }
}
