//! Index lifecycle management.
//!
//! [`Index`] is a builder: obtain one from
//! [`Connection::create_index`](crate::Connection::create_index), chain the
//! settings, then call [`Index::create`]. [`Index::create_params`] renders the
//! request without sending it:
//!
//! ```text
//! { "index": "books",
//!   "body": { "settings": { "number_of_shards": 5, "number_of_replicas": 0 },
//!             "aliases": { ... }, "mappings": { ... } },
//!   "client": { "ignore": [400] } }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::connection::Connection;
use crate::error::{QuarryResult, QueryError};
use crate::transport::{Endpoint, RequestParams};

/// Default primary shard count.
pub const DEFAULT_SHARDS: u32 = 5;

/// Default replica count.
pub const DEFAULT_REPLICAS: u32 = 0;

/// Settings, mappings and aliases for one index.
#[derive(Debug, Clone)]
pub struct Index {
    connection: Arc<Connection>,
    name: String,
    shards: u32,
    replicas: u32,
    settings: Map<String, Value>,
    mappings: Option<Value>,
    aliases: Map<String, Value>,
    ignores: BTreeSet<u16>,
}

impl Index {
    /// Creates a builder with the default shard and replica counts.
    pub fn new(connection: Arc<Connection>, name: impl Into<String>) -> Self {
        let ignores = connection.ignores().clone();
        Self {
            connection,
            name: name.into(),
            shards: DEFAULT_SHARDS,
            replicas: DEFAULT_REPLICAS,
            settings: Map::new(),
            mappings: None,
            aliases: Map::new(),
            ignores,
        }
    }

    /// Returns the index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ignored statuses.
    pub fn ignores(&self) -> &BTreeSet<u16> {
        &self.ignores
    }

    /// Sets the primary shard count.
    pub fn shards(mut self, shards: u32) -> Self {
        self.shards = shards;
        self
    }

    /// Sets the replica count.
    pub fn replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    /// Adds an extra index setting such as `refresh_interval`.
    pub fn setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    /// Sets the mappings, replacing any previous value.
    pub fn mappings(mut self, mappings: Value) -> Self {
        self.mappings = Some(mappings);
        self
    }

    /// Adds an alias with no options.
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.aliases.insert(name.into(), json!({}));
        self
    }

    /// Adds aliases from a loosely typed value.
    ///
    /// `null` adds nothing, a string adds one alias, an object maps alias
    /// names to their options. Anything else is rejected.
    pub fn aliases(mut self, aliases: Value) -> QuarryResult<Self> {
        match aliases {
            Value::Null => {}
            Value::String(name) => {
                self.aliases.insert(name, json!({}));
            }
            Value::Object(map) => self.aliases.extend(map),
            other => {
                return Err(QueryError::invalid_argument(
                    "aliases",
                    format!("expected null, a string or an object, got {}", other),
                )
                .into());
            }
        }
        Ok(self)
    }

    /// Adds status codes that must not raise. Duplicates collapse.
    pub fn ignore(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.ignores.extend(codes);
        self
    }

    /// Renders the creation request without sending it.
    pub fn create_params(&self) -> RequestParams {
        let mut settings = Map::new();
        settings.insert("number_of_shards".to_string(), json!(self.shards));
        settings.insert("number_of_replicas".to_string(), json!(self.replicas));
        for (key, value) in &self.settings {
            settings.insert(key.clone(), value.clone());
        }

        let mut body = Map::new();
        body.insert("settings".to_string(), Value::Object(settings));
        if !self.aliases.is_empty() {
            body.insert("aliases".to_string(), Value::Object(self.aliases.clone()));
        }
        if let Some(mappings) = &self.mappings {
            body.insert("mappings".to_string(), mappings.clone());
        }

        RequestParams::for_index(self.name.as_str())
            .with_body(Value::Object(body))
            .with_ignore(&self.ignores)
    }

    /// Creates the index.
    pub async fn create(&self) -> QuarryResult<Value> {
        let response = self
            .connection
            .perform(Endpoint::IndicesCreate, self.create_params())
            .await?;
        if response.is_success() {
            tracing::info!(
                "Created index '{}' ({} shards, {} replicas)",
                self.name,
                self.shards,
                self.replicas
            );
        } else {
            tracing::debug!(
                "Index '{}' not created, ignored status {}",
                self.name,
                response.status
            );
        }
        Ok(response.body)
    }

    /// Deletes the index.
    pub async fn delete(&self) -> QuarryResult<Value> {
        let params = RequestParams::for_index(self.name.as_str()).with_ignore(&self.ignores);
        let response = self
            .connection
            .perform(Endpoint::IndicesDelete, params)
            .await?;
        if response.is_success() {
            tracing::info!("Deleted index '{}'", self.name);
        } else {
            tracing::debug!(
                "Index '{}' not deleted, ignored status {}",
                self.name,
                response.status
            );
        }
        Ok(response.body)
    }

    /// Returns true if the index exists.
    pub async fn exists(&self) -> QuarryResult<bool> {
        let params = RequestParams::for_index(self.name.as_str());
        let response = self
            .connection
            .perform(Endpoint::IndicesExists, params)
            .await?;
        Ok(response.is_success())
    }
}
