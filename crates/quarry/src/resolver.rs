//! Named connection registry.
//!
//! The [`ConnectionResolver`] is an ordinary value owned by the application's
//! composition root and handed to whoever needs connections. Each name maps to
//! either a live connection or a deferred builder; the first lookup of a
//! deferred name builds it under that name's own lock and caches it, so every
//! later lookup returns the same `Arc`. The registry lock is never held while
//! a builder runs, so a builder may resolve other names.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use quarry::{Connection, ConnectionResolver};
//! # use quarry::transport::{Endpoint, RequestParams, SearchTransport, TransportResponse};
//! # use quarry::error::TransportResult;
//! # #[derive(Debug)]
//! # struct Noop;
//! # #[async_trait::async_trait]
//! # impl SearchTransport for Noop {
//! #     async fn perform(&self, _: Endpoint, _: RequestParams) -> TransportResult<TransportResponse> {
//! #         Ok(TransportResponse::ok(serde_json::Value::Null))
//! #     }
//! # }
//!
//! let resolver = ConnectionResolver::new();
//! resolver.extend("search", || Ok(Connection::new("search", Arc::new(Noop))));
//! resolver.set_default_connection("search");
//!
//! let first = resolver.connection(None).unwrap();
//! let second = resolver.connection(Some("search")).unwrap();
//! assert!(Arc::ptr_eq(&first, &second));
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::connection::Connection;
use crate::error::{ConnectionError, QuarryResult};

/// A deferred connection constructor.
pub type ConnectionBuilder = Box<dyn Fn() -> QuarryResult<Connection> + Send + Sync>;

/// A registered builder and the connection it produced, if any.
///
/// `built` serializes concurrent first lookups of one name.
struct Deferred {
    builder: ConnectionBuilder,
    built: Mutex<Option<Arc<Connection>>>,
}

impl Deferred {
    fn resolve(&self, name: &str) -> QuarryResult<Arc<Connection>> {
        let mut built = self.built.lock();
        if let Some(connection) = built.as_ref() {
            return Ok(Arc::clone(connection));
        }
        let connection = Arc::new((self.builder)()?);
        tracing::debug!("Materialized connection '{}'", name);
        *built = Some(Arc::clone(&connection));
        Ok(connection)
    }
}

/// A registry slot.
enum Entry {
    /// Built and cached.
    Materialized(Arc<Connection>),
    /// Registered but not yet built.
    Deferred(Arc<Deferred>),
}

/// Resolves connection names to shared [`Connection`] instances.
pub struct ConnectionResolver {
    entries: Mutex<HashMap<String, Entry>>,
    default: RwLock<Option<String>>,
}

impl Debug for ConnectionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionResolver")
            .field("connections", &self.connection_names())
            .field("default", &*self.default.read())
            .finish()
    }
}

impl Default for ConnectionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionResolver {
    /// Creates an empty resolver with no default.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default: RwLock::new(None),
        }
    }

    /// Registers a deferred HTTP connection for every configured name and
    /// sets the configured default.
    #[cfg(feature = "elasticsearch")]
    pub fn from_config(config: &crate::config::QuarryConfig) -> Self {
        let resolver = Self::new();
        for (name, connection_config) in &config.connections {
            let name_for_builder = name.clone();
            let connection_config = connection_config.clone();
            resolver.extend(name.clone(), move || {
                crate::client::ClientFactory::connection(&name_for_builder, &connection_config)
            });
        }
        resolver.set_default_connection(config.default.clone());
        tracing::debug!(
            "Registered {} deferred connections, default '{}'",
            config.connections.len(),
            config.default
        );
        resolver
    }

    /// Registers a built connection, replacing any entry with the same name.
    pub fn add_connection(
        &self,
        name: impl Into<String>,
        connection: impl Into<Arc<Connection>>,
    ) -> Arc<Connection> {
        let connection = connection.into();
        self.entries
            .lock()
            .insert(name.into(), Entry::Materialized(Arc::clone(&connection)));
        connection
    }

    /// Registers a builder that runs on first lookup of `name`.
    ///
    /// Replaces any entry with the same name, live or deferred.
    pub fn extend<F>(&self, name: impl Into<String>, builder: F)
    where
        F: Fn() -> QuarryResult<Connection> + Send + Sync + 'static,
    {
        let deferred = Deferred {
            builder: Box::new(builder),
            built: Mutex::new(None),
        };
        self.entries
            .lock()
            .insert(name.into(), Entry::Deferred(Arc::new(deferred)));
    }

    /// Returns the connection for `name`, or for the default when `None`.
    ///
    /// A deferred entry is built at most once: a successful build replaces the
    /// entry, a failed build leaves it registered so a later call can retry.
    /// A builder must not resolve its own name.
    pub fn connection(&self, name: Option<&str>) -> QuarryResult<Arc<Connection>> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self
                .default
                .read()
                .clone()
                .ok_or(ConnectionError::MissingDefault)?,
        };

        let deferred = match self.entries.lock().get(&name) {
            Some(Entry::Materialized(connection)) => return Ok(Arc::clone(connection)),
            Some(Entry::Deferred(deferred)) => Arc::clone(deferred),
            None => return Err(ConnectionError::UnknownConnection { name }.into()),
        };

        let built = deferred.resolve(&name)?;

        // Only replace the slot we built; a concurrent re-registration wins.
        let mut entries = self.entries.lock();
        if let Some(Entry::Deferred(current)) = entries.get(&name)
            && Arc::ptr_eq(current, &deferred)
        {
            entries.insert(name, Entry::Materialized(Arc::clone(&built)));
        }
        Ok(built)
    }

    /// Returns true if `name` is live or deferred. Never builds anything.
    pub fn has_connection(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    /// Returns true if `name` has already been built.
    pub fn is_materialized(&self, name: &str) -> bool {
        matches!(self.entries.lock().get(name), Some(Entry::Materialized(_)))
    }

    /// Sets the default connection name. Resolution is checked on lookup.
    pub fn set_default_connection(&self, name: impl Into<String>) {
        *self.default.write() = Some(name.into());
    }

    /// Returns the default connection name, if set.
    pub fn default_connection(&self) -> Option<String> {
        self.default.read().clone()
    }

    /// Returns all registered names, sorted.
    pub fn connection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Removes `name`. Returns true if it was registered.
    pub fn purge(&self, name: &str) -> bool {
        self.entries.lock().remove(name).is_some()
    }

    /// Drops every entry and the default.
    pub fn reset(&self) {
        self.entries.lock().clear();
        *self.default.write() = None;
    }
}
