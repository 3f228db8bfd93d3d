//! Quarry: connections, queries and index management for Elasticsearch
//!
//! This crate sits between application code and the Elasticsearch client.
//! It resolves named connections lazily, builds queries with a chainable
//! API, applies reusable scopes and adapts responses into typed results.
//!
//! # Features
//!
//! - **Named connections**: a [`ConnectionResolver`] caches one
//!   [`Connection`] per name and builds deferred ones on first use
//! - **Query builder**: where-family clauses, sorting, pagination,
//!   aggregations, scrolling and by-query updates and deletes
//! - **Scopes**: reusable [`Scope`] transformations applied in order
//! - **Index management**: shards, replicas, mappings and aliases through
//!   the [`Index`] builder
//!
//! # Backend Features
//!
//! - `elasticsearch` (default) - HTTP transport over the official client
//!
//! Without it, supply your own [`SearchTransport`] and wrap it with
//! [`Connection::new`].
//!
//! # Architecture
//!
//! - [`config`] - Connection configuration
//! - [`resolver`] - Named connection registry
//! - [`connection`] - One transport plus its ignored statuses
//! - [`query`] - Query builder and terminal operations
//! - [`scope`] - Reusable query transformations
//! - [`index`] - Index lifecycle builder
//! - [`collection`] - Search response adaptation
//! - [`transport`] - The boundary to the search engine client
//! - [`error`] - Error types for all operations
//!
//! # Quick Start
//!
//! ```no_run
//! use quarry::{ConnectionResolver, SortOrder};
//! use quarry::config::{ConnectionConfig, QuarryConfig};
//!
//! # async fn run() -> quarry::QuarryResult<()> {
//! let config = QuarryConfig::new("main").with_connection("main", ConnectionConfig::default());
//! let resolver = ConnectionResolver::from_config(&config);
//!
//! let books = resolver
//!     .connection(None)?
//!     .index("books")
//!     .where_eq("status", "published")
//!     .order_by("year", SortOrder::Desc)
//!     .take(10)
//!     .get()
//!     .await?;
//!
//! println!("{} of {} books", books.len(), books.total());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

#[cfg(feature = "elasticsearch")]
pub mod client;
pub mod collection;
pub mod config;
pub mod connection;
pub mod error;
pub mod index;
pub mod model;
pub mod query;
pub mod resolver;
pub mod scope;
pub mod transport;

// Re-export commonly used types
pub use collection::{Collection, Hit, Page};
pub use connection::Connection;
pub use error::{QuarryError, QuarryResult};
pub use index::Index;
pub use model::Model;
pub use query::{BoolQuery, Operator, Query, SortOrder};
pub use resolver::ConnectionResolver;
pub use scope::Scope;
pub use transport::{Endpoint, RequestParams, SearchTransport, TransportResponse};

#[cfg(feature = "elasticsearch")]
pub use client::{ClientFactory, ElasticsearchTransport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
