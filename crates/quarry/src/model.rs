//! Binding application types to an index and a connection.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::QuarryResult;
use crate::query::Query;
use crate::resolver::ConnectionResolver;

/// A document type stored in one index.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use quarry::Model;
///
/// #[derive(Serialize, Deserialize)]
/// struct Book {
///     title: String,
/// }
///
/// impl Model for Book {
///     const INDEX: &'static str = "books";
/// }
///
/// assert_eq!(Book::connection_name(), None);
/// ```
pub trait Model: Serialize + DeserializeOwned {
    /// Index the documents live in.
    const INDEX: &'static str;

    /// Connection to use; `None` selects the resolver's default.
    fn connection_name() -> Option<&'static str> {
        None
    }

    /// Document id used when this value is inserted.
    fn document_id(&self) -> Option<String> {
        None
    }

    /// Starts a query over this model's index.
    fn query(resolver: &ConnectionResolver) -> QuarryResult<Query> {
        let connection = resolver.connection(Self::connection_name())?;
        Ok(connection.index(Self::INDEX))
    }

    /// Starts a query targeting this value's document, ready for `insert`,
    /// `update` or `delete`.
    fn document_query(&self, resolver: &ConnectionResolver) -> QuarryResult<Query> {
        let query = Self::query(resolver)?;
        Ok(match self.document_id() {
            Some(id) => query.id(id),
            None => query,
        })
    }
}
