//! Reusable query transformations.
//!
//! A scope receives a [`Query`] plus the model it is applied on behalf of and
//! returns the transformed query. Any `Fn(Query, &M) -> Query` closure is a
//! scope; named scopes are ordinary types implementing the trait.
//!
//! ```
//! use quarry::{Query, Scope, SortOrder};
//!
//! struct Published;
//!
//! impl<M> Scope<M> for Published {
//!     fn apply(&self, query: Query, _model: &M) -> Query {
//!         query.where_eq("status", "published")
//!     }
//! }
//!
//! let newest = |query: Query, _model: &()| query.order_by("created_at", SortOrder::Desc);
//! # let _ = (Published, newest);
//! ```

use crate::query::Query;

/// A transformation applied to a query before execution.
pub trait Scope<M: ?Sized> {
    /// Returns `query` with this scope's clauses added.
    fn apply(&self, query: Query, model: &M) -> Query;
}

impl<M, F> Scope<M> for F
where
    M: ?Sized,
    F: Fn(Query, &M) -> Query,
{
    fn apply(&self, query: Query, model: &M) -> Query {
        self(query, model)
    }
}
