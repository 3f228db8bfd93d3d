//! Test infrastructure for the query layer.
//!
//! Provides a recording [`SearchTransport`](quarry::SearchTransport) that
//! answers with canned responses, plus response and document fixtures.

#![allow(dead_code)]

pub mod fixtures;
pub mod harness;

// Re-export commonly used items
pub use fixtures::*;
pub use harness::*;
