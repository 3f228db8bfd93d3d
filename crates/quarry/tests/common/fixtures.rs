//! Response and document fixtures.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use quarry::Model;

/// A book document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Document id.
    #[serde(skip)]
    pub id: Option<String>,
    /// Title.
    pub title: String,
    /// Publication year.
    pub year: u32,
    /// Publication status.
    pub status: String,
}

impl Book {
    /// Creates a published book.
    pub fn new(title: &str, year: u32) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            year,
            status: "published".to_string(),
        }
    }

    /// Sets the document id.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

impl Model for Book {
    const INDEX: &'static str = "books";

    fn document_id(&self) -> Option<String> {
        self.id.clone()
    }
}

/// An audit event stored on a non-default connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Event name.
    pub event: String,
}

impl Model for AuditEntry {
    const INDEX: &'static str = "audit";

    fn connection_name() -> Option<&'static str> {
        Some("audit")
    }
}

/// A search response carrying `books` as hits and `total` as `hits.total`.
pub fn search_response(books: &[(&str, &Book)], total: Value) -> Value {
    let hits: Vec<Value> = books
        .iter()
        .map(|(id, book)| {
            json!({
                "_index": "books",
                "_id": id,
                "_score": 1.0,
                "_source": book
            })
        })
        .collect();

    json!({
        "took": 2,
        "timed_out": false,
        "_shards": { "total": 1, "successful": 1, "skipped": 0, "failed": 0 },
        "hits": {
            "total": total,
            "max_score": 1.0,
            "hits": hits
        }
    })
}

/// A `get` response for one document.
pub fn get_response(id: &str, book: &Book) -> Value {
    json!({
        "_index": "books",
        "_id": id,
        "_version": 1,
        "found": true,
        "_source": book
    })
}

/// Two sample books.
pub fn sample_books() -> Vec<Book> {
    vec![Book::new("Dune", 1965), Book::new("Emma", 1815)]
}
