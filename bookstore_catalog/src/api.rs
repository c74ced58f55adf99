use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Natural key of a catalog record (Universal Product Code)
pub type Upc = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Book as sent by callers of the upsert endpoints.
/// Numeric fields are accepted either as JSON numbers or as numeric strings,
/// they are normalized into a [`Book`] before reaching the database.
pub struct BookInput {
    pub title: String,
    pub price: serde_json::Value,
    pub rating: serde_json::Value,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub upc: Upc,
    pub num_available_units: serde_json::Value,
    pub image_url: String,
    pub book_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Normalized book, every attribute has its canonical type
pub struct Book {
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub rating: i16,
    pub description: String,
    pub category: String,
    pub upc: Upc,
    pub num_available_units: i32,
    pub image_url: String,
    pub book_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Book as persisted, with the timestamps maintained by the repository
pub struct StoredBook {
    #[serde(flatten)]
    pub book: Book,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Decision taken for a single record during reconciliation
pub enum UpsertAction {
    Inserted,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub upc: Upc,
    pub action: UpsertAction,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Result of a batch upsert, one outcome per distinct upc in input order
pub struct BatchOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub outcomes: Vec<UpsertOutcome>,
}

impl BatchOutcome {
    pub fn record(&mut self, upc: Upc, action: UpsertAction) {
        match action {
            UpsertAction::Inserted => self.inserted += 1,
            UpsertAction::Updated => self.updated += 1,
            UpsertAction::Skipped => self.skipped += 1,
        }
        self.outcomes.push(UpsertOutcome { upc, action });
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.skipped
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Response of POST /upsert
pub struct UpsertBookResponse {
    #[serde(flatten)]
    pub book: Book,
    pub action: UpsertAction,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Response of POST /batch-upsert
pub struct BatchUpsertResponse {
    pub message: String,
    pub count: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Read only statement with optional positional parameters ($1, $2, ...)
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
}

/// Single result row, column name to value
pub type QueryRow = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub results: Vec<QueryRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Body of every non 2xx response
pub struct ErrorResponse {
    pub detail: String,
}
