pub use books_table::BooksTable;
pub use connection::{Connection, PostgresConnectionConfig, PostgresConnector};
pub use in_memory_books_repository::InMemoryBooksRepository;
pub use postgres_books_repository::PostgresBooksRepository;
pub use read_only_statement::ReadOnlyStatement;

use crate::api::{BatchOutcome, Book, BookInput, QueryRow, StoredBook, UpsertAction, Upc};

mod books_table;
mod connection;
mod in_memory_books_repository;
mod normalization;
mod postgres_books_repository;
pub mod query_params;
mod read_only_statement;
pub mod reconciliation;

/// Errors a caller can correct by changing the request
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Invalid {field} for book {upc}: {reason}")]
    InvalidField {
        upc: Upc,
        field: &'static str,
        reason: String,
    },

    #[error("Only SELECT queries are allowed for security reasons")]
    NotReadOnly,

    #[error("Query expects {expected} parameters, got {got}")]
    ParameterCount { expected: usize, got: usize },

    #[error("Invalid query parameter ${position}: {reason}")]
    InvalidParameter { position: usize, reason: String },

    #[error("Invalid table name {0:?}")]
    InvalidTableName(String),
}

impl ValidationError {
    pub fn invalid_field(upc: &str, field: &'static str, reason: &str) -> Self {
        Self::InvalidField {
            upc: upc.to_string(),
            field,
            reason: reason.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BooksRepositoryError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to connect to database: {0}")]
    ConnectionFailure(tokio_postgres::Error),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait BooksRepository: Send + Sync {
    /// Inserts, updates or skips every book of the batch in one transaction.
    /// Later occurrences of the same upc replace earlier ones.
    async fn upsert_books(&self, books: Vec<Book>) -> Result<BatchOutcome, BooksRepositoryError>;

    /// Retrieves a stored book, `None` if there is no book with given upc
    async fn get_book(&self, upc: &str) -> Result<Option<StoredBook>, BooksRepositoryError>;

    /// Runs a read only statement with positional parameters
    async fn query_books(
        &self,
        statement: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Vec<QueryRow>, BooksRepositoryError>;

    /// Normalizes and upserts a single book
    async fn upsert_book(&self, input: BookInput) -> Result<(Book, UpsertAction), BooksRepositoryError> {
        let book = input.normalize()?;
        let outcome = self.upsert_books(vec![book.clone()]).await?;
        let action = outcome
            .outcomes
            .first()
            .map(|outcome| outcome.action)
            .ok_or_else(|| BooksRepositoryError::Other("No outcome returned".to_string()))?;
        Ok((book, action))
    }

    /// Normalizes every book first so that nothing reaches the store when any record is invalid
    async fn upsert_book_inputs(
        &self,
        inputs: Vec<BookInput>,
    ) -> Result<BatchOutcome, BooksRepositoryError> {
        let books = inputs
            .into_iter()
            .map(BookInput::normalize)
            .collect::<Result<Vec<_>, _>>()?;
        self.upsert_books(books).await
    }
}
