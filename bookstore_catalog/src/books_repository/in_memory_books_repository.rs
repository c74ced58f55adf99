use std::collections::HashMap;

use chrono::Utc;

use crate::api::{BatchOutcome, Book, QueryRow, StoredBook, Upc};
use crate::books_repository::reconciliation::{deduplicate_last_wins, plan};
use crate::books_repository::{BooksRepository, BooksRepositoryError, ReadOnlyStatement};

/// Repository keeping books in process memory, used for local runs and tests.
/// Every batch is applied under a single write lock.
#[derive(Default)]
pub struct InMemoryBooksRepository {
    books: parking_lot::RwLock<HashMap<Upc, StoredBook>>,
}

#[async_trait::async_trait]
impl BooksRepository for InMemoryBooksRepository {
    async fn upsert_books(&self, books: Vec<Book>) -> Result<BatchOutcome, BooksRepositoryError> {
        if books.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let books = deduplicate_last_wins(books);

        let mut locked_books = self.books.write();
        let plan = plan(books, &locked_books);
        let now = Utc::now();

        for book in plan.inserts {
            locked_books.insert(
                book.upc.clone(),
                StoredBook {
                    book,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        for book in plan.updates {
            if let Some(stored) = locked_books.get_mut(&book.upc) {
                stored.book = book;
                stored.updated_at = now;
            }
        }
        Ok(plan.outcome)
    }

    async fn get_book(&self, upc: &str) -> Result<Option<StoredBook>, BooksRepositoryError> {
        Ok(self.books.read().get(upc).cloned())
    }

    async fn query_books(
        &self,
        statement: &str,
        _params: Vec<serde_json::Value>,
    ) -> Result<Vec<QueryRow>, BooksRepositoryError> {
        ReadOnlyStatement::parse(statement)?;
        Err(BooksRepositoryError::Other(
            "Ad hoc queries require the postgres repository".to_string(),
        ))
    }
}
