use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Row, Transaction};

use crate::api::{BatchOutcome, Book, QueryRow, StoredBook, Upc};
use crate::books_repository::query_params::{bind_params, row_to_json};
use crate::books_repository::reconciliation::{deduplicate_last_wins, plan};
use crate::books_repository::{
    BooksRepository, BooksRepositoryError, BooksTable, Connection, PostgresConnector,
    ReadOnlyStatement,
};

/// Repository backed by a single postgres table.
/// Every operation opens its own session and closes it before returning.
pub struct PostgresBooksRepository {
    connector: PostgresConnector,
    table: BooksTable,
}

impl PostgresBooksRepository {
    /// Checks that the database is reachable and creates the books table if needed
    pub async fn init(connector: PostgresConnector, table: BooksTable) -> anyhow::Result<Self> {
        let mut connection = connector
            .acquire()
            .await
            .context("Failed to start postgres")?;
        let setup = connection
            .client()
            .batch_execute(&table.create_table())
            .await
            .context("Failed to setup table");
        connection.release().await;
        setup?;
        Ok(Self { connector, table })
    }

    async fn upsert_in_transaction(
        &self,
        transaction: &Transaction<'_>,
        books: Vec<Book>,
    ) -> Result<BatchOutcome, BooksRepositoryError> {
        let upcs: Vec<Upc> = books.iter().map(|book| book.upc.clone()).collect();
        let rows = transaction
            .query(&self.table.select_by_upcs(), &[&upcs])
            .await?;
        let existing = rows
            .iter()
            .map(|row| {
                let stored = stored_book_from_row(row)?;
                Ok((stored.book.upc.clone(), stored))
            })
            .collect::<Result<HashMap<_, _>, BooksRepositoryError>>()?;
        tracing::debug!("Found {} of {} books already stored", existing.len(), upcs.len());

        let plan = plan(books, &existing);
        let now = Utc::now();

        if !plan.inserts.is_empty() {
            let columns = BookColumns::from_books(&plan.inserts);
            let inserted = transaction
                .execute(&self.table.bulk_insert(), &columns.params(&now))
                .await?;
            tracing::info!("Inserted {} new books", inserted);
        }
        if !plan.updates.is_empty() {
            let columns = BookColumns::from_books(&plan.updates);
            let updated = transaction
                .execute(&self.table.bulk_update(), &columns.params(&now))
                .await?;
            tracing::info!("Updated {} books", updated);
        }
        Ok(plan.outcome)
    }

    async fn upsert_with_connection(
        &self,
        connection: &mut Connection,
        books: Vec<Book>,
    ) -> Result<BatchOutcome, BooksRepositoryError> {
        let transaction = connection.client().transaction().await?;
        match self.upsert_in_transaction(&transaction, books).await {
            Ok(outcome) => {
                transaction.commit().await?;
                Ok(outcome)
            }
            Err(err) => {
                tracing::error!("Batch upsert failed, rolling back: {}", err);
                if let Err(rollback_err) = transaction.rollback().await {
                    tracing::error!("Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    async fn query_with_connection(
        connection: &mut Connection,
        statement: &ReadOnlyStatement,
        params: Vec<serde_json::Value>,
    ) -> Result<Vec<QueryRow>, BooksRepositoryError> {
        let transaction = connection.client().transaction().await?;
        let result = Self::query_in_transaction(&transaction, statement, &params).await;

        // read only, nothing to commit
        if let Err(rollback_err) = transaction.rollback().await {
            tracing::warn!("Rollback after query failed: {}", rollback_err);
        }
        result
    }

    async fn query_in_transaction(
        transaction: &Transaction<'_>,
        statement: &ReadOnlyStatement,
        params: &[serde_json::Value],
    ) -> Result<Vec<QueryRow>, BooksRepositoryError> {
        let prepared = transaction.prepare(statement.as_str()).await?;
        let bound = bind_params(params, prepared.params())?;
        let refs: Vec<&(dyn ToSql + Sync)> = bound
            .iter()
            .map(|param| param.as_ref() as &(dyn ToSql + Sync))
            .collect();
        let rows = transaction.query(&prepared, &refs).await?;
        tracing::debug!("Query returned {} records", rows.len());
        rows.iter().map(row_to_json).collect()
    }
}

#[async_trait::async_trait]
impl BooksRepository for PostgresBooksRepository {
    async fn upsert_books(&self, books: Vec<Book>) -> Result<BatchOutcome, BooksRepositoryError> {
        if books.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let books = deduplicate_last_wins(books);

        let mut connection = self.connector.acquire().await?;
        let result = self.upsert_with_connection(&mut connection, books).await;
        connection.release().await;
        result
    }

    async fn get_book(&self, upc: &str) -> Result<Option<StoredBook>, BooksRepositoryError> {
        tracing::debug!("Fetching book with UPC: {}", upc);
        let mut connection = self.connector.acquire().await?;
        let rows = connection
            .client()
            .query(&self.table.select_by_upcs(), &[&vec![upc.to_string()]])
            .await;
        connection.release().await;

        match rows?.first() {
            Some(row) => Ok(Some(stored_book_from_row(row)?)),
            None => {
                tracing::debug!("No book found with UPC: {}", upc);
                Ok(None)
            }
        }
    }

    async fn query_books(
        &self,
        statement: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Vec<QueryRow>, BooksRepositoryError> {
        let statement = ReadOnlyStatement::parse(statement)?;
        tracing::debug!(
            "Executing query: {} with {} parameters",
            statement.as_str(),
            params.len()
        );

        let mut connection = self.connector.acquire().await?;
        let result = Self::query_with_connection(&mut connection, &statement, params).await;
        connection.release().await;
        result
    }
}

fn stored_book_from_row(row: &Row) -> Result<StoredBook, BooksRepositoryError> {
    Ok(StoredBook {
        book: Book {
            upc: row.try_get("upc")?,
            title: row.try_get("title")?,
            price: row.try_get("price")?,
            rating: row.try_get("rating")?,
            description: row.try_get("description")?,
            category: row.try_get("category")?,
            num_available_units: row.try_get("num_available_units")?,
            image_url: row.try_get("image_url")?,
            book_url: row.try_get("book_url")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Books transposed into one array per column, bound to the UNNEST statements
struct BookColumns {
    upcs: Vec<String>,
    titles: Vec<String>,
    prices: Vec<Decimal>,
    ratings: Vec<i16>,
    descriptions: Vec<String>,
    categories: Vec<String>,
    units: Vec<i32>,
    image_urls: Vec<String>,
    book_urls: Vec<String>,
}

impl BookColumns {
    fn from_books(books: &[Book]) -> Self {
        let mut columns = Self {
            upcs: Vec::with_capacity(books.len()),
            titles: Vec::with_capacity(books.len()),
            prices: Vec::with_capacity(books.len()),
            ratings: Vec::with_capacity(books.len()),
            descriptions: Vec::with_capacity(books.len()),
            categories: Vec::with_capacity(books.len()),
            units: Vec::with_capacity(books.len()),
            image_urls: Vec::with_capacity(books.len()),
            book_urls: Vec::with_capacity(books.len()),
        };
        for book in books {
            columns.upcs.push(book.upc.clone());
            columns.titles.push(book.title.clone());
            columns.prices.push(book.price);
            columns.ratings.push(book.rating);
            columns.descriptions.push(book.description.clone());
            columns.categories.push(book.category.clone());
            columns.units.push(book.num_available_units);
            columns.image_urls.push(book.image_url.clone());
            columns.book_urls.push(book.book_url.clone());
        }
        columns
    }

    fn params<'a>(&'a self, now: &'a DateTime<Utc>) -> [&'a (dyn ToSql + Sync); 10] {
        [
            &self.upcs,
            &self.titles,
            &self.prices,
            &self.ratings,
            &self.descriptions,
            &self.categories,
            &self.units,
            &self.image_urls,
            &self.book_urls,
            now,
        ]
    }
}
