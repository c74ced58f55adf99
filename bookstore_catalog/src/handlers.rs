use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::web::{self, Data};
use actix_web::{Error, HttpResponse};
use serde::Deserialize;

use crate::api::{
    BatchUpsertResponse, BookInput, ErrorResponse, HealthResponse, QueryRequest, QueryResponse,
    UpsertBookResponse,
};
use crate::books_repository::{BooksRepository, BooksRepositoryError};

pub type SharedBooksRepository = Data<Arc<dyn BooksRepository>>;

fn error_response(status: StatusCode, detail: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        detail: detail.into(),
    })
}

/// Maps write path failures, details of database errors stay in the logs
fn write_error_response(operation: &str, err: BooksRepositoryError) -> HttpResponse {
    match err {
        BooksRepositoryError::Validation(validation) => {
            tracing::error!("Validation error: {}", validation);
            error_response(StatusCode::BAD_REQUEST, validation.to_string())
        }
        BooksRepositoryError::DatabaseFailure(_) | BooksRepositoryError::ConnectionFailure(_) => {
            tracing::error!("Database error while {}: {}", operation, err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
        }
        BooksRepositoryError::Other(_) => {
            tracing::error!("Unexpected error while {}: {}", operation, err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred",
            )
        }
    }
}

pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
    }))
}

pub async fn upsert_book(
    books_repository: SharedBooksRepository,
    book: web::Json<BookInput>,
) -> Result<HttpResponse, Error> {
    Ok(match books_repository.upsert_book(book.into_inner()).await {
        Ok((book, action)) => HttpResponse::Ok().json(UpsertBookResponse {
            book,
            action,
            message: "Book processed successfully".to_string(),
        }),
        Err(err) => write_error_response("processing book", err),
    })
}

pub async fn batch_upsert_books(
    books_repository: SharedBooksRepository,
    books: web::Json<Vec<BookInput>>,
) -> Result<HttpResponse, Error> {
    Ok(
        match books_repository.upsert_book_inputs(books.into_inner()).await {
            Ok(outcome) => HttpResponse::Ok().json(BatchUpsertResponse {
                message: "Books processed successfully".to_string(),
                count: outcome.total(),
                inserted: outcome.inserted,
                updated: outcome.updated,
                skipped: outcome.skipped,
            }),
            Err(err) => write_error_response("processing batch", err),
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct QueryString {
    pub query: String,
}

pub async fn query_books_get(
    books_repository: SharedBooksRepository,
    query: web::Query<QueryString>,
) -> Result<HttpResponse, Error> {
    Ok(run_query(&books_repository, query.into_inner().query, vec![]).await)
}

pub async fn query_books_post(
    books_repository: SharedBooksRepository,
    request: web::Json<QueryRequest>,
) -> Result<HttpResponse, Error> {
    let QueryRequest { query, params } = request.into_inner();
    Ok(run_query(&books_repository, query, params).await)
}

async fn run_query(
    books_repository: &SharedBooksRepository,
    query: String,
    params: Vec<serde_json::Value>,
) -> HttpResponse {
    match books_repository.query_books(&query, params).await {
        Ok(results) => HttpResponse::Ok().json(QueryResponse { results }),
        Err(BooksRepositoryError::Validation(validation)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, validation.to_string())
        }
        Err(err) => {
            tracing::error!("Database error while querying books: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
        }
    }
}

pub async fn get_book(
    books_repository: SharedBooksRepository,
    upc: web::Path<String>,
) -> Result<HttpResponse, Error> {
    Ok(match books_repository.get_book(&upc.into_inner()).await {
        Ok(Some(book)) => HttpResponse::Ok().json(book),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Book not found"),
        Err(err) => {
            tracing::error!("Get book failed {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
        }
    })
}

#[cfg(test)]
mod handler_tests {
    use actix_web::{test, App};
    use serde_json::json;

    use crate::api::{BatchUpsertResponse, StoredBook, UpsertAction};
    use crate::app_config::config_app;
    use crate::books_repository::InMemoryBooksRepository;

    use super::*;

    fn repository() -> Arc<dyn BooksRepository> {
        Arc::new(InMemoryBooksRepository::default())
    }

    fn book_json(upc: &str, price: serde_json::Value) -> serde_json::Value {
        json!({
            "title": "Sharp Objects",
            "price": price,
            "rating": 4,
            "description": "WICKED above her hipbone",
            "category": "Mystery",
            "upc": upc,
            "num_available_units": 20,
            "image_url": "https://books.toscrape.com/media/cache/32/51/3251cf3a3412f53f339e42cac2134093.jpg",
            "book_url": "https://books.toscrape.com/catalogue/sharp-objects_997/index.html"
        })
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(repository()))
                .configure(config_app),
        )
        .await;
        let response: HealthResponse =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request())
                .await;
        assert_eq!(response.status, "healthy");
    }

    #[actix_web::test]
    async fn test_upsert_then_skip_then_get() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(repository()))
                .configure(config_app),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/upsert")
            .set_json(book_json("e10e1e165dc8be4a", json!(47.82)))
            .to_request();
        let response: UpsertBookResponse = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response.action, UpsertAction::Inserted);
        assert_eq!(response.message, "Book processed successfully");
        assert_eq!(response.book.price.to_string(), "47.82");

        let request = test::TestRequest::post()
            .uri("/upsert")
            .set_json(book_json("e10e1e165dc8be4a", json!("47.82")))
            .to_request();
        let response: UpsertBookResponse = test::call_and_read_body_json(&app, request).await;
        assert_eq!(response.action, UpsertAction::Skipped);

        let request = test::TestRequest::get()
            .uri("/books/e10e1e165dc8be4a")
            .to_request();
        let stored: StoredBook = test::call_and_read_body_json(&app, request).await;
        assert_eq!(stored.book.title, "Sharp Objects");

        let request = test::TestRequest::get().uri("/books/unknown").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_invalid_book_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(repository()))
                .configure(config_app),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/upsert")
            .set_json(book_json("upc", json!("free")))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(response).await;
        assert!(body.detail.contains("price"));

        let request = test::TestRequest::post()
            .uri("/upsert")
            .set_json(json!({"title": "missing everything"}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_batch_upsert() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(repository()))
                .configure(config_app),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/batch-upsert")
            .set_json(json!([
                book_json("a", json!(1.5)),
                book_json("b", json!(2.5)),
            ]))
            .to_request();
        let response: BatchUpsertResponse = test::call_and_read_body_json(&app, request).await;
        assert_eq!((response.count, response.inserted), (2, 2));

        let request = test::TestRequest::post()
            .uri("/batch-upsert")
            .set_json(json!([
                book_json("a", json!(1.5)),
                book_json("b", json!(3)),
                book_json("c", json!(4)),
            ]))
            .to_request();
        let response: BatchUpsertResponse = test::call_and_read_body_json(&app, request).await;
        assert_eq!(
            (response.count, response.inserted, response.updated, response.skipped),
            (3, 1, 1, 1)
        );

        // one invalid record rejects the whole batch before anything is written
        let request = test::TestRequest::post()
            .uri("/batch-upsert")
            .set_json(json!([book_json("d", json!(1)), book_json("e", json!("n/a"))]))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let request = test::TestRequest::get().uri("/books/d").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_non_select_query_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(repository()))
                .configure(config_app),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/query")
            .set_json(json!({"query": "DELETE FROM books"}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = test::read_body_json(response).await;
        assert_eq!(body.detail, "Only SELECT queries are allowed for security reasons");

        let request = test::TestRequest::get()
            .uri("/query?query=DROP%20TABLE%20books")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
