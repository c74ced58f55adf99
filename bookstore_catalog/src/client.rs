use anyhow::{anyhow, bail, Context};
use reqwest::{StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{default_on_request_failure, Retryable, RetryableStrategy, RetryTransientMiddleware};
use reqwest_tracing::TracingMiddleware;

use crate::api::{
    BatchUpsertResponse, BookInput, ErrorResponse, HealthResponse, QueryRequest, QueryResponse,
    QueryRow, StoredBook, UpsertBookResponse,
};

/// Retries connection failures and gateway errors only.
/// A 500 from the service is a final answer, e.g. a rejected query or a rolled back batch.
struct GatewayErrorsOnly;

impl RetryableStrategy for GatewayErrorsOnly {
    fn handle(&self, res: &Result<reqwest::Response, reqwest_middleware::Error>) -> Option<Retryable> {
        match res {
            Ok(response) if is_retryable_status(response.status()) => Some(Retryable::Transient),
            Ok(response) if response.status().is_success() => None,
            Ok(_) => Some(Retryable::Fatal),
            Err(error) => default_on_request_failure(error),
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

pub struct BookstoreCatalogClient {
    url: String,
    client: ClientWithMiddleware,
}

impl BookstoreCatalogClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest_client)
            // Insert the tracing middleware
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                retry_policy,
                GatewayErrorsOnly,
            ))
            .build();

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    /// Url of a single book, the upc is percent encoded as one path segment
    fn book_url(&self, upc: &str) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.url).context("Invalid catalog url")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Catalog url {} cannot be a base", self.url))?
            .pop_if_empty()
            .push("books")
            .push(upc);
        Ok(url)
    }

    async fn error_detail(response: reqwest::Response) -> String {
        response
            .json::<ErrorResponse>()
            .await
            .map(|error| error.detail)
            .unwrap_or_default()
    }

    /// Calls GET /health endpoint
    pub async fn health(&self) -> anyhow::Result<HealthResponse> {
        let response = self
            .client
            .get(format!("{}/health", self.url))
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("Health check failed with status {}", response.status())
        }
        Ok(response.json().await?)
    }

    /// Calls POST /upsert endpoint
    pub async fn upsert_book(&self, book: &BookInput) -> anyhow::Result<UpsertBookResponse> {
        let response = self
            .client
            .post(format!("{}/upsert", self.url))
            .json(book)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("Failed to upsert book {}", Self::error_detail(response).await)
        }
        Ok(response.json().await?)
    }

    /// Calls POST /batch-upsert endpoint
    pub async fn batch_upsert(&self, books: &[BookInput]) -> anyhow::Result<BatchUpsertResponse> {
        let response = self
            .client
            .post(format!("{}/batch-upsert", self.url))
            .json(books)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("Failed to upsert books {}", Self::error_detail(response).await)
        }
        Ok(response.json().await?)
    }

    /// Calls POST /query endpoint
    pub async fn query(
        &self,
        query: &str,
        params: Vec<serde_json::Value>,
    ) -> anyhow::Result<Vec<QueryRow>> {
        let response = self
            .client
            .post(format!("{}/query", self.url))
            .json(&QueryRequest {
                query: query.to_string(),
                params,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("Failed to query books {}", Self::error_detail(response).await)
        }
        let query_response: QueryResponse = response.json().await?;
        Ok(query_response.results)
    }

    /// Calls GET /books/{upc} endpoint
    /// Returns None if book is not in the catalog
    pub async fn get_book(&self, upc: &str) -> anyhow::Result<Option<StoredBook>> {
        let response = self
            .client
            .get(self.book_url(upc)?)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to get book {}", Self::error_detail(response).await)
        }
    }
}

#[cfg(test)]
mod client_tests {
    use super::*;

    #[test]
    fn test_book_url_encodes_upc() {
        let client = BookstoreCatalogClient::new("http://127.0.0.1:8080").unwrap();
        assert_eq!(
            client.book_url("a897fe39b1053632").unwrap().as_str(),
            "http://127.0.0.1:8080/books/a897fe39b1053632"
        );
        assert_eq!(
            client.book_url("odd/upc?x#y").unwrap().as_str(),
            "http://127.0.0.1:8080/books/odd%2Fupc%3Fx%23y"
        );

        let client = BookstoreCatalogClient::new("http://catalog:8080/api/").unwrap();
        assert_eq!(
            client.book_url("abc").unwrap().as_str(),
            "http://catalog:8080/api/books/abc"
        );
    }

    #[test]
    fn test_only_gateway_errors_are_retried() {
        for status in [
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ] {
            assert!(is_retryable_status(status));
        }
        for status in [
            StatusCode::OK,
            StatusCode::BAD_REQUEST,
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            assert!(!is_retryable_status(status));
        }
    }
}
