use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};

use crate::books_repository::BooksRepositoryError;

/// Coordinates of the postgres server, built once from [`crate::settings::Settings`]
#[derive(Debug, Clone)]
pub struct PostgresConnectionConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

/// Opens one session per logical operation
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    config: tokio_postgres::Config,
}

impl PostgresConnector {
    pub fn new(config: &PostgresConnectionConfig) -> Self {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.hostname)
            .port(config.port)
            .user(&config.username)
            .password(&config.password)
            .dbname(&config.database)
            .application_name("bookstore_catalog");
        tracing::info!(
            "Postgres connection: {}@{}:{}/{}",
            config.username,
            config.hostname,
            config.port,
            config.database
        );
        Self { config: pg_config }
    }

    /// Establishes a new session, no retries are attempted.
    pub async fn acquire(&self) -> Result<Connection, BooksRepositoryError> {
        let (client, connection) = self.config.connect(NoTls).await.map_err(|err| {
            tracing::error!("Failed to connect to database: {}", err);
            BooksRepositoryError::ConnectionFailure(err)
        })?;

        let connection_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("connection error: {}", e);
            }
        });
        tracing::debug!("Database connection established");

        Ok(Connection {
            client,
            connection_task,
        })
    }
}

/// Single database session, owned by exactly one operation.
/// Call [`Connection::release`] when done; dropping it also closes the session
/// but without waiting for the teardown to finish.
pub struct Connection {
    client: Client,
    connection_task: JoinHandle<()>,
}

impl Connection {
    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }

    /// Closes the client (and with it every prepared statement) and then waits
    /// for the session task to finish. Teardown errors are only logged.
    pub async fn release(self) {
        let Connection {
            client,
            connection_task,
        } = self;
        tracing::debug!("Closing client");
        drop(client);
        tracing::debug!("Closing connection");
        if let Err(err) = connection_task.await {
            tracing::warn!("Connection task did not shut down cleanly: {}", err);
        }
        tracing::debug!("Database connection closed");
    }
}
