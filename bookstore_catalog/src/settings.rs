use anyhow::Context;
use serde::Deserialize;

use crate::books_repository::{BooksTable, PostgresConnectionConfig};

/// Process configuration, read once from the environment at startup
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub table_name: String,
    #[serde(default)]
    pub use_in_memory_db: bool,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_listen_port() -> u16 {
    8080
}

impl Settings {
    /// Loads settings from process environment (DB_HOST, DB_PORT, ...)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_source(config::Environment::default())
    }

    pub fn from_source(environment: config::Environment) -> anyhow::Result<Self> {
        let settings: Settings = config::Config::builder()
            .add_source(environment)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid or missing configuration")?;
        // fail at startup rather than on the first request
        settings.books_table()?;
        Ok(settings)
    }

    pub fn books_table(&self) -> anyhow::Result<BooksTable> {
        BooksTable::new(&self.table_name).context("Invalid TABLE_NAME")
    }

    pub fn connection_config(&self) -> PostgresConnectionConfig {
        PostgresConnectionConfig {
            hostname: self.db_host.clone(),
            port: self.db_port,
            username: self.db_user.clone(),
            password: self.db_password.clone(),
            database: self.db_name.clone(),
        }
    }
}
