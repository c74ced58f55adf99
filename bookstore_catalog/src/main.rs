use std::sync::Arc;

use actix_web::web::Data;
use actix_web::{App, HttpServer};
use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::runtime::TokioCurrentThread;
use tracing_actix_web::TracingLogger;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use bookstore_catalog::app_config::config_app;
use bookstore_catalog::books_repository::{
    BooksRepository, InMemoryBooksRepository, PostgresBooksRepository, PostgresConnector,
};
use bookstore_catalog::settings::Settings;

// Based on https://github.com/LukeMathWalker/tracing-actix-web/blob/main/examples/opentelemetry/src/main.rs#L15
fn init_telemetry() {
    let app_name = "bookstore_catalog";

    // Start a new Jaeger trace pipeline.
    // Spans are exported in batch - recommended setup for a production application.
    global::set_text_map_propagator(TraceContextPropagator::new());
    #[allow(deprecated)]
    let tracer = opentelemetry_jaeger::new_agent_pipeline()
        .with_service_name(app_name)
        .install_batch(TokioCurrentThread)
        .expect("Failed to install OpenTelemetry tracer.");

    // Filter based on level - trace, debug, info, warn, error
    // Tunable via `RUST_LOG` env variable
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info"));
    // Create a `tracing` layer using the Jaeger tracer
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);
    // Create a `tracing` layer to emit spans as structured logs to stdout
    let formatting_layer = BunyanFormattingLayer::new(app_name.into(), std::io::stdout);
    // Combined them all together in a `tracing` subscriber
    let subscriber = Registry::default()
        .with(env_filter)
        .with(telemetry)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to install `tracing` subscriber.")
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry();

    let settings = Settings::from_env()?;
    let books_table = settings.books_table()?;

    let books_repository: Arc<dyn BooksRepository> = if settings.use_in_memory_db {
        tracing::warn!("Using in memory books repository, data is lost on restart");
        Arc::new(InMemoryBooksRepository::default())
    } else {
        let connector = PostgresConnector::new(&settings.connection_config());
        Arc::new(PostgresBooksRepository::init(connector, books_table).await?)
    };

    tracing::info!(
        "starting HTTP server at http://0.0.0.0:{}",
        settings.listen_port
    );
    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(books_repository.clone()))
            .wrap(TracingLogger::default())
            .configure(config_app)
    })
    .bind(("0.0.0.0", settings.listen_port))?
    .run()
    .await?;

    global::shutdown_tracer_provider();
    Ok(())
}
