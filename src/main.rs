//! askdb - Main entry point.
//!
//! Serves the natural-language query API over HTTP.

use askdb::config::Config;
use askdb::db::{ConnectionManager, QueryExecutor};
use askdb::handlers::AppState;
use askdb::llm::ChatCompletionTranslator;
use askdb::service::QueryService;
use askdb::transport::HttpTransport;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    let config = Config::parse();
    init_tracing(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    info!("Starting askdb v{}", env!("CARGO_PKG_VERSION"));

    let llm_settings = config.llm_settings()?;
    info!(
        base_url = %llm_settings.base_url,
        model = %llm_settings.model,
        temperature = llm_settings.temperature,
        "Using language model"
    );
    let translator = ChatCompletionTranslator::new(llm_settings)?;

    let connections = ConnectionManager::new(config.pool_settings());
    let executor = QueryExecutor::with_limits(config.query_timeout, config.max_rows);
    let service = QueryService::new(connections, Arc::new(translator), executor)
        .with_allow_writes(config.allow_writes);

    if config.allow_writes {
        info!("Read-only guard disabled (--allow-writes)");
    }

    let state = AppState::new(service).with_schema_dump(config.schema_dump.clone());
    let transport = HttpTransport::new(
        state,
        &config.http_host,
        config.http_port,
        config.normalized_api_prefix(),
    );

    if let Err(e) = transport.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
