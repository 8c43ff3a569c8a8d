use std::sync::Arc;
use std::time::Duration;

use tracing::info;

mod chat;
mod config;
mod gemini;
mod knowledge;
mod ledger;
mod models;
mod server;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        // It's not fatal if .env doesn't exist, but good to know
        info!("No .env file found or failed to load: {}", e);
    }

    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Yatra backend starting...");

    let settings = config::Settings::from_env()?;

    let knowledge = Arc::new(knowledge::KnowledgeBase::load(&settings.places_file)?);

    info!("Initializing store at {}", settings.database_path);
    let store = store::Store::new(&settings.database_path).await?;
    store.init().await?;

    // One shared client; per-call timeouts are set where the calls are made.
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let gateway = gemini::GeminiClient::new(http.clone(), settings.gemini_api_key.clone())?;
    let chat = chat::ChatRouter::new(knowledge, gateway)?;
    let ledger = ledger::LedgerClient::new(http, settings.ledger_service_url.clone());

    let state = Arc::new(server::AppState { chat, ledger, store });
    let app = server::router(state);

    info!("Listening on {}", settings.bind_addr);
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        res = axum::serve(listener, app) => {
            if let Err(e) = res {
                info!("Server stopped with error: {}", e);
            }
        }
    }

    Ok(())
}
