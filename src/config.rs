use anyhow::{Context, Result};

/// Runtime configuration, read once at startup from the environment
/// (a `.env` file is loaded beforehand in `main` if present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: String,
    pub gemini_api_key: String,
    pub ledger_service_url: String,
    pub places_file: String,
    pub bind_addr: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let gemini_api_key =
            std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY not set")?;

        Ok(Self {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "yatra.db".into()),
            gemini_api_key,
            ledger_service_url: std::env::var("LEDGER_SERVICE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8001".into()),
            places_file: std::env::var("PLACES_FILE").unwrap_or_else(|_| "places.json".into()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into()),
        })
    }
}
