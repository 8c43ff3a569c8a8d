use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::SaleReceipt;

const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure taxonomy for calls into the ledger service. `NotFound` is the
/// outcome of a successful scan with no match, distinct from the transport
/// and protocol failures around it.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("the ledger service is unavailable: {0}")]
    Unavailable(#[source] reqwest::Error),
    #[error("ledger service returned {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },
    #[error("ledger service returned a non-JSON body")]
    BadBody(#[source] serde_json::Error),
    #[error("ledger service response was not a list of sales")]
    InvalidFormat,
    #[error("transaction id not found for the given product")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// One-shot HTTP proxy to the ledger microservice. No retries, no circuit
/// breaking; each call stands alone with its own timeout.
pub struct LedgerClient {
    http: Client,
    base_url: String,
}

impl LedgerClient {
    pub fn new(http: Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Forward a purchase to the ledger's recording endpoint. Both fields go
    /// over the wire stringified (the ledger's contract); the receipt comes
    /// back verbatim. Transport failures are `Unavailable`; everything else,
    /// including a non-2xx status, is `Internal`.
    pub async fn forward(&self, product_id: i64, price: f64) -> Result<SaleReceipt, LedgerError> {
        info!(product_id, "Forwarding transaction to the ledger service");

        let payload = serde_json::json!({
            "product_id": product_id.to_string(),
            "price": price.to_string(),
        });

        let response = self
            .http
            .post(format!("{}/record-transaction-on-chain", self.base_url))
            .json(&payload)
            .timeout(FORWARD_TIMEOUT)
            .send()
            .await
            .map_err(LedgerError::Unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "Ledger service rejected the transaction");
            return Err(LedgerError::Internal(anyhow::anyhow!(
                "ledger service returned {status}"
            )));
        }

        response
            .json::<SaleReceipt>()
            .await
            .map_err(|e| LedgerError::Internal(e.into()))
    }

    /// Look up a transaction in the ledger's per-product sales list: fetch,
    /// require an array, scan in order for an exact `txID` match.
    pub async fn verify(&self, product_id: &str, tx_id: &str) -> Result<SaleReceipt, LedgerError> {
        let url = format!("{}/query/sales/{}", self.base_url, product_id);
        info!(product_id, tx_id, %url, "Verifying transaction against the ledger service");

        let response = self
            .http
            .get(&url)
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await
            .map_err(LedgerError::Unavailable)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LedgerError::Internal(e.into()))?;

        debug!(%status, %body, "Ledger service responded");

        if !status.is_success() {
            error!(%status, %body, "Ledger service returned an error");
            return Err(LedgerError::UpstreamStatus { status, body });
        }

        let sales: Value = serde_json::from_str(&body).map_err(LedgerError::BadBody)?;
        let Some(sales) = sales.as_array() else {
            error!("Ledger service response is not a list");
            return Err(LedgerError::InvalidFormat);
        };

        info!(records = sales.len(), "Scanning sales for the transaction id");
        for sale in sales {
            if sale.get("txID").and_then(Value::as_str) == Some(tx_id) {
                return serde_json::from_value(sale.clone())
                    .map_err(|e| LedgerError::Internal(e.into()));
            }
        }

        warn!(tx_id, "Transaction id not found for this product");
        Err(LedgerError::NotFound)
    }
}
