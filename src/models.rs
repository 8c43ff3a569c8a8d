use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Defaults to "default" when the client sends nothing.
    pub user_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    #[serde(rename = "productId")]
    pub product_id: i64,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct ActivityLogRequest {
    /// Defaults to "guest" when the client sends nothing.
    pub user_id: Option<String>,
    pub action: String,
}

/// Receipt minted by the ledger service. Every field arrives stringified on
/// the wire (including productID and price); we relay it without reshaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReceipt {
    #[serde(rename = "productID")]
    pub product_id: String,
    pub price: String,
    pub timestamp: String,
    #[serde(rename = "txID")]
    pub tx_id: String,
}

/// Catalog entry owned by the store; read-only from this service.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price: f64,
    pub artisan_name: String,
}
