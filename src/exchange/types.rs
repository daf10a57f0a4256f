//! Binance REST wire types and errors

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Exchange client errors
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Non-success HTTP status
    #[error("{method} {path} failed {status}: {body}")]
    Http {
        method: String,
        path: String,
        status: u16,
        body: String,
    },
    /// Signed request without credentials
    #[error("missing API key/secret for signed request")]
    MissingCredentials,
    /// exchangeInfo returned no symbols
    #[error("no exchangeInfo returned for symbol={0}")]
    UnknownSymbol(String),
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
    #[error("failed to initialize request signer")]
    Signer,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ExchangeError {
    /// HTTP status code, when the exchange answered with one
    pub fn status(&self) -> Option<u16> {
        match self {
            ExchangeError::Http { status, .. } => Some(*status),
            ExchangeError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True for 418 (IP ban) and 429 (rate limit)
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status(), Some(418) | Some(429))
    }
}

/// Parse a number Binance may send as a string, falling back to 0
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value))
}

pub(crate) fn value_to_f64(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(0.0),
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// `GET /v3/ticker/bookTicker`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookTicker {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bid_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bid_qty: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ask_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ask_qty: f64,
}

/// `GET /v3/depth`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthBook {
    #[serde(default)]
    pub last_update_id: Option<u64>,
    #[serde(default)]
    pub bids: Vec<Vec<Value>>,
    #[serde(default)]
    pub asks: Vec<Vec<Value>>,
}

impl DepthBook {
    fn levels(raw: &[Vec<Value>]) -> Vec<(f64, f64)> {
        raw.iter()
            .map(|level| {
                let px = level.first().map(value_to_f64).unwrap_or(0.0);
                let qty = level.get(1).map(value_to_f64).unwrap_or(0.0);
                (px, qty)
            })
            .collect()
    }

    /// Bid levels as `(price, qty)`
    pub fn bid_levels(&self) -> Vec<(f64, f64)> {
        Self::levels(&self.bids)
    }

    /// Ask levels as `(price, qty)`
    pub fn ask_levels(&self) -> Vec<(f64, f64)> {
        Self::levels(&self.asks)
    }
}

/// `GET /v3/exchangeInfo`
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    #[serde(default)]
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub base_asset: Option<String>,
    #[serde(default)]
    pub quote_asset: Option<String>,
    #[serde(default)]
    pub filters: Vec<Value>,
}

/// `GET /v3/account`
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub balances: Vec<AssetBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub free: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub locked: f64,
}

/// `POST /v3/order` full response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(default)]
    pub order_id: Option<Value>,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub executed_qty: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cummulative_quote_qty: f64,
    #[serde(default)]
    pub fills: Vec<OrderFill>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderFill {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub qty: f64,
}

/// Entry of `GET /v3/openOrders`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    #[serde(default)]
    pub order_id: Option<u64>,
}
