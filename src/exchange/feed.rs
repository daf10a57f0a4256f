//! REST-polled market data source

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use super::types::{value_to_f64, AccountInfo, BookTicker, DepthBook, ExchangeInfo};
use super::{BinanceClient, ExchangeError};
use crate::config::MarketConfig;
use crate::market::{depth_qty_sums, Balances, MarketDataSource, MarketSnapshot, SymbolFilters};

/// Extract trading filters for `symbol` from an exchangeInfo response.
///
/// MARKET_LOT_SIZE is preferred; any non-positive value falls back to
/// LOT_SIZE. The notional floor comes from MIN_NOTIONAL or NOTIONAL.
pub fn parse_filters(info: &ExchangeInfo, symbol: &str) -> Result<SymbolFilters, ExchangeError> {
    let symbol_info = info
        .symbols
        .first()
        .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))?;

    let find = |kind: &str| -> Option<&Value> {
        symbol_info
            .filters
            .iter()
            .find(|f| f.get("filterType").and_then(Value::as_str) == Some(kind))
    };
    let field = |filter: Option<&Value>, key: &str| -> f64 {
        filter.and_then(|f| f.get(key)).map(value_to_f64).unwrap_or(0.0)
    };

    let market_lot = find("MARKET_LOT_SIZE");
    let lot = find("LOT_SIZE");
    let notional = find("MIN_NOTIONAL").or_else(|| find("NOTIONAL"));

    let min_notional = match notional.and_then(|f| f.get("minNotional")) {
        Some(v) => value_to_f64(v),
        None => field(notional, "notional"),
    };

    let with_fallback = |key: &str| {
        let value = field(market_lot, key);
        if value <= 0.0 {
            field(lot, key)
        } else {
            value
        }
    };

    Ok(SymbolFilters {
        symbol: symbol_info.symbol.clone(),
        base_asset: symbol_info
            .base_asset
            .clone()
            .unwrap_or_else(|| "BTC".to_string()),
        quote_asset: symbol_info
            .quote_asset
            .clone()
            .unwrap_or_else(|| "USDT".to_string()),
        min_qty: with_fallback("minQty"),
        max_qty: with_fallback("maxQty"),
        step_size: with_fallback("stepSize"),
        min_notional,
    })
}

/// Total (free + locked) balances of the symbol's assets
pub fn parse_balances(account: &AccountInfo, filters: &SymbolFilters) -> Balances {
    let mut balances = Balances::default();
    for item in &account.balances {
        let total = item.free + item.locked;
        if item.asset == filters.base_asset {
            balances.base = total;
        }
        if item.asset == filters.quote_asset {
            balances.quote = total;
        }
    }
    balances
}

/// Market data source polling Binance REST endpoints
pub struct BinanceRestFeed {
    client: Arc<BinanceClient>,
    symbol: String,
    market: MarketConfig,
    fixed_balances: Option<Balances>,
}

impl BinanceRestFeed {
    /// Create a new feed for `symbol`
    pub fn new(client: Arc<BinanceClient>, symbol: impl Into<String>, market: MarketConfig) -> Self {
        Self {
            client,
            symbol: symbol.into(),
            market,
            fixed_balances: None,
        }
    }

    /// Report `balances` instead of querying the signed account endpoint
    pub fn with_fixed_balances(mut self, balances: Balances) -> Self {
        self.fixed_balances = Some(balances);
        self
    }

    fn symbol_param(&self) -> Vec<(&'static str, String)> {
        vec![("symbol", self.symbol.clone())]
    }
}

#[async_trait]
impl MarketDataSource for BinanceRestFeed {
    async fn filters(&self) -> anyhow::Result<SymbolFilters> {
        let info: ExchangeInfo = self
            .client
            .get("/v3/exchangeInfo", &self.symbol_param(), false)
            .await?;
        Ok(parse_filters(&info, &self.symbol)?)
    }

    async fn snapshot(&self) -> anyhow::Result<MarketSnapshot> {
        let ticker: BookTicker = self
            .client
            .get("/v3/ticker/bookTicker", &self.symbol_param(), false)
            .await?;
        let snapshot = MarketSnapshot::new(
            Utc::now(),
            ticker.bid_price,
            ticker.ask_price,
            ticker.bid_qty,
            ticker.ask_qty,
        );
        if !self.market.use_depth {
            return Ok(snapshot);
        }

        let levels = self.market.depth_levels;
        let mut params = self.symbol_param();
        params.push(("limit", levels.to_string()));
        let depth: DepthBook = self.client.get("/v3/depth", &params, false).await?;
        let (bid_qty, ask_qty) = depth_qty_sums(&depth.bid_levels(), &depth.ask_levels(), levels);
        tracing::trace!(levels, bid_qty, ask_qty, "Depth sums");
        Ok(snapshot.with_depth(bid_qty, ask_qty, depth.last_update_id))
    }

    async fn balances(&self, filters: &SymbolFilters) -> anyhow::Result<Balances> {
        if let Some(balances) = self.fixed_balances {
            return Ok(balances);
        }
        let account: AccountInfo = self.client.get("/v3/account", &[], true).await?;
        Ok(parse_balances(&account, filters))
    }
}
