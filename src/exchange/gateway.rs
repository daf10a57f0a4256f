//! Live market-order gateway

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use super::types::{OpenOrder, OrderResponse};
use super::BinanceClient;
use crate::execution::{ActionTaken, OrderGateway, OrderResult};
use crate::risk::TradeDecision;
use crate::signal::Signal;

/// Format an order quantity with at most 8 decimals, trailing zeros trimmed
pub fn format_qty(value: f64) -> String {
    let fixed = format!("{:.8}", value);
    match Decimal::from_str(&fixed) {
        Ok(d) => d.normalize().to_string(),
        Err(_) => fixed,
    }
}

/// Quantity-weighted fill price, falling back to cumulative quote / executed qty
pub fn avg_fill_price(order: &OrderResponse) -> f64 {
    let (total_qty, total_quote) = order
        .fills
        .iter()
        .fold((0.0, 0.0), |(q, n), fill| (q + fill.qty, n + fill.qty * fill.price));
    if total_qty > 0.0 {
        return total_quote / total_qty;
    }
    if order.executed_qty > 0.0 {
        return order.cummulative_quote_qty / order.executed_qty;
    }
    0.0
}

fn order_id_string(id: &Option<Value>) -> String {
    match id {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Convert an exchange order response into an order result
pub fn order_result(side: Signal, order: &OrderResponse) -> OrderResult {
    OrderResult {
        action: ActionTaken::Live(side),
        approved: true,
        order_id: order_id_string(&order.order_id),
        status: order.status.clone(),
        executed_qty: order.executed_qty,
        cummulative_quote_qty: order.cummulative_quote_qty,
        avg_fill_px: avg_fill_price(order),
        placed: true,
        filled: order.status == "FILLED",
        ..Default::default()
    }
}

/// Gateway placing MARKET orders on Binance spot
pub struct BinanceOrderGateway {
    client: Arc<BinanceClient>,
    symbol: String,
}

impl BinanceOrderGateway {
    /// Create a new gateway for `symbol`
    pub fn new(client: Arc<BinanceClient>, symbol: impl Into<String>) -> Self {
        Self {
            client,
            symbol: symbol.into(),
        }
    }

    /// Request parameters for an approved decision
    pub fn order_params(&self, decision: &TradeDecision) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", self.symbol.clone()),
            ("side", decision.side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("newClientOrderId", Uuid::new_v4().to_string()),
            ("newOrderRespType", "FULL".to_string()),
        ];
        match decision.side {
            Signal::Buy => params.push(("quoteOrderQty", format_qty(decision.quote_order_qty))),
            _ => params.push(("quantity", format_qty(decision.quantity))),
        }
        params
    }
}

#[async_trait]
impl OrderGateway for BinanceOrderGateway {
    async fn execute(&self, decision: &TradeDecision) -> anyhow::Result<OrderResult> {
        if let Some(result) = OrderResult::preflight(decision) {
            return Ok(result);
        }

        let params = self.order_params(decision);
        let order: OrderResponse = self.client.post("/v3/order", &params, true).await?;
        let result = order_result(decision.side, &order);
        tracing::info!(
            side = %decision.side,
            order_id = %result.order_id,
            status = %result.status,
            executed_qty = result.executed_qty,
            avg_fill_px = result.avg_fill_px,
            "Market order placed"
        );
        Ok(result)
    }

    async fn cancel_all(&self) -> anyhow::Result<usize> {
        let symbol = vec![("symbol", self.symbol.clone())];
        let open: Vec<OpenOrder> = self.client.get("/v3/openOrders", &symbol, true).await?;

        let mut canceled = 0;
        for order in open {
            let Some(order_id) = order.order_id else {
                continue;
            };
            let params = vec![
                ("symbol", self.symbol.clone()),
                ("orderId", order_id.to_string()),
            ];
            match self.client.delete::<Value>("/v3/order", &params, true).await {
                Ok(_) => canceled += 1,
                Err(e) => tracing::warn!(order_id, error = %e, "Failed to cancel order"),
            }
        }
        Ok(canceled)
    }
}
