//! Exchange connectivity module
//!
//! Binance spot REST client, the polled market data source, and the live
//! order gateway

mod client;
mod feed;
mod gateway;
mod types;

pub use client::{sign, BinanceClient, Credentials, API_KEY_ENV, API_SECRET_ENV};
pub use feed::{parse_balances, parse_filters, BinanceRestFeed};
pub use gateway::{avg_fill_price, format_qty, order_result, BinanceOrderGateway};
pub use types::{
    AccountInfo, AssetBalance, BookTicker, DepthBook, ExchangeError, ExchangeInfo, OpenOrder,
    OrderFill, OrderResponse, SymbolInfo,
};

/// HTTP status of an exchange failure anywhere in the error chain
pub fn http_status(err: &anyhow::Error) -> Option<u16> {
    err.chain()
        .find_map(|e| e.downcast_ref::<ExchangeError>())
        .and_then(ExchangeError::status)
}
