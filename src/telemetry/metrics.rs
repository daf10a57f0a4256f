//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;

/// Gauge metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeMetric {
    /// Paper ledger equity
    PaperEquity,
    /// Paper ledger P&L against initial equity
    PaperPnl,
    /// Paper ledger max drawdown
    MaxDrawdown,
    /// Exchange-balance P&L proxy
    PnlProxy,
    /// Threshold in effect
    Threshold,
    /// Latest imbalance reading
    Imbalance,
    /// Base asset position
    PositionBase,
    /// Consecutive poll errors
    ConsecutiveErrors,
}

impl GaugeMetric {
    /// Exported metric name
    pub fn name(&self) -> &'static str {
        match self {
            GaugeMetric::PaperEquity => "imbalance_paper_equity",
            GaugeMetric::PaperPnl => "imbalance_paper_pnl",
            GaugeMetric::MaxDrawdown => "imbalance_paper_max_drawdown",
            GaugeMetric::PnlProxy => "imbalance_pnl_proxy",
            GaugeMetric::Threshold => "imbalance_threshold",
            GaugeMetric::Imbalance => "imbalance_ratio",
            GaugeMetric::PositionBase => "imbalance_position_base",
            GaugeMetric::ConsecutiveErrors => "imbalance_consecutive_errors",
        }
    }
}

/// Counter metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMetric {
    /// Polls processed
    Polls,
    /// Orders that reached the exchange
    OrdersPlaced,
    /// Orders reported filled
    OrdersFilled,
    /// Poll or execution errors
    Errors,
    /// Approved decisions
    Approved,
    /// Simulated paper fills
    PaperTrades,
}

impl CounterMetric {
    /// Exported metric name
    pub fn name(&self) -> &'static str {
        match self {
            CounterMetric::Polls => "imbalance_polls_total",
            CounterMetric::OrdersPlaced => "imbalance_orders_placed_total",
            CounterMetric::OrdersFilled => "imbalance_orders_filled_total",
            CounterMetric::Errors => "imbalance_errors_total",
            CounterMetric::Approved => "imbalance_decisions_approved_total",
            CounterMetric::PaperTrades => "imbalance_paper_trades_total",
        }
    }
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    metrics::counter!(metric.name()).increment(1);
}

/// Count a rejected decision by reason code
pub fn record_rejection(reason: &'static str) {
    metrics::counter!("imbalance_decisions_rejected_total", "reason" => reason).increment(1);
}

/// Start the Prometheus exporter on `port`
pub fn install_prometheus(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;
    tracing::info!(port, "Prometheus exporter listening");
    Ok(())
}
