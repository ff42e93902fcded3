//! Market snapshot types and the source abstraction the tracker fetches from.

pub mod binance;

use chrono::{DateTime, Utc};

use crate::error::AppError;

pub use binance::BinanceSource;

/// One fetched set of market data points at a point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub records: Vec<MarketRecord>,
}

/// A single traded asset within a snapshot, quoted against the configured
/// quote asset.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketRecord {
    pub symbol: String,
    pub name: String,
    pub last_price: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub price_change_percent: f64,
    pub weighted_avg_price: f64,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Snapshot, AppError>;
    fn name(&self) -> &str;
}
