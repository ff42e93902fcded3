use serde::Serialize;

use crate::market::Snapshot;

/// One line of the market table shared by both artifacts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketRow {
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub change_24h: f64,
    pub avg_price: f64,
    #[serde(skip)]
    quote_volume: f64,
}

pub const COLUMNS: [&str; 7] = [
    "Name",
    "Symbol",
    "Price",
    "Market Cap",
    "Volume (24h)",
    "Change (24h)",
    "Avg Price",
];

/// Turns a snapshot into table rows ordered by quote volume, most traded
/// first. Every record yields exactly one row.
#[tracing::instrument(
    name = "pipeline_stage process",
    skip(snapshot),
    fields(pipeline.stage = "process", rows = snapshot.records.len())
)]
pub fn process(snapshot: &Snapshot) -> Vec<MarketRow> {
    let mut rows: Vec<MarketRow> = snapshot
        .records
        .iter()
        .map(|r| MarketRow {
            name: r.name.clone(),
            symbol: r.symbol.clone(),
            price: r.last_price,
            // Price times base volume, the same approximation the report has
            // always labelled "Market Cap".
            market_cap: r.last_price * r.volume,
            volume_24h: r.volume,
            change_24h: r.price_change_percent,
            avg_price: r.weighted_avg_price,
            quote_volume: r.quote_volume,
        })
        .collect();

    rows.sort_by(|a, b| b.quote_volume.total_cmp(&a.quote_volume));
    rows
}
