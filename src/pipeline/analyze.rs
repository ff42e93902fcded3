use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;

use super::process::MarketRow;

pub const DISTRIBUTION_BUCKETS: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct MarketStats {
    pub generated_at: DateTime<Utc>,
    pub overview: MarketOverview,
    pub health: MarketHealth,
    pub top_by_market_cap: Vec<CoinSummary>,
    pub prices: PriceStatistics,
    pub changes: PriceChanges,
    pub change_distribution: Vec<ChangeBucket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketOverview {
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub avg_price: f64,
    pub median_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketHealth {
    pub positive_performers: usize,
    pub negative_performers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoinSummary {
    pub name: String,
    pub symbol: String,
    pub market_cap: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceStatistics {
    pub average: f64,
    pub median: f64,
    pub highest: f64,
    pub lowest: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Mover {
    pub name: String,
    pub symbol: String,
    pub change_24h: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceChanges {
    pub highest: Mover,
    pub lowest: Mover,
    pub average: f64,
}

/// Half-open range `[lower, upper)` of 24h change percentages; the last bucket
/// also includes its upper bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeBucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[tracing::instrument(
    name = "pipeline_stage analyze",
    skip(rows),
    fields(pipeline.stage = "analyze", rows = rows.len())
)]
pub fn analyze(rows: &[MarketRow], generated_at: DateTime<Utc>) -> Result<MarketStats, AppError> {
    if rows.is_empty() {
        return Err(AppError::EmptySnapshot);
    }

    let prices: Vec<f64> = rows.iter().map(|r| r.price).collect();
    let changes: Vec<f64> = rows.iter().map(|r| r.change_24h).collect();

    let average_price = mean(&prices);
    let median_price = median(&prices);

    let mut by_cap: Vec<&MarketRow> = rows.iter().collect();
    by_cap.sort_by(|a, b| b.market_cap.total_cmp(&a.market_cap));
    let top_by_market_cap = by_cap
        .into_iter()
        .take(5)
        .map(|r| CoinSummary {
            name: r.name.clone(),
            symbol: r.symbol.clone(),
            market_cap: r.market_cap,
            price: r.price,
        })
        .collect();

    // rows is non-empty, so both extremes exist
    let best = rows
        .iter()
        .max_by(|a, b| a.change_24h.total_cmp(&b.change_24h))
        .ok_or(AppError::EmptySnapshot)?;
    let worst = rows
        .iter()
        .min_by(|a, b| a.change_24h.total_cmp(&b.change_24h))
        .ok_or(AppError::EmptySnapshot)?;

    Ok(MarketStats {
        generated_at,
        overview: MarketOverview {
            total_market_cap: rows.iter().map(|r| r.market_cap).sum(),
            total_volume_24h: rows.iter().map(|r| r.volume_24h).sum(),
            avg_price: average_price,
            median_price,
        },
        health: MarketHealth {
            positive_performers: changes.iter().filter(|c| **c > 0.0).count(),
            negative_performers: changes.iter().filter(|c| **c < 0.0).count(),
        },
        top_by_market_cap,
        prices: PriceStatistics {
            average: average_price,
            median: median_price,
            highest: prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            lowest: prices.iter().cloned().fold(f64::INFINITY, f64::min),
        },
        changes: PriceChanges {
            highest: mover(best),
            lowest: mover(worst),
            average: mean(&changes),
        },
        change_distribution: distribution(&changes, DISTRIBUTION_BUCKETS),
    })
}

fn mover(row: &MarketRow) -> Mover {
    Mover {
        name: row.name.clone(),
        symbol: row.symbol.clone(),
        change_24h: row.change_24h,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn distribution(values: &[f64], buckets: usize) -> Vec<ChangeBucket> {
    if values.is_empty() || buckets == 0 {
        return vec![];
    }

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    // Every value identical: one bucket holds them all.
    if max - min <= f64::EPSILON {
        return vec![ChangeBucket {
            lower: min,
            upper: max,
            count: values.len(),
        }];
    }

    let width = (max - min) / buckets as f64;
    let mut counts = vec![0usize; buckets];
    for v in values {
        let idx = (((v - min) / width) as usize).min(buckets - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| ChangeBucket {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            count,
        })
        .collect()
}
