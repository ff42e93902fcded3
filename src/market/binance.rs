use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;

use super::{MarketRecord, MarketSource, Snapshot};
use crate::config::Config;
use crate::error::AppError;

/// 24h rolling ticker as returned by `/api/v3/ticker/24hr`. Binance encodes
/// every numeric field as a string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    last_price: String,
    volume: String,
    quote_volume: String,
    price_change_percent: String,
    weighted_avg_price: String,
}

#[derive(Debug, Deserialize)]
struct CoinListing {
    symbol: String,
    name: String,
}

pub struct BinanceSource {
    client: reqwest::Client,
    market_data_url: String,
    coin_names_url: String,
    quote_asset: String,
    top_n: usize,
}

impl BinanceSource {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("crypto-market-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            market_data_url: config.market_data_url.trim_end_matches('/').to_string(),
            coin_names_url: config.coin_names_url.trim_end_matches('/').to_string(),
            quote_asset: config.quote_asset.clone(),
            top_n: config.top_n,
        })
    }

    #[tracing::instrument(name = "market tickers", skip(self), fields(tickers.received))]
    async fn fetch_tickers(&self) -> Result<Vec<Ticker24h>, AppError> {
        let url = format!("{}/api/v3/ticker/24hr", self.market_data_url);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("{url} returned {status}")));
        }

        let tickers: Vec<Ticker24h> = resp.json().await?;
        tracing::Span::current().record("tickers.received", tickers.len());
        Ok(tickers)
    }

    /// Display names are cosmetic, so any failure degrades to an empty map and
    /// the caller falls back to the bare symbol.
    #[tracing::instrument(name = "market coin_names", skip(self))]
    async fn fetch_coin_names(&self) -> HashMap<String, String> {
        let url = format!("{}/coins/list", self.coin_names_url);

        let result = async {
            let resp = self.client.get(&url).send().await?;
            let resp = resp.error_for_status()?;
            resp.json::<Vec<CoinListing>>().await
        }
        .await;

        match result {
            Ok(listings) => coin_name_map(listings),
            Err(e) => {
                tracing::warn!(error = %e, url = %url, "Couldn't fetch coin names, using symbols");
                HashMap::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl MarketSource for BinanceSource {
    #[tracing::instrument(
        name = "market fetch_snapshot",
        skip(self),
        fields(snapshot.records, snapshot.skipped)
    )]
    async fn fetch_snapshot(&self) -> Result<Snapshot, AppError> {
        let tickers = self.fetch_tickers().await?;
        let names = self.fetch_coin_names().await;

        let (records, skipped) = build_records(tickers, &self.quote_asset, &names, self.top_n);

        let span = tracing::Span::current();
        span.record("snapshot.records", records.len());
        span.record("snapshot.skipped", skipped);

        if skipped > 0 {
            tracing::warn!(skipped, "Dropped tickers with unparseable numeric fields");
        }

        if records.is_empty() {
            return Err(AppError::EmptySnapshot);
        }

        Ok(Snapshot {
            taken_at: Utc::now(),
            records,
        })
    }

    fn name(&self) -> &str {
        "binance"
    }
}

/// Later listings win when several coins share a symbol.
fn coin_name_map(listings: Vec<CoinListing>) -> HashMap<String, String> {
    listings
        .into_iter()
        .map(|c| (c.symbol.to_uppercase(), c.name))
        .collect()
}

/// Filters tickers to the quote asset, parses them and keeps the `top_n` most
/// traded by quote volume. Returns the records and the number of matching
/// tickers that were dropped because a numeric field did not parse.
fn build_records(
    tickers: Vec<Ticker24h>,
    quote_asset: &str,
    names: &HashMap<String, String>,
    top_n: usize,
) -> (Vec<MarketRecord>, usize) {
    let mut skipped = 0;
    let mut records: Vec<MarketRecord> = tickers
        .into_iter()
        .filter_map(|t| {
            let base = t.symbol.strip_suffix(quote_asset)?.to_uppercase();
            if base.is_empty() {
                return None;
            }
            let record = parse_ticker(&t, base, names);
            if record.is_none() {
                skipped += 1;
            }
            record
        })
        .collect();

    records.sort_by(|a, b| b.quote_volume.total_cmp(&a.quote_volume));
    records.truncate(top_n);

    (records, skipped)
}

fn parse_ticker(
    ticker: &Ticker24h,
    symbol: String,
    names: &HashMap<String, String>,
) -> Option<MarketRecord> {
    let num = |raw: &str| raw.trim().parse::<f64>().ok().filter(|v| v.is_finite());

    Some(MarketRecord {
        name: names.get(&symbol).cloned().unwrap_or_else(|| symbol.clone()),
        last_price: num(&ticker.last_price)?,
        volume: num(&ticker.volume)?,
        quote_volume: num(&ticker.quote_volume)?,
        price_change_percent: num(&ticker.price_change_percent)?,
        weighted_avg_price: num(&ticker.weighted_avg_price)?,
        symbol,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKERS: &str = r#"[
        {"symbol": "BTCUSDT", "lastPrice": "50000.00", "volume": "1200.5", "quoteVolume": "60025000.0", "priceChangePercent": "2.150", "weightedAvgPrice": "49800.10", "count": 1000},
        {"symbol": "ETHUSDT", "lastPrice": "3000.00", "volume": "9000", "quoteVolume": "27000000", "priceChangePercent": "-1.500", "weightedAvgPrice": "3010.5"},
        {"symbol": "ETHBTC", "lastPrice": "0.06", "volume": "500", "quoteVolume": "30", "priceChangePercent": "0.1", "weightedAvgPrice": "0.06"},
        {"symbol": "DOGEUSDT", "lastPrice": "0.12", "volume": "1000000", "quoteVolume": "120000", "priceChangePercent": "5.0", "weightedAvgPrice": "0.118"},
        {"symbol": "BADUSDT", "lastPrice": "n/a", "volume": "1", "quoteVolume": "1", "priceChangePercent": "0", "weightedAvgPrice": "1"},
        {"symbol": "USDT", "lastPrice": "1", "volume": "1", "quoteVolume": "1", "priceChangePercent": "0", "weightedAvgPrice": "1"}
    ]"#;

    fn tickers() -> Vec<Ticker24h> {
        serde_json::from_str(TICKERS).unwrap()
    }

    fn names() -> HashMap<String, String> {
        coin_name_map(vec![
            CoinListing {
                symbol: "btc".into(),
                name: "Bitcoin".into(),
            },
            CoinListing {
                symbol: "eth".into(),
                name: "Ethereum".into(),
            },
        ])
    }

    #[test]
    fn test_build_records_filters_quote_asset_and_sorts() {
        let (records, skipped) = build_records(tickers(), "USDT", &names(), 50);

        let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "DOGE"]);
        assert_eq!(skipped, 1);

        assert_eq!(records[0].name, "Bitcoin");
        assert_eq!(records[0].last_price, 50000.0);
        assert_eq!(records[1].price_change_percent, -1.5);
    }

    #[test]
    fn test_missing_name_falls_back_to_symbol() {
        let (records, _) = build_records(tickers(), "USDT", &names(), 50);
        let doge = records.iter().find(|r| r.symbol == "DOGE").unwrap();
        assert_eq!(doge.name, "DOGE");
    }

    #[test]
    fn test_top_n_keeps_highest_quote_volume() {
        let (records, _) = build_records(tickers(), "USDT", &HashMap::new(), 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol, "BTC");
        assert_eq!(records[1].symbol, "ETH");
    }

    #[test]
    fn test_other_quote_asset() {
        let (records, skipped) = build_records(tickers(), "BTC", &HashMap::new(), 50);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "ETH");
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_coin_name_map_uppercases_symbols() {
        let map = names();
        assert_eq!(map.get("BTC").map(String::as_str), Some("Bitcoin"));
        assert!(map.get("btc").is_none());
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let json = r#"[{"symbol": "XUSDT", "lastPrice": "NaN", "volume": "1", "quoteVolume": "1", "priceChangePercent": "0", "weightedAvgPrice": "1"}]"#;
        let tickers: Vec<Ticker24h> = serde_json::from_str(json).unwrap();
        let (records, skipped) = build_records(tickers, "USDT", &HashMap::new(), 50);
        assert!(records.is_empty());
        assert_eq!(skipped, 1);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_fetch_error() {
        let config = Config::from_lookup(|key| match key {
            "MARKET_DATA_URL" => Some("http://127.0.0.1:9".to_string()),
            "COIN_NAMES_URL" => Some("http://127.0.0.1:9".to_string()),
            "HTTP_TIMEOUT_SECS" => Some("2".to_string()),
            _ => None,
        })
        .unwrap();
        let source = BinanceSource::new(&config).unwrap();

        let err = source.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(_)));
    }
}
