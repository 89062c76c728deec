use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use tracing::debug;

use common::{Candle, CandleSeries, Error, MarketDataGateway, Result, WatchKey};

const BASE_URL: &str = "https://api.gateio.ws/api/v4";

/// A single fetch must never stall the whole scheduler; past this the key
/// is skipped for the tick.
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// How many recent candles back the freshest-price read.
const PRICE_READ_LIMIT: usize = 5;

/// REST client for the Gate.io spot candlesticks endpoint.
pub struct GateClient {
    http: Client,
}

impl GateClient {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .use_rustls_tls()
                .timeout(FETCH_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

impl Default for GateClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataGateway for GateClient {
    async fn candles(&self, key: &WatchKey, limit: usize) -> Result<CandleSeries> {
        let url = format!("{BASE_URL}/spot/candlesticks");
        debug!(key = %key, limit, "Fetching candles from Gate.io");

        let limit_param = limit.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("currency_pair", key.pair.as_str()),
                ("interval", key.timeframe.as_str()),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::MarketData(format!("HTTP {status}: {body}")));
        }

        let rows: Vec<Vec<String>> = serde_json::from_str(&body)
            .map_err(|e| Error::MarketData(format!("malformed candle payload: {e}")))?;
        parse_candles(rows)
    }

    async fn last_price(&self, key: &WatchKey) -> Result<f64> {
        let series = self.candles(key, PRICE_READ_LIMIT).await?;
        series
            .latest()
            .map(|c| c.close)
            .ok_or_else(|| Error::MarketData(format!("empty candle feed for {key}")))
    }
}

// ─── Gate.io candlestick row parsing ─────────────────────────────────────────
//
// Rows are arrays of strings:
//   [timestamp, quote_volume, close, high, low, open, base_volume?, closed?]
// The trailing "true"/"false" flag marks window close on newer API revisions;
// when absent, the newest row is the in-progress window.

fn parse_candles(rows: Vec<Vec<String>>) -> Result<CandleSeries> {
    let total = rows.len();
    let mut candles = Vec::with_capacity(total);

    for (i, row) in rows.iter().enumerate() {
        if row.len() < 6 {
            return Err(Error::MarketData(format!(
                "candle row has {} fields, expected at least 6",
                row.len()
            )));
        }
        let ts: i64 = row[0]
            .parse()
            .map_err(|_| Error::MarketData(format!("bad candle timestamp '{}'", row[0])))?;
        let open_time = Utc
            .timestamp_opt(ts, 0)
            .single()
            .ok_or_else(|| Error::MarketData(format!("bad candle timestamp '{}'", row[0])))?;

        let closed = match row.get(7) {
            Some(flag) => flag == "true",
            None => i + 1 < total,
        };

        candles.push(Candle {
            open_time,
            volume: numeric(&row[1])?,
            close: numeric(&row[2])?,
            high: numeric(&row[3])?,
            low: numeric(&row[4])?,
            open: numeric(&row[5])?,
            closed,
        });
    }

    Ok(CandleSeries::new(candles))
}

fn numeric(field: &str) -> Result<f64> {
    field
        .parse()
        .map_err(|_| Error::MarketData(format!("non-numeric candle field '{field}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ts: &str, close: &str, extra: Option<&str>) -> Vec<String> {
        let mut r: Vec<String> = [ts, "1000.0", close, "101.0", "99.0", "100.0"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Some(flag) = extra {
            r.push("50.0".to_string()); // base volume
            r.push(flag.to_string());
        }
        r
    }

    #[test]
    fn parses_rows_with_explicit_close_flag() {
        let rows = vec![
            row("1700000000", "100.5", Some("true")),
            row("1700000900", "100.7", Some("false")),
        ];
        let series = parse_candles(rows).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closed_bars().len(), 1);
        assert!((series.last_closed().unwrap().close - 100.5).abs() < 1e-12);
    }

    #[test]
    fn six_field_rows_treat_newest_as_forming() {
        let rows = vec![
            row("1700000000", "100.5", None),
            row("1700000900", "100.7", None),
            row("1700001800", "100.9", None),
        ];
        let series = parse_candles(rows).unwrap();
        assert_eq!(series.closed_bars().len(), 2);
        assert!((series.latest().unwrap().close - 100.9).abs() < 1e-12);
    }

    #[test]
    fn rejects_malformed_rows() {
        assert!(parse_candles(vec![vec!["1700000000".to_string()]]).is_err());
        assert!(parse_candles(vec![row("not-a-ts", "100.0", None)]).is_err());
        assert!(parse_candles(vec![row("1700000000", "not-a-price", None)]).is_err());
    }

    #[test]
    fn empty_payload_is_an_empty_series() {
        let series = parse_candles(Vec::new()).unwrap();
        assert!(series.is_empty());
        assert!(series.last_closed().is_none());
    }
}
