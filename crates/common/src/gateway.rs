use async_trait::async_trait;

use crate::{CandleSeries, Result, WatchKey};

/// Abstraction over the market data feed.
///
/// `GateClient` in `crates/watch` implements this against the Gate.io REST
/// API; tests substitute scripted implementations. "No data" and fetch
/// failures are typed results the scheduler must handle, never exceptions.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Fetch up to `limit` candles for a key, oldest first.
    /// The newest entry may be a still-forming bar, flagged via `Candle::closed`.
    async fn candles(&self, key: &WatchKey, limit: usize) -> Result<CandleSeries>;

    /// Freshest traded price for a key, used for exit monitoring.
    async fn last_price(&self, key: &WatchKey) -> Result<f64>;
}
