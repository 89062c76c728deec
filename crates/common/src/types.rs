use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar from the exchange.
///
/// The newest candle in a feed may still be forming; `closed` is false for
/// such a bar and signal decisions must ignore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub closed: bool,
}

/// An ordered candle series, oldest first.
#[derive(Debug, Clone, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series from raw candles, sorting ascending by open time.
    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.open_time);
        Self { candles }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// The prefix of finalized bars. Everything from the first still-forming
    /// bar onward is excluded.
    pub fn closed_bars(&self) -> &[Candle] {
        let end = self
            .candles
            .iter()
            .position(|c| !c.closed)
            .unwrap_or(self.candles.len());
        &self.candles[..end]
    }

    /// The most recent finalized bar, if any.
    pub fn last_closed(&self) -> Option<&Candle> {
        self.closed_bars().last()
    }

    /// The newest bar in the feed, closed or not.
    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }
}

/// Candle interval tokens accepted by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(crate::Error::Parameter(format!(
                "unknown timeframe '{other}' (expected 1m, 5m, 15m, 30m, 1h, 4h or 1d)"
            ))),
        }
    }
}

/// Normalize a user-supplied pair into exchange form ("BTC_USDT").
///
/// Uppercases, maps the common separators to `_`, and quotes bare symbols
/// in USDT. Returns `None` when the result is not a two-part pair.
pub fn normalize_pair(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }
    let mut s: String = raw
        .trim()
        .to_uppercase()
        .replace(' ', "")
        .replace(['-', '/'], "_");
    while s.contains("__") {
        s = s.replace("__", "_");
    }
    if !s.contains("_USDT") && s.len() <= 6 {
        s = format!("{s}_USDT");
    }
    let parts: Vec<&str> = s.split('_').collect();
    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(s)
}

/// Identity of one monitored stream: normalized pair + timeframe.
/// One position and one last-processed-bar timestamp are tracked per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WatchKey {
    pub pair: String,
    pub timeframe: Timeframe,
}

impl WatchKey {
    /// Parse a raw pair string into a key, normalizing the pair.
    pub fn parse(raw_pair: &str, timeframe: Timeframe) -> Option<Self> {
        normalize_pair(raw_pair).map(|pair| Self { pair, timeframe })
    }

    /// Human-facing form used in alerts: "BTC/USDT 15m".
    pub fn label(&self) -> String {
        format!("{} {}", self.pair.replace('_', "/"), self.timeframe)
    }
}

impl std::fmt::Display for WatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.pair, self.timeframe)
    }
}

/// Side of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// A trade opportunity derived from one closed bar.
/// Produced at most once per (key, bar_time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_price: f64,
    pub tp1_price: f64,
    pub tp2_price: f64,
    /// Open time of the closed bar that produced the signal.
    pub bar_time: DateTime<Utc>,
}

/// Lifecycle state of a live position. A fully exited position is removed
/// from tracking rather than stored in a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionState {
    Open,
    Partial,
}

impl std::fmt::Display for PositionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionState::Open => write!(f, "open"),
            PositionState::Partial => write!(f, "partial"),
        }
    }
}

/// An opportunity being tracked toward its exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub key: WatchKey,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_price: f64,
    pub tp1_price: f64,
    pub tp2_price: f64,
    pub state: PositionState,
    pub opened_at: DateTime<Utc>,
}
