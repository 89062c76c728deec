use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Tunable knobs of the signal evaluator. Mutated per chat at runtime;
/// every mutation passes through `validate()` before it reaches a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParameters {
    /// Fractional distance from the SMA20 mean that arms a candidate
    /// (0.004 = 0.4%). The comparison is inclusive.
    pub deviation_threshold: f64,

    pub use_rsi_filter: bool,
    pub rsi_length: usize,
    /// A LONG candidate requires RSI <= this bound.
    pub rsi_long_max: f64,
    /// A SHORT candidate requires RSI >= this bound.
    pub rsi_short_min: f64,

    pub use_trend_filter: bool,
    pub trend_ema_length: usize,

    pub atr_length: usize,
    /// Exit levels as ATR multiples of the entry price.
    pub stop_mult: f64,
    pub tp1_mult: f64,
    pub tp2_mult: f64,
}

impl Default for SignalParameters {
    fn default() -> Self {
        Self {
            deviation_threshold: 0.004,
            use_rsi_filter: true,
            rsi_length: 14,
            rsi_long_max: 35.0,
            rsi_short_min: 65.0,
            use_trend_filter: true,
            trend_ema_length: 50,
            atr_length: 14,
            stop_mult: 1.0,
            tp1_mult: 0.5,
            tp2_mult: 1.0,
        }
    }
}

impl SignalParameters {
    /// Reject values that would make the evaluator meaningless. Called at
    /// the mutation boundary; a session keeps its last-valid parameters
    /// when this fails.
    pub fn validate(&self) -> Result<()> {
        if !(self.deviation_threshold > 0.0) {
            return Err(Error::Parameter(format!(
                "deviation threshold must be positive, got {}",
                self.deviation_threshold
            )));
        }
        if self.rsi_length < 2 {
            return Err(Error::Parameter(format!(
                "RSI length must be >= 2, got {}",
                self.rsi_length
            )));
        }
        if !(0.0..=100.0).contains(&self.rsi_long_max)
            || !(0.0..=100.0).contains(&self.rsi_short_min)
        {
            return Err(Error::Parameter(
                "RSI bounds must lie within 0..=100".to_string(),
            ));
        }
        if self.rsi_long_max >= self.rsi_short_min {
            return Err(Error::Parameter(format!(
                "RSI long bound ({}) must be below the short bound ({})",
                self.rsi_long_max, self.rsi_short_min
            )));
        }
        if self.trend_ema_length < 2 {
            return Err(Error::Parameter(format!(
                "trend EMA length must be >= 2, got {}",
                self.trend_ema_length
            )));
        }
        if self.atr_length < 1 {
            return Err(Error::Parameter("ATR length must be >= 1".to_string()));
        }
        for (name, value) in [
            ("stop_mult", self.stop_mult),
            ("tp1_mult", self.tp1_mult),
            ("tp2_mult", self.tp2_mult),
        ] {
            if !(value > 0.0) {
                return Err(Error::Parameter(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Optional defaults file (TOML).
///
/// Example `config/signals.toml`:
/// ```toml
/// watchlist = ["BTC_USDT", "ETH_USDT"]
///
/// [parameters]
/// deviation_threshold = 0.004
/// use_rsi_filter = true
/// rsi_long_max = 35.0
/// rsi_short_min = 65.0
/// trend_ema_length = 50
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalFileConfig {
    pub parameters: SignalParameters,
    pub watchlist: Vec<String>,
}

impl SignalFileConfig {
    /// Load from a TOML file. Exits process on error.
    pub fn load(path: &str) -> Self {
        let content = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read signals config at '{path}': {e}"));
        let cfg: Self = toml::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse signals config at '{path}': {e}"));
        cfg.parameters
            .validate()
            .unwrap_or_else(|e| panic!("Invalid signals config at '{path}': {e}"));
        cfg
    }
}
