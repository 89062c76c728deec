pub mod atr;
pub mod moving_average;
pub mod rsi;

pub use atr::atr;
pub use moving_average::{ema, sma};
pub use rsi::rsi;

use common::Candle;

use crate::evaluator::MEAN_LENGTH;
use crate::params::SignalParameters;

/// All indicator series an evaluation needs, aligned index-for-index with
/// the input candles. Entries are NaN until the respective window fills.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub sma: Vec<f64>,
    pub ema: Vec<f64>,
    pub rsi: Vec<f64>,
    pub atr: Vec<f64>,
}

impl IndicatorSet {
    pub fn compute(candles: &[Candle], params: &SignalParameters) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        Self {
            sma: sma(&closes, MEAN_LENGTH),
            ema: ema(&closes, params.trend_ema_length),
            rsi: rsi(&closes, params.rsi_length),
            atr: atr(candles, params.atr_length),
        }
    }
}
