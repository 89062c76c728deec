use common::{CandleSeries, Direction, Signal};

use crate::indicators::IndicatorSet;
use crate::params::SignalParameters;

/// Window of the mean-reversion baseline (SMA).
pub const MEAN_LENGTH: usize = 20;

/// Outcome of one evaluation. A missing signal is a normal result, never an
/// error; the reason is kept so `/debug` and the logs can explain it.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Signal(Signal),
    NoSignal(NoSignalReason),
}

impl Evaluation {
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Evaluation::Signal(s) => Some(s),
            Evaluation::NoSignal(_) => None,
        }
    }

    pub fn into_signal(self) -> Option<Signal> {
        match self {
            Evaluation::Signal(s) => Some(s),
            Evaluation::NoSignal(_) => None,
        }
    }
}

/// Why a bar produced no signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoSignalReason {
    InsufficientHistory,
    IndicatorUnavailable,
    DeviationInsideBand { deviation: f64 },
    RsiVeto { rsi: f64 },
    TrendVeto { trend_ema: f64 },
}

impl std::fmt::Display for NoSignalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoSignalReason::InsufficientHistory => write!(f, "insufficient history"),
            NoSignalReason::IndicatorUnavailable => write!(f, "indicators unavailable"),
            NoSignalReason::DeviationInsideBand { deviation } => {
                write!(f, "deviation insufficient ({:.3}%)", deviation * 100.0)
            }
            NoSignalReason::RsiVeto { rsi } => write!(f, "RSI veto ({rsi:.1})"),
            NoSignalReason::TrendVeto { trend_ema } => {
                write!(f, "trend veto (EMA {trend_ema:.6})")
            }
        }
    }
}

fn min_closed_bars(params: &SignalParameters) -> usize {
    MEAN_LENGTH
        .max(params.trend_ema_length)
        .max(params.atr_length)
        + 2
}

/// Evaluate the latest closed bar of a series for a new opportunity.
///
/// Pure over its inputs: identical series and parameters always yield an
/// identical result. Only closed bars are read; a trailing forming bar in
/// the series never influences the outcome.
pub fn evaluate(series: &CandleSeries, params: &SignalParameters) -> Evaluation {
    let closed = series.closed_bars();
    if closed.len() < min_closed_bars(params) {
        return Evaluation::NoSignal(NoSignalReason::InsufficientHistory);
    }

    let indicators = IndicatorSet::compute(closed, params);
    let idx = closed.len() - 1;
    let last = closed[idx].close;
    let mean = indicators.sma[idx];
    let atr = indicators.atr[idx];

    if !mean.is_finite() || mean == 0.0 || !atr.is_finite() || atr <= 0.0 {
        return Evaluation::NoSignal(NoSignalReason::IndicatorUnavailable);
    }

    let deviation = (last - mean) / mean;
    // Price stretched above the mean reverts down, below the mean reverts up.
    // Both comparisons are inclusive.
    let direction = if deviation >= params.deviation_threshold {
        Direction::Short
    } else if deviation <= -params.deviation_threshold {
        Direction::Long
    } else {
        return Evaluation::NoSignal(NoSignalReason::DeviationInsideBand { deviation });
    };

    if params.use_rsi_filter {
        let rsi = indicators.rsi[idx];
        // NaN fails either comparison, which vetoes the candidate.
        let passes = match direction {
            Direction::Long => rsi <= params.rsi_long_max,
            Direction::Short => rsi >= params.rsi_short_min,
        };
        if !passes {
            return Evaluation::NoSignal(NoSignalReason::RsiVeto { rsi });
        }
    }

    if params.use_trend_filter {
        let trend_ema = indicators.ema[idx];
        let passes = match direction {
            Direction::Long => last > trend_ema,
            Direction::Short => last < trend_ema,
        };
        if !passes {
            return Evaluation::NoSignal(NoSignalReason::TrendVeto { trend_ema });
        }
    }

    let (stop_price, tp1_price, tp2_price) = match direction {
        Direction::Long => (
            last - params.stop_mult * atr,
            last + params.tp1_mult * atr,
            last + params.tp2_mult * atr,
        ),
        Direction::Short => (
            last + params.stop_mult * atr,
            last - params.tp1_mult * atr,
            last - params.tp2_mult * atr,
        ),
    };

    Evaluation::Signal(Signal {
        direction,
        entry_price: last,
        stop_price,
        tp1_price,
        tp2_price,
        bar_time: closed[idx].open_time,
    })
}

/// Snapshot of the inputs behind an evaluation, for the `/debug` command.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorReadout {
    pub last: f64,
    pub mean: f64,
    pub rsi: f64,
    pub trend_ema: f64,
    pub deviation: f64,
}

pub fn readout(series: &CandleSeries, params: &SignalParameters) -> Option<IndicatorReadout> {
    let closed = series.closed_bars();
    if closed.len() < min_closed_bars(params) {
        return None;
    }
    let indicators = IndicatorSet::compute(closed, params);
    let idx = closed.len() - 1;
    let last = closed[idx].close;
    let mean = indicators.sma[idx];
    let deviation = if mean != 0.0 && mean.is_finite() {
        (last - mean) / mean
    } else {
        f64::NAN
    };
    Some(IndicatorReadout {
        last,
        mean,
        rsi: indicators.rsi[idx],
        trend_ema: indicators.ema[idx],
        deviation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use common::Candle;

    fn bar_time(i: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(15 * i as i64)
    }

    /// Closed candles with a half-point range around each close, plus one
    /// trailing forming bar that must never influence the outcome.
    fn series_from_closes(closes: &[f64], forming_close: f64) -> CandleSeries {
        let mut candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open_time: bar_time(i),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1.0,
                closed: true,
            })
            .collect();
        candles.push(Candle {
            open_time: bar_time(closes.len()),
            open: forming_close,
            high: forming_close + 0.5,
            low: forming_close - 0.5,
            close: forming_close,
            volume: 1.0,
            closed: false,
        });
        CandleSeries::new(candles)
    }

    fn lenient_params() -> SignalParameters {
        SignalParameters {
            use_rsi_filter: false,
            use_trend_filter: false,
            trend_ema_length: 10,
            ..Default::default()
        }
    }

    /// 16 flat bars at 100 then nine 0.5 steps down to 95.5. Every true
    /// range is exactly 1.0, so ATR(14) = 1.0 and the derived levels are
    /// exact.
    fn downtrend_closes() -> Vec<f64> {
        let mut closes = vec![100.0; 16];
        for step in 1..=9 {
            closes.push(100.0 - 0.5 * step as f64);
        }
        closes
    }

    /// 22 bars whose trailing 20-bar window averages exactly 250.0 when
    /// `last` is 251.0. The single down-step sits inside the trailing RSI
    /// window so the oscillator reads below 100.
    fn stretched_closes(last: f64) -> Vec<f64> {
        let mut closes = vec![250.0; 14];
        closes.push(249.0);
        closes.extend(std::iter::repeat(250.0).take(6));
        closes.push(last);
        closes
    }

    #[test]
    fn insufficient_history_is_a_normal_result() {
        let series = series_from_closes(&[100.0; 10], 100.0);
        assert_eq!(
            evaluate(&series, &lenient_params()),
            Evaluation::NoSignal(NoSignalReason::InsufficientHistory)
        );
    }

    #[test]
    fn flat_series_has_no_range_and_cannot_be_evaluated() {
        // high == low == close on every bar: ATR is exactly zero.
        let closes = vec![100.0; 30];
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open_time: bar_time(i),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
                closed: true,
            })
            .collect();
        let series = CandleSeries::new(candles);
        assert_eq!(
            evaluate(&series, &lenient_params()),
            Evaluation::NoSignal(NoSignalReason::IndicatorUnavailable)
        );
    }

    #[test]
    fn deviation_boundary_is_inclusive() {
        // Window mean exactly 250: a last close of 251 puts the deviation at
        // exactly the 0.004 threshold and must arm the short candidate.
        let series = series_from_closes(&stretched_closes(251.0), 251.0);
        let eval = evaluate(&series, &lenient_params());
        let signal = eval.signal().expect("boundary deviation must trigger");
        assert_eq!(signal.direction, Direction::Short);

        // Just inside the band: no candidate.
        let series = series_from_closes(&stretched_closes(250.9), 250.9);
        assert!(matches!(
            evaluate(&series, &lenient_params()),
            Evaluation::NoSignal(NoSignalReason::DeviationInsideBand { .. })
        ));
    }

    #[test]
    fn deep_dip_opens_long_with_atr_levels() {
        let closes = downtrend_closes();
        let series = series_from_closes(&closes, 90.0);
        let eval = evaluate(&series, &lenient_params());
        let signal = eval.signal().expect("deep dip must trigger a long");

        assert_eq!(signal.direction, Direction::Long);
        // Forming bar at 90.0 is ignored: entry is the last *closed* close.
        assert!((signal.entry_price - 95.5).abs() < 1e-9);
        assert!((signal.stop_price - 94.5).abs() < 1e-9);
        assert!((signal.tp1_price - 96.0).abs() < 1e-9);
        assert!((signal.tp2_price - 96.5).abs() < 1e-9);
        assert_eq!(signal.bar_time, bar_time(closes.len() - 1));
    }

    #[test]
    fn rsi_filter_vetoes_short_without_momentum() {
        let params = SignalParameters {
            use_rsi_filter: true,
            rsi_short_min: 80.0,
            use_trend_filter: false,
            trend_ema_length: 10,
            ..Default::default()
        };
        let series = series_from_closes(&stretched_closes(251.0), 251.0);
        assert!(matches!(
            evaluate(&series, &params),
            Evaluation::NoSignal(NoSignalReason::RsiVeto { .. })
        ));
    }

    #[test]
    fn trend_filter_vetoes_short_above_its_ema() {
        let params = SignalParameters {
            use_rsi_filter: false,
            use_trend_filter: true,
            trend_ema_length: 10,
            ..Default::default()
        };
        // Last close is the series high, so it sits above any trailing EMA.
        let series = series_from_closes(&stretched_closes(251.0), 251.0);
        assert!(matches!(
            evaluate(&series, &params),
            Evaluation::NoSignal(NoSignalReason::TrendVeto { .. })
        ));
    }

    #[test]
    fn evaluation_is_deterministic_over_identical_input() {
        let series = series_from_closes(&downtrend_closes(), 95.4);
        let params = lenient_params();
        assert_eq!(evaluate(&series, &params), evaluate(&series, &params));
    }

    #[test]
    fn readout_reports_the_evaluators_view() {
        let series = series_from_closes(&downtrend_closes(), 95.4);
        let r = readout(&series, &lenient_params()).unwrap();
        assert!((r.last - 95.5).abs() < 1e-9);
        assert!((r.mean - 98.875).abs() < 1e-9);
        assert!(r.deviation < -0.004);

        let short = series_from_closes(&[100.0; 5], 100.0);
        assert!(readout(&short, &lenient_params()).is_none());
    }
}
