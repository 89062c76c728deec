use common::Candle;

/// Average true range: trailing simple mean of the true range.
///
/// True range at i = max(high-low, |high-prev_close|, |low-prev_close|).
/// Index 0 has no previous close and is excluded from every window, so the
/// first reading sits at index `period`.
pub fn atr(candles: &[Candle], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; candles.len()];
    if period == 0 || candles.len() < period + 1 {
        return out;
    }
    let true_ranges: Vec<f64> = candles
        .windows(2)
        .map(|w| {
            let prev_close = w[0].close;
            let c = &w[1];
            (c.high - c.low)
                .max((c.high - prev_close).abs())
                .max((c.low - prev_close).abs())
        })
        .collect();
    for i in period..candles.len() {
        let window = &true_ranges[i - period..i];
        out[i] = window.iter().sum::<f64>() / period as f64;
    }
    out
}
