/// Relative-strength oscillator over trailing-window averages.
///
/// Gains and losses are the positive and negative one-step deltas (losses
/// as magnitudes), each averaged over the trailing `period` deltas with a
/// plain mean. First defined at index `period` (the first delta sits at
/// index 1). A window with zero average loss yields exactly 100.0 rather
/// than dividing by zero.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period + 1 {
        return out;
    }
    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    for i in period..values.len() {
        let window = &deltas[i - period..i];
        let avg_gain =
            window.iter().filter(|&&d| d > 0.0).sum::<f64>() / period as f64;
        let avg_loss =
            window.iter().filter(|&&d| d < 0.0).map(|d| -d).sum::<f64>() / period as f64;
        out[i] = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
    }
    out
}
