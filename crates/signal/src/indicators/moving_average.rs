/// Simple moving average over a trailing window.
///
/// Output is aligned with the input: index i < period-1 is NaN, index
/// i >= period-1 holds the mean of the window ending at i. An input shorter
/// than the window yields an all-NaN vector, a normal checked state.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        out[i] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// Exponential moving average, seeded with the first value.
///
/// Smoothing factor k = 2/(period+1); ema[i] = v[i]*k + ema[i-1]*(1-k).
/// Reported from index period-1 onward so the seed has decayed over a full
/// window before any value is used.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut current = values[0];
    for (i, &value) in values.iter().enumerate() {
        if i > 0 {
            current = value * k + current * (1.0 - k);
        }
        if i + 1 >= period {
            out[i] = current;
        }
    }
    out
}
