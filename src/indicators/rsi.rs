//! Relative Strength Index over simple (non-smoothed) average gain and loss

/// Neutral reading returned when the series is too short
pub const RSI_NEUTRAL: f64 = 50.0;

/// RSI of the last `period` close-to-close deltas.
///
/// Zero deltas count toward gains. Returns 50 with fewer than `period + 1`
/// closes and 100 when there are no losses.
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return RSI_NEUTRAL;
    }
    rsi_ending_at(closes, closes.len() - 1, period)
}

/// One RSI value per close from index `period` onward.
///
/// Each value uses the same simple-average formula as [`rsi`] over the
/// deltas ending at that close, so the last element equals `rsi(closes, period)`.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return Vec::new();
    }
    (period..closes.len())
        .map(|i| rsi_ending_at(closes, i, period))
        .collect()
}

fn rsi_ending_at(closes: &[f64], end: usize, period: usize) -> f64 {
    let (gains, losses) = closes[end - period..=end]
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), change| {
            if change >= 0.0 {
                (g + change, l)
            } else {
                (g, l + change.abs())
            }
        });

    let n = period as f64;
    let avg_gain = gains / n;
    let avg_loss = losses / n;
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}
