//! MACD (12, 26, 9)
//!
//! Two paths exist and are not reconciled. The scalar snapshot derives its
//! signal line from a zero-padded series, while [`macd_series`] runs a true
//! EMA over the historical MACD values.

use super::ema::{ema, running_ema};

pub const FAST: usize = 12;
pub const SLOW: usize = 26;
pub const SIGNAL: usize = 9;

/// Latest MACD reading with the histogram momentum against the prior candle
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct MacdSnapshot {
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
    pub prev_histogram: f64,
    /// Histogram rising
    pub is_bullish: bool,
    pub crossed_up: bool,
    pub crossed_down: bool,
}

/// One point of the MACD history
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MacdPoint {
    /// Candle index the point belongs to
    pub index: usize,
    pub macd_line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD line, signal and histogram over `closes`
fn line_signal(closes: &[f64]) -> (f64, f64) {
    let macd_line = ema(closes, FAST) - ema(closes, SLOW);
    let mut padded = vec![0.0; closes.len().saturating_sub(SLOW)];
    padded.push(macd_line);
    (macd_line, ema(&padded, SIGNAL))
}

/// Scalar MACD snapshot of the full series.
///
/// The previous histogram is computed the same way on the series without
/// its last close.
pub fn macd(closes: &[f64]) -> MacdSnapshot {
    let (macd_line, signal_line) = line_signal(closes);
    let histogram = macd_line - signal_line;

    let prev = &closes[..closes.len().saturating_sub(1)];
    let (prev_line, prev_signal) = line_signal(prev);
    let prev_histogram = prev_line - prev_signal;

    MacdSnapshot {
        macd_line,
        signal_line,
        histogram,
        prev_histogram,
        is_bullish: histogram > prev_histogram,
        crossed_up: histogram > 0.0 && prev_histogram <= 0.0,
        crossed_down: histogram < 0.0 && prev_histogram >= 0.0,
    }
}

/// MACD history for every candle that has a signal value.
///
/// MACD values start at candle 26; the signal needs nine of them, so the
/// first point lands on candle 34.
pub fn macd_series(closes: &[f64]) -> Vec<MacdPoint> {
    if closes.len() <= SLOW {
        return Vec::new();
    }
    let fast = running_ema(closes, FAST);
    let slow = running_ema(closes, SLOW);

    // Element j is the MACD of closes[..=SLOW + j]
    let lines: Vec<f64> = (SLOW..closes.len())
        .map(|i| fast[i + 1 - FAST] - slow[i + 1 - SLOW])
        .collect();
    let signals = running_ema(&lines, SIGNAL);

    signals
        .iter()
        .enumerate()
        .map(|(k, &signal)| {
            let j = k + SIGNAL - 1;
            MacdPoint {
                index: SLOW + j,
                macd_line: lines[j],
                signal,
                histogram: lines[j] - signal,
            }
        })
        .collect()
}
