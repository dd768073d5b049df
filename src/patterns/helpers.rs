//! Shared candle geometry and trend classification for the detectors

use crate::{OHLCVExt, OHLCV};

/// Lookback used by the hammer family to decide reversal context
pub const TREND_LOOKBACK: usize = 5;

/// Short-term trend over the candles preceding an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendBias {
    Up,
    Down,
    Neutral,
}

/// Classify the `lookback` candles strictly before `index`.
///
/// Up-candles close above their open; every other candle counts as down.
/// A side wins only when it leads by more than one candle.
pub fn trend<T: OHLCV>(bars: &[T], index: usize, lookback: usize) -> TrendBias {
    if index < lookback || index > bars.len() {
        return TrendBias::Neutral;
    }

    let (up, down) = bars[index - lookback..index]
        .iter()
        .fold((0usize, 0usize), |(u, d), b| {
            if b.is_bullish() {
                (u + 1, d)
            } else {
                (u, d + 1)
            }
        });

    if up > down + 1 {
        TrendBias::Up
    } else if down > up + 1 {
        TrendBias::Down
    } else {
        TrendBias::Neutral
    }
}

/// Body and wick fractions of one candle's range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleShape {
    pub body: f64,
    pub upper_wick: f64,
    pub lower_wick: f64,
    pub bullish: bool,
}

impl CandleShape {
    /// None for a zero-range candle
    pub fn of<T: OHLCV>(bar: &T) -> Option<Self> {
        Some(Self {
            body: bar.body_ratio()?,
            upper_wick: bar.upper_wick_ratio()?,
            lower_wick: bar.lower_wick_ratio()?,
            bullish: bar.is_bullish(),
        })
    }
}
