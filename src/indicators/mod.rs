//! Per-timeframe indicator bundle
//!
//! [`analyze`] condenses a candle series into a [`TfMetrics`] snapshot:
//! anatomy of the latest candle, RSI, MACD, volume ratio and the alert
//! flags derived from them. [`overlays`] computes the chart lines (SMA,
//! EMA, VWAP) separately since they are only needed for display.
//!
//! All functions consult only the series they are given.

use std::collections::BTreeMap;

use crate::config::{EngineConfig, OverlayConfig};
use crate::{OHLCVExt, OHLCV};

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod volume;

pub use ema::{ema, ema_overlay, sma_overlay, Ema};
pub use macd::{macd, macd_series, MacdPoint, MacdSnapshot};
pub use rsi::{rsi, rsi_series};
pub use volume::{volume_ratio, vwap_series};

// ============================================================
// METRICS
// ============================================================

/// Indicator snapshot for one timeframe, replaced wholesale on every refresh
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TfMetrics {
    pub tf_id: String,
    /// Latest candle closed above its open
    pub is_bullish: bool,
    pub body_pct: f64,
    pub upper_wick_pct: f64,
    pub lower_wick_pct: f64,
    pub change_pct: f64,
    pub volume_ratio: f64,
    /// Where the close sits in the candle's range, as a percentage from the low
    pub buy_pct: f64,
    pub sell_pct: f64,
    pub last_close: f64,
    pub rsi: f64,
    pub rsi_series: Vec<f64>,
    pub macd: MacdSnapshot,
    pub macd_series: Vec<MacdPoint>,
    pub alerts: AlertFlags,
}

/// Threshold crossings on the latest candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct AlertFlags {
    pub overbought: bool,
    pub extreme_overbought: bool,
    pub oversold: bool,
    pub extreme_oversold: bool,
    /// High but below spike level
    pub high_volume: bool,
    pub volume_spike: bool,
    pub low_volume: bool,
    pub indecision: bool,
    pub reject_high: bool,
    pub reject_low: bool,
    pub macd_bull: bool,
    pub macd_bear: bool,
    pub macd_cross_up: bool,
    pub macd_cross_down: bool,
}

/// Inputs the alert flags are derived from
#[derive(Debug, Clone, Copy)]
pub struct AlertInputs {
    pub rsi: f64,
    pub volume_ratio: f64,
    pub body_pct: f64,
    pub upper_wick_pct: f64,
    pub lower_wick_pct: f64,
}

impl AlertFlags {
    pub fn evaluate(inputs: AlertInputs, macd: &MacdSnapshot, config: &EngineConfig) -> Self {
        let rsi_cfg = &config.rsi;
        let vol = &config.volume;
        let ratio = inputs.volume_ratio;
        Self {
            overbought: inputs.rsi >= rsi_cfg.overbought,
            extreme_overbought: inputs.rsi >= rsi_cfg.extreme_overbought,
            oversold: inputs.rsi <= rsi_cfg.oversold,
            extreme_oversold: inputs.rsi <= rsi_cfg.extreme_oversold,
            high_volume: ratio >= vol.high_threshold && ratio < vol.spike_threshold,
            volume_spike: ratio >= vol.spike_threshold,
            low_volume: ratio <= vol.low_threshold,
            indecision: inputs.body_pct <= 20.0,
            reject_high: inputs.upper_wick_pct >= 50.0,
            reject_low: inputs.lower_wick_pct >= 50.0,
            macd_bull: macd.is_bullish,
            macd_bear: !macd.is_bullish,
            macd_cross_up: macd.crossed_up,
            macd_cross_down: macd.crossed_down,
        }
    }
}

/// Analyze a candle series. Returns None for fewer than two candles.
pub fn analyze<T: OHLCV>(tf_id: &str, bars: &[T], config: &EngineConfig) -> Option<TfMetrics> {
    if bars.len() < 2 {
        return None;
    }
    let current = bars.last()?;

    let range = current.range();
    let pct_of_range = |v: f64| if range > 0.0 { v / range * 100.0 } else { 0.0 };
    let body_pct = pct_of_range(current.body());
    let upper_wick_pct = pct_of_range(current.upper_wick());
    let lower_wick_pct = pct_of_range(current.lower_wick());

    let change_pct = if current.open() != 0.0 {
        (current.close() - current.open()) / current.open() * 100.0
    } else {
        0.0
    };

    let close_position = if range > 0.0 {
        (current.close() - current.low()) / range
    } else {
        0.5
    };
    let buy_pct = close_position * 100.0;

    let ratio = volume_ratio(bars, config.volume.avg_period.get());
    let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
    let period = config.rsi.period.get();
    let rsi_now = rsi(&closes, period);
    let macd_now = macd(&closes);

    let alerts = AlertFlags::evaluate(
        AlertInputs {
            rsi: rsi_now,
            volume_ratio: ratio,
            body_pct,
            upper_wick_pct,
            lower_wick_pct,
        },
        &macd_now,
        config,
    );

    Some(TfMetrics {
        tf_id: tf_id.to_string(),
        is_bullish: current.is_bullish(),
        body_pct,
        upper_wick_pct,
        lower_wick_pct,
        change_pct,
        volume_ratio: ratio,
        buy_pct,
        sell_pct: 100.0 - buy_pct,
        last_close: current.close(),
        rsi: rsi_now,
        rsi_series: rsi_series(&closes, period),
        macd: macd_now,
        macd_series: macd_series(&closes),
        alerts,
    })
}

// ============================================================
// OVERLAYS
// ============================================================

/// Chart lines keyed by period
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Overlays {
    pub sma: BTreeMap<usize, Vec<Option<f64>>>,
    pub ema: BTreeMap<usize, Vec<f64>>,
    pub vwap: Option<Vec<f64>>,
}

/// Compute the configured overlay lines. Periods longer than the series are skipped.
pub fn overlays<T: OHLCV>(bars: &[T], config: &OverlayConfig) -> Overlays {
    let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
    let mut out = Overlays::default();

    for p in &config.sma_periods {
        if let Some(line) = sma_overlay(&closes, p.get()) {
            out.sma.insert(p.get(), line);
        }
    }
    for p in &config.ema_periods {
        if let Some(line) = ema_overlay(&closes, p.get()) {
            out.ema.insert(p.get(), line);
        }
    }
    if config.vwap && !bars.is_empty() {
        out.vwap = Some(vwap_series(bars));
    }
    out
}
