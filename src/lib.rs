//! # confluence-engine
//!
//! Multi-timeframe analysis engine for a single instrument: candlestick pattern
//! detection, per-timeframe indicator bundles, a weighted confluence score and a
//! rolling history of high-confluence moments.
//!
//! ## Quick Start
//!
//! ```rust
//! use confluence_engine::prelude::*;
//!
//! let config = EngineConfig::default();
//! let mut ctx = EngineContext::new(config);
//! ctx.switch_instrument("BTCUSDT", Vec::new());
//!
//! // Candles normally come from a `CandleSource`; any ordered series works.
//! let candles: Vec<Candle> = (0..60)
//!     .map(|i| {
//!         let base = 100.0 + i as f64;
//!         Candle::new(i * 60_000, base, base + 2.0, base - 1.0, base + 1.0, 1_000.0)
//!     })
//!     .collect();
//!
//! let fetches = vec![TimeframeFetch::ok("5m", candles)];
//! let generation = ctx.generation();
//! ctx.apply_fetches(generation, fetches);
//!
//! let result = ctx.evaluate_confluence(chrono::Utc::now());
//! assert!((0.0..=100.0).contains(&result.score));
//! ```

pub mod config;
pub mod confluence;
pub mod engine;
pub mod feed;
pub mod history;
pub mod indicators;
pub mod monitor;
pub mod patterns;
pub mod timeframe;

pub mod prelude {
    pub use crate::{
        // Config
        config::{
            AlertConfig, BodyConfig, ConfigError, ConfluenceConfig, EngineConfig, HistoryConfig,
            OverlayConfig, PatternToggles, RefreshConfig, RsiConfig, VolumeConfig,
        },
        // Confluence
        confluence::{
            AppliedModifier, Bias, ConfluenceResult, ConfluenceScorer, TimeframeWeight, WeightMethod,
        },
        // Engine
        engine::{
            analyze_parallel, analyze_timeframe, AnalysisError, ApplyOutcome, EngineContext,
            TimeframeAnalysis, TimeframeState,
        },
        // Feed
        feed::{fetch_timeframes, CandleSource, FeedError, Quote, TimeframeFetch},
        // History
        history::{HistoryRecord, HistoryStore, HistoryTracker, JsonFileStore, MemoryStore, StoreError},
        // Indicators
        indicators::{
            analyze, ema, macd, macd_series, overlays, rsi, rsi_series, volume_ratio, AlertFlags,
            MacdPoint, MacdSnapshot, Overlays, TfMetrics,
        },
        monitor::Monitor,
        // Patterns
        patterns::{
            detect_all_patterns, DoubleCandleDetector, PatternDetector, PatternFilter, PatternIterator, PatternKind,
            PatternMatch, PatternScanner, SingleCandleDetector, TrendBias, TripleCandleDetector,
        },
        // Timeframes
        timeframe::{closing_alert, format_countdown, seconds_to_close, ClosingAlert, Timeframe},
        // Core types
        Candle,
        Direction,
        EngineError,
        OHLCVExt,
        Period,
        Ratio,
        Result,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the analytical engine
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(EngineError::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(EngineError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Lookback length (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(EngineError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with candle anatomy for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_wick(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_wick(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    /// Strictly rising candle. A flat candle counts as bearish everywhere
    /// direction is needed.
    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn midpoint(&self) -> f64 {
        (self.open() + self.close()) / 2.0
    }

    /// Body as fraction of range. Returns None if range is exactly 0
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range != 0.0).then(|| self.body() / range)
    }

    #[inline]
    fn upper_wick_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range != 0.0).then(|| self.upper_wick() / range)
    }

    #[inline]
    fn lower_wick_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range != 0.0).then(|| self.lower_wick() / range)
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let values = [self.open(), self.high(), self.low(), self.close(), self.volume()];
        if values.iter().any(|v| v.is_nan()) {
            return Err(EngineError::InvalidCandle {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(EngineError::InvalidCandle {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(EngineError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Validate every candle of a series, reporting the first bad index
pub fn validate_series<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            EngineError::InvalidCandle { reason, .. } => EngineError::InvalidCandle { index: i, reason },
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// CANDLE
// ============================================================

/// One time-bucketed OHLCV bar as delivered by the data collaborator
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    /// Bucket open time, milliseconds since the Unix epoch
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Bucket close time, milliseconds since the Unix epoch
    pub close_time: i64,
}

impl Candle {
    /// Build a candle with `close_time` set one millisecond before the next
    /// minute bucket. Mostly useful for tests and fixtures.
    pub fn new(open_time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time: open_time + 59_999,
        }
    }
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.open_time)
    }
}

// ============================================================
// DIRECTION
// ============================================================

/// Directional category of a pattern or timeframe verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    /// Bullish for a rising candle, bearish otherwise
    #[inline]
    pub fn of<T: OHLCV>(bar: &T) -> Self {
        if bar.is_bullish() {
            Direction::Bullish
        } else {
            Direction::Bearish
        }
    }
}

// ============================================================
// TESTS
// ============================================================
