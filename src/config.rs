//! Engine configuration
//!
//! Every tunable of the engine lives in [`EngineConfig`]. Sections default
//! individually, so a TOML file only needs the values it overrides:
//!
//! ```toml
//! [confluence]
//! weight_method = "tiered"
//!
//! [rsi]
//! overbought = 75.0
//! oversold = 25.0
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::confluence::WeightMethod;
use crate::patterns::PatternKind;
use crate::timeframe::Timeframe;
use crate::Period;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

// ============================================================
// ROOT
// ============================================================

/// Root configuration record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rsi: RsiConfig,
    pub volume: VolumeConfig,
    pub body: BodyConfig,
    pub confluence: ConfluenceConfig,
    pub history: HistoryConfig,
    pub refresh: RefreshConfig,
    pub alerts: AlertConfig,
    pub overlays: OverlayConfig,
    pub patterns: PatternToggles,
    /// Catalog order is also the aggregation order
    pub timeframes: Vec<Timeframe>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rsi: RsiConfig::default(),
            volume: VolumeConfig::default(),
            body: BodyConfig::default(),
            confluence: ConfluenceConfig::default(),
            history: HistoryConfig::default(),
            refresh: RefreshConfig::default(),
            alerts: AlertConfig::default(),
            overlays: OverlayConfig::default(),
            patterns: PatternToggles::default(),
            timeframes: Timeframe::default_catalog(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a file path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Enabled timeframes in catalog order
    pub fn enabled_timeframes(&self) -> impl Iterator<Item = &Timeframe> {
        self.timeframes.iter().filter(|tf| tf.enabled)
    }

    pub fn timeframe(&self, id: &str) -> Option<&Timeframe> {
        self.timeframes.iter().find(|tf| tf.id == id)
    }

    /// Flip a timeframe on or off. Returns false for an unknown id.
    pub fn set_timeframe_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.timeframes.iter_mut().find(|tf| tf.id == id) {
            Some(tf) => {
                tf.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Check cross-field constraints. Called once on load.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rsi.validate()?;
        self.volume.validate()?;
        self.body.validate()?;
        self.history.validate()?;
        self.refresh.validate()?;
        self.alerts.validate()?;

        if self.timeframes.is_empty() {
            return Err(invalid("timeframes must not be empty"));
        }
        let mut seen = HashSet::new();
        for tf in &self.timeframes {
            if tf.minutes == 0 {
                return Err(invalid(format!("timeframe {} has zero minutes", tf.id)));
            }
            if !seen.insert(tf.id.as_str()) {
                return Err(invalid(format!("duplicate timeframe id {}", tf.id)));
            }
        }
        Ok(())
    }
}

fn check_pct(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(invalid(format!("{field} = {value} must be within [0, 100]")));
    }
    Ok(())
}

// ============================================================
// SECTIONS
// ============================================================

/// RSI period and alert levels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiConfig {
    pub period: Period,
    pub overbought: f64,
    pub oversold: f64,
    pub extreme_overbought: f64,
    pub extreme_oversold: f64,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            period: Period::new_const(14),
            overbought: 70.0,
            oversold: 30.0,
            extreme_overbought: 80.0,
            extreme_oversold: 20.0,
        }
    }
}

impl RsiConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_pct("rsi.overbought", self.overbought)?;
        check_pct("rsi.oversold", self.oversold)?;
        check_pct("rsi.extreme_overbought", self.extreme_overbought)?;
        check_pct("rsi.extreme_oversold", self.extreme_oversold)?;
        if self.oversold >= self.overbought {
            return Err(invalid("rsi.oversold must be below rsi.overbought"));
        }
        if self.extreme_overbought < self.overbought || self.extreme_oversold > self.oversold {
            return Err(invalid("rsi extreme levels must lie beyond the normal levels"));
        }
        Ok(())
    }
}

/// Volume ratio averaging and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub avg_period: Period,
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub spike_threshold: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            avg_period: Period::new_const(20),
            high_threshold: 1.5,
            low_threshold: 0.6,
            spike_threshold: 2.5,
        }
    }
}

impl VolumeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.low_threshold.is_nan() || self.low_threshold < 0.0 {
            return Err(invalid("volume.low_threshold must be non-negative"));
        }
        if self.low_threshold >= self.high_threshold {
            return Err(invalid("volume.low_threshold must be below volume.high_threshold"));
        }
        if self.spike_threshold < self.high_threshold {
            return Err(invalid("volume.spike_threshold must not be below volume.high_threshold"));
        }
        Ok(())
    }
}

/// Body-size thresholds in percent of range
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    pub strong_threshold: f64,
    pub weak_threshold: f64,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            strong_threshold: 70.0,
            weak_threshold: 40.0,
        }
    }
}

impl BodyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_pct("body.strong_threshold", self.strong_threshold)?;
        check_pct("body.weak_threshold", self.weak_threshold)?;
        if self.weak_threshold > self.strong_threshold {
            return Err(invalid("body.weak_threshold must not exceed body.strong_threshold"));
        }
        Ok(())
    }
}

/// Weighting policy and modifier toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluenceConfig {
    pub weight_method: WeightMethod,
    pub use_strength_modifier: bool,
    pub use_volume_modifier: bool,
    pub use_indicator_modifier: bool,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            weight_method: WeightMethod::Linear,
            use_strength_modifier: true,
            use_volume_modifier: true,
            use_indicator_modifier: true,
        }
    }
}

/// High-confluence history admission and retention
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Scores at or above this are recorded
    pub high_threshold: f64,
    /// Scores at or below this are recorded
    pub low_threshold: f64,
    /// Minimum age of the instrument's latest record before another is admitted
    pub min_spacing_secs: i64,
    /// Outcome tracking stops once a record is this old
    pub lock_after_secs: i64,
    pub max_records: usize,
    pub persisted_per_instrument: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            high_threshold: 70.0,
            low_threshold: 30.0,
            min_spacing_secs: 5 * 60,
            lock_after_secs: 30 * 60,
            max_records: 20,
            persisted_per_instrument: 10,
        }
    }
}

impl HistoryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_pct("history.high_threshold", self.high_threshold)?;
        check_pct("history.low_threshold", self.low_threshold)?;
        if self.low_threshold >= self.high_threshold {
            return Err(invalid("history.low_threshold must be below history.high_threshold"));
        }
        if self.min_spacing_secs < 0 || self.lock_after_secs < 0 {
            return Err(invalid("history durations must be non-negative"));
        }
        if self.max_records == 0 {
            return Err(invalid("history.max_records must be > 0"));
        }
        Ok(())
    }
}

/// Refresh cadence of the monitor loops
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub quote_interval_ms: u64,
    pub candle_interval_ms: u64,
    /// Candles requested per timeframe
    pub candle_limit: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            quote_interval_ms: 2_000,
            candle_interval_ms: 10_000,
            candle_limit: 200,
        }
    }
}

impl RefreshConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.quote_interval_ms == 0 || self.candle_interval_ms == 0 {
            return Err(invalid("refresh intervals must be > 0"));
        }
        if self.candle_limit < 2 {
            return Err(invalid("refresh.candle_limit must be at least 2"));
        }
        Ok(())
    }
}

/// Candle-close alert window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub alert_seconds: u32,
    /// Timeframes that must close together to trigger
    pub min_confluence: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            alert_seconds: 30,
            min_confluence: 2,
        }
    }
}

impl AlertConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_confluence == 0 {
            return Err(invalid("alerts.min_confluence must be > 0"));
        }
        Ok(())
    }
}

/// Chart overlay series computed alongside the metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub sma_periods: Vec<Period>,
    pub ema_periods: Vec<Period>,
    pub vwap: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            sma_periods: vec![Period::new_const(20)],
            ema_periods: vec![Period::new_const(21)],
            vwap: true,
        }
    }
}

/// Per-kind pattern visibility. Everything is shown unless hidden.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternToggles {
    pub hidden: BTreeSet<PatternKind>,
}

impl PatternToggles {
    #[inline]
    pub fn is_visible(&self, kind: PatternKind) -> bool {
        !self.hidden.contains(&kind)
    }

    pub fn hide(&mut self, kind: PatternKind) {
        self.hidden.insert(kind);
    }

    pub fn show(&mut self, kind: PatternKind) {
        self.hidden.remove(&kind);
    }

    pub fn set(&mut self, kind: PatternKind, visible: bool) {
        if visible {
            self.show(kind);
        } else {
            self.hide(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.confluence.weight_method, WeightMethod::Linear);
        assert_eq!(config.rsi.period.get(), 14);
        assert_eq!(config.refresh.candle_limit, 200);
        let enabled: Vec<_> = config.enabled_timeframes().map(|tf| tf.id.as_str()).collect();
        assert_eq!(enabled, vec!["5m", "15m", "1h"]);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [confluence]
            weight_method = "tiered"

            [rsi]
            overbought = 75.0
            "#,
        )
        .unwrap();
        assert_eq!(config.confluence.weight_method, WeightMethod::Tiered);
        assert!(config.confluence.use_volume_modifier);
        assert_eq!(config.rsi.overbought, 75.0);
        assert_eq!(config.rsi.oversold, 30.0);
        assert_eq!(config.timeframes.len(), 6);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = EngineConfig::default();
        config.patterns.hide(PatternKind::Doji);
        config.set_timeframe_enabled("4h", true);
        let text = config.to_toml_string().unwrap();
        let back = EngineConfig::from_toml_str(&text).unwrap();
        assert!(!back.patterns.is_visible(PatternKind::Doji));
        assert!(back.timeframe("4h").unwrap().enabled);
        assert_eq!(back.overlays.ema_periods, vec![Period::new_const(21)]);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let err = EngineConfig::from_toml_str("[rsi]\noverbought = 20.0\n");
        assert!(matches!(err, Err(ConfigError::Invalid(_))));

        let err = EngineConfig::from_toml_str("[volume]\nlow_threshold = 2.0\n");
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_period() {
        let err = EngineConfig::from_toml_str("[rsi]\nperiod = 0\n");
        assert!(matches!(err, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_rejects_duplicate_timeframes() {
        let mut config = EngineConfig::default();
        config.timeframes.push(Timeframe::new("5m", 5, true));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load("/nonexistent/confluence.toml");
        assert!(matches!(err, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_pattern_toggles() {
        let mut toggles = PatternToggles::default();
        assert!(toggles.is_visible(PatternKind::MorningStar));
        toggles.set(PatternKind::MorningStar, false);
        assert!(!toggles.is_visible(PatternKind::MorningStar));
        toggles.show(PatternKind::MorningStar);
        assert!(toggles.is_visible(PatternKind::MorningStar));
    }
}
