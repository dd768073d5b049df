//! Weighted multi-timeframe confluence
//!
//! Every enabled timeframe with metrics votes bullish or bearish with a
//! weight: a base weight from the [`WeightMethod`], scaled by optional
//! body-strength, volume and indicator-agreement modifiers. The score is the
//! bullish share of the total weight, in percent.

use std::fmt;

use crate::config::{BodyConfig, EngineConfig, RsiConfig, VolumeConfig};
use crate::indicators::TfMetrics;
use crate::timeframe::Timeframe;
use crate::Direction;

/// Score reported when no timeframe contributes
pub const NEUTRAL_SCORE: f64 = 50.0;

// ============================================================
// WEIGHTING POLICIES
// ============================================================

/// Base-weight policy per timeframe id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMethod {
    Equal,
    #[default]
    Linear,
    Exponential,
    Tiered,
}

impl WeightMethod {
    pub const ALL: [WeightMethod; 4] = [
        WeightMethod::Equal,
        WeightMethod::Linear,
        WeightMethod::Exponential,
        WeightMethod::Tiered,
    ];

    /// Base weight of a timeframe id. Ids outside the catalog weigh 1.
    pub fn base_weight(self, tf_id: &str) -> f64 {
        let table: [f64; 6] = match self {
            WeightMethod::Equal => [1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            WeightMethod::Linear => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            WeightMethod::Exponential => [1.0, 2.0, 4.0, 8.0, 16.0, 32.0],
            WeightMethod::Tiered => [1.0, 3.0, 3.0, 7.0, 7.0, 15.0],
        };
        let slot = match tf_id {
            "1m" => 0,
            "5m" => 1,
            "15m" => 2,
            "30m" => 3,
            "1h" => 4,
            "4h" => 5,
            _ => return 1.0,
        };
        table[slot]
    }

    pub fn description(self) -> &'static str {
        match self {
            WeightMethod::Equal => "All timeframes weighted equally",
            WeightMethod::Linear => "Higher timeframes get progressively more weight",
            WeightMethod::Exponential => "Exponentially increasing weight for higher TFs",
            WeightMethod::Tiered => "Grouped tiers: Scalp(1), Intraday(3), Swing(7), Position(15)",
        }
    }

    pub fn formula(self) -> &'static str {
        match self {
            WeightMethod::Equal => "Score = (Bull TFs × 1) / (Total TFs × 1) × 100%",
            WeightMethod::Linear => "Weights: 1m=1, 5m=2, 15m=3, 30m=4, 1h=5, 4h=6",
            WeightMethod::Exponential => "Weights: 1m=1, 5m=2, 15m=4, 30m=8, 1h=16, 4h=32",
            WeightMethod::Tiered => "Scalp=1 | Intraday=3 | Swing=7 | Position=15",
        }
    }

    /// Tier name of a timeframe under the tiered policy
    pub fn tier(tf_id: &str) -> Option<&'static str> {
        match tf_id {
            "1m" => Some("Scalp"),
            "5m" | "15m" => Some("Intraday"),
            "30m" | "1h" => Some("Swing"),
            "4h" => Some("Position"),
            _ => None,
        }
    }
}

impl fmt::Display for WeightMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WeightMethod::Equal => "equal",
            WeightMethod::Linear => "linear",
            WeightMethod::Exponential => "exponential",
            WeightMethod::Tiered => "tiered",
        })
    }
}

// ============================================================
// MODIFIERS
// ============================================================

/// Multiplier applied on top of the base weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedModifier {
    StrongBody,
    WeakBody,
    HighVolume,
    LowVolume,
    /// RSI and MACD both agree with the candle direction
    IndicatorsConfirm,
    /// Exactly one of RSI and MACD agrees
    IndicatorsPartial,
    IndicatorsDiverge,
}

impl AppliedModifier {
    pub fn factor(self) -> f64 {
        match self {
            AppliedModifier::StrongBody => 1.5,
            AppliedModifier::WeakBody => 0.5,
            AppliedModifier::HighVolume => 1.3,
            AppliedModifier::LowVolume => 0.7,
            AppliedModifier::IndicatorsConfirm => 1.4,
            AppliedModifier::IndicatorsPartial => 1.2,
            AppliedModifier::IndicatorsDiverge => 0.8,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AppliedModifier::StrongBody => "Body×1.5",
            AppliedModifier::WeakBody => "Body×0.5",
            AppliedModifier::HighVolume => "Vol×1.3",
            AppliedModifier::LowVolume => "Vol×0.7",
            AppliedModifier::IndicatorsConfirm => "Ind×1.4",
            AppliedModifier::IndicatorsPartial => "Ind×1.2",
            AppliedModifier::IndicatorsDiverge => "Ind×0.8",
        }
    }
}

impl fmt::Display for AppliedModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================
// RESULT
// ============================================================

/// Majority direction of the contributing timeframes. Ties are bearish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Bull,
    Bear,
}

impl Bias {
    pub fn from_counts(bull_count: usize, bear_count: usize) -> Self {
        if bull_count > bear_count {
            Bias::Bull
        } else {
            Bias::Bear
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bias::Bull => "BULL",
            Bias::Bear => "BEAR",
        })
    }
}

/// Weight breakdown of one contributing timeframe
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeframeWeight {
    pub tf_id: String,
    pub label: String,
    pub base: f64,
    pub final_weight: f64,
    pub modifiers: Vec<AppliedModifier>,
    pub direction: Direction,
}

impl TimeframeWeight {
    /// Modifier labels joined by spaces, e.g. `Body×1.5 Ind×1.2`
    pub fn modifier_labels(&self) -> String {
        self.modifiers
            .iter()
            .map(|m| m.label())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfluenceResult {
    /// Bullish share of the total weight, 0..=100
    pub score: f64,
    pub bull_count: usize,
    pub bear_count: usize,
    pub bias: Bias,
    pub bull_weight: f64,
    pub bear_weight: f64,
    /// One entry per contributing timeframe, in catalog order
    pub weights: Vec<TimeframeWeight>,
}

impl ConfluenceResult {
    pub fn neutral() -> Self {
        Self {
            score: NEUTRAL_SCORE,
            bull_count: 0,
            bear_count: 0,
            bias: Bias::Bear,
            bull_weight: 0.0,
            bear_weight: 0.0,
            weights: Vec::new(),
        }
    }

    pub fn contributing(&self) -> usize {
        self.bull_count + self.bear_count
    }
}

// ============================================================
// SCORER
// ============================================================

/// Pure confluence computation over per-timeframe metrics
#[derive(Debug, Clone)]
pub struct ConfluenceScorer {
    pub method: WeightMethod,
    pub use_strength_modifier: bool,
    pub use_volume_modifier: bool,
    pub use_indicator_modifier: bool,
    pub body: BodyConfig,
    pub volume: VolumeConfig,
    pub rsi: RsiConfig,
}

impl Default for ConfluenceScorer {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ConfluenceScorer {
    pub fn from_config(config: &EngineConfig) -> Self {
        let c = &config.confluence;
        Self {
            method: c.weight_method,
            use_strength_modifier: c.use_strength_modifier,
            use_volume_modifier: c.use_volume_modifier,
            use_indicator_modifier: c.use_indicator_modifier,
            body: config.body.clone(),
            volume: config.volume.clone(),
            rsi: config.rsi.clone(),
        }
    }

    /// Modifiers that apply to one timeframe, in strength / volume / indicator order
    pub fn modifiers(&self, m: &TfMetrics) -> Vec<AppliedModifier> {
        let mut out = Vec::with_capacity(3);

        if self.use_strength_modifier {
            if m.body_pct >= self.body.strong_threshold {
                out.push(AppliedModifier::StrongBody);
            } else if m.body_pct < self.body.weak_threshold {
                out.push(AppliedModifier::WeakBody);
            }
        }

        if self.use_volume_modifier {
            if m.volume_ratio >= self.volume.high_threshold {
                out.push(AppliedModifier::HighVolume);
            } else if m.volume_ratio <= self.volume.low_threshold {
                out.push(AppliedModifier::LowVolume);
            }
        }

        // Applied on every vote while enabled, including RSI 50 / flat MACD
        // readings of short series.
        if self.use_indicator_modifier {
            let rsi_confirms = if m.is_bullish {
                m.rsi < self.rsi.overbought
            } else {
                m.rsi > self.rsi.oversold
            };
            let macd_confirms = m.is_bullish == m.macd.is_bullish;
            out.push(match (rsi_confirms, macd_confirms) {
                (true, true) => AppliedModifier::IndicatorsConfirm,
                (false, false) => AppliedModifier::IndicatorsDiverge,
                _ => AppliedModifier::IndicatorsPartial,
            });
        }

        out
    }

    /// Weight of one timeframe's vote
    pub fn weigh(&self, tf: &Timeframe, m: &TfMetrics) -> TimeframeWeight {
        let base = self.method.base_weight(&tf.id);
        let modifiers = self.modifiers(m);
        let final_weight = modifiers.iter().fold(base, |w, md| w * md.factor());
        TimeframeWeight {
            tf_id: tf.id.clone(),
            label: tf.label.clone(),
            base,
            final_weight,
            modifiers,
            direction: if m.is_bullish {
                Direction::Bullish
            } else {
                Direction::Bearish
            },
        }
    }

    /// Aggregate the enabled timeframes, in catalog order, that have metrics
    pub fn score<'m, F>(&self, timeframes: &[Timeframe], metrics: F) -> ConfluenceResult
    where
        F: Fn(&str) -> Option<&'m TfMetrics>,
    {
        let mut result = ConfluenceResult::neutral();

        for tf in timeframes.iter().filter(|tf| tf.enabled) {
            let Some(m) = metrics(&tf.id) else {
                continue;
            };
            let weight = self.weigh(tf, m);
            if m.is_bullish {
                result.bull_weight += weight.final_weight;
                result.bull_count += 1;
            } else {
                result.bear_weight += weight.final_weight;
                result.bear_count += 1;
            }
            result.weights.push(weight);
        }

        let total = result.bull_weight + result.bear_weight;
        if total > 0.0 {
            result.score = result.bull_weight / total * 100.0;
        }
        result.bias = Bias::from_counts(result.bull_count, result.bear_count);
        result
    }
}
