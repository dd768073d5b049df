//! Single-candle patterns
//!
//! Doji, Marubozu, Spinning Top, Hammer / Hanging Man and
//! Inverted Hammer / Shooting Star. All thresholds are fractions of the
//! candle's high-low range.

use super::helpers::{trend, CandleShape, TrendBias};
use super::{PatternDetector, PatternKind, PatternMatch};
use crate::{Direction, EngineError, Period, Ratio, Result, OHLCV};

/// Single-candle rules, evaluated in order; the first that fires wins
#[derive(Debug, Clone, Copy)]
pub struct SingleCandleDetector {
    /// Doji: body below this fraction
    pub doji_max_body: Ratio,
    /// Marubozu: body above this fraction
    pub marubozu_min_body: Ratio,
    /// Marubozu: each wick below this fraction
    pub marubozu_max_wick: Ratio,
    pub spinning_top_max_body: Ratio,
    pub spinning_top_min_wick: Ratio,
    /// Hammer family: body below this fraction
    pub hammer_max_body: Ratio,
    /// Hammer family: the long wick exceeds this fraction
    pub hammer_min_wick: Ratio,
    /// Hammer family: the opposite wick stays below this fraction
    pub hammer_max_opposite_wick: Ratio,
    pub trend_lookback: Period,
}

impl Default for SingleCandleDetector {
    fn default() -> Self {
        Self {
            doji_max_body: Ratio::new_const(0.10),
            marubozu_min_body: Ratio::new_const(0.90),
            marubozu_max_wick: Ratio::new_const(0.05),
            spinning_top_max_body: Ratio::new_const(0.30),
            spinning_top_min_wick: Ratio::new_const(0.25),
            hammer_max_body: Ratio::new_const(0.35),
            hammer_min_wick: Ratio::new_const(0.60),
            hammer_max_opposite_wick: Ratio::new_const(0.10),
            trend_lookback: Period::new_const(super::helpers::TREND_LOOKBACK),
        }
    }
}

impl PatternDetector for SingleCandleDetector {
    fn span(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        let shape = CandleShape::of(bar)?;

        if shape.body < self.doji_max_body.get() {
            return Some(PatternMatch::new(PatternKind::Doji, index));
        }

        let max_wick = self.marubozu_max_wick.get();
        if shape.body > self.marubozu_min_body.get()
            && shape.upper_wick < max_wick
            && shape.lower_wick < max_wick
        {
            return Some(PatternMatch::with_category(
                PatternKind::Marubozu,
                index,
                Direction::of(bar),
            ));
        }

        let min_wick = self.spinning_top_min_wick.get();
        if shape.body < self.spinning_top_max_body.get()
            && shape.upper_wick > min_wick
            && shape.lower_wick > min_wick
        {
            return Some(PatternMatch::new(PatternKind::SpinningTop, index));
        }

        let bias = trend(bars, index, self.trend_lookback.get());
        let small_body = shape.body < self.hammer_max_body.get();
        let long = self.hammer_min_wick.get();
        let short = self.hammer_max_opposite_wick.get();

        if small_body && shape.lower_wick > long && shape.upper_wick < short {
            match bias {
                TrendBias::Down => return Some(PatternMatch::new(PatternKind::Hammer, index)),
                TrendBias::Up => return Some(PatternMatch::new(PatternKind::HangingMan, index)),
                TrendBias::Neutral => {}
            }
        }

        if small_body && shape.upper_wick > long && shape.lower_wick < short {
            match bias {
                TrendBias::Down => {
                    return Some(PatternMatch::new(PatternKind::InvertedHammer, index))
                }
                TrendBias::Up => return Some(PatternMatch::new(PatternKind::ShootingStar, index)),
                TrendBias::Neutral => {}
            }
        }

        None
    }

    fn validate_config(&self) -> Result<()> {
        if self.marubozu_min_body <= self.doji_max_body {
            return Err(EngineError::InvalidConfig(
                "marubozu_min_body must exceed doji_max_body".into(),
            ));
        }
        if self.hammer_max_opposite_wick >= self.hammer_min_wick {
            return Err(EngineError::InvalidConfig(
                "hammer_max_opposite_wick must be below hammer_min_wick".into(),
            ));
        }
        Ok(())
    }
}
