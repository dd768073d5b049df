//! Two-candle patterns
//!
//! Engulfing, Harami, Piercing Line / Dark Cloud Cover and Tweezer Top / Bottom.
//! The current candle is compared to its predecessor; rules are evaluated in
//! that order and the first that fires wins.

use super::{PatternDetector, PatternKind, PatternMatch};
use crate::{EngineError, OHLCVExt, Ratio, Result, OHLCV};

#[derive(Debug, Clone, Copy)]
pub struct DoubleCandleDetector {
    /// Harami: current body must stay below this fraction of the prior body
    pub harami_max_body: Ratio,
    /// Tweezers: relative tolerance on the shared high or low
    pub tweezer_tolerance: Ratio,
}

impl Default for DoubleCandleDetector {
    fn default() -> Self {
        Self {
            harami_max_body: Ratio::new_const(0.5),
            tweezer_tolerance: Ratio::new_const(0.001),
        }
    }
}

impl PatternDetector for DoubleCandleDetector {
    fn span(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 1 {
            return None;
        }
        let prev = bars.get(index - 1)?;
        let curr = bars.get(index)?;

        let curr_body = curr.body();
        let prev_body = prev.body();
        let curr_up = curr.is_bullish();
        let prev_up = prev.is_bullish();
        let hit = |kind| Some(PatternMatch::new(kind, index));

        if !prev_up
            && curr_up
            && curr.open() < prev.close()
            && curr.close() > prev.open()
            && curr_body > prev_body
        {
            return hit(PatternKind::BullishEngulfing);
        }

        if prev_up
            && !curr_up
            && curr.open() > prev.close()
            && curr.close() < prev.open()
            && curr_body > prev_body
        {
            return hit(PatternKind::BearishEngulfing);
        }

        let harami = self.harami_max_body.get();
        if !prev_up
            && curr_up
            && curr.open() > prev.close()
            && curr.close() < prev.open()
            && curr_body < prev_body * harami
        {
            return hit(PatternKind::BullishHarami);
        }

        if prev_up
            && !curr_up
            && curr.open() < prev.close()
            && curr.close() > prev.open()
            && curr_body < prev_body * harami
        {
            return hit(PatternKind::BearishHarami);
        }

        let mid = prev.midpoint();
        if !prev_up
            && curr_up
            && curr.open() < prev.low()
            && curr.close() > mid
            && curr.close() < prev.open()
        {
            return hit(PatternKind::PiercingLine);
        }

        if prev_up
            && !curr_up
            && curr.open() > prev.high()
            && curr.close() < mid
            && curr.close() > prev.open()
        {
            return hit(PatternKind::DarkCloudCover);
        }

        let tol = self.tweezer_tolerance.get();
        if (curr.high() - prev.high()).abs() / prev.high() < tol && prev_up && !curr_up {
            return hit(PatternKind::TweezerTop);
        }

        if (curr.low() - prev.low()).abs() / prev.low() < tol && !prev_up && curr_up {
            return hit(PatternKind::TweezerBottom);
        }

        None
    }

    fn validate_config(&self) -> Result<()> {
        if self.harami_max_body.get() == 0.0 {
            return Err(EngineError::InvalidConfig(
                "harami_max_body must be positive".into(),
            ));
        }
        Ok(())
    }
}
