//! Three-candle patterns: Morning / Evening Star and Three White Soldiers / Black Crows

use super::{PatternDetector, PatternKind, PatternMatch};
use crate::{EngineError, OHLCVExt, Ratio, Result, OHLCV};

#[derive(Debug, Clone, Copy)]
pub struct TripleCandleDetector {
    /// Stars: middle body stays below this fraction of the first body
    pub star_max_body: Ratio,
    /// Soldiers / Crows: body of the first two candles exceeds this fraction of their range
    pub soldier_min_body: Ratio,
}

impl Default for TripleCandleDetector {
    fn default() -> Self {
        Self {
            star_max_body: Ratio::new_const(0.3),
            soldier_min_body: Ratio::new_const(0.6),
        }
    }
}

impl PatternDetector for TripleCandleDetector {
    fn span(&self) -> usize {
        3
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 2 {
            return None;
        }
        let c1 = bars.get(index - 2)?;
        let c2 = bars.get(index - 1)?;
        let c3 = bars.get(index)?;
        let hit = |kind| Some(PatternMatch::new(kind, index));

        let (up1, up2, up3) = (c1.is_bullish(), c2.is_bullish(), c3.is_bullish());
        let small_star = c2.body() < c1.body() * self.star_max_body.get();
        let mid = c1.midpoint();

        if !up1
            && up3
            && small_star
            && c2.close() < c1.close()
            && c2.close() < c3.open()
            && c3.close() > mid
        {
            return hit(PatternKind::MorningStar);
        }

        if up1
            && !up3
            && small_star
            && c2.close() > c1.close()
            && c2.close() > c3.open()
            && c3.close() < mid
        {
            return hit(PatternKind::EveningStar);
        }

        // Only the first two candles are checked for a full body
        let min_body = self.soldier_min_body.get();
        let solid = c1.body() > c1.range() * min_body && c2.body() > c2.range() * min_body;

        if up1
            && up2
            && up3
            && c2.open() > c1.open()
            && c2.close() > c1.close()
            && c3.open() > c2.open()
            && c3.close() > c2.close()
            && solid
        {
            return hit(PatternKind::ThreeWhiteSoldiers);
        }

        if !up1
            && !up2
            && !up3
            && c2.open() < c1.open()
            && c2.close() < c1.close()
            && c3.open() < c2.open()
            && c3.close() < c2.close()
            && solid
        {
            return hit(PatternKind::ThreeBlackCrows);
        }

        None
    }

    fn validate_config(&self) -> Result<()> {
        if self.star_max_body.get() == 0.0 {
            return Err(EngineError::InvalidConfig(
                "star_max_body must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(0, o, h, l, c, 1_000.0)
    }

    fn detect(bars: [Candle; 3]) -> Option<PatternKind> {
        TripleCandleDetector::default().detect(&bars, 2).map(|m| m.kind)
    }

    #[test]
    fn test_needs_three_candles() {
        let bars = [bar(12.0, 12.1, 9.9, 10.0), bar(9.7, 9.8, 9.4, 9.5)];
        assert!(TripleCandleDetector::default().detect(&bars, 1).is_none());
    }

    #[test]
    fn test_morning_star() {
        let kind = detect([
            bar(12.0, 12.1, 9.9, 10.0),
            bar(9.7, 9.8, 9.4, 9.5),
            bar(9.8, 11.6, 9.7, 11.5),
        ]);
        assert_eq!(kind, Some(PatternKind::MorningStar));
    }

    #[test]
    fn test_evening_star() {
        let kind = detect([
            bar(10.0, 12.1, 9.9, 12.0),
            bar(12.3, 12.6, 12.2, 12.5),
            bar(12.2, 12.3, 10.4, 10.5),
        ]);
        assert_eq!(kind, Some(PatternKind::EveningStar));
    }

    #[test]
    fn test_star_rejects_large_middle_body() {
        let kind = detect([
            bar(12.0, 12.1, 9.9, 10.0),
            bar(10.5, 10.6, 9.4, 9.5),
            bar(9.8, 11.6, 9.7, 11.5),
        ]);
        assert_eq!(kind, None);
    }

    #[test]
    fn test_three_white_soldiers() {
        let kind = detect([
            bar(10.0, 11.1, 9.9, 11.0),
            bar(10.5, 11.6, 10.4, 11.5),
            bar(11.0, 12.1, 10.9, 12.0),
        ]);
        assert_eq!(kind, Some(PatternKind::ThreeWhiteSoldiers));
    }

    #[test]
    fn test_soldiers_ignore_third_body_size() {
        // Third candle has a long upper wick; only c1 and c2 need full bodies
        let kind = detect([
            bar(10.0, 11.1, 9.9, 11.0),
            bar(10.5, 11.6, 10.4, 11.5),
            bar(11.0, 14.0, 10.9, 11.6),
        ]);
        assert_eq!(kind, Some(PatternKind::ThreeWhiteSoldiers));
    }

    #[test]
    fn test_three_black_crows() {
        let kind = detect([
            bar(12.0, 12.1, 10.9, 11.0),
            bar(11.5, 11.6, 10.4, 10.5),
            bar(11.0, 11.1, 9.9, 10.0),
        ]);
        assert_eq!(kind, Some(PatternKind::ThreeBlackCrows));
    }

    #[test]
    fn test_crows_need_solid_bodies() {
        let kind = detect([
            bar(12.0, 13.5, 9.5, 11.0),
            bar(11.5, 11.6, 10.4, 10.5),
            bar(11.0, 11.1, 9.9, 10.0),
        ]);
        assert_eq!(kind, None);
    }
}
