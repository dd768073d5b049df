//! Candlestick pattern detection
//!
//! Three detector classes are run at every index of a series:
//!
//! - **Single-candle**: Doji, Marubozu, Spinning Top, Hammer / Hanging Man,
//!   Inverted Hammer / Shooting Star
//! - **Two-candle**: Engulfing, Harami, Piercing Line / Dark Cloud Cover, Tweezers
//! - **Three-candle**: Morning / Evening Star, Three White Soldiers / Black Crows
//!
//! Each class returns at most one match per index (first rule that fires
//! wins), so an index carries at most three matches.

use std::ops::Range;

use crate::{config::PatternToggles, validate_series, Direction, Result, OHLCV};

pub mod helpers;
pub mod single_bar;
pub mod three_bar;
pub mod two_bar;

pub use helpers::{trend, CandleShape, TrendBias};
pub use single_bar::SingleCandleDetector;
pub use three_bar::TripleCandleDetector;
pub use two_bar::DoubleCandleDetector;

// ============================================================
// PATTERN KIND
// ============================================================

/// Every pattern the detectors can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternKind {
    // Single candle
    Doji,
    Hammer,
    InvertedHammer,
    HangingMan,
    ShootingStar,
    Marubozu,
    SpinningTop,
    // Two candles
    BullishEngulfing,
    BearishEngulfing,
    BullishHarami,
    BearishHarami,
    PiercingLine,
    DarkCloudCover,
    TweezerTop,
    TweezerBottom,
    // Three candles
    MorningStar,
    EveningStar,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
}

impl PatternKind {
    pub const ALL: [PatternKind; 19] = [
        PatternKind::Doji,
        PatternKind::Hammer,
        PatternKind::InvertedHammer,
        PatternKind::HangingMan,
        PatternKind::ShootingStar,
        PatternKind::Marubozu,
        PatternKind::SpinningTop,
        PatternKind::BullishEngulfing,
        PatternKind::BearishEngulfing,
        PatternKind::BullishHarami,
        PatternKind::BearishHarami,
        PatternKind::PiercingLine,
        PatternKind::DarkCloudCover,
        PatternKind::TweezerTop,
        PatternKind::TweezerBottom,
        PatternKind::MorningStar,
        PatternKind::EveningStar,
        PatternKind::ThreeWhiteSoldiers,
        PatternKind::ThreeBlackCrows,
    ];

    /// Stable identifier, matching the serde name
    pub fn key(self) -> &'static str {
        match self {
            PatternKind::Doji => "doji",
            PatternKind::Hammer => "hammer",
            PatternKind::InvertedHammer => "invertedHammer",
            PatternKind::HangingMan => "hangingMan",
            PatternKind::ShootingStar => "shootingStar",
            PatternKind::Marubozu => "marubozu",
            PatternKind::SpinningTop => "spinningTop",
            PatternKind::BullishEngulfing => "bullishEngulfing",
            PatternKind::BearishEngulfing => "bearishEngulfing",
            PatternKind::BullishHarami => "bullishHarami",
            PatternKind::BearishHarami => "bearishHarami",
            PatternKind::PiercingLine => "piercingLine",
            PatternKind::DarkCloudCover => "darkCloudCover",
            PatternKind::TweezerTop => "tweezerTop",
            PatternKind::TweezerBottom => "tweezerBottom",
            PatternKind::MorningStar => "morningStar",
            PatternKind::EveningStar => "eveningStar",
            PatternKind::ThreeWhiteSoldiers => "threeWhiteSoldiers",
            PatternKind::ThreeBlackCrows => "threeBlackCrows",
        }
    }

    /// Short label used by chart legends
    pub fn display_name(self) -> &'static str {
        match self {
            PatternKind::Doji => "Doji",
            PatternKind::Hammer => "Hammer",
            PatternKind::InvertedHammer => "Inv Hammer",
            PatternKind::HangingMan => "Hanging Man",
            PatternKind::ShootingStar => "Shoot Star",
            PatternKind::Marubozu => "Marubozu",
            PatternKind::SpinningTop => "Spin Top",
            PatternKind::BullishEngulfing => "Bull Engulf",
            PatternKind::BearishEngulfing => "Bear Engulf",
            PatternKind::BullishHarami => "Bull Harami",
            PatternKind::BearishHarami => "Bear Harami",
            PatternKind::PiercingLine => "Piercing",
            PatternKind::DarkCloudCover => "Dark Cloud",
            PatternKind::TweezerTop => "Tweez Top",
            PatternKind::TweezerBottom => "Tweez Bot",
            PatternKind::MorningStar => "Morning Star",
            PatternKind::EveningStar => "Evening Star",
            PatternKind::ThreeWhiteSoldiers => "3 Soldiers",
            PatternKind::ThreeBlackCrows => "3 Crows",
        }
    }

    /// Default category. Marubozu is reported per match by candle direction.
    pub fn category(self) -> Direction {
        match self {
            PatternKind::Hammer
            | PatternKind::InvertedHammer
            | PatternKind::BullishEngulfing
            | PatternKind::BullishHarami
            | PatternKind::PiercingLine
            | PatternKind::TweezerBottom
            | PatternKind::MorningStar
            | PatternKind::ThreeWhiteSoldiers => Direction::Bullish,
            PatternKind::HangingMan
            | PatternKind::ShootingStar
            | PatternKind::BearishEngulfing
            | PatternKind::BearishHarami
            | PatternKind::DarkCloudCover
            | PatternKind::TweezerTop
            | PatternKind::EveningStar
            | PatternKind::ThreeBlackCrows => Direction::Bearish,
            PatternKind::Doji | PatternKind::Marubozu | PatternKind::SpinningTop => {
                Direction::Neutral
            }
        }
    }

    /// Number of candles the pattern consumes
    pub fn span(self) -> u8 {
        match self {
            PatternKind::Doji
            | PatternKind::Hammer
            | PatternKind::InvertedHammer
            | PatternKind::HangingMan
            | PatternKind::ShootingStar
            | PatternKind::Marubozu
            | PatternKind::SpinningTop => 1,
            PatternKind::BullishEngulfing
            | PatternKind::BearishEngulfing
            | PatternKind::BullishHarami
            | PatternKind::BearishHarami
            | PatternKind::PiercingLine
            | PatternKind::DarkCloudCover
            | PatternKind::TweezerTop
            | PatternKind::TweezerBottom => 2,
            PatternKind::MorningStar
            | PatternKind::EveningStar
            | PatternKind::ThreeWhiteSoldiers
            | PatternKind::ThreeBlackCrows => 3,
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================
// PATTERN MATCH
// ============================================================

/// One detected pattern - Copy, no allocations
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PatternMatch {
    /// Index of the last candle the pattern consumes
    pub index: usize,
    pub kind: PatternKind,
    pub display_name: &'static str,
    pub category: Direction,
    pub span: u8,
}

impl PatternMatch {
    /// Match carrying the kind's default category
    pub fn new(kind: PatternKind, index: usize) -> Self {
        Self::with_category(kind, index, kind.category())
    }

    pub fn with_category(kind: PatternKind, index: usize, category: Direction) -> Self {
        Self {
            index,
            kind,
            display_name: kind.display_name(),
            category,
            span: kind.span(),
        }
    }

    /// First candle index the pattern covers
    #[inline]
    pub fn start_index(&self) -> usize {
        self.index + 1 - self.span as usize
    }
}

// ============================================================
// DETECTOR TRAIT
// ============================================================

/// One class of pattern rules. Implementations return at most one match per call.
pub trait PatternDetector: Send + Sync {
    /// Candles consumed, ending at `index`
    fn span(&self) -> usize;

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// SCANNER
// ============================================================

/// Runs the three detector classes over a series
#[derive(Debug, Clone, Default)]
pub struct PatternScanner {
    pub single: SingleCandleDetector,
    pub double: DoubleCandleDetector,
    pub triple: TripleCandleDetector,
    validate_data: bool,
}

impl PatternScanner {
    pub fn new(
        single: SingleCandleDetector,
        double: DoubleCandleDetector,
        triple: TripleCandleDetector,
    ) -> Result<Self> {
        let scanner = Self {
            single,
            double,
            triple,
            validate_data: false,
        };
        scanner.validate()?;
        Ok(scanner)
    }

    /// Reject series containing NaN/infinite values or inverted ranges before scanning
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.validate_data = enable;
        self
    }

    /// Scan all candles and return the flat, index-ascending match list
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<PatternMatch>> {
        if self.validate_data {
            validate_series(bars)?;
        }
        let mut out = Vec::new();
        for i in 0..bars.len() {
            out.extend(self.scan_at(bars, i));
        }
        Ok(out)
    }

    /// Matches ending at a single index, in single / double / triple order
    pub fn scan_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Vec<PatternMatch> {
        let mut out = Vec::with_capacity(3);
        if index >= bars.len() {
            return out;
        }
        if let Some(m) = self.single.detect(bars, index) {
            out.push(m);
        }
        if index + 1 >= self.double.span() {
            if let Some(m) = self.double.detect(bars, index) {
                out.push(m);
            }
        }
        if index + 1 >= self.triple.span() {
            if let Some(m) = self.triple.detect(bars, index) {
                out.push(m);
            }
        }
        out
    }

    /// Scan and return matches grouped by candle index
    pub fn scan_grouped<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<Vec<PatternMatch>>> {
        if self.validate_data {
            validate_series(bars)?;
        }
        Ok((0..bars.len()).map(|i| self.scan_at(bars, i)).collect())
    }

    /// Iterate candles with their matches
    pub fn iter<'a, T: OHLCV>(&'a self, bars: &'a [T]) -> PatternIterator<'a, T> {
        PatternIterator {
            scanner: self,
            bars,
            current: 0,
        }
    }

    fn validate(&self) -> Result<()> {
        self.single.validate_config()?;
        self.double.validate_config()?;
        self.triple.validate_config()
    }
}

/// Detect every pattern with default thresholds
pub fn detect_all_patterns<T: OHLCV>(bars: &[T]) -> Vec<PatternMatch> {
    let scanner = PatternScanner::default();
    (0..bars.len()).flat_map(|i| scanner.scan_at(bars, i)).collect()
}

// ============================================================
// PATTERN ITERATOR
// ============================================================

/// Iterator over candles with the patterns ending at each
pub struct PatternIterator<'a, T: OHLCV> {
    scanner: &'a PatternScanner,
    bars: &'a [T],
    current: usize,
}

impl<'a, T: OHLCV> Iterator for PatternIterator<'a, T> {
    type Item = (usize, Vec<PatternMatch>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.bars.len() {
            return None;
        }
        let index = self.current;
        self.current += 1;
        Some((index, self.scanner.scan_at(self.bars, index)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bars.len().saturating_sub(self.current);
        (remaining, Some(remaining))
    }
}

impl<'a, T: OHLCV> ExactSizeIterator for PatternIterator<'a, T> {}

// ============================================================
// CONSUMER FILTER
// ============================================================

/// Display-side filtering of a match list: per-kind toggles and a visible window
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    toggles: PatternToggles,
    window: Option<Range<usize>>,
}

impl PatternFilter {
    pub fn new(toggles: PatternToggles) -> Self {
        Self {
            toggles,
            window: None,
        }
    }

    /// Keep only matches whose `index` falls in the window
    pub fn visible_range(mut self, window: Range<usize>) -> Self {
        self.window = Some(window);
        self
    }

    pub fn accepts(&self, m: &PatternMatch) -> bool {
        if let Some(ref w) = self.window {
            if !w.contains(&m.index) {
                return false;
            }
        }
        self.toggles.is_visible(m.kind)
    }

    pub fn apply(&self, matches: &[PatternMatch]) -> Vec<PatternMatch> {
        matches.iter().filter(|m| self.accepts(m)).copied().collect()
    }
}

// ============================================================
// TESTS
// ============================================================
