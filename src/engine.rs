//! Engine context
//!
//! [`EngineContext`] owns everything that belongs to the selected
//! instrument: per-timeframe candles, patterns, metrics and overlays, the
//! latest quote, and the history tracker. Fetch batches are applied with
//! [`EngineContext::apply_fetches`]; each successful timeframe is analyzed
//! in parallel and replaces its previous state, while failed timeframes keep
//! what they had.
//!
//! Every instrument switch bumps a generation counter. Batches and quotes
//! tagged with an older generation are dropped, so results that arrive
//! after a switch can never leak into the new instrument's state.

use std::collections::HashMap;

use chrono::{DateTime, Timelike, Utc};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::confluence::{ConfluenceResult, ConfluenceScorer, WeightMethod};
use crate::feed::{FeedError, Quote, TimeframeFetch};
use crate::history::{HistoryRecord, HistoryTracker};
use crate::indicators::{self, Overlays, TfMetrics};
use crate::patterns::{PatternFilter, PatternMatch, PatternScanner};
use crate::timeframe::{closing_alert, ClosingAlert};
use crate::{Candle, EngineError};

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

/// Fresh analysis of one timeframe
#[derive(Debug, Clone)]
pub struct TimeframeAnalysis {
    pub tf_id: String,
    pub candles: Vec<Candle>,
    pub patterns: Vec<PatternMatch>,
    /// None for series shorter than two candles
    pub metrics: Option<TfMetrics>,
    pub overlays: Overlays,
}

/// Analysis failure of one timeframe
#[derive(Debug, Clone)]
pub struct AnalysisError {
    pub tf_id: String,
    pub error: EngineError,
}

/// Analyze a single timeframe series
pub fn analyze_timeframe(
    scanner: &PatternScanner,
    config: &EngineConfig,
    tf_id: String,
    candles: Vec<Candle>,
) -> Result<TimeframeAnalysis, AnalysisError> {
    let patterns = match scanner.scan(&candles) {
        Ok(p) => p,
        Err(error) => return Err(AnalysisError { tf_id, error }),
    };
    let metrics = indicators::analyze(&tf_id, &candles, config);
    let overlays = indicators::overlays(&candles, &config.overlays);
    Ok(TimeframeAnalysis {
        tf_id,
        candles,
        patterns,
        metrics,
        overlays,
    })
}

/// Parallel analysis of multiple timeframe series
pub fn analyze_parallel<I>(
    scanner: &PatternScanner,
    config: &EngineConfig,
    batches: I,
) -> (Vec<TimeframeAnalysis>, Vec<AnalysisError>)
where
    I: IntoParallelIterator<Item = (String, Vec<Candle>)>,
{
    let results: Vec<_> = batches
        .into_par_iter()
        .map(|(tf_id, candles)| analyze_timeframe(scanner, config, tf_id, candles))
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// STATE
// ============================================================

/// Last-known state of one timeframe
#[derive(Debug, Clone, Default)]
pub struct TimeframeState {
    pub candles: Vec<Candle>,
    pub patterns: Vec<PatternMatch>,
    pub metrics: Option<TfMetrics>,
    pub overlays: Overlays,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<TimeframeAnalysis> for TimeframeState {
    fn from(a: TimeframeAnalysis) -> Self {
        Self {
            candles: a.candles,
            patterns: a.patterns,
            metrics: a.metrics,
            overlays: a.overlays,
            updated_at: Some(Utc::now()),
        }
    }
}

/// What happened to a batch passed to [`EngineContext::apply_fetches`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    /// Batch belonged to an older generation and was dropped
    pub stale: bool,
    pub refreshed: Vec<String>,
    /// Timeframes that kept their previous state
    pub failed: Vec<(String, String)>,
}

// ============================================================
// CONTEXT
// ============================================================

pub struct EngineContext {
    config: EngineConfig,
    scanner: PatternScanner,
    scorer: ConfluenceScorer,
    instrument: Option<String>,
    generation: u64,
    states: HashMap<String, TimeframeState>,
    quote: Option<Quote>,
    history: HistoryTracker,
    last_confluence: Option<ConfluenceResult>,
}

impl EngineContext {
    /// Build a context around an already validated configuration
    pub fn new(config: EngineConfig) -> Self {
        Self {
            scanner: PatternScanner::default().validate_data(true),
            scorer: ConfluenceScorer::from_config(&config),
            history: HistoryTracker::new(config.history.clone()),
            config,
            instrument: None,
            generation: 0,
            states: HashMap::new(),
            quote: None,
            last_confluence: None,
        }
    }

    /// Validate `config`, then build the context
    pub fn try_new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn instrument(&self) -> Option<&str> {
        self.instrument.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_weight_method(&mut self, method: WeightMethod) {
        self.config.confluence.weight_method = method;
        self.scorer.method = method;
    }

    /// Enable or disable a timeframe. Disabled timeframes keep their state
    /// but stop contributing to confluence.
    pub fn set_timeframe_enabled(&mut self, tf_id: &str, enabled: bool) -> bool {
        self.config.set_timeframe_enabled(tf_id, enabled)
    }

    /// Select another instrument.
    ///
    /// Clears every timeframe's state and the quote, invalidates in-flight
    /// results, and merges the instrument's persisted history. Returns the
    /// new generation.
    pub fn switch_instrument(&mut self, instrument: &str, loaded: Vec<HistoryRecord>) -> u64 {
        self.generation += 1;
        self.states.clear();
        self.quote = None;
        self.last_confluence = None;
        self.history.merge_loaded(instrument, loaded);
        self.instrument = Some(instrument.to_string());
        info!(instrument, generation = self.generation, "instrument selected");
        self.generation
    }

    /// Store a quote fetched for `generation`. Returns false if it was stale.
    pub fn set_quote(&mut self, generation: u64, quote: Quote) -> bool {
        if generation != self.generation {
            debug!(generation, current = self.generation, "dropping stale quote");
            return false;
        }
        self.quote = Some(quote);
        true
    }

    pub fn quote(&self) -> Option<&Quote> {
        self.quote.as_ref()
    }

    /// Apply one fetch batch.
    ///
    /// Successful timeframes are analyzed in parallel and replace their
    /// state. Fetch failures, empty series and malformed candles leave the
    /// previous state in place.
    pub fn apply_fetches(&mut self, generation: u64, fetches: Vec<TimeframeFetch>) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        if generation != self.generation {
            debug!(generation, current = self.generation, "dropping stale candle batch");
            outcome.stale = true;
            return outcome;
        }

        let mut batches = Vec::with_capacity(fetches.len());
        for fetch in fetches {
            match fetch.result {
                Ok(candles) if !candles.is_empty() => batches.push((fetch.tf_id, candles)),
                Ok(_) => outcome.failed.push((fetch.tf_id, FeedError::Empty.to_string())),
                Err(e) => outcome.failed.push((fetch.tf_id, e.to_string())),
            }
        }

        let (analyses, errors) = analyze_parallel(&self.scanner, &self.config, batches);

        for err in errors {
            warn!(tf = %err.tf_id, error = %err.error, "keeping previous state");
            outcome.failed.push((err.tf_id, err.error.to_string()));
        }
        for analysis in analyses {
            debug!(
                tf = %analysis.tf_id,
                candles = analysis.candles.len(),
                patterns = analysis.patterns.len(),
                "timeframe analyzed"
            );
            outcome.refreshed.push(analysis.tf_id.clone());
            self.states.insert(analysis.tf_id.clone(), analysis.into());
        }
        outcome
    }

    pub fn timeframe_state(&self, tf_id: &str) -> Option<&TimeframeState> {
        self.states.get(tf_id)
    }

    pub fn metrics(&self, tf_id: &str) -> Option<&TfMetrics> {
        self.states.get(tf_id).and_then(|s| s.metrics.as_ref())
    }

    /// All detected patterns of a timeframe, index-ascending
    pub fn patterns(&self, tf_id: &str) -> &[PatternMatch] {
        self.states
            .get(tf_id)
            .map(|s| s.patterns.as_slice())
            .unwrap_or(&[])
    }

    /// Patterns that pass the configured per-kind toggles
    pub fn visible_patterns(&self, tf_id: &str) -> Vec<PatternMatch> {
        PatternFilter::new(self.config.patterns.clone()).apply(self.patterns(tf_id))
    }

    /// Best known price: the quote, else the latest close of the first
    /// enabled timeframe with data, else 0
    pub fn current_price(&self) -> f64 {
        if let Some(q) = self.quote.filter(|q| q.price > 0.0) {
            return q.price;
        }
        self.config
            .enabled_timeframes()
            .find_map(|tf| self.metrics(&tf.id))
            .map(|m| m.last_close)
            .unwrap_or(0.0)
    }

    /// Score the enabled timeframes and feed the result into the history
    /// tracker for the selected instrument
    pub fn evaluate_confluence(&mut self, now: DateTime<Utc>) -> ConfluenceResult {
        let result = self
            .scorer
            .score(&self.config.timeframes, |id| self.states.get(id).and_then(|s| s.metrics.as_ref()));

        if let Some(instrument) = self.instrument.clone() {
            let price = self.current_price();
            self.history
                .track(&instrument, result.score, result.bias, price, now);
        }

        debug!(
            score = result.score,
            bull = result.bull_count,
            bear = result.bear_count,
            "confluence evaluated"
        );
        self.last_confluence = Some(result.clone());
        result
    }

    pub fn last_confluence(&self) -> Option<&ConfluenceResult> {
        self.last_confluence.as_ref()
    }

    pub fn history(&self) -> &HistoryTracker {
        &self.history
    }

    /// Records of the selected instrument as they should be persisted
    pub fn persisted_history(&self) -> Vec<HistoryRecord> {
        match &self.instrument {
            Some(id) => self.history.persisted_view(id),
            None => Vec::new(),
        }
    }

    /// Candle-close alert for the configured timeframes
    pub fn closing_alert<T: Timelike>(&self, now: &T) -> ClosingAlert {
        closing_alert(&self.config.timeframes, now, &self.config.alerts)
    }
}
