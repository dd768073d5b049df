//! Market-data boundary
//!
//! The engine does not talk to any exchange itself. A [`CandleSource`]
//! supplies candles and quotes; [`fetch_timeframes`] fans out one request per
//! enabled timeframe and keeps every outcome, so one failing interval never
//! blocks the others.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::timeframe::Timeframe;
use crate::Candle;

/// Error types for candle retrieval
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeedError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Empty candle series")]
    Empty,
}

/// Latest ticker snapshot of an instrument
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Quote {
    pub price: f64,
    /// 24h change in percent
    pub change_pct: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

/// Provider of candles and quotes
#[async_trait::async_trait]
pub trait CandleSource: Send + Sync {
    /// Most recent `limit` candles of one interval, oldest first
    async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe_id: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, FeedError>;

    async fn fetch_quote(&self, instrument: &str) -> Result<Quote, FeedError>;

    /// Source name
    fn name(&self) -> &str {
        "candle-source"
    }
}

/// Outcome of one timeframe's fetch within a batch
#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeFetch {
    pub tf_id: String,
    pub result: Result<Vec<Candle>, FeedError>,
}

impl TimeframeFetch {
    pub fn ok(tf_id: &str, candles: Vec<Candle>) -> Self {
        Self {
            tf_id: tf_id.to_string(),
            result: Ok(candles),
        }
    }

    pub fn err(tf_id: &str, error: FeedError) -> Self {
        Self {
            tf_id: tf_id.to_string(),
            result: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.result, Ok(ref c) if !c.is_empty())
    }
}

/// Fetch every enabled timeframe concurrently.
///
/// Returns one entry per enabled timeframe in catalog order. An empty series
/// is reported as [`FeedError::Empty`], a series whose open times do not
/// strictly ascend as [`FeedError::InvalidResponse`].
pub async fn fetch_timeframes(
    source: &dyn CandleSource,
    instrument: &str,
    timeframes: &[Timeframe],
    limit: usize,
) -> Vec<TimeframeFetch> {
    let enabled: Vec<&Timeframe> = timeframes.iter().filter(|tf| tf.enabled).collect();

    let futures = enabled
        .iter()
        .map(|tf| source.fetch_candles(instrument, &tf.id, limit));
    let results = join_all(futures).await;

    enabled
        .into_iter()
        .zip(results)
        .map(|(tf, result)| {
            let result = match result {
                Ok(candles) if candles.is_empty() => Err(FeedError::Empty),
                Ok(candles) if !is_ascending(&candles) => Err(FeedError::InvalidResponse(
                    "candles not in ascending open time order".into(),
                )),
                other => other,
            };
            match &result {
                Ok(candles) => debug!(instrument, tf = %tf.id, count = candles.len(), "candles fetched"),
                Err(e) => warn!(
                    instrument,
                    tf = %tf.id,
                    source = source.name(),
                    "Source error: {}",
                    e
                ),
            }
            TimeframeFetch {
                tf_id: tf.id.clone(),
                result,
            }
        })
        .collect()
}

fn is_ascending(candles: &[Candle]) -> bool {
    candles.windows(2).all(|w| w[0].open_time < w[1].open_time)
}
