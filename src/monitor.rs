//! Refresh loops for the selected instrument
//!
//! A [`Monitor`] drives two independent `tokio` tasks against the shared
//! [`EngineContext`]: a short quote cycle and a longer full candle cycle.
//! Selecting another instrument aborts both tasks before the context is
//! switched, then starts fresh ones.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::confluence::ConfluenceResult;
use crate::engine::EngineContext;
use crate::feed::{fetch_timeframes, CandleSource};
use crate::history::HistoryStore;

pub struct Monitor {
    ctx: Arc<Mutex<EngineContext>>,
    source: Arc<dyn CandleSource>,
    store: Arc<dyn HistoryStore>,
    tasks: Vec<JoinHandle<()>>,
}

impl Monitor {
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn CandleSource>,
        store: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            ctx: Arc::new(Mutex::new(EngineContext::new(config))),
            source,
            store,
            tasks: Vec::new(),
        }
    }

    /// Shared handle to the engine state
    pub fn context(&self) -> Arc<Mutex<EngineContext>> {
        Arc::clone(&self.ctx)
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    /// Switch to `instrument` and start its refresh loops.
    ///
    /// Running loops are aborted first. Persisted history is loaded for the
    /// new instrument; a store failure is logged and the in-memory history
    /// is kept as it was.
    pub async fn select_instrument(&mut self, instrument: &str) {
        self.stop();

        let loaded = match self.store.load(instrument) {
            Ok(records) => records,
            Err(e) => {
                warn!(instrument, error = %e, "failed to load history");
                Vec::new()
            }
        };

        let refresh = {
            let mut ctx = self.ctx.lock().await;
            ctx.switch_instrument(instrument, loaded);
            ctx.config().refresh.clone()
        };

        self.tasks.push(self.spawn_quote_loop(refresh.quote_interval_ms));
        self.tasks.push(self.spawn_candle_loop(refresh.candle_interval_ms));
        info!(instrument, "refresh loops started");
    }

    /// Abort both refresh loops
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// One full candle refresh outside the loops
    pub async fn refresh_candles(&self) -> Option<ConfluenceResult> {
        refresh_candles_once(&self.ctx, self.source.as_ref(), self.store.as_ref()).await
    }

    /// One quote refresh outside the loops
    pub async fn refresh_quote(&self) -> bool {
        refresh_quote_once(&self.ctx, self.source.as_ref()).await
    }

    fn spawn_quote_loop(&self, period_ms: u64) -> JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_millis(period_ms.max(1)));
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                refresh_quote_once(&ctx, source.as_ref()).await;
            }
        })
    }

    fn spawn_candle_loop(&self, period_ms: u64) -> JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_millis(period_ms.max(1)));
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                refresh_candles_once(&ctx, source.as_ref(), store.as_ref()).await;
            }
        })
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fetch all enabled timeframes, apply the batch and evaluate confluence.
/// The history view is saved whenever the evaluation changed it.
async fn refresh_candles_once(
    ctx: &Mutex<EngineContext>,
    source: &dyn CandleSource,
    store: &dyn HistoryStore,
) -> Option<ConfluenceResult> {
    let (instrument, generation, timeframes, limit) = {
        let ctx = ctx.lock().await;
        let instrument = ctx.instrument()?.to_string();
        let config = ctx.config();
        (
            instrument,
            ctx.generation(),
            config.timeframes.clone(),
            config.refresh.candle_limit,
        )
    };

    let fetches = fetch_timeframes(source, &instrument, &timeframes, limit).await;

    let mut ctx = ctx.lock().await;
    let outcome = ctx.apply_fetches(generation, fetches);
    if outcome.stale {
        return None;
    }

    let revision = ctx.history().revision();
    let result = ctx.evaluate_confluence(Utc::now());
    if ctx.history().revision() != revision {
        if let Err(e) = store.save(&instrument, &ctx.persisted_history()) {
            warn!(instrument, error = %e, "failed to save history");
        }
    }
    debug!(
        instrument,
        refreshed = outcome.refreshed.len(),
        failed = outcome.failed.len(),
        score = result.score,
        "candle refresh complete"
    );
    Some(result)
}

async fn refresh_quote_once(ctx: &Mutex<EngineContext>, source: &dyn CandleSource) -> bool {
    let (instrument, generation) = {
        let ctx = ctx.lock().await;
        match ctx.instrument() {
            Some(id) => (id.to_string(), ctx.generation()),
            None => return false,
        }
    };

    match source.fetch_quote(&instrument).await {
        Ok(quote) => ctx.lock().await.set_quote(generation, quote),
        Err(e) => {
            warn!(instrument, error = %e, "quote refresh failed");
            false
        }
    }
}
