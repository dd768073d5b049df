//! Integration tests for confluence scoring, the history log and configuration

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use confluence_engine::prelude::*;

fn metrics(tf: &str, bullish: bool) -> TfMetrics {
    TfMetrics {
        tf_id: tf.to_string(),
        is_bullish: bullish,
        body_pct: 50.0,
        upper_wick_pct: 25.0,
        lower_wick_pct: 25.0,
        change_pct: 0.0,
        volume_ratio: 1.0,
        buy_pct: 50.0,
        sell_pct: 50.0,
        last_close: 100.0,
        rsi: 50.0,
        rsi_series: Vec::new(),
        macd: MacdSnapshot {
            is_bullish: bullish,
            ..Default::default()
        },
        macd_series: Vec::new(),
        alerts: AlertFlags::default(),
    }
}

fn two_frames() -> Vec<Timeframe> {
    vec![Timeframe::new("5m", 5, true), Timeframe::new("15m", 15, true)]
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

// ============================================================
// CONFLUENCE
// ============================================================

#[test]
fn test_split_vote_with_equal_weights_is_fifty() {
    let scorer = ConfluenceScorer {
        method: WeightMethod::Equal,
        ..Default::default()
    };
    let data: HashMap<&str, TfMetrics> =
        [("5m", metrics("5m", true)), ("15m", metrics("15m", false))].into_iter().collect();

    let result = scorer.score(&two_frames(), |id| data.get(id));
    assert_eq!(result.score, 50.0);
    assert_eq!(result.bull_count, 1);
    assert_eq!(result.bear_count, 1);
    // ties go to the bears
    assert_eq!(result.bias, Bias::Bear);
    assert_eq!(result.weights.len(), 2);
}

#[test]
fn test_no_contributors_is_neutral() {
    let scorer = ConfluenceScorer::default();
    let result = scorer.score(&two_frames(), |_| None);
    assert_eq!(result.score, 50.0);
    assert_eq!(result.bull_count, 0);
    assert_eq!(result.bear_count, 0);
    assert_eq!(result.contributing(), 0);
    assert!(result.weights.is_empty());
}

#[test]
fn test_disabled_timeframes_do_not_vote() {
    let scorer = ConfluenceScorer::default();
    let frames = vec![Timeframe::new("5m", 5, true), Timeframe::new("15m", 15, false)];
    let data: HashMap<&str, TfMetrics> =
        [("5m", metrics("5m", true)), ("15m", metrics("15m", false))].into_iter().collect();

    let result = scorer.score(&frames, |id| data.get(id));
    assert_eq!(result.score, 100.0);
    assert_eq!(result.bias, Bias::Bull);
    assert_eq!(result.contributing(), 1);
}

#[test]
fn test_modifiers_scale_weight() {
    let scorer = ConfluenceScorer::default();
    let mut m = metrics("1h", true);
    m.body_pct = 80.0;
    m.volume_ratio = 2.0;

    let w = scorer.weigh(&Timeframe::new("1h", 60, true), &m);
    assert_eq!(w.base, 5.0);
    assert_eq!(
        w.modifiers,
        vec![
            AppliedModifier::StrongBody,
            AppliedModifier::HighVolume,
            AppliedModifier::IndicatorsConfirm
        ]
    );
    assert!((w.final_weight - 5.0 * 1.5 * 1.3 * 1.4).abs() < 1e-9);
    assert_eq!(w.direction, Direction::Bullish);
}

#[test]
fn test_score_is_bullish_weight_share() {
    let scorer = ConfluenceScorer {
        method: WeightMethod::Exponential,
        use_strength_modifier: false,
        use_volume_modifier: false,
        use_indicator_modifier: false,
        ..Default::default()
    };
    let frames = vec![Timeframe::new("5m", 5, true), Timeframe::new("4h", 240, true)];
    let data: HashMap<&str, TfMetrics> =
        [("5m", metrics("5m", false)), ("4h", metrics("4h", true))].into_iter().collect();

    let result = scorer.score(&frames, |id| data.get(id));
    // 32 / (2 + 32)
    assert!((result.score - 32.0 / 34.0 * 100.0).abs() < 1e-9);
    assert!((0.0..=100.0).contains(&result.score));
}

// ============================================================
// HISTORY
// ============================================================

#[test]
fn test_admission_is_throttled() {
    let mut tracker = HistoryTracker::default();
    assert!(tracker.track("BTCUSDT", 75.0, Bias::Bull, 100.0, t0()).is_some());
    assert!(tracker
        .track("BTCUSDT", 75.0, Bias::Bull, 100.0, t0() + Duration::minutes(2))
        .is_none());
    assert_eq!(tracker.records().len(), 1);

    assert!(tracker
        .track("BTCUSDT", 80.0, Bias::Bull, 100.0, t0() + Duration::minutes(5))
        .is_some());
    assert_eq!(tracker.records().len(), 2);
    assert_eq!(tracker.records()[0].confluence_score, 80.0);
}

#[test]
fn test_middle_scores_are_not_recorded() {
    let mut tracker = HistoryTracker::default();
    assert!(tracker.track("ETHUSDT", 50.0, Bias::Bear, 10.0, t0()).is_none());
    assert!(tracker.track("ETHUSDT", 69.9, Bias::Bull, 10.0, t0()).is_none());
    assert!(tracker.track("ETHUSDT", 30.0, Bias::Bear, 10.0, t0()).is_some());
}

#[test]
fn test_spacing_is_per_instrument() {
    let mut tracker = HistoryTracker::default();
    assert!(tracker.track("BTCUSDT", 90.0, Bias::Bull, 100.0, t0()).is_some());
    assert!(tracker.track("ETHUSDT", 10.0, Bias::Bear, 50.0, t0()).is_some());
    assert_eq!(tracker.records_for("BTCUSDT").count(), 1);
    assert_eq!(tracker.records_for("ETHUSDT").count(), 1);
}

#[test]
fn test_result_locks_after_thirty_minutes() {
    let mut tracker = HistoryTracker::default();
    tracker.track("BTCUSDT", 75.0, Bias::Bull, 100.0, t0());

    tracker.backfill("BTCUSDT", 110.0, t0() + Duration::minutes(10));
    let rec = tracker.latest_for("BTCUSDT").unwrap();
    assert!((rec.result.unwrap() - 10.0).abs() < 1e-9);
    assert!(!rec.result_locked);

    tracker.backfill("BTCUSDT", 120.0, t0() + Duration::minutes(30));
    let rec = tracker.latest_for("BTCUSDT").unwrap();
    assert!((rec.result.unwrap() - 20.0).abs() < 1e-9);
    assert!(rec.result_locked);

    assert_eq!(tracker.backfill("BTCUSDT", 130.0, t0() + Duration::minutes(40)), 0);
    let rec = tracker.latest_for("BTCUSDT").unwrap();
    assert!((rec.result.unwrap() - 20.0).abs() < 1e-9);
}

#[test]
fn test_backfill_skips_unknown_prices() {
    let mut tracker = HistoryTracker::default();
    tracker.track("BTCUSDT", 75.0, Bias::Bull, 0.0, t0());
    tracker.track("ETHUSDT", 75.0, Bias::Bull, 50.0, t0());

    assert_eq!(tracker.backfill("BTCUSDT", 110.0, t0() + Duration::minutes(1)), 0);
    assert_eq!(tracker.backfill("ETHUSDT", 0.0, t0() + Duration::minutes(1)), 0);
    assert!(tracker.records().iter().all(|r| r.result.is_none()));
}

#[test]
fn test_log_is_capped() {
    let mut tracker = HistoryTracker::default();
    for i in 0..25 {
        tracker.track("BTCUSDT", 90.0, Bias::Bull, 100.0, t0() + Duration::minutes(10 * i));
    }
    assert_eq!(tracker.records().len(), 20);
    assert_eq!(tracker.records()[0].timestamp, t0() + Duration::minutes(240));
    assert_eq!(tracker.persisted_view("BTCUSDT").len(), 10);
}

#[test]
fn test_record_display_time() {
    let rec = HistoryRecord::new("BTCUSDT", 72.5, Bias::Bull, 100.0, t0() + Duration::minutes(7));
    assert_eq!(rec.display_time, "12:07");
    assert_eq!(rec.result, None);
    assert!(!rec.result_locked);
}

#[test]
fn test_memory_store_round_trip() {
    let store = MemoryStore::new();
    let mut tracker = HistoryTracker::default();
    tracker.track("SOLUSDT", 15.0, Bias::Bear, 20.0, t0());
    store.save("SOLUSDT", &tracker.persisted_view("SOLUSDT")).unwrap();

    let loaded = store.load("SOLUSDT").unwrap();
    assert_eq!(loaded, tracker.persisted_view("SOLUSDT"));
    assert!(store.load("BTCUSDT").unwrap().is_empty());
}

#[test]
fn test_switch_without_saved_history_keeps_records() {
    let mut tracker = HistoryTracker::default();
    tracker.track("BTCUSDT", 80.0, Bias::Bull, 100.0, t0());

    tracker.merge_loaded("BTCUSDT", Vec::new());
    assert_eq!(tracker.records_for("BTCUSDT").count(), 1);
    assert_eq!(tracker.latest_for("BTCUSDT").unwrap().confluence_score, 80.0);
}

#[test]
fn test_merge_keeps_log_capped() {
    let mut tracker = HistoryTracker::default();
    for i in 0..20 {
        tracker.track("ETHUSDT", 90.0, Bias::Bull, 10.0, t0() + Duration::minutes(5 * i));
    }
    let saved: Vec<_> = (1..=10)
        .map(|i| HistoryRecord::new("BTCUSDT", 85.0, Bias::Bull, 100.0, t0() - Duration::hours(i)))
        .collect();
    tracker.merge_loaded("BTCUSDT", saved);

    assert!(tracker.records().len() <= 20);
    assert_eq!(tracker.records_for("BTCUSDT").count(), 10);
    assert_eq!(tracker.records()[0].instrument_id, "BTCUSDT");
}

#[test]
fn test_json_store_keeps_similar_ids_apart() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());
    let slash = HistoryRecord::new("BTC/USDT", 80.0, Bias::Bull, 100.0, t0());
    let underscore = HistoryRecord::new("BTC_USDT", 20.0, Bias::Bear, 50.0, t0());

    store.save("BTC/USDT", &[slash.clone()]).unwrap();
    store.save("BTC_USDT", &[underscore.clone()]).unwrap();

    assert_eq!(store.load("BTC/USDT").unwrap(), vec![slash]);
    assert_eq!(store.load("BTC_USDT").unwrap(), vec![underscore]);
}

// ============================================================
// CONFIG
// ============================================================

#[test]
fn test_config_toml_round_trip() {
    let mut config = EngineConfig::default();
    config.confluence.weight_method = WeightMethod::Tiered;
    config.set_timeframe_enabled("4h", true);
    config.patterns.hide(PatternKind::SpinningTop);

    let text = config.to_toml_string().unwrap();
    let back = EngineConfig::from_toml_str(&text).unwrap();

    assert_eq!(back.confluence.weight_method, WeightMethod::Tiered);
    assert!(back.timeframe("4h").unwrap().enabled);
    assert!(!back.patterns.is_visible(PatternKind::SpinningTop));
    assert!(back.patterns.is_visible(PatternKind::Doji));
    assert_eq!(back.timeframes.len(), 6);
}

#[test]
fn test_partial_config_uses_defaults() {
    let config = EngineConfig::from_toml_str(
        r#"
[rsi]
overbought = 75.0

[confluence]
weight_method = "exponential"
"#,
    )
    .unwrap();
    assert_eq!(config.rsi.overbought, 75.0);
    assert_eq!(config.rsi.oversold, 30.0);
    assert_eq!(config.confluence.weight_method, WeightMethod::Exponential);
    assert_eq!(config.history.max_records, 20);
    let enabled: Vec<_> = config.enabled_timeframes().map(|tf| tf.id.as_str()).collect();
    assert_eq!(enabled, vec!["5m", "15m", "1h"]);
}

#[test]
fn test_inconsistent_config_rejected() {
    let err = EngineConfig::from_toml_str("[rsi]\noverbought = 20.0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = EngineConfig::from_toml_str("[history]\nmax_records = \"lots\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}
