//! Timeframe catalog and candle-close countdowns

use chrono::Timelike;

use crate::config::AlertConfig;

/// One candle resolution the engine tracks
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Timeframe {
    /// Stable key, also the interval name passed to the candle source
    pub id: String,
    pub label: String,
    pub minutes: u32,
    pub enabled: bool,
}

impl Timeframe {
    pub fn new(id: &str, minutes: u32, enabled: bool) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            minutes,
            enabled,
        }
    }

    #[inline]
    pub fn seconds(&self) -> u32 {
        self.minutes * 60
    }

    /// Default catalog: 5m, 15m and 1h enabled
    pub fn default_catalog() -> Vec<Timeframe> {
        vec![
            Timeframe::new("1m", 1, false),
            Timeframe::new("5m", 5, true),
            Timeframe::new("15m", 15, true),
            Timeframe::new("30m", 30, false),
            Timeframe::new("1h", 60, true),
            Timeframe::new("4h", 240, false),
        ]
    }
}

/// Seconds until the current candle of `tf` closes, in `1..=tf.seconds()`.
///
/// Four-hour candles are aligned to hours divisible by four; every other
/// frame is aligned within the current hour.
pub fn seconds_to_close<T: Timelike>(tf: &Timeframe, now: &T) -> u32 {
    let minute = now.minute();
    let second = now.second().min(59);

    if tf.minutes == 240 {
        let remaining_hours = 3 - now.hour() % 4;
        return remaining_hours * 3600 + (59 - minute) * 60 + (60 - second);
    }

    let tf_secs = tf.seconds().max(1);
    tf_secs - ((minute * 60 + second) % tf_secs)
}

/// `M:SS`, or `H:MM:SS` from one hour up
pub fn format_countdown(seconds: u32) -> String {
    if seconds >= 3600 {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        return format!("{hours}:{mins:02}:{:02}", seconds % 60);
    }
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Enabled timeframes about to close at the same moment
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ClosingAlert {
    pub alerting: Vec<String>,
    pub count: usize,
    pub triggered: bool,
}

/// Count enabled timeframes within `alert_seconds` of closing.
/// `triggered` once at least `min_confluence` of them line up.
pub fn closing_alert<T: Timelike>(
    timeframes: &[Timeframe],
    now: &T,
    alerts: &AlertConfig,
) -> ClosingAlert {
    let alerting: Vec<String> = timeframes
        .iter()
        .filter(|tf| tf.enabled && seconds_to_close(tf, now) <= alerts.alert_seconds)
        .map(|tf| tf.id.clone())
        .collect();
    let count = alerting.len();
    ClosingAlert {
        alerting,
        count,
        triggered: count >= alerts.min_confluence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn tf(minutes: u32) -> Timeframe {
        Timeframe::new("x", minutes, true)
    }

    #[test]
    fn test_five_minute_countdown() {
        assert_eq!(seconds_to_close(&tf(5), &at(10, 3, 20)), 100);
        assert_eq!(seconds_to_close(&tf(5), &at(10, 5, 0)), 300);
    }

    #[test]
    fn test_hourly_countdown() {
        assert_eq!(seconds_to_close(&tf(60), &at(10, 59, 30)), 30);
    }

    #[test]
    fn test_four_hour_alignment() {
        // Buckets close at 0, 4, 8, 12, 16 and 20 o'clock
        assert_eq!(seconds_to_close(&tf(240), &at(13, 59, 30)), 2 * 3600 + 30);
        assert_eq!(seconds_to_close(&tf(240), &at(15, 59, 30)), 30);
        assert_eq!(seconds_to_close(&tf(240), &at(16, 0, 0)), 4 * 3600);
    }

    #[test]
    fn test_countdown_stays_in_bounds() {
        for minutes in [1, 5, 15, 30, 60, 240] {
            let frame = tf(minutes);
            for h in 0..24 {
                for m in (0..60).step_by(7) {
                    for s in (0..60).step_by(13) {
                        let secs = seconds_to_close(&frame, &at(h, m, s));
                        assert!(secs > 0 && secs <= frame.seconds(), "{minutes}m {h}:{m}:{s} -> {secs}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(65), "1:05");
        assert_eq!(format_countdown(3_725), "1:02:05");
        assert_eq!(format_countdown(0), "0:00");
    }

    #[test]
    fn test_closing_alert_counts_enabled_only() {
        let catalog = Timeframe::default_catalog();
        let alerts = AlertConfig::default();
        // 10:59:45: 1m, 5m, 15m, 30m, 1h all within 15 s; 1m and 30m are disabled
        let alert = closing_alert(&catalog, &at(10, 59, 45), &alerts);
        assert_eq!(alert.alerting, vec!["5m", "15m", "1h"]);
        assert_eq!(alert.count, 3);
        assert!(alert.triggered);

        let quiet = closing_alert(&catalog, &at(10, 57, 0), &alerts);
        assert!(!quiet.triggered);
    }
}
