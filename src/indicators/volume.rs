//! Volume pressure: ratio against the trailing average, and VWAP

use crate::OHLCV;

/// Last candle's volume relative to the mean of the up to `period` candles
/// before it. Returns 1 for fewer than two candles or a zero mean.
pub fn volume_ratio<T: OHLCV>(bars: &[T], period: usize) -> f64 {
    if bars.len() < 2 || period == 0 {
        return 1.0;
    }
    let last = bars.len() - 1;
    let n = period.min(last);
    let avg = bars[last - n..last].iter().map(|b| b.volume()).sum::<f64>() / n as f64;
    if avg == 0.0 {
        return 1.0;
    }
    bars[last].volume() / avg
}

/// Cumulative volume-weighted average of the typical price `(h + l + c) / 3`.
/// While no volume has traded the typical price itself is reported.
pub fn vwap_series<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    let mut pv = 0.0;
    let mut vol = 0.0;
    bars.iter()
        .map(|b| {
            let typical = (b.high() + b.low() + b.close()) / 3.0;
            pv += typical * b.volume();
            vol += b.volume();
            if vol > 0.0 {
                pv / vol
            } else {
                typical
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    fn with_volumes(volumes: &[f64]) -> Vec<Candle> {
        volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| Candle::new(i as i64 * 60_000, 10.0, 11.0, 9.0, 10.5, v))
            .collect()
    }

    #[test]
    fn test_ratio_excludes_last_candle_from_average() {
        let mut volumes = vec![100.0; 20];
        volumes.push(300.0);
        assert!((volume_ratio(&with_volumes(&volumes), 20) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_short_series_uses_available_candles() {
        let bars = with_volumes(&[50.0, 150.0, 200.0]);
        assert!((volume_ratio(&bars, 20) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_fallbacks() {
        assert_eq!(volume_ratio(&with_volumes(&[500.0]), 20), 1.0);
        assert_eq!(volume_ratio(&with_volumes(&[0.0, 0.0, 10.0]), 20), 1.0);
    }

    #[test]
    fn test_ratio_window_is_trailing() {
        // Only the 2 candles before the last enter the mean
        let bars = with_volumes(&[1_000.0, 10.0, 30.0, 40.0]);
        assert!((volume_ratio(&bars, 2) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_vwap() {
        let bars = vec![
            Candle::new(0, 10.0, 12.0, 9.0, 12.0, 0.0),
            Candle::new(60_000, 10.0, 12.0, 9.0, 9.0, 2.0),
            Candle::new(120_000, 10.0, 14.0, 11.0, 11.0, 2.0),
        ];
        let vwap = vwap_series(&bars);
        assert_eq!(vwap[0], 11.0);
        assert_eq!(vwap[1], 10.0);
        assert_eq!(vwap[2], 11.0);
    }
}
