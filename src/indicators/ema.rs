//! Moving averages: the SMA-seeded EMA used by MACD, and the overlay lines

/// Exponential moving average of `values`, seeded with the simple mean of
/// the first `period` values.
///
/// With fewer than `period` values the last value is returned (0 when empty).
pub fn ema(values: &[f64], period: usize) -> f64 {
    running_ema(values, period)
        .last()
        .copied()
        .unwrap_or_else(|| values.last().copied().unwrap_or(0.0))
}

/// Every intermediate value of [`ema`]: element `k` is the EMA of
/// `values[..period + k]`. Empty when the input is shorter than `period`.
pub(crate) fn running_ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut current = seed;
    for &x in &values[period..] {
        current = (x - current) * k + current;
        out.push(current);
    }
    out
}

/// Incremental EMA seeded with the first observation.
///
/// bar 0  → value = price
/// bar 1+ → value = (price - prev) * k + prev, k = 2/(period+1)
#[derive(Debug, Clone)]
pub struct Ema {
    k: f64,
    pub value: f64,
    count: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            k: 2.0 / (period as f64 + 1.0),
            value: 0.0,
            count: 0,
        }
    }

    /// Feed one price, return the current EMA value.
    pub fn update(&mut self, price: f64) -> f64 {
        if self.count == 0 {
            self.value = price;
        } else {
            self.value = (price - self.value) * self.k + self.value;
        }
        self.count += 1;
        self.value
    }
}

/// EMA overlay line, one value per close. None if the series is shorter than `period`.
pub fn ema_overlay(closes: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let mut ema = Ema::new(period);
    Some(closes.iter().map(|&c| ema.update(c)).collect())
}

/// Simple moving average line aligned to the closes: `None` for the first
/// `period - 1` slots. None overall if the series is shorter than `period`.
pub fn sma_overlay(closes: &[f64], period: usize) -> Option<Vec<Option<f64>>> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let n = period as f64;
    let mut out = vec![None; period - 1];
    let mut sum: f64 = closes[..period - 1].iter().sum();
    for i in period - 1..closes.len() {
        sum += closes[i];
        out.push(Some(sum / n));
        sum -= closes[i + 1 - period];
    }
    Some(out)
}
