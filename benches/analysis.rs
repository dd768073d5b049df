//! Benchmarks for pattern scanning, indicator analysis and batch application.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use confluence_engine::prelude::*;

/// Generate realistic random candles
fn generate_candles(n: usize) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0; // Deterministic "random"
        let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;
        let volume = 1_000.0 + ((i * 11) % 17) as f64 * 150.0;

        let o = price;
        let c = price + change;
        let h = o.max(c) + volatility * 0.5;
        let l = o.min(c) - volatility * 0.5;

        candles.push(Candle::new(i as i64 * 60_000, o, h, l, c, volume));
        price = c;
    }

    candles
}

fn bench_scan(c: &mut Criterion) {
    let candles = generate_candles(1000);
    let scanner = PatternScanner::default();

    c.bench_function("scan_all_patterns_1000_candles", |b| {
        b.iter(|| {
            let _ = black_box(scanner.scan(black_box(&candles)));
        })
    });
}

fn bench_analyze(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut group = c.benchmark_group("analyze");

    for size in [100, 200, 500, 1000] {
        let candles = generate_candles(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &candles, |b, candles| {
            b.iter(|| black_box(analyze("5m", black_box(candles), &config)));
        });
    }

    group.finish();
}

fn bench_apply_fetches(c: &mut Criterion) {
    let mut ctx = EngineContext::new(EngineConfig::default());
    let generation = ctx.switch_instrument("BTCUSDT", Vec::new());
    let candles = generate_candles(200);

    c.bench_function("apply_three_timeframes_200_candles", |b| {
        b.iter(|| {
            let fetches = ["5m", "15m", "1h"]
                .iter()
                .map(|tf| TimeframeFetch::ok(tf, candles.clone()))
                .collect();
            black_box(ctx.apply_fetches(generation, fetches))
        })
    });
}

criterion_group!(benches, bench_scan, bench_analyze, bench_apply_fetches);
criterion_main!(benches);
