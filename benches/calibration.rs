//! Benchmarks for threshold calibration

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use imbalance_trader::calibration::{GridSearch, LabeledObservation, WalkForwardCalibrator};
use imbalance_trader::config::CalibrationConfig;
use imbalance_trader::market::MarketSnapshot;

fn observations(n: usize) -> Vec<LabeledObservation> {
    (0..n)
        .map(|i| {
            let phase = i as f64 * 0.37;
            let imbalance = phase.sin() * 0.6;
            LabeledObservation {
                imbalance,
                forward_return: imbalance * 1e-4 + (phase * 3.1).cos() * 5e-5,
            }
        })
        .collect()
}

fn benchmark_grid_search(c: &mut Criterion) {
    let grid = GridSearch {
        grid_min: 0.02,
        grid_max: 0.5,
        grid_step: 0.02,
        min_trades: 20,
        turnover_penalty_alpha: 0.5,
    };
    let obs = observations(300);

    c.bench_function("grid_search_300", |b| {
        b.iter(|| grid.run(black_box(&obs), 300))
    });
}

fn benchmark_calibrator_update(c: &mut Criterion) {
    let config = CalibrationConfig {
        enabled: true,
        ..Default::default()
    };
    let snapshots: Vec<MarketSnapshot> = (0..1_000)
        .map(|i| {
            let wave = (i as f64 * 0.21).sin();
            MarketSnapshot::new(
                Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap(),
                100.0 + wave,
                100.5 + wave,
                1.0 + wave.abs(),
                1.0,
            )
        })
        .collect();

    c.bench_function("calibrator_update_1000", |b| {
        b.iter(|| {
            let mut calibrator = WalkForwardCalibrator::new(&config);
            for snapshot in &snapshots {
                calibrator.update(black_box(snapshot));
                black_box(calibrator.current_threshold(0.06));
            }
        })
    });
}

criterion_group!(benches, benchmark_grid_search, benchmark_calibrator_update);
criterion_main!(benches);
