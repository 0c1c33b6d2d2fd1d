use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{Days, NaiveDate, TimeZone, Utc};
use stockflow_ai::{DailySeries, DemandForecaster, ForecastWindow};
use stockflow_core::{BranchId, Money, ProductId};
use stockflow_infra::BatchLedger;

/// Ledger with `batches` single-unit batches of one product, every other one dated.
fn seeded_ledger(batches: usize) -> (BatchLedger, ProductId, BranchId) {
    let ledger = BatchLedger::new();
    let (p, b) = (ProductId::new(), BranchId::new());
    let at = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
    let start = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    for i in 0..batches {
        let expiry = (i % 2 == 0).then(|| start + Days::new(i as u64));
        ledger
            .replenish(p, b, expiry, Money::from_minor(100 + i as u64), 1, at)
            .unwrap();
    }
    (ledger, p, b)
}

fn bench_fifo_consumption(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_consumption");
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 8, 0, 0).unwrap();

    for batches in [10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(batches as u64));
        group.bench_with_input(BenchmarkId::new("drain_all_batches", batches), &batches, |bencher, &n| {
            bencher.iter_batched(
                || seeded_ledger(n),
                |(ledger, p, b)| black_box(ledger.consume_fifo(p, b, n as i64, at).unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("insufficient_stock", batches), &batches, |bencher, &n| {
            let (ledger, p, b) = seeded_ledger(n);
            bencher.iter(|| black_box(ledger.consume_fifo(p, b, n as i64 + 1, at).is_err()));
        });
    }
    group.finish();
}

fn bench_forecast_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("forecast_batch");
    let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let to = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
    let window = ForecastWindow::new(from, to).unwrap();
    let forecaster = DemandForecaster::new(window, 30);

    for products in [10usize, 100] {
        let series: Vec<(ProductId, DailySeries)> = (0..products)
            .map(|i| {
                let points = (0..90u64).map(|d| (from + Days::new(d), ((d as i64 * 7 + i as i64) % 5) + 1));
                (ProductId::new(), DailySeries::from_points(points))
            })
            .collect();

        group.throughput(Throughput::Elements(products as u64));
        group.bench_with_input(BenchmarkId::new("products", products), &series, |bencher, series| {
            bencher.iter(|| black_box(forecaster.forecast_batch(series.iter().map(|(p, s)| (*p, s)))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fifo_consumption, bench_forecast_batch);
criterion_main!(benches);
