//! Criterion benchmarks for warehouse and window hot paths.
//!
//! Benchmarks:
//! 1. In-memory merge of one trading day over growing history
//! 2. Window selection + pivot across a backfill of target dates

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pricewin_core::data::{distinct_dates, merge_rows};
use pricewin_core::domain::PriceRow;
use pricewin_core::window::{pivot, WindowSelection, WindowSelector};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_rows(days: usize, tickers: usize) -> Vec<PriceRow> {
    let base = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    let mut rows = Vec::with_capacity(days * tickers);
    for d in 0..days {
        let date = base + Duration::days(d as i64);
        for t in 0..tickers {
            let close = 100.0 + ((d * 7 + t) as f64 * 0.1).sin() * 10.0;
            rows.push(PriceRow::new(date, format!("T{t:03}"), close));
        }
    }
    rows
}

// ── 1. Merge ─────────────────────────────────────────────────────────

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_upsert");

    for days in [250usize, 1250] {
        let existing = make_rows(days, 100);
        let new_day: Vec<PriceRow> = make_rows(days + 1, 100).split_off(days * 100);
        group.bench_with_input(BenchmarkId::new("100_tickers", days), &days, |b, _| {
            b.iter(|| merge_rows(black_box(existing.clone()), black_box(&new_day)))
        });
    }

    group.finish();
}

// ── 2. Window selection ──────────────────────────────────────────────

fn bench_windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_select_pivot");
    let rows = make_rows(1250, 100);
    let targets = distinct_dates(&rows);

    group.bench_function("backfill_1250_dates_len_51", |b| {
        b.iter(|| {
            let selector = WindowSelector::new(black_box(&rows));
            let mut accepted = 0usize;
            for target in &targets {
                if let WindowSelection::Selected(window) = selector.select(51, *target) {
                    accepted += pivot(window).n_rows();
                }
            }
            accepted
        })
    });

    group.finish();
}

criterion_group!(benches, bench_merge, bench_windows);
criterion_main!(benches);
