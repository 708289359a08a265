//! Integration tests for the Parquet warehouse and window artifacts on disk.

use chrono::NaiveDate;
use pricewin_core::data::{
    Canonicalizer, DataError, ParquetWarehouse, PriceStore, RawPriceRow,
};
use pricewin_core::domain::PriceRow;
use pricewin_core::window::{latest_alias_path, materialize, window_path};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn raw_day(date: &str, tickers: &[&str], base: f64) -> Vec<RawPriceRow> {
    tickers
        .iter()
        .enumerate()
        .map(|(i, t)| RawPriceRow::on_date(d(date), *t, base + i as f64))
        .collect()
}

#[test]
fn reingesting_same_batch_is_byte_stable() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ParquetWarehouse::new(dir.path());

    let batch = Canonicalizer::clean(raw_day("2024-01-02", &["SPY", "AAPL"], 100.0))
        .unwrap()
        .rows;
    store.merge_upsert(&batch).unwrap();
    let first = std::fs::read(store.table_path()).unwrap();

    store.merge_upsert(&batch).unwrap();
    let second = std::fs::read(store.table_path()).unwrap();

    assert_eq!(first, second);
    assert_eq!(store.load().unwrap().len(), 2);
}

#[test]
fn correction_overwrites_stored_close() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ParquetWarehouse::new(dir.path());

    store
        .merge_upsert(&[PriceRow::new(d("2024-01-02"), "SPY", 470.0)])
        .unwrap();
    store
        .merge_upsert(&[PriceRow::new(d("2024-01-02"), "SPY", 471.25)])
        .unwrap();

    let rows = store.load().unwrap();
    assert_eq!(rows, vec![PriceRow::new(d("2024-01-02"), "SPY", 471.25)]);
}

#[test]
fn rejected_batch_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ParquetWarehouse::new(dir.path());
    let good = Canonicalizer::clean(raw_day("2024-01-02", &["SPY"], 100.0))
        .unwrap()
        .rows;
    store.merge_upsert(&good).unwrap();
    let before = std::fs::read(store.table_path()).unwrap();

    let tickers: Vec<String> = (0..100).map(|i| format!("T{i:03}")).collect();
    let refs: Vec<&str> = tickers.iter().map(|s| s.as_str()).collect();
    let mut bad = raw_day("2024-01-03", &refs, 10.0);
    bad.push(RawPriceRow::on_date(d("2024-01-03"), "BAD", -1.0));

    let result = Canonicalizer::clean(bad).map(|batch| store.merge_upsert(&batch.rows));
    assert!(matches!(result, Err(DataError::BadValues { count: 1 })));

    let after = std::fs::read(store.table_path()).unwrap();
    assert_eq!(before, after);
    assert_eq!(store.last_stored_date().unwrap(), Some(d("2024-01-02")));
}

#[test]
fn alias_matches_latest_window_after_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ParquetWarehouse::new(dir.path().join("store"));
    let out = dir.path().join("compute_inputs");

    for (i, day) in ["2024-01-08", "2024-01-09", "2024-01-10", "2024-01-11", "2024-01-12"]
        .iter()
        .enumerate()
    {
        let batch = Canonicalizer::clean(raw_day(day, &["SPY", "QQQ", "AAPL"], 100.0 + i as f64))
            .unwrap()
            .rows;
        store.merge_upsert(&batch).unwrap();
    }

    let rows = store.load().unwrap();
    let targets = [d("2024-01-10"), d("2024-01-11"), d("2024-01-12")];
    let report = materialize(&rows, 3, &targets, &out).unwrap();

    assert_eq!(report.written_dates(), targets.to_vec());
    assert_eq!(
        std::fs::read(latest_alias_path(&out)).unwrap(),
        std::fs::read(window_path(&out, d("2024-01-12"))).unwrap()
    );
}
