//! File-backed store tests: persistence across reopenings, deletion, disk
//! accounting.

mod common;

use common::*;

use backlab::adapters::sqlite_store::SqliteStoreAdapter;
use backlab::domain::metrics::BacktestMetrics;
use backlab::domain::params::ParamSet;
use backlab::domain::record::{BacktestKey, GroupSet, QueryFilter, DEFAULT_EXIT_RULE};
use backlab::ports::store_port::StorePort;
use tempfile::TempDir;

fn open_at(dir: &TempDir) -> SqliteStoreAdapter {
    let path = dir.path().join("backtests.db");
    let store = SqliteStoreAdapter::at_path(path.to_str().unwrap(), 2).unwrap();
    store.initialize_schema().unwrap();
    store
}

fn sample_key() -> BacktestKey {
    BacktestKey::new(
        "AAPL",
        "rsi_meanrev",
        ParamSet::new()
            .with("rsi_period", 14)
            .with("oversold", 30.0)
            .with("overbought", 70.0),
        DEFAULT_EXIT_RULE,
    )
}

fn sample_metrics() -> BacktestMetrics {
    BacktestMetrics::compute(&[100_000.0, 104_000.0, 102_000.0, 108_000.0], 3)
}

#[test]
fn results_persist_across_store_instances() {
    let dir = TempDir::new().unwrap();
    let key = sample_key();
    let metrics = sample_metrics();

    {
        let store = open_at(&dir);
        let equity = vec![100_000.0, 104_000.0, 102_000.0, 108_000.0];
        store
            .store_backtest(&key, &metrics, Some(&equity), None, Some(&dates(4)), None)
            .unwrap();
    }

    // A fresh adapter over the same file sees everything.
    let reopened = open_at(&dir);
    let rows = reopened.query(&QueryFilter::all()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].metrics, metrics);
    assert_eq!(rows[0].start_date, "2020-01-01");
    assert_eq!(rows[0].end_date, "2020-01-04");

    let detailed = reopened.get_detailed(&key).unwrap().unwrap();
    assert_eq!(detailed.equity_curve.unwrap().len(), 4);
}

#[test]
fn group_sets_persist_across_store_instances() {
    let dir = TempDir::new().unwrap();

    {
        let store = open_at(&dir);
        store
            .save_group_set(&GroupSet {
                name: "persistent".into(),
                symbols: vec!["AAPL".into(), "MSFT".into()],
                strategies: vec!["rsi_meanrev".into()],
                params_list: vec![ParamSet::new().with("rsi_period", 14)],
                exit_rules: vec![DEFAULT_EXIT_RULE.into()],
                created_at: String::new(),
            })
            .unwrap();
    }

    let reopened = open_at(&dir);
    let loaded = reopened.load_group_set("persistent").unwrap().unwrap();
    assert_eq!(loaded.symbols, vec!["AAPL", "MSFT"]);
    assert_eq!(
        loaded.params_list[0],
        ParamSet::new().with("rsi_period", 14)
    );
}

#[test]
fn delete_persists() {
    let dir = TempDir::new().unwrap();
    let key = sample_key();

    {
        let store = open_at(&dir);
        store
            .store_backtest(&key, &sample_metrics(), None, None, None, None)
            .unwrap();
        assert!(store.delete(&key).unwrap());
    }

    let reopened = open_at(&dir);
    assert!(reopened.query(&QueryFilter::all()).unwrap().is_empty());
    assert!(!reopened.delete(&key).unwrap());
}

#[test]
fn summary_reports_disk_usage() {
    let dir = TempDir::new().unwrap();
    let store = open_at(&dir);

    let equity: Vec<f64> = (0..500).map(|i| 100_000.0 + i as f64).collect();
    store
        .store_backtest(
            &sample_key(),
            &sample_metrics(),
            Some(&equity),
            None,
            Some(&dates(500)),
            None,
        )
        .unwrap();

    let summary = store.summary().unwrap();
    assert_eq!(summary.total_backtests, 1);
    assert_eq!(summary.unique_symbols, 1);
    assert_eq!(summary.unique_strategies, 1);
    assert!(summary.storage_size_mb > 0.0);
}

#[test]
fn same_file_from_config_section() {
    use backlab::adapters::file_config_adapter::FileConfigAdapter;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("store.db");
    let config = FileConfigAdapter::from_string(&format!(
        "[store]\npath = {}\npool_size = 2\n",
        db_path.display()
    ))
    .unwrap();

    let store = SqliteStoreAdapter::from_config(&config).unwrap();
    store.initialize_schema().unwrap();
    store
        .store_backtest(&sample_key(), &sample_metrics(), None, None, None, None)
        .unwrap();

    assert!(db_path.exists());
    assert_eq!(store.summary().unwrap().total_backtests, 1);
}
