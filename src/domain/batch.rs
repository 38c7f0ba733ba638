//! Batch driver: the symbols × strategies × exit-rules loop.
//!
//! Units run strictly in sequence. A failing unit is counted and logged,
//! never retried, and never blocks the rest of the batch. The progress
//! callback fires after every unit, success or failure.

use log::warn;

use super::engine::simulate;
use super::error::BacklabError;
use super::market_data::MarketData;
use super::metrics::BacktestMetrics;
use super::params::ParamSet;
use super::record::BacktestKey;
use super::strategy::StrategySpec;
use super::trade::extract_trades;
use crate::ports::data_port::DataPort;
use crate::ports::store_port::StorePort;

/// One completed unit of the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    pub symbol: String,
    pub strategy: String,
    pub params: ParamSet,
    pub exit_rule: String,
    pub metrics: BacktestMetrics,
}

/// Batch-level accounting, always observable even under partial failure.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStats {
    pub total_jobs: usize,
    pub completed: usize,
    pub errors: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub rows: Vec<BatchRow>,
    pub stats: JobStats,
}

/// Run every (symbol, strategy, exit rule) combination through the engine,
/// extractor, metrics calculator, and store.
pub fn run_batch(
    data_port: &dyn DataPort,
    store: &dyn StorePort,
    symbols: &[String],
    strategies: &[StrategySpec],
    exit_rules: &[String],
    initial_capital: f64,
    mut progress: impl FnMut(usize, usize, &str),
) -> BatchOutcome {
    let total_jobs = symbols.len() * strategies.len() * exit_rules.len();
    let mut rows = Vec::new();
    let mut completed = 0;
    let mut errors = 0;
    let mut current = 0;

    for symbol in symbols {
        let data = data_port.load(symbol);

        for spec in strategies {
            for exit_rule in exit_rules {
                current += 1;
                let unit = format!("{symbol} {} {exit_rule}", spec.name());

                let result = match &data {
                    Ok(table) => run_unit(store, symbol, spec, exit_rule, table, initial_capital)
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                };

                match result {
                    Ok(metrics) => {
                        completed += 1;
                        rows.push(BatchRow {
                            symbol: symbol.clone(),
                            strategy: spec.name().to_string(),
                            params: spec.params(),
                            exit_rule: exit_rule.clone(),
                            metrics,
                        });
                        progress(current, total_jobs, &format!("{unit}: done"));
                    }
                    Err(e) => {
                        errors += 1;
                        warn!("batch unit {unit} failed: {e}");
                        progress(current, total_jobs, &format!("{unit}: failed: {e}"));
                    }
                }
            }
        }
    }

    let success_rate = if total_jobs > 0 {
        completed as f64 / total_jobs as f64
    } else {
        0.0
    };

    BatchOutcome {
        rows,
        stats: JobStats {
            total_jobs,
            completed,
            errors,
            success_rate,
        },
    }
}

fn run_unit(
    store: &dyn StorePort,
    symbol: &str,
    spec: &StrategySpec,
    exit_rule: &str,
    data: &MarketData,
    initial_capital: f64,
) -> Result<BacktestMetrics, BacklabError> {
    let signals = spec.signals(data)?;
    let sim = simulate(data.close(), &signals, initial_capital);
    let trades = extract_trades(data.close(), &sim.positions, &sim.equity, data.dates());
    let metrics = BacktestMetrics::compute(&sim.equity, sim.num_trades);

    let key = BacktestKey::for_spec(symbol, spec, exit_rule);
    store.store_backtest(
        &key,
        &metrics,
        Some(&sim.equity),
        Some(&sim.positions),
        Some(data.dates()),
        Some(&trades),
    )?;

    Ok(metrics)
}
