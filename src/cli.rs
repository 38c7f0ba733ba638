//! CLI definition and dispatch.
//!
//! Thin host layer over the library: wires the config file, the CSV data
//! adapter, and the SQLite store into the batch driver and the store
//! queries. No domain logic lives here.

use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_data_adapter::CsvDataAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_store::SqliteStoreAdapter;
use crate::domain::batch::run_batch;
use crate::domain::engine::DEFAULT_INITIAL_CAPITAL;
use crate::domain::error::BacklabError;
use crate::domain::record::{QueryFilter, DEFAULT_EXIT_RULE};
use crate::domain::strategy::StrategySpec;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::StorePort;

#[derive(Parser, Debug)]
#[command(name = "backlab", about = "Backtest lab for parametrized trading rules")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a batch of backtests and store the results
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Use a saved group set instead of the [backtest] config section
        #[arg(long)]
        group_set: Option<String>,
    },
    /// Query stored backtest statistics
    Query {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        exit_rule: Option<String>,
    },
    /// Show store totals
    Summary {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List saved group sets
    GroupSets {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn dispatch(cli: Cli) -> Result<(), BacklabError> {
    match cli.command {
        Command::Run { config, group_set } => cmd_run(&config, group_set.as_deref()),
        Command::Query {
            config,
            symbol,
            strategy,
            exit_rule,
        } => cmd_query(&config, symbol, strategy, exit_rule),
        Command::Summary { config } => cmd_summary(&config),
        Command::GroupSets { config } => cmd_group_sets(&config),
    }
}

fn open_store(config: &FileConfigAdapter) -> Result<SqliteStoreAdapter, BacklabError> {
    let store = SqliteStoreAdapter::from_config(config)?;
    store.initialize_schema()?;
    Ok(store)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn cmd_run(config_path: &PathBuf, group_set: Option<&str>) -> Result<(), BacklabError> {
    let config = FileConfigAdapter::from_file(config_path)?;
    let store = open_store(&config)?;

    let data_dir = config
        .get_string("data", "dir")
        .ok_or_else(|| BacklabError::ConfigMissing {
            section: "data".into(),
            key: "dir".into(),
        })?;
    let data_port = CsvDataAdapter::new(PathBuf::from(data_dir));

    let initial_capital =
        config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL);

    let (symbols, strategies, exit_rules) = match group_set {
        Some(name) => {
            let group =
                store
                    .load_group_set(name)?
                    .ok_or_else(|| BacklabError::GroupSetNotFound {
                        name: name.to_string(),
                    })?;

            if group.strategies.len() != group.params_list.len() {
                return Err(BacklabError::ConfigInvalid {
                    section: "group_sets".into(),
                    key: name.to_string(),
                    reason: format!(
                        "{} strategies but {} parameter sets",
                        group.strategies.len(),
                        group.params_list.len()
                    ),
                });
            }

            let strategies = group
                .strategies
                .iter()
                .zip(&group.params_list)
                .map(|(name, params)| StrategySpec::from_params(name, params))
                .collect::<Result<Vec<_>, _>>()?;

            (group.symbols, strategies, group.exit_rules)
        }
        None => {
            let symbols = config
                .get_string("backtest", "symbols")
                .map(|s| split_list(&s))
                .ok_or_else(|| BacklabError::ConfigMissing {
                    section: "backtest".into(),
                    key: "symbols".into(),
                })?;

            let exit_rules = config
                .get_string("backtest", "exit_rules")
                .map(|s| split_list(&s))
                .unwrap_or_else(|| vec![DEFAULT_EXIT_RULE.to_string()]);

            (symbols, StrategySpec::default_presets(), exit_rules)
        }
    };

    if symbols.is_empty() {
        return Err(BacklabError::ConfigInvalid {
            section: "backtest".into(),
            key: "symbols".into(),
            reason: "no symbols to run".into(),
        });
    }

    let outcome = run_batch(
        &data_port,
        &store,
        &symbols,
        &strategies,
        &exit_rules,
        initial_capital,
        |current, total, message| info!("[{current}/{total}] {message}"),
    );

    println!(
        "{:<10} {:<14} {:<14} {:>10} {:>8} {:>8}",
        "symbol", "strategy", "exit rule", "return", "sharpe", "trades"
    );
    for row in &outcome.rows {
        println!(
            "{:<10} {:<14} {:<14} {:>9.2}% {:>8.2} {:>8}",
            row.symbol,
            row.strategy,
            row.exit_rule,
            row.metrics.total_return * 100.0,
            row.metrics.sharpe_ratio,
            row.metrics.num_trades,
        );
    }
    println!(
        "total: {} | completed: {} | errors: {} | success rate: {:.0}%",
        outcome.stats.total_jobs,
        outcome.stats.completed,
        outcome.stats.errors,
        outcome.stats.success_rate * 100.0,
    );

    Ok(())
}

fn cmd_query(
    config_path: &PathBuf,
    symbol: Option<String>,
    strategy: Option<String>,
    exit_rule: Option<String>,
) -> Result<(), BacklabError> {
    let config = FileConfigAdapter::from_file(config_path)?;
    let store = open_store(&config)?;

    let filter = QueryFilter {
        symbol,
        strategy,
        params: None,
        exit_rule,
    };
    let rows = store.query(&filter)?;

    println!(
        "{:<10} {:<14} {:<18} {:<14} {:>10} {:>8} {:>8} {:>8}",
        "symbol", "strategy", "params", "exit rule", "return", "sharpe", "max dd", "trades"
    );
    for row in &rows {
        println!(
            "{:<10} {:<14} {:<18} {:<14} {:>9.2}% {:>8.2} {:>7.2}% {:>8}",
            row.symbol,
            row.strategy,
            row.params_hash,
            row.exit_rule,
            row.metrics.total_return * 100.0,
            row.metrics.sharpe_ratio,
            row.metrics.max_drawdown * 100.0,
            row.metrics.num_trades,
        );
    }
    println!("{} rows", rows.len());

    Ok(())
}

fn cmd_summary(config_path: &PathBuf) -> Result<(), BacklabError> {
    let config = FileConfigAdapter::from_file(config_path)?;
    let store = open_store(&config)?;

    let summary = store.summary()?;
    println!("backtests:  {}", summary.total_backtests);
    println!("symbols:    {}", summary.unique_symbols);
    println!("strategies: {}", summary.unique_strategies);
    println!("disk:       {:.2} MB", summary.storage_size_mb);

    Ok(())
}

fn cmd_group_sets(config_path: &PathBuf) -> Result<(), BacklabError> {
    let config = FileConfigAdapter::from_file(config_path)?;
    let store = open_store(&config)?;

    let names = store.list_group_sets()?;
    if names.is_empty() {
        println!("no group sets saved");
    } else {
        for name in names {
            println!("{name}");
        }
    }

    Ok(())
}
