//! Store-facing record types: keys, rows, summaries, group sets.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::metrics::BacktestMetrics;
use super::params::ParamSet;
use super::signal::Signal;
use super::strategy::StrategySpec;
use super::trade::TradeRecord;

pub const DEFAULT_EXIT_RULE: &str = "default";

/// Composite identity of one stored backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestKey {
    pub symbol: String,
    pub strategy: String,
    pub params: ParamSet,
    pub exit_rule: String,
}

impl BacktestKey {
    pub fn new(
        symbol: impl Into<String>,
        strategy: impl Into<String>,
        params: ParamSet,
        exit_rule: impl Into<String>,
    ) -> Self {
        BacktestKey {
            symbol: symbol.into(),
            strategy: strategy.into(),
            params,
            exit_rule: exit_rule.into(),
        }
    }

    pub fn for_spec(symbol: impl Into<String>, spec: &StrategySpec, exit_rule: impl Into<String>) -> Self {
        BacktestKey::new(symbol, spec.name(), spec.params(), exit_rule)
    }

    pub fn params_hash(&self) -> String {
        self.params.stable_hash()
    }

    /// Identifier the sub-artifact tables are keyed by.
    pub fn record_id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.symbol,
            self.strategy,
            self.params_hash(),
            self.exit_rule
        )
    }
}

/// One metadata-index row: the key fields, decoded params, metrics, and
/// bookkeeping labels. Light enough to query in bulk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    pub symbol: String,
    pub strategy: String,
    pub params_hash: String,
    pub exit_rule: String,
    pub params: ParamSet,
    pub metrics: BacktestMetrics,
    pub start_date: String,
    pub end_date: String,
    pub created_at: String,
}

/// A metadata row merged with whatever sub-artifacts were stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedResult {
    pub symbol: String,
    pub strategy: String,
    pub params: ParamSet,
    pub exit_rule: String,
    pub metrics: BacktestMetrics,
    pub equity_curve: Option<Vec<f64>>,
    pub dates: Option<Vec<NaiveDate>>,
    pub positions: Option<Vec<Signal>>,
    pub trades: Option<Vec<TradeRecord>>,
}

/// Store-wide totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub total_backtests: usize,
    pub unique_symbols: usize,
    pub unique_strategies: usize,
    pub storage_size_mb: f64,
}

/// A named, reusable batch preset. `params_list` pairs with `strategies`
/// index-for-index. Re-saving under the same name overwrites wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSet {
    pub name: String,
    pub symbols: Vec<String>,
    pub strategies: Vec<String>,
    pub params_list: Vec<ParamSet>,
    pub exit_rules: Vec<String>,
    pub created_at: String,
}

/// Optional filters, AND-combined by the store. Params filter by their
/// stable hash, not structural equality.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryFilter {
    pub symbol: Option<String>,
    pub strategy: Option<String>,
    pub params: Option<ParamSet>,
    pub exit_rule: Option<String>,
}

impl QueryFilter {
    pub fn all() -> Self {
        QueryFilter::default()
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn params(mut self, params: ParamSet) -> Self {
        self.params = Some(params);
        self
    }

    pub fn exit_rule(mut self, exit_rule: impl Into<String>) -> Self {
        self.exit_rule = Some(exit_rule.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.symbol.is_none()
            && self.strategy.is_none()
            && self.params.is_none()
            && self.exit_rule.is_none()
    }

    /// The filter matching exactly one key.
    pub fn for_key(key: &BacktestKey) -> Self {
        QueryFilter::all()
            .symbol(key.symbol.clone())
            .strategy(key.strategy.clone())
            .params(key.params.clone())
            .exit_rule(key.exit_rule.clone())
    }
}
