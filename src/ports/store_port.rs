//! Result store contract.
//!
//! All operations are synchronous and complete before returning. Absence is
//! expressed as `Ok(None)` / `Ok(false)` / an empty vec, never as an error.

use chrono::NaiveDate;

use crate::domain::error::BacklabError;
use crate::domain::metrics::BacktestMetrics;
use crate::domain::record::{
    BacktestKey, DetailedResult, GroupSet, QueryFilter, StatsRow, StoreSummary,
};
use crate::domain::signal::Signal;
use crate::domain::trade::TradeRecord;

pub trait StorePort {
    /// Upsert the metadata row for `key` (last-write-wins) and best-effort
    /// write the optional sub-artifacts. A sub-artifact failure is logged
    /// and swallowed; the metrics row governs success. Returns the record
    /// id the artifacts are keyed by.
    #[allow(clippy::too_many_arguments)]
    fn store_backtest(
        &self,
        key: &BacktestKey,
        metrics: &BacktestMetrics,
        equity: Option<&[f64]>,
        positions: Option<&[Signal]>,
        dates: Option<&[NaiveDate]>,
        trades: Option<&[TradeRecord]>,
    ) -> Result<String, BacklabError>;

    /// Metadata rows matching the AND of the supplied filters; the full
    /// table when no filter is set.
    fn query(&self, filter: &QueryFilter) -> Result<Vec<StatsRow>, BacklabError>;

    /// The metadata row for `key` merged with any stored sub-artifacts.
    fn get_detailed(&self, key: &BacktestKey) -> Result<Option<DetailedResult>, BacklabError>;

    /// Best-effort lookup of many keys; misses are skipped.
    fn bulk_get(&self, keys: &[BacktestKey]) -> Result<Vec<StatsRow>, BacklabError>;

    /// Remove the metadata row and sub-artifacts. False when nothing
    /// matched.
    fn delete(&self, key: &BacktestKey) -> Result<bool, BacklabError>;

    fn summary(&self) -> Result<StoreSummary, BacklabError>;

    /// Remove every stored backtest, params entry, and group set.
    fn clear_all(&self) -> Result<(), BacklabError>;

    fn save_group_set(&self, group: &GroupSet) -> Result<(), BacklabError>;
    fn load_group_set(&self, name: &str) -> Result<Option<GroupSet>, BacklabError>;
    fn list_group_sets(&self) -> Result<Vec<String>, BacklabError>;
    fn delete_group_set(&self, name: &str) -> Result<bool, BacklabError>;
}
