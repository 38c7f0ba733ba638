//! SQLite-backed result store.
//!
//! One database holds the five logical tables: the metadata index
//! (`backtests`, composite primary key, upserted last-write-wins), the
//! deduplicated `params` lookup, the `equity_artifacts` and
//! `trade_artifacts` payload tables (JSON, keyed by record id), and
//! `group_sets`. The composite-key upsert is atomic, so repeated stores of
//! the same key can never leave duplicate index rows.
//!
//! Sub-artifact writes are best-effort: a failure is logged and swallowed,
//! and the metadata row remains the source of truth for the metrics.

use chrono::{NaiveDate, Utc};
use log::warn;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::domain::error::BacklabError;
use crate::domain::metrics::BacktestMetrics;
#[cfg(test)]
use crate::domain::params::ParamSet;
use crate::domain::record::{
    BacktestKey, DetailedResult, GroupSet, QueryFilter, StatsRow, StoreSummary,
};
use crate::domain::signal::Signal;
use crate::domain::trade::TradeRecord;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::StorePort;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteStoreAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStoreAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BacklabError> {
        let db_path =
            config
                .get_string("store", "path")
                .ok_or_else(|| BacklabError::ConfigMissing {
                    section: "store".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("store", "pool_size", 4) as u32;
        Self::at_path(&db_path, pool_size)
    }

    pub fn at_path(path: &str, pool_size: u32) -> Result<Self, BacklabError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| BacklabError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, BacklabError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| BacklabError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), BacklabError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS backtests (
                symbol TEXT NOT NULL,
                strategy TEXT NOT NULL,
                params_hash TEXT NOT NULL,
                exit_rule TEXT NOT NULL,
                total_return REAL NOT NULL,
                cagr REAL NOT NULL,
                sharpe_ratio REAL NOT NULL,
                max_drawdown REAL NOT NULL,
                win_rate REAL NOT NULL,
                num_trades INTEGER NOT NULL,
                expectancy REAL NOT NULL,
                start_date TEXT NOT NULL DEFAULT '',
                end_date TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                PRIMARY KEY (symbol, strategy, params_hash, exit_rule)
            );
            CREATE INDEX IF NOT EXISTS idx_backtests_symbol ON backtests(symbol);
            CREATE INDEX IF NOT EXISTS idx_backtests_strategy ON backtests(strategy);
            CREATE TABLE IF NOT EXISTS params (
                params_hash TEXT PRIMARY KEY,
                params_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS equity_artifacts (
                record_id TEXT PRIMARY KEY,
                equity_json TEXT NOT NULL,
                dates_json TEXT,
                positions_json TEXT
            );
            CREATE TABLE IF NOT EXISTS trade_artifacts (
                record_id TEXT PRIMARY KEY,
                trades_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS group_sets (
                name TEXT PRIMARY KEY,
                symbols_json TEXT NOT NULL,
                strategies_json TEXT NOT NULL,
                params_list_json TEXT NOT NULL,
                exit_rules_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )
        .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, BacklabError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| BacklabError::Database {
                reason: e.to_string(),
            })
    }

    fn write_equity_artifact(
        conn: &rusqlite::Connection,
        record_id: &str,
        equity: &[f64],
        positions: Option<&[Signal]>,
        dates: Option<&[NaiveDate]>,
    ) -> Result<(), BacklabError> {
        let equity_json = serde_json::to_string(equity)?;
        let dates_json = dates
            .map(|ds| {
                serde_json::to_string(
                    &ds.iter()
                        .map(|d| d.format(DATE_FORMAT).to_string())
                        .collect::<Vec<_>>(),
                )
            })
            .transpose()?;
        let positions_json = positions
            .map(|ps| {
                serde_json::to_string(&ps.iter().map(|p| p.value()).collect::<Vec<i8>>())
            })
            .transpose()?;

        conn.execute(
            "INSERT OR REPLACE INTO equity_artifacts (record_id, equity_json, dates_json, positions_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![record_id, equity_json, dates_json, positions_json],
        )
        .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn write_trade_artifact(
        conn: &rusqlite::Connection,
        record_id: &str,
        trades: &[TradeRecord],
    ) -> Result<(), BacklabError> {
        let trades_json = serde_json::to_string(trades)?;

        conn.execute(
            "INSERT OR REPLACE INTO trade_artifacts (record_id, trades_json) VALUES (?1, ?2)",
            params![record_id, trades_json],
        )
        .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn row_to_stats(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatsRow> {
        let params_json: Option<String> = row.get(14)?;
        let params = params_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();

        Ok(StatsRow {
            symbol: row.get(0)?,
            strategy: row.get(1)?,
            params_hash: row.get(2)?,
            exit_rule: row.get(3)?,
            metrics: BacktestMetrics {
                total_return: row.get(4)?,
                cagr: row.get(5)?,
                sharpe_ratio: row.get(6)?,
                max_drawdown: row.get(7)?,
                win_rate: row.get(8)?,
                num_trades: row.get::<_, i64>(9)? as usize,
                expectancy: row.get(10)?,
            },
            start_date: row.get(11)?,
            end_date: row.get(12)?,
            created_at: row.get(13)?,
            params,
        })
    }
}

const STATS_COLUMNS: &str = "m.symbol, m.strategy, m.params_hash, m.exit_rule, \
     m.total_return, m.cagr, m.sharpe_ratio, m.max_drawdown, m.win_rate, m.num_trades, \
     m.expectancy, m.start_date, m.end_date, m.created_at, p.params_json";

impl StorePort for SqliteStoreAdapter {
    fn store_backtest(
        &self,
        key: &BacktestKey,
        metrics: &BacktestMetrics,
        equity: Option<&[f64]>,
        positions: Option<&[Signal]>,
        dates: Option<&[NaiveDate]>,
        trades: Option<&[TradeRecord]>,
    ) -> Result<String, BacklabError> {
        let conn = self.conn()?;
        let params_hash = key.params_hash();
        let record_id = key.record_id();

        let (start_date, end_date) = match dates {
            Some(ds) if !ds.is_empty() => (
                ds[0].format(DATE_FORMAT).to_string(),
                ds[ds.len() - 1].format(DATE_FORMAT).to_string(),
            ),
            _ => (String::new(), String::new()),
        };

        conn.execute(
            "INSERT OR REPLACE INTO backtests
             (symbol, strategy, params_hash, exit_rule, total_return, cagr, sharpe_ratio,
              max_drawdown, win_rate, num_trades, expectancy, start_date, end_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                key.symbol,
                key.strategy,
                params_hash,
                key.exit_rule,
                metrics.total_return,
                metrics.cagr,
                metrics.sharpe_ratio,
                metrics.max_drawdown,
                metrics.win_rate,
                metrics.num_trades as i64,
                metrics.expectancy,
                start_date,
                end_date,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        conn.execute(
            "INSERT OR IGNORE INTO params (params_hash, params_json) VALUES (?1, ?2)",
            params![params_hash, key.params.canonical_json()],
        )
        .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        // Best-effort from here: the metrics row is already durable.
        if let Some(equity) = equity {
            if let Err(e) = Self::write_equity_artifact(&conn, &record_id, equity, positions, dates)
            {
                warn!("equity artifact write failed for {record_id}: {e}");
            }
        }

        if let Some(trades) = trades {
            if let Err(e) = Self::write_trade_artifact(&conn, &record_id, trades) {
                warn!("trade artifact write failed for {record_id}: {e}");
            }
        }

        Ok(record_id)
    }

    fn query(&self, filter: &QueryFilter) -> Result<Vec<StatsRow>, BacklabError> {
        let conn = self.conn()?;

        let mut sql = format!(
            "SELECT {STATS_COLUMNS} FROM backtests m \
             LEFT JOIN params p ON p.params_hash = m.params_hash"
        );
        let mut clauses: Vec<&str> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(symbol) = &filter.symbol {
            clauses.push("m.symbol = ?");
            binds.push(symbol.clone());
        }
        if let Some(strategy) = &filter.strategy {
            clauses.push("m.strategy = ?");
            binds.push(strategy.clone());
        }
        if let Some(filter_params) = &filter.params {
            clauses.push("m.params_hash = ?");
            binds.push(filter_params.stable_hash());
        }
        if let Some(exit_rule) = &filter.exit_rule {
            clauses.push("m.exit_rule = ?");
            binds.push(exit_rule.clone());
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY m.symbol, m.strategy, m.params_hash, m.exit_rule");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params_from_iter(binds.iter()), Self::row_to_stats)
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(
                row.map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                    reason: e.to_string(),
                })?,
            );
        }

        Ok(stats)
    }

    fn get_detailed(&self, key: &BacktestKey) -> Result<Option<DetailedResult>, BacklabError> {
        let rows = self.query(&QueryFilter::for_key(key))?;
        let Some(stats) = rows.into_iter().next() else {
            return Ok(None);
        };

        let conn = self.conn()?;
        let record_id = key.record_id();

        let mut result = DetailedResult {
            symbol: stats.symbol,
            strategy: stats.strategy,
            params: key.params.clone(),
            exit_rule: stats.exit_rule,
            metrics: stats.metrics,
            equity_curve: None,
            dates: None,
            positions: None,
            trades: None,
        };

        let equity_row: Option<(String, Option<String>, Option<String>)> = conn
            .query_row(
                "SELECT equity_json, dates_json, positions_json
                 FROM equity_artifacts WHERE record_id = ?1",
                params![record_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        if let Some((equity_json, dates_json, positions_json)) = equity_row {
            match serde_json::from_str::<Vec<f64>>(&equity_json) {
                Ok(equity) => result.equity_curve = Some(equity),
                Err(e) => warn!("undecodable equity artifact for {record_id}: {e}"),
            }

            if let Some(json) = dates_json {
                match serde_json::from_str::<Vec<String>>(&json) {
                    Ok(labels) => {
                        let dates: Result<Vec<NaiveDate>, _> = labels
                            .iter()
                            .map(|s| NaiveDate::parse_from_str(s, DATE_FORMAT))
                            .collect();
                        match dates {
                            Ok(dates) => result.dates = Some(dates),
                            Err(e) => warn!("undecodable date labels for {record_id}: {e}"),
                        }
                    }
                    Err(e) => warn!("undecodable date labels for {record_id}: {e}"),
                }
            }

            if let Some(json) = positions_json {
                match serde_json::from_str::<Vec<i8>>(&json) {
                    Ok(raw) => {
                        result.positions = Some(
                            raw.into_iter()
                                .map(|v| Signal::from_value(v).unwrap_or(Signal::Flat))
                                .collect(),
                        )
                    }
                    Err(e) => warn!("undecodable position trail for {record_id}: {e}"),
                }
            }
        }

        let trades_json: Option<String> = conn
            .query_row(
                "SELECT trades_json FROM trade_artifacts WHERE record_id = ?1",
                params![record_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        if let Some(json) = trades_json {
            match serde_json::from_str::<Vec<TradeRecord>>(&json) {
                Ok(trades) => result.trades = Some(trades),
                Err(e) => warn!("undecodable trade log for {record_id}: {e}"),
            }
        }

        Ok(Some(result))
    }

    fn bulk_get(&self, keys: &[BacktestKey]) -> Result<Vec<StatsRow>, BacklabError> {
        let mut rows = Vec::new();
        for key in keys {
            if let Some(row) = self.query(&QueryFilter::for_key(key))?.into_iter().next() {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn delete(&self, key: &BacktestKey) -> Result<bool, BacklabError> {
        let conn = self.conn()?;

        let removed = conn
            .execute(
                "DELETE FROM backtests
                 WHERE symbol = ?1 AND strategy = ?2 AND params_hash = ?3 AND exit_rule = ?4",
                params![key.symbol, key.strategy, key.params_hash(), key.exit_rule],
            )
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        if removed == 0 {
            return Ok(false);
        }

        let record_id = key.record_id();
        for table in ["equity_artifacts", "trade_artifacts"] {
            conn.execute(
                &format!("DELETE FROM {table} WHERE record_id = ?1"),
                params![record_id],
            )
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        }

        Ok(true)
    }

    fn summary(&self) -> Result<StoreSummary, BacklabError> {
        let conn = self.conn()?;

        let (total, symbols, strategies): (i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT symbol), COUNT(DISTINCT strategy) FROM backtests",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let page_count: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        let page_size: i64 = conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Ok(StoreSummary {
            total_backtests: total as usize,
            unique_symbols: symbols as usize,
            unique_strategies: strategies as usize,
            storage_size_mb: (page_count * page_size) as f64 / (1024.0 * 1024.0),
        })
    }

    fn clear_all(&self) -> Result<(), BacklabError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "DELETE FROM backtests;
             DELETE FROM params;
             DELETE FROM equity_artifacts;
             DELETE FROM trade_artifacts;
             DELETE FROM group_sets;",
        )
        .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn save_group_set(&self, group: &GroupSet) -> Result<(), BacklabError> {
        let conn = self.conn()?;

        let created_at = if group.created_at.is_empty() {
            Utc::now().to_rfc3339()
        } else {
            group.created_at.clone()
        };

        conn.execute(
            "INSERT OR REPLACE INTO group_sets
             (name, symbols_json, strategies_json, params_list_json, exit_rules_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                group.name,
                serde_json::to_string(&group.symbols)?,
                serde_json::to_string(&group.strategies)?,
                serde_json::to_string(&group.params_list)?,
                serde_json::to_string(&group.exit_rules)?,
                created_at,
            ],
        )
        .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn load_group_set(&self, name: &str) -> Result<Option<GroupSet>, BacklabError> {
        let conn = self.conn()?;

        let row: Option<(String, String, String, String, String)> = conn
            .query_row(
                "SELECT symbols_json, strategies_json, params_list_json, exit_rules_json, created_at
                 FROM group_sets WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let Some((symbols, strategies, params_list, exit_rules, created_at)) = row else {
            return Ok(None);
        };

        Ok(Some(GroupSet {
            name: name.to_string(),
            symbols: serde_json::from_str(&symbols)?,
            strategies: serde_json::from_str(&strategies)?,
            params_list: serde_json::from_str(&params_list)?,
            exit_rules: serde_json::from_str(&exit_rules)?,
            created_at,
        }))
    }

    fn list_group_sets(&self) -> Result<Vec<String>, BacklabError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT name FROM group_sets ORDER BY name")
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut names = Vec::new();
        for row in rows {
            names.push(
                row.map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                    reason: e.to_string(),
                })?,
            );
        }

        Ok(names)
    }

    fn delete_group_set(&self, name: &str) -> Result<bool, BacklabError> {
        let conn = self.conn()?;

        let removed = conn
            .execute("DELETE FROM group_sets WHERE name = ?1", params![name])
            .map_err(|e: rusqlite::Error| BacklabError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Ok(removed > 0)
    }
}
