//! CSV file data adapter.
//!
//! One file per symbol (`<SYMBOL>.csv`): a `date` column, a `close` column,
//! and any number of indicator columns named as the strategies expect them
//! (`SMA_20`, `RSI_14`, ...). Empty cells are indicator warmup and load as
//! NaN.

use crate::domain::error::BacklabError;
use crate::domain::market_data::MarketData;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvDataAdapter {
    base_path: PathBuf,
}

impl CsvDataAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

fn parse_cell(value: &str) -> Result<f64, std::num::ParseFloatError> {
    if value.trim().is_empty() {
        Ok(f64::NAN)
    } else {
        value.trim().parse()
    }
}

impl DataPort for CsvDataAdapter {
    fn load(&self, symbol: &str) -> Result<MarketData, BacklabError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|_| BacklabError::NoData {
            symbol: symbol.to_string(),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| BacklabError::InvalidData {
                symbol: symbol.to_string(),
                reason: format!("CSV header error: {e}"),
            })?
            .clone();

        let date_idx = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case("date"))
            .ok_or_else(|| BacklabError::InvalidData {
                symbol: symbol.to_string(),
                reason: "missing date column".into(),
            })?;
        let close_idx = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case("close"))
            .ok_or_else(|| BacklabError::InvalidData {
                symbol: symbol.to_string(),
                reason: "missing close column".into(),
            })?;

        let indicator_cols: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != date_idx && i != close_idx)
            .map(|(i, name)| (i, name.to_string()))
            .collect();

        let mut dates = Vec::new();
        let mut close = Vec::new();
        let mut indicators: Vec<Vec<f64>> = vec![Vec::new(); indicator_cols.len()];

        for result in rdr.records() {
            let record = result.map_err(|e| BacklabError::InvalidData {
                symbol: symbol.to_string(),
                reason: format!("CSV parse error: {e}"),
            })?;

            let date_str = record.get(date_idx).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                BacklabError::InvalidData {
                    symbol: symbol.to_string(),
                    reason: format!("invalid date {date_str:?}: {e}"),
                }
            })?;
            dates.push(date);

            let close_str = record.get(close_idx).unwrap_or_default();
            let close_value =
                close_str
                    .trim()
                    .parse()
                    .map_err(|e| BacklabError::InvalidData {
                        symbol: symbol.to_string(),
                        reason: format!("invalid close value {close_str:?}: {e}"),
                    })?;
            close.push(close_value);

            for (slot, (col, name)) in indicators.iter_mut().zip(&indicator_cols) {
                let cell = record.get(*col).unwrap_or_default();
                let value = parse_cell(cell).map_err(|e| BacklabError::InvalidData {
                    symbol: symbol.to_string(),
                    reason: format!("invalid {name} value {cell:?}: {e}"),
                })?;
                slot.push(value);
            }
        }

        let mut data = MarketData::new(symbol, dates, close)?;
        for (values, (_, name)) in indicators.into_iter().zip(&indicator_cols) {
            data.add_indicator(name.clone(), values)?;
        }

        Ok(data)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacklabError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BacklabError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BacklabError::Database {
                reason: format!("directory entry error: {e}"),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
