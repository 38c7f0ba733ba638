#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;

use backlab::domain::error::BacklabError;
use backlab::domain::market_data::MarketData;
use backlab::domain::signal::Signal;
use backlab::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, MarketData>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_table(mut self, data: MarketData) -> Self {
        self.data.insert(data.symbol.clone(), data);
        self
    }
}

impl DataPort for MockDataPort {
    fn load(&self, symbol: &str) -> Result<MarketData, BacklabError> {
        self.data.get(symbol).cloned().ok_or(BacklabError::NoData {
            symbol: symbol.to_string(),
        })
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacklabError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dates(n: usize) -> Vec<NaiveDate> {
    (0..n)
        .map(|i| date(2020, 1, 1) + chrono::Duration::days(i as i64))
        .collect()
}

pub fn signals(values: &[i8]) -> Vec<Signal> {
    values
        .iter()
        .map(|&v| Signal::from_value(v).unwrap())
        .collect()
}

/// A table whose RSI column forces the given signal on every bar.
pub fn rsi_table_for_signals(symbol: &str, close: Vec<f64>, raw_signals: &[i8]) -> MarketData {
    assert_eq!(close.len(), raw_signals.len());
    let rsi = raw_signals
        .iter()
        .map(|&s| match s {
            1 => 20.0,  // below oversold 30 -> long
            -1 => 80.0, // above overbought 70 -> short
            _ => 50.0,  // neutral band -> flat
        })
        .collect();

    MarketData::new(symbol, dates(close.len()), close)
        .unwrap()
        .with_indicator("RSI_14", rsi)
        .unwrap()
}
