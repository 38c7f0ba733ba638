//! Per-symbol price and indicator table.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::error::BacklabError;

/// Close prices plus named indicator columns, aligned to a strictly
/// increasing date axis. Indicator warmup rows carry NaN.
#[derive(Debug, Clone)]
pub struct MarketData {
    pub symbol: String,
    dates: Vec<NaiveDate>,
    close: Vec<f64>,
    indicators: HashMap<String, Vec<f64>>,
}

impl MarketData {
    pub fn new(
        symbol: impl Into<String>,
        dates: Vec<NaiveDate>,
        close: Vec<f64>,
    ) -> Result<Self, BacklabError> {
        let symbol = symbol.into();
        if dates.len() != close.len() {
            return Err(BacklabError::InvalidData {
                symbol,
                reason: format!("{} dates but {} close prices", dates.len(), close.len()),
            });
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(BacklabError::InvalidData {
                symbol,
                reason: "dates must be strictly increasing".into(),
            });
        }
        Ok(Self {
            symbol,
            dates,
            close,
            indicators: HashMap::new(),
        })
    }

    pub fn add_indicator(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), BacklabError> {
        let name = name.into();
        if values.len() != self.dates.len() {
            return Err(BacklabError::InvalidData {
                symbol: self.symbol.clone(),
                reason: format!(
                    "indicator {} has {} rows, table has {}",
                    name,
                    values.len(),
                    self.dates.len()
                ),
            });
        }
        self.indicators.insert(name, values);
        Ok(())
    }

    pub fn with_indicator(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, BacklabError> {
        self.add_indicator(name, values)?;
        Ok(self)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn close(&self) -> &[f64] {
        &self.close
    }

    pub fn indicator(&self, name: &str) -> Option<&[f64]> {
        self.indicators.get(name).map(|v| v.as_slice())
    }

    pub fn indicator_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.indicators.keys().map(|k| k.as_str()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect()
    }

    #[test]
    fn new_validates_lengths() {
        let result = MarketData::new("AAPL", dates(3), vec![1.0, 2.0]);
        assert!(result.is_err());
    }

    #[test]
    fn new_rejects_unordered_dates() {
        let mut ds = dates(3);
        ds.swap(0, 2);
        let result = MarketData::new("AAPL", ds, vec![1.0, 2.0, 3.0]);
        assert!(result.is_err());
    }

    #[test]
    fn new_rejects_duplicate_dates() {
        let mut ds = dates(3);
        ds[2] = ds[1];
        let result = MarketData::new("AAPL", ds, vec![1.0, 2.0, 3.0]);
        assert!(result.is_err());
    }

    #[test]
    fn indicator_access() {
        let data = MarketData::new("AAPL", dates(3), vec![1.0, 2.0, 3.0])
            .unwrap()
            .with_indicator("SMA_2", vec![f64::NAN, 1.5, 2.5])
            .unwrap();

        let sma = data.indicator("SMA_2").unwrap();
        assert!(sma[0].is_nan());
        assert_eq!(sma[2], 2.5);
        assert!(data.indicator("SMA_5").is_none());
        assert_eq!(data.indicator_names(), vec!["SMA_2"]);
    }

    #[test]
    fn add_indicator_validates_length() {
        let mut data = MarketData::new("AAPL", dates(3), vec![1.0, 2.0, 3.0]).unwrap();
        let result = data.add_indicator("SMA_2", vec![1.0]);
        assert!(result.is_err());
    }

    #[test]
    fn empty_table() {
        let data = MarketData::new("AAPL", vec![], vec![]).unwrap();
        assert!(data.is_empty());
        assert_eq!(data.len(), 0);
    }
}
