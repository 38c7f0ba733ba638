//! Indicator provider boundary.
//!
//! Supplies the per-symbol price/indicator table the engine consumes.
//! Indicator computation and caching policy belong to the implementor.

use crate::domain::error::BacklabError;
use crate::domain::market_data::MarketData;

pub trait DataPort {
    /// Load the full price + indicator table for a symbol.
    fn load(&self, symbol: &str) -> Result<MarketData, BacklabError>;

    /// Symbols this provider can serve, sorted.
    fn list_symbols(&self) -> Result<Vec<String>, BacklabError>;
}
