//! Strategy registry: a closed set of parametrized trading rules.
//!
//! Each variant reads the indicator columns it needs from a [`MarketData`]
//! table and emits a per-bar signal series. A bar where a required value is
//! NaN (indicator warmup) compares false on every threshold and stays flat.

use serde::{Deserialize, Serialize};

use super::error::BacklabError;
use super::market_data::MarketData;
use super::params::{ParamSet, ParamValue};
use super::signal::Signal;

pub const MA_CROSSOVER: &str = "ma_crossover";
pub const RSI_MEANREV: &str = "rsi_meanrev";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaCrossoverParams {
    pub fast_period: i64,
    pub slow_period: i64,
}

impl Default for MaCrossoverParams {
    fn default() -> Self {
        MaCrossoverParams {
            fast_period: 20,
            slow_period: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiMeanRevParams {
    pub rsi_period: i64,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiMeanRevParams {
    fn default() -> Self {
        RsiMeanRevParams {
            rsi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

/// A fully parametrized strategy, ready to generate signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrategySpec {
    MaCrossover(MaCrossoverParams),
    RsiMeanReversion(RsiMeanRevParams),
}

impl StrategySpec {
    pub fn name(&self) -> &'static str {
        match self {
            StrategySpec::MaCrossover(_) => MA_CROSSOVER,
            StrategySpec::RsiMeanReversion(_) => RSI_MEANREV,
        }
    }

    pub fn available() -> &'static [&'static str] {
        &[MA_CROSSOVER, RSI_MEANREV]
    }

    /// Rebuild a spec from a stored name and parameter set. Unknown names
    /// are errors; absent keys fall back to the variant's defaults.
    pub fn from_params(name: &str, params: &ParamSet) -> Result<Self, BacklabError> {
        match name {
            MA_CROSSOVER => {
                let defaults = MaCrossoverParams::default();
                Ok(StrategySpec::MaCrossover(MaCrossoverParams {
                    fast_period: params.get_int("fast_period", defaults.fast_period),
                    slow_period: params.get_int("slow_period", defaults.slow_period),
                }))
            }
            RSI_MEANREV => {
                let defaults = RsiMeanRevParams::default();
                Ok(StrategySpec::RsiMeanReversion(RsiMeanRevParams {
                    rsi_period: params.get_int("rsi_period", defaults.rsi_period),
                    oversold: params.get_float("oversold", defaults.oversold),
                    overbought: params.get_float("overbought", defaults.overbought),
                }))
            }
            other => Err(BacklabError::UnknownStrategy {
                name: other.to_string(),
            }),
        }
    }

    /// The parameter set that keys this spec in the store.
    pub fn params(&self) -> ParamSet {
        match self {
            StrategySpec::MaCrossover(p) => ParamSet::new()
                .with("fast_period", p.fast_period)
                .with("slow_period", p.slow_period),
            StrategySpec::RsiMeanReversion(p) => ParamSet::new()
                .with("rsi_period", p.rsi_period)
                .with("oversold", p.oversold)
                .with("overbought", p.overbought),
        }
    }

    /// Generate the aligned signal series for `data`.
    pub fn signals(&self, data: &MarketData) -> Result<Vec<Signal>, BacklabError> {
        match self {
            StrategySpec::MaCrossover(p) => {
                let fast = require_column(self, data, &format!("SMA_{}", p.fast_period))?;
                let slow = require_column(self, data, &format!("SMA_{}", p.slow_period))?;

                Ok(fast
                    .iter()
                    .zip(slow)
                    .map(|(&f, &s)| {
                        if f > s {
                            Signal::Long
                        } else if f < s {
                            Signal::Short
                        } else {
                            Signal::Flat
                        }
                    })
                    .collect())
            }
            StrategySpec::RsiMeanReversion(p) => {
                let rsi = require_column(self, data, &format!("RSI_{}", p.rsi_period))?;

                Ok(rsi
                    .iter()
                    .map(|&r| {
                        if r < p.oversold {
                            Signal::Long
                        } else if r > p.overbought {
                            Signal::Short
                        } else {
                            Signal::Flat
                        }
                    })
                    .collect())
            }
        }
    }

    /// The four predefined configurations commonly run as a batch.
    pub fn default_presets() -> Vec<StrategySpec> {
        vec![
            StrategySpec::MaCrossover(MaCrossoverParams {
                fast_period: 20,
                slow_period: 50,
            }),
            StrategySpec::MaCrossover(MaCrossoverParams {
                fast_period: 50,
                slow_period: 200,
            }),
            StrategySpec::RsiMeanReversion(RsiMeanRevParams {
                rsi_period: 14,
                oversold: 30.0,
                overbought: 70.0,
            }),
            StrategySpec::RsiMeanReversion(RsiMeanRevParams {
                rsi_period: 14,
                oversold: 20.0,
                overbought: 80.0,
            }),
        ]
    }

    /// Expand a parameter grid into the cross-product of specs.
    pub fn param_grid(
        name: &str,
        grid: &[(&str, Vec<ParamValue>)],
    ) -> Result<Vec<StrategySpec>, BacklabError> {
        let mut combos: Vec<ParamSet> = vec![ParamSet::new()];
        for (key, values) in grid {
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in values {
                    next.push(combo.clone().with(*key, value.clone()));
                }
            }
            combos = next;
        }

        combos
            .iter()
            .map(|params| StrategySpec::from_params(name, params))
            .collect()
    }
}

fn require_column<'a>(
    spec: &StrategySpec,
    data: &'a MarketData,
    name: &str,
) -> Result<&'a [f64], BacklabError> {
    data.indicator(name)
        .ok_or_else(|| BacklabError::StrategyComputation {
            strategy: spec.name().to_string(),
            reason: format!("required column {name} not found in {}", data.symbol),
        })
}
