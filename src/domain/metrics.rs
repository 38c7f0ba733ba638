//! Summary statistics over an equity curve.

use serde::{Deserialize, Serialize};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// The seven summary metrics stored with every backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    /// Fraction of bars with a positive return. Bar-level, not trade-level:
    /// per-trade win/loss lives in the trade log.
    pub win_rate: f64,
    pub num_trades: usize,
    pub expectancy: f64,
}

impl BacktestMetrics {
    /// All-zero metrics, the result for an empty equity curve.
    pub fn zero() -> Self {
        BacktestMetrics {
            total_return: 0.0,
            cagr: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            win_rate: 0.0,
            num_trades: 0,
            expectancy: 0.0,
        }
    }

    /// Compute metrics from an equity curve and the engine's trade count.
    /// Every output is finite; degenerate inputs fall back to 0.
    pub fn compute(equity: &[f64], num_trades: usize) -> Self {
        if equity.is_empty() {
            return BacktestMetrics {
                num_trades,
                ..BacktestMetrics::zero()
            };
        }

        let total_return = (equity[equity.len() - 1] - equity[0]) / equity[0];

        let base = 1.0 + total_return;
        let cagr = if base > 0.0 {
            base.powf(TRADING_DAYS_PER_YEAR / equity.len() as f64) - 1.0
        } else {
            0.0
        };

        let returns = bar_returns(equity);
        let sharpe_ratio = compute_sharpe(&returns);

        let max_drawdown = compute_max_drawdown(equity);

        let win_rate = if returns.is_empty() {
            0.0
        } else {
            returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
        };

        let expectancy = if num_trades > 0 {
            total_return / num_trades as f64
        } else {
            0.0
        };

        BacktestMetrics {
            total_return,
            cagr,
            sharpe_ratio,
            max_drawdown,
            win_rate,
            num_trades,
            expectancy,
        }
    }
}

/// Bar-to-bar returns with non-finite entries discarded.
fn bar_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .filter(|r| r.is_finite())
        .collect()
}

fn compute_sharpe(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        mean / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Worst decline from the running peak, as a fraction. Always <= 0.
fn compute_max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for &value in equity {
        if value > peak {
            peak = value;
        }
        let dd = (value - peak) / peak;
        if dd < max_dd {
            max_dd = dd;
        }
    }

    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_equity_all_zero() {
        let m = BacktestMetrics::compute(&[], 3);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.cagr, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.num_trades, 3);
        assert_eq!(m.expectancy, 0.0);
    }

    #[test]
    fn constant_equity() {
        let m = BacktestMetrics::compute(&[100_000.0; 10], 0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.expectancy, 0.0);
    }

    #[test]
    fn total_return_positive_and_negative() {
        let m = BacktestMetrics::compute(&[100_000.0, 110_000.0], 1);
        assert_relative_eq!(m.total_return, 0.10, epsilon = 1e-12);

        let m = BacktestMetrics::compute(&[100_000.0, 90_000.0], 1);
        assert_relative_eq!(m.total_return, -0.10, epsilon = 1e-12);
    }

    #[test]
    fn cagr_equals_total_return_over_one_year() {
        let mut equity = vec![100_000.0; 252];
        let last = equity.len() - 1;
        equity[last] = 120_000.0;
        let m = BacktestMetrics::compute(&equity, 1);
        assert_relative_eq!(m.cagr, m.total_return, epsilon = 1e-12);
    }

    #[test]
    fn cagr_annualizes_short_series() {
        // 126 bars (half a year) at +10% compounds to ~21% annualized.
        let mut equity = vec![100_000.0; 126];
        let last = equity.len() - 1;
        equity[last] = 110_000.0;
        let m = BacktestMetrics::compute(&equity, 1);
        assert_relative_eq!(m.cagr, 1.10_f64.powf(2.0) - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn max_drawdown_known_curve() {
        let equity = [100.0, 110.0, 90.0, 95.0, 80.0, 100.0];
        let m = BacktestMetrics::compute(&equity, 0);
        assert_relative_eq!(m.max_drawdown, (80.0 - 110.0) / 110.0, epsilon = 1e-12);
    }

    #[test]
    fn max_drawdown_never_positive() {
        let rising = [100.0, 110.0, 120.0, 130.0];
        let m = BacktestMetrics::compute(&rising, 0);
        assert_eq!(m.max_drawdown, 0.0);

        let falling = [100.0, 90.0, 80.0];
        let m = BacktestMetrics::compute(&falling, 0);
        assert!(m.max_drawdown <= 0.0);
    }

    #[test]
    fn win_rate_counts_positive_bars() {
        let equity = [100.0, 110.0, 105.0, 115.0, 115.0];
        let m = BacktestMetrics::compute(&equity, 0);
        // Four bar returns: +, -, +, 0.
        assert_relative_eq!(m.win_rate, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn expectancy_divides_by_trade_count() {
        let m = BacktestMetrics::compute(&[100_000.0, 120_000.0], 4);
        assert_relative_eq!(m.expectancy, 0.05, epsilon = 1e-12);

        let m = BacktestMetrics::compute(&[100_000.0, 120_000.0], 0);
        assert_eq!(m.expectancy, 0.0);
    }

    #[test]
    fn sharpe_positive_for_steady_gains() {
        let equity: Vec<f64> = (0..100).map(|i| 100_000.0 * 1.001_f64.powi(i)).collect();
        let m = BacktestMetrics::compute(&equity, 0);
        assert!(m.sharpe_ratio > 0.0);
    }

    #[test]
    fn sharpe_zero_for_zero_variance() {
        let m = BacktestMetrics::compute(&[100.0, 100.0, 100.0], 0);
        assert_eq!(m.sharpe_ratio, 0.0);
    }

    #[test]
    fn all_outputs_finite_for_total_loss() {
        // Equity driven to zero: cagr guard kicks in, nothing is NaN.
        let m = BacktestMetrics::compute(&[100.0, 50.0, 0.0], 2);
        assert!(m.total_return.is_finite());
        assert!(m.cagr.is_finite());
        assert!(m.sharpe_ratio.is_finite());
        assert!(m.max_drawdown.is_finite());
        assert!(m.win_rate.is_finite());
        assert!(m.expectancy.is_finite());
        assert_relative_eq!(m.total_return, -1.0, epsilon = 1e-12);
        assert_eq!(m.cagr, 0.0);
        assert_relative_eq!(m.max_drawdown, -1.0, epsilon = 1e-12);
    }
}
