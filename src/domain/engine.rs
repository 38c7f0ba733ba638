//! Bar-by-bar simulation engine.
//!
//! Turns a close-price series and an aligned signal series into an equity
//! curve, a position trail, and a trade count. Deterministic and O(n); the
//! bar's signal is adopted before its return is applied, so a reversal bar
//! earns the new position's return.

use super::signal::Signal;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;

/// Output of [`simulate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub equity: Vec<f64>,
    pub positions: Vec<Signal>,
    pub num_trades: usize,
}

/// Run the simulation over aligned price and signal slices.
///
/// `equity[0] == initial_capital` and `positions[0] == Flat` by
/// construction. The trade counter increments when a nonzero position is
/// left; a position still open at the final bar is not counted here (the
/// trade extractor synthesizes its closing record).
///
/// Preconditions: `prices.len() == signals.len()`, prices positive. A zero
/// previous price is a contract violation, not a handled error.
pub fn simulate(prices: &[f64], signals: &[Signal], initial_capital: f64) -> Simulation {
    debug_assert_eq!(prices.len(), signals.len());

    let n = prices.len();
    if n == 0 {
        return Simulation {
            equity: Vec::new(),
            positions: Vec::new(),
            num_trades: 0,
        };
    }

    let mut equity = vec![0.0; n];
    let mut positions = vec![Signal::Flat; n];
    equity[0] = initial_capital;

    let mut held = Signal::Flat;
    let mut num_trades = 0;

    for i in 1..n {
        if signals[i] != held {
            if held.is_open() {
                num_trades += 1;
            }
            held = signals[i];
        }
        positions[i] = held;

        if held.is_open() {
            let price_change = (prices[i] - prices[i - 1]) / prices[i - 1];
            equity[i] = equity[i - 1] * (1.0 + f64::from(held.value()) * price_change);
        } else {
            equity[i] = equity[i - 1];
        }
    }

    Simulation {
        equity,
        positions,
        num_trades,
    }
}
