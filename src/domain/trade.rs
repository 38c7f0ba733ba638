//! Trade-by-trade extraction from a position trail.
//!
//! A state machine over the bars: flat until the position turns nonzero,
//! then in a trade until the position flattens (Signal Exit), flips sign
//! (Signal Reversal — the next trade opens at the same bar), or the series
//! ends (End of Period, closed at the last bar's price and equity).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::signal::{Side, Signal};

/// Why a trade was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "Signal Exit")]
    SignalExit,
    #[serde(rename = "Signal Reversal")]
    SignalReversal,
    #[serde(rename = "End of Period")]
    EndOfPeriod,
}

impl ExitReason {
    pub fn label(self) -> &'static str {
        match self {
            ExitReason::SignalExit => "Signal Exit",
            ExitReason::SignalReversal => "Signal Reversal",
            ExitReason::EndOfPeriod => "End of Period",
        }
    }
}

/// One closed trade, in chronological entry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_no: usize,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub side: Side,
    /// Whole units at entry: floor(entry_equity / entry_price).
    pub size: i64,
    /// Bars held: exit index minus entry index.
    pub holding_period: usize,
    /// Directional P&L fraction from entry to exit price.
    pub pnl_pct: f64,
    /// Equity delta between entry and exit bars.
    pub pnl_dollars: f64,
    /// Maximum adverse excursion: worst directional P&L% while open.
    pub mae: f64,
    /// Maximum favorable excursion: best directional P&L% while open.
    pub mfe: f64,
    pub exit_reason: ExitReason,
    pub comment: String,
}

struct OpenTrade {
    side: Side,
    entry_idx: usize,
    entry_price: f64,
    entry_equity: f64,
    mae: f64,
    mfe: f64,
}

impl OpenTrade {
    fn open(side: Side, idx: usize, price: f64, equity: f64) -> Self {
        OpenTrade {
            side,
            entry_idx: idx,
            entry_price: price,
            entry_equity: equity,
            mae: 0.0,
            mfe: 0.0,
        }
    }

    fn update_excursions(&mut self, price: f64) {
        let excursion = self.side.directional_return(price, self.entry_price);
        self.mae = self.mae.min(excursion);
        self.mfe = self.mfe.max(excursion);
    }

    fn close(
        self,
        trade_no: usize,
        exit_idx: usize,
        prices: &[f64],
        equity: &[f64],
        dates: &[NaiveDate],
        exit_reason: ExitReason,
    ) -> TradeRecord {
        let exit_price = prices[exit_idx];
        TradeRecord {
            trade_no,
            entry_date: dates[self.entry_idx],
            exit_date: dates[exit_idx],
            entry_price: self.entry_price,
            exit_price,
            side: self.side,
            size: (self.entry_equity / self.entry_price).floor() as i64,
            holding_period: exit_idx - self.entry_idx,
            pnl_pct: self.side.directional_return(exit_price, self.entry_price),
            pnl_dollars: equity[exit_idx] - equity[self.entry_idx],
            mae: self.mae,
            mfe: self.mfe,
            exit_reason,
            comment: String::new(),
        }
    }
}

/// Walk the position trail and emit the ordered trade log.
///
/// Trade numbering is 1-based and monotonic. An all-flat trail yields an
/// empty vec. All slices must have equal length.
pub fn extract_trades(
    prices: &[f64],
    positions: &[Signal],
    equity: &[f64],
    dates: &[NaiveDate],
) -> Vec<TradeRecord> {
    debug_assert_eq!(prices.len(), positions.len());
    debug_assert_eq!(prices.len(), equity.len());
    debug_assert_eq!(prices.len(), dates.len());

    let n = prices.len();
    let mut trades = Vec::new();
    let mut open: Option<OpenTrade> = None;
    let mut trade_no = 0;

    for i in 0..n {
        let position = positions[i];
        let same_side = matches!(&open, Some(t) if position == t.side.signal());

        if same_side {
            if let Some(trade) = open.as_mut() {
                trade.update_excursions(prices[i]);
            }
        } else if let Some(trade) = open.take() {
            let reason = if position.is_open() {
                ExitReason::SignalReversal
            } else {
                ExitReason::SignalExit
            };
            trade_no += 1;
            trades.push(trade.close(trade_no, i, prices, equity, dates, reason));

            if let Some(side) = position.side() {
                open = Some(OpenTrade::open(side, i, prices[i], equity[i]));
            }
        } else if let Some(side) = position.side() {
            open = Some(OpenTrade::open(side, i, prices[i], equity[i]));
        }
    }

    if let Some(trade) = open.take() {
        trade_no += 1;
        trades.push(trade.close(
            trade_no,
            n - 1,
            prices,
            equity,
            dates,
            ExitReason::EndOfPeriod,
        ));
    }

    trades
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::simulate;

    fn sig(values: &[i8]) -> Vec<Signal> {
        values
            .iter()
            .map(|&v| Signal::from_value(v).unwrap())
            .collect()
    }

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect()
    }

    fn run(prices: &[f64], signals: &[i8]) -> Vec<TradeRecord> {
        let signals = sig(signals);
        let sim = simulate(prices, &signals, 100_000.0);
        extract_trades(prices, &sim.positions, &sim.equity, &dates(prices.len()))
    }

    #[test]
    fn no_positions_empty_trade_list() {
        let trades = run(&[100.0; 50], &[0; 50]);
        assert!(trades.is_empty());
    }

    #[test]
    fn two_separate_long_windows() {
        let n = 100;
        let prices: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.5).collect();
        let mut signals = vec![0i8; n];
        signals[10..30].fill(1);
        signals[40..60].fill(1);

        let trades = run(&prices, &signals);

        assert_eq!(trades.len(), 2);
        let first = &trades[0];
        assert_eq!(first.trade_no, 1);
        assert_eq!(first.side, Side::Long);
        assert_eq!(first.holding_period, 20);
        assert_eq!(first.exit_reason, ExitReason::SignalExit);
        assert!(first.pnl_pct > 0.0);
        assert!(first.pnl_dollars > 0.0);

        let second = &trades[1];
        assert_eq!(second.trade_no, 2);
        assert_eq!(second.holding_period, 20);
    }

    #[test]
    fn long_then_short_windows() {
        let n = 100;
        let prices: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.5).collect();
        let mut signals = vec![0i8; n];
        signals[10..30].fill(1);
        signals[40..60].fill(-1);

        let trades = run(&prices, &signals);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, Side::Long);
        assert_eq!(trades[1].side, Side::Short);
        // Short into rising prices loses.
        assert!(trades[1].pnl_pct < 0.0);
    }

    #[test]
    fn signal_exit_reasons() {
        let trades = run(&[100.0; 7], &[0, 1, 1, 0, -1, -1, 0]);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].exit_reason, ExitReason::SignalExit);
        assert_eq!(trades[1].exit_reason, ExitReason::SignalExit);
    }

    #[test]
    fn reversal_closes_and_reopens_same_bar() {
        let trades = run(&[100.0; 5], &[0, 1, 1, -1, -1]);
        assert_eq!(trades.len(), 2);

        assert_eq!(trades[0].side, Side::Long);
        assert_eq!(trades[0].exit_reason, ExitReason::SignalReversal);
        assert_eq!(trades[0].holding_period, 2);

        assert_eq!(trades[1].side, Side::Short);
        assert_eq!(trades[1].entry_date, trades[0].exit_date);
        assert_eq!(trades[1].exit_reason, ExitReason::EndOfPeriod);
    }

    #[test]
    fn spec_scenario_reversal_and_end_of_period() {
        let prices = [100.0, 101.0, 99.0, 105.0];
        let trades = run(&prices, &[0, 1, 1, -1]);

        assert_eq!(trades.len(), 2);

        let long = &trades[0];
        assert_eq!(long.trade_no, 1);
        assert_eq!(long.side, Side::Long);
        assert_eq!(long.entry_price, 101.0);
        assert_eq!(long.exit_price, 105.0);
        assert_eq!(long.exit_reason, ExitReason::SignalReversal);
        assert_eq!(long.size, 1000); // floor(101000 / 101)
        assert!((long.pnl_pct - (105.0 - 101.0) / 101.0).abs() < 1e-12);
        // MAE reached at the 99 bar, MFE never above entry.
        assert!((long.mae - (99.0 - 101.0) / 101.0).abs() < 1e-12);
        assert_eq!(long.mfe, 0.0);

        let short = &trades[1];
        assert_eq!(short.trade_no, 2);
        assert_eq!(short.side, Side::Short);
        assert_eq!(short.entry_price, 105.0);
        assert_eq!(short.exit_price, 105.0);
        assert_eq!(short.holding_period, 0);
        assert_eq!(short.exit_reason, ExitReason::EndOfPeriod);
        assert_eq!(short.pnl_pct, 0.0);
        assert_eq!(short.pnl_dollars, 0.0);
    }

    #[test]
    fn end_of_period_uses_last_bar() {
        let prices = [100.0, 100.0, 110.0];
        let trades = run(&prices, &[0, 1, 1]);

        assert_eq!(trades.len(), 1);
        let trade = &trades[0];
        assert_eq!(trade.exit_reason, ExitReason::EndOfPeriod);
        assert_eq!(trade.exit_price, 110.0);
        assert_eq!(trade.holding_period, 2);
        assert!((trade.pnl_pct - 0.10).abs() < 1e-12);
        assert!((trade.pnl_dollars - 10_000.0).abs() < 1e-9);
        // Final bar's excursion is part of the open trade.
        assert!((trade.mfe - 0.10).abs() < 1e-12);
        assert_eq!(trade.mae, 0.0);
    }

    #[test]
    fn excursions_track_running_extremes() {
        // Long entered at 100, dips to 90, recovers to 120, exits flat.
        let prices = [100.0, 100.0, 90.0, 120.0, 120.0];
        let trades = run(&prices, &[0, 1, 1, 1, 0]);

        assert_eq!(trades.len(), 1);
        let trade = &trades[0];
        assert!((trade.mae - (-0.10)).abs() < 1e-12);
        assert!((trade.mfe - 0.20).abs() < 1e-12);
    }

    #[test]
    fn size_floors_whole_units() {
        let prices = [100.0, 103.0, 103.0];
        let trades = run(&prices, &[0, 1, 0]);
        assert_eq!(trades.len(), 1);
        // Entry equity 103000 at price 103 -> exactly 1000 units.
        assert_eq!(trades[0].size, 1000);
    }

    #[test]
    fn exit_reason_labels() {
        assert_eq!(ExitReason::SignalExit.label(), "Signal Exit");
        assert_eq!(ExitReason::SignalReversal.label(), "Signal Reversal");
        assert_eq!(ExitReason::EndOfPeriod.label(), "End of Period");
    }

    #[test]
    fn trade_record_serde_roundtrip() {
        let trades = run(&[100.0, 101.0, 99.0, 105.0], &[0, 1, 1, -1]);
        let json = serde_json::to_string(&trades).unwrap();
        assert!(json.contains("\"Signal Reversal\""));
        assert!(json.contains("\"End of Period\""));
        let back: Vec<TradeRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trades);
    }
}
