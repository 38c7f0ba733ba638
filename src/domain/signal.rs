//! Per-bar trading signals and position sides.

use serde::{Deserialize, Serialize};

/// Desired position for a bar: short, flat, or long.
///
/// Doubles as the position trail element; the engine adopts the signal as
/// the held position before applying the bar's return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i8)]
pub enum Signal {
    Short = -1,
    Flat = 0,
    Long = 1,
}

impl Signal {
    /// Numeric value used in equity arithmetic and stored position arrays.
    pub fn value(self) -> i8 {
        self as i8
    }

    pub fn from_value(value: i8) -> Option<Signal> {
        match value {
            -1 => Some(Signal::Short),
            0 => Some(Signal::Flat),
            1 => Some(Signal::Long),
            _ => None,
        }
    }

    pub fn is_open(self) -> bool {
        self != Signal::Flat
    }

    /// The trade side this signal opens, if any.
    pub fn side(self) -> Option<Side> {
        match self {
            Signal::Long => Some(Side::Long),
            Signal::Short => Some(Side::Short),
            Signal::Flat => None,
        }
    }
}

/// Side of an open or closed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn signal(self) -> Signal {
        match self {
            Side::Long => Signal::Long,
            Side::Short => Signal::Short,
        }
    }

    /// Directional P&L fraction for a move from `entry` to `price`.
    pub fn directional_return(self, price: f64, entry: f64) -> f64 {
        match self {
            Side::Long => (price - entry) / entry,
            Side::Short => (entry - price) / entry,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Long => "Long",
            Side::Short => "Short",
        }
    }
}
