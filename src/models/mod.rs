use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One closed OHLCV bar from the terminal. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Chart timeframe, mirroring the terminal's bar periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Width of one bar in seconds.
    pub fn as_secs(&self) -> u64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1800,
            Timeframe::H1 => 3600,
            Timeframe::H4 => 14400,
            Timeframe::D1 => 86400,
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            other => Err(format!("unknown timeframe: {}", other)),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Trading signal emitted by a signal engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// Bollinger Bands computed over the current window. Derived data,
/// replaced wholesale on every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerSnapshot {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
    pub std_dev: f64,
}

/// One evaluation cycle's output: the signal plus the indicator state
/// that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub signal: Signal,
    pub bands: Option<BollingerSnapshot>,
    /// ATR over the window, when enough bars are present. Used for
    /// stop-loss distances.
    pub atr: Option<f64>,
    pub close: f64,
    pub timestamp: DateTime<Utc>,
}

impl Evaluation {
    /// A Hold with no indicator state, for windows that are still filling.
    pub fn hold(close: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            signal: Signal::Hold,
            bands: None,
            atr: None,
            close,
            timestamp,
        }
    }
}

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// Net exposure for a symbol as reported by the order manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    Long,
    Short,
    Flat,
}

/// A live position. Presence in the order manager's book means the
/// position is open; Flat is represented by absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    /// Broker-assigned ticket id.
    pub ticket: u64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

/// Connection lifecycle as tracked by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Authenticated,
    Degraded,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Account summary returned by login and reused as the heartbeat probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub login: u64,
    pub balance: f64,
    pub currency: String,
    pub margin_free: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_roundtrip() {
        let tf: Timeframe = "h4".parse().unwrap();
        assert_eq!(tf, Timeframe::H4);
        assert_eq!(tf.as_secs(), 14400);
        assert_eq!(tf.to_string(), "H4");
    }

    #[test]
    fn test_timeframe_rejects_unknown() {
        assert!("H2".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::Long.opposite(), Direction::Short);
        assert_eq!(Direction::Short.opposite(), Direction::Long);
    }

    #[test]
    fn test_hold_evaluation_is_bare() {
        let eval = Evaluation::hold(1.25, Utc::now());
        assert_eq!(eval.signal, Signal::Hold);
        assert!(eval.bands.is_none());
        assert!(eval.atr.is_none());
    }
}
