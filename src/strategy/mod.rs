// Signal engines
pub mod bollinger;
pub mod donchian;
pub mod window;

pub use bollinger::{BollingerConfig, BollingerEngine};
pub use donchian::DonchianEngine;
pub use window::PriceWindow;

use crate::models::{Evaluation, PriceBar};
use serde::Deserialize;

/// How a close outside the bands is read. An explicit choice, never
/// implied: the same touch is a fade in one mode and an entry in the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandMode {
    /// Close above the upper band sells, below the lower band buys.
    MeanReversion,
    /// Close above the upper band buys, below the lower band sells.
    Breakout,
}

/// Base trait for all signal engines.
///
/// An engine owns its rolling price window; the strategy loop feeds it
/// one closed bar at a time and asks for an evaluation each tick. An
/// engine that has not seen `warmup()` bars always evaluates to Hold.
pub trait SignalEngine: Send {
    /// Record one closed bar, evicting the oldest once the window is full.
    fn feed(&mut self, bar: PriceBar);

    /// Classify the current window. Never fails: insufficient data is a
    /// Hold, not an error.
    fn evaluate(&self) -> Evaluation;

    /// Bars required before a non-Hold signal is possible.
    fn warmup(&self) -> usize;

    /// Engine name for logging.
    fn name(&self) -> &'static str;
}
