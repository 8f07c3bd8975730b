use crate::indicators::{calculate_atr, calculate_donchian};
use crate::models::{Evaluation, PriceBar, Signal};
use crate::strategy::{PriceWindow, SignalEngine};
use chrono::{TimeZone, Utc};

/// Donchian channel breakout engine.
///
/// Buys when the newest close breaks above the highest high of the
/// preceding `period` bars, sells on a break below the lowest low.
/// The current bar is excluded from its own channel, a bar cannot break
/// a level it set itself.
pub struct DonchianEngine {
    period: usize,
    atr_period: usize,
    window: PriceWindow,
}

impl DonchianEngine {
    pub fn new(period: usize, atr_period: usize) -> Self {
        Self {
            period,
            atr_period,
            // One extra slot so the channel lookback excludes the
            // newest bar
            window: PriceWindow::new(period + 1),
        }
    }
}

impl SignalEngine for DonchianEngine {
    fn feed(&mut self, bar: PriceBar) {
        self.window.push(bar);
    }

    fn evaluate(&self) -> Evaluation {
        let (close, timestamp) = match self.window.last() {
            Some(bar) => (bar.close, bar.timestamp),
            None => return Evaluation::hold(0.0, Utc.timestamp_opt(0, 0).unwrap()),
        };

        if !self.window.is_full() {
            return Evaluation::hold(close, timestamp);
        }

        let bars = self.window.bars();
        let lookback = &bars[..bars.len() - 1];
        let channel = match calculate_donchian(lookback, self.period) {
            Some(c) => c,
            None => return Evaluation::hold(close, timestamp),
        };

        // Exact touches stay inside the channel
        let signal = if close > channel.upper {
            Signal::Buy
        } else if close < channel.lower {
            Signal::Sell
        } else {
            Signal::Hold
        };

        let atr = calculate_atr(&bars, self.atr_period);

        tracing::debug!(
            close,
            upper = channel.upper,
            lower = channel.lower,
            ?signal,
            "donchian evaluation"
        );

        Evaluation {
            signal,
            bands: None,
            atr,
            close,
            timestamp,
        }
    }

    fn warmup(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &'static str {
        "donchian_breakout"
    }
}
