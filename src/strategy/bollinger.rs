use crate::indicators::{calculate_atr, calculate_bollinger};
use crate::models::{Evaluation, PriceBar, Signal};
use crate::strategy::{BandMode, PriceWindow, SignalEngine};
use chrono::{TimeZone, Utc};

/// Bollinger Bands signal engine.
///
/// Keeps a rolling window of the last `period` closed bars and classifies
/// the newest close against bands at `multiplier` standard deviations.
/// A close exactly on a band counts as inside it: equality holds, only a
/// strict break signals, which keeps float-equality edge cases from
/// oscillating.
#[derive(Debug, Clone)]
pub struct BollingerConfig {
    /// Window length (the moving-average period).
    pub period: usize,

    /// Band offset in population standard deviations.
    pub multiplier: f64,

    /// Band-touch semantics.
    pub mode: BandMode,

    /// ATR lookback for stop distances.
    pub atr_period: usize,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            period: 20,
            multiplier: 2.0,
            mode: BandMode::MeanReversion,
            atr_period: 14,
        }
    }
}

pub struct BollingerEngine {
    config: BollingerConfig,
    window: PriceWindow,
}

impl BollingerEngine {
    pub fn new(config: BollingerConfig) -> Self {
        let window = PriceWindow::new(config.period);
        Self { config, window }
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }
}

impl Default for BollingerEngine {
    fn default() -> Self {
        Self::new(BollingerConfig::default())
    }
}

impl SignalEngine for BollingerEngine {
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

        let bands = match calculate_bollinger(
            &self.window.closes(),
            self.config.period,
            self.config.multiplier,
        ) {
            Some(b) => b,
            None => return Evaluation::hold(close, timestamp),
        };

        let signal = if close > bands.upper {
            match self.config.mode {
                BandMode::Breakout => Signal::Buy,
                BandMode::MeanReversion => Signal::Sell,
            }
        } else if close < bands.lower {
            match self.config.mode {
                BandMode::Breakout => Signal::Sell,
                BandMode::MeanReversion => Signal::Buy,
            }
        } else {
            Signal::Hold
        };

        let atr = calculate_atr(&self.window.bars(), self.config.atr_period);

        tracing::debug!(
            close,
            middle = bands.middle,
            upper = bands.upper,
            lower = bands.lower,
            ?signal,
            "bollinger evaluation"
        );

        Evaluation {
            signal,
            bands: Some(bands),
            atr,
            close,
            timestamp,
        }
    }

    fn warmup(&self) -> usize {
        self.config.period
    }

    fn name(&self) -> &'static str {
        "bollinger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn feed_closes(engine: &mut BollingerEngine, closes: &[f64]) {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        for (i, &close) in closes.iter().enumerate() {
            engine.feed(PriceBar {
                timestamp: start + Duration::hours(4 * i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            });
        }
    }

    fn engine(period: usize, mode: BandMode) -> BollingerEngine {
        BollingerEngine::new(BollingerConfig {
            period,
            multiplier: 2.0,
            mode,
            atr_period: 14,
        })
    }

    #[test]
    fn test_hold_until_window_full() {
        for n in 1..=5 {
            let mut eng = engine(n, BandMode::Breakout);
            // Feed n - 1 bars: always Hold, no bands
            feed_closes(&mut eng, &vec![10.0; n - 1]);
            let eval = eng.evaluate();
            assert_eq!(eval.signal, Signal::Hold);
            assert!(eval.bands.is_none());
        }
    }

    #[test]
    fn test_constant_series_always_holds() {
        let mut eng = engine(10, BandMode::Breakout);
        feed_closes(&mut eng, &[10.0; 30]);

        let eval = eng.evaluate();
        let bands = eval.bands.unwrap();
        assert_eq!(bands.upper, bands.middle);
        assert_eq!(bands.lower, bands.middle);
        // Close sits exactly on both collapsed bands: inside, Hold
        assert_eq!(eval.signal, Signal::Hold);
    }

    #[test]
    fn test_breakout_buy_on_upper_break() {
        let mut eng = engine(10, BandMode::Breakout);
        let mut closes = vec![10.0; 9];
        closes.push(15.0);
        feed_closes(&mut eng, &closes);

        let eval = eng.evaluate();
        assert_eq!(eval.signal, Signal::Buy);
        assert!(eval.close > eval.bands.unwrap().upper);
    }

    #[test]
    fn test_mean_reversion_sells_same_break() {
        let mut eng = engine(10, BandMode::MeanReversion);
        let mut closes = vec![10.0; 9];
        closes.push(15.0);
        feed_closes(&mut eng, &closes);

        assert_eq!(eng.evaluate().signal, Signal::Sell);
    }

    #[test]
    fn test_lower_break_mirrors_mode() {
        let mut closes = vec![10.0; 9];
        closes.push(5.0);

        let mut breakout = engine(10, BandMode::Breakout);
        feed_closes(&mut breakout, &closes);
        assert_eq!(breakout.evaluate().signal, Signal::Sell);

        let mut reversion = engine(10, BandMode::MeanReversion);
        feed_closes(&mut reversion, &closes);
        assert_eq!(reversion.evaluate().signal, Signal::Buy);
    }

    #[test]
    fn test_inside_band_holds() {
        let mut eng = engine(10, BandMode::Breakout);
        let closes: Vec<f64> = (0..10).map(|i| 10.0 + 0.1 * (i % 3) as f64).collect();
        feed_closes(&mut eng, &closes);

        let eval = eng.evaluate();
        let bands = eval.bands.unwrap();
        assert!(eval.close < bands.upper && eval.close > bands.lower);
        assert_eq!(eval.signal, Signal::Hold);
    }

    #[test]
    fn test_stale_evaluation_is_stable() {
        // Same window, same answer, no matter how often asked
        let mut eng = engine(10, BandMode::Breakout);
        let mut closes = vec![10.0; 9];
        closes.push(15.0);
        feed_closes(&mut eng, &closes);

        let first = eng.evaluate();
        let second = eng.evaluate();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_window_holds() {
        let eng = engine(10, BandMode::Breakout);
        assert_eq!(eng.evaluate().signal, Signal::Hold);
    }
}
