use crate::models::PriceBar;

/// Calculate Average True Range over the most recent `period` bars.
///
/// True range needs the previous close, so `period + 1` bars are
/// required before a value is produced.
pub fn calculate_atr(bars: &[PriceBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let start = bars.len() - period;
    let mut sum = 0.0;
    for i in start..bars.len() {
        let bar = &bars[i];
        let prev_close = bars[i - 1].close;
        let tr = (bar.high - bar.low)
            .max((bar.high - prev_close).abs())
            .max((bar.low - prev_close).abs());
        sum += tr;
    }

    Some(sum / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar {
            timestamp: Utc.timestamp_opt(0, 0).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_atr_insufficient_data() {
        let bars: Vec<PriceBar> = (0..14).map(|_| bar(1.1, 0.9, 1.0)).collect();
        assert!(calculate_atr(&bars, 14).is_none());
    }

    #[test]
    fn test_atr_simple_range() {
        // Constant closes, constant 0.2 high-low range: ATR is the range
        let bars: Vec<PriceBar> = (0..15).map(|_| bar(1.1, 0.9, 1.0)).collect();
        let atr = calculate_atr(&bars, 14).unwrap();
        assert!((atr - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_atr_includes_gap() {
        // A gap from the previous close dominates the bar's own range
        let mut bars: Vec<PriceBar> = (0..3).map(|_| bar(1.0, 1.0, 1.0)).collect();
        bars.push(bar(2.0, 2.0, 2.0)); // gap of 1.0 vs prior close
        let atr = calculate_atr(&bars, 3).unwrap();
        assert!((atr - 1.0 / 3.0).abs() < 1e-12);
    }
}
