use crate::models::PriceBar;

/// Donchian channel bounds over a fixed lookback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DonchianChannel {
    pub upper: f64,
    pub lower: f64,
}

/// Calculate the Donchian channel over the most recent `period` bars:
/// upper is the highest high, lower the lowest low.
pub fn calculate_donchian(bars: &[PriceBar], period: usize) -> Option<DonchianChannel> {
    if period == 0 || bars.len() < period {
        return None;
    }

    let tail = &bars[bars.len() - period..];
    let upper = tail.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let lower = tail.iter().map(|b| b.low).fold(f64::MAX, f64::min);

    Some(DonchianChannel { upper, lower })
}
