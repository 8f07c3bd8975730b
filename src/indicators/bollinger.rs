use crate::indicators::{calculate_sma, calculate_std_dev};
use crate::models::BollingerSnapshot;

/// Calculate Bollinger Bands over the most recent `period` closes.
///
/// Middle band is the SMA, outer bands sit at `multiplier` population
/// standard deviations either side. Returns None until `period` closes
/// are available.
pub fn calculate_bollinger(
    closes: &[f64],
    period: usize,
    multiplier: f64,
) -> Option<BollingerSnapshot> {
    let middle = calculate_sma(closes, period)?;
    let std_dev = calculate_std_dev(closes, period)?;

    Some(BollingerSnapshot {
        middle,
        upper: middle + multiplier * std_dev,
        lower: middle - multiplier * std_dev,
        std_dev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bollinger_insufficient_data() {
        let closes = vec![1.0; 19];
        assert!(calculate_bollinger(&closes, 20, 2.0).is_none());
    }

    #[test]
    fn test_bollinger_constant_series_collapses() {
        let closes = vec![10.0; 20];
        let bands = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert_eq!(bands.middle, 10.0);
        assert_eq!(bands.upper, 10.0);
        assert_eq!(bands.lower, 10.0);
        assert_eq!(bands.std_dev, 0.0);
    }

    #[test]
    fn test_bollinger_bands_symmetric() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 4) as f64).collect();
        let bands = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert!(bands.std_dev > 0.0);
        let upper_gap = bands.upper - bands.middle;
        let lower_gap = bands.middle - bands.lower;
        assert!((upper_gap - lower_gap).abs() < 1e-12);
        assert!((upper_gap - 2.0 * bands.std_dev).abs() < 1e-12);
    }

    #[test]
    fn test_bollinger_spike_widens_bands() {
        // Nine flat closes then a spike: σ > 0 and the middle shifts up
        let mut closes = vec![10.0; 9];
        closes.push(15.0);
        let bands = calculate_bollinger(&closes, 10, 2.0).unwrap();
        assert_eq!(bands.middle, 10.5);
        assert!(bands.std_dev > 0.0);
        assert!(bands.upper > bands.middle);
        // The spike itself still closes above the upper band at k=2
        assert!(15.0 > bands.upper);
    }
}
