/// Calculate Simple Moving Average (SMA) over the most recent `period` values
pub fn calculate_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let sum: f64 = values.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate the population standard deviation over the most recent
/// `period` values
pub fn calculate_std_dev(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let mean = calculate_sma(values, period)?;
    let variance: f64 = values
        .iter()
        .rev()
        .take(period)
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / period as f64;

    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let values = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        assert_eq!(calculate_sma(&values, 5), Some(104.0));
    }

    #[test]
    fn test_sma_uses_tail() {
        let values = vec![1.0, 1.0, 100.0, 102.0, 104.0];
        assert_eq!(calculate_sma(&values, 3), Some(102.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let values = vec![100.0, 102.0];
        assert!(calculate_sma(&values, 5).is_none());
    }

    #[test]
    fn test_std_dev_constant_series_is_zero() {
        let values = vec![10.0; 20];
        assert_eq!(calculate_std_dev(&values, 20), Some(0.0));
    }

    #[test]
    fn test_std_dev_population() {
        // Population σ of [2, 4, 4, 4, 5, 5, 7, 9] is exactly 2
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let sd = calculate_std_dev(&values, 8).unwrap();
        assert!((sd - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_std_dev_insufficient_data() {
        assert!(calculate_std_dev(&[1.0, 2.0], 3).is_none());
    }
}
