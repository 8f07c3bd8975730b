use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// Hard limits that gate new entries. A tripped limit skips the entry and
/// is logged; it never crashes the loop.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskLimits {
    /// Ceiling on simultaneously open positions across all symbols.
    pub max_open_positions: usize,
    /// Entries allowed per UTC day.
    pub max_daily_trades: u32,
    /// Realized loss per UTC day, in account currency, that halts entries.
    pub max_daily_loss: f64,
    /// Losing closes in a row that halt entries.
    pub max_consecutive_losses: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_open_positions: 2,
            max_daily_trades: 4,
            max_daily_loss: 500.0,
            max_consecutive_losses: 5,
        }
    }
}

/// Which limit blocked an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTrip {
    MaxOpenPositions,
    DailyTradeLimit,
    DailyLoss,
    ConsecutiveLosses,
}

/// Per-day trading counters, reset on UTC date rollover.
#[derive(Debug, Clone)]
pub struct DailyStats {
    date: NaiveDate,
    pub daily_pnl: f64,
    pub trades_today: u32,
    pub consecutive_losses: u32,
}

impl DailyStats {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            date: now.date_naive(),
            daily_pnl: 0.0,
            trades_today: 0,
            consecutive_losses: 0,
        }
    }

    /// Reset the day counters if the UTC date has rolled over.
    /// Consecutive losses carry across days.
    pub fn roll(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.date {
            tracing::info!(date = %today, "daily risk counters reset");
            self.date = today;
            self.daily_pnl = 0.0;
            self.trades_today = 0;
        }
    }

    pub fn record_entry(&mut self) {
        self.trades_today += 1;
    }

    pub fn record_close(&mut self, profit: f64) {
        self.daily_pnl += profit;
        if profit < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
    }
}

impl RiskLimits {
    /// Check whether a new entry is allowed right now.
    pub fn check(&self, stats: &DailyStats, open_positions: usize) -> Result<(), RiskTrip> {
        if open_positions >= self.max_open_positions {
            return Err(RiskTrip::MaxOpenPositions);
        }
        if stats.trades_today >= self.max_daily_trades {
            return Err(RiskTrip::DailyTradeLimit);
        }
        if stats.daily_pnl <= -self.max_daily_loss {
            return Err(RiskTrip::DailyLoss);
        }
        if stats.consecutive_losses >= self.max_consecutive_losses {
            return Err(RiskTrip::ConsecutiveLosses);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fresh_day_allows_entry() {
        let limits = RiskLimits::default();
        let stats = DailyStats::new(Utc::now());
        assert!(limits.check(&stats, 0).is_ok());
    }

    #[test]
    fn test_position_ceiling() {
        let limits = RiskLimits::default();
        let stats = DailyStats::new(Utc::now());
        assert_eq!(limits.check(&stats, 2), Err(RiskTrip::MaxOpenPositions));
    }

    #[test]
    fn test_daily_trade_limit() {
        let limits = RiskLimits::default();
        let mut stats = DailyStats::new(Utc::now());
        for _ in 0..4 {
            stats.record_entry();
        }
        assert_eq!(limits.check(&stats, 0), Err(RiskTrip::DailyTradeLimit));
    }

    #[test]
    fn test_daily_loss_halts() {
        let limits = RiskLimits::default();
        let mut stats = DailyStats::new(Utc::now());
        stats.record_close(-600.0);
        assert_eq!(limits.check(&stats, 0), Err(RiskTrip::DailyLoss));
    }

    #[test]
    fn test_consecutive_losses_halt_and_reset_on_win() {
        let limits = RiskLimits::default();
        let mut stats = DailyStats::new(Utc::now());
        for _ in 0..5 {
            stats.record_close(-10.0);
        }
        assert_eq!(limits.check(&stats, 0), Err(RiskTrip::ConsecutiveLosses));

        stats.record_close(25.0);
        // Daily loss is only -25 at this point, far above the halt level
        assert!(limits.check(&stats, 0).is_ok());
    }

    #[test]
    fn test_rollover_resets_day_counters() {
        let limits = RiskLimits::default();
        let yesterday = Utc::now() - Duration::days(1);
        let mut stats = DailyStats::new(yesterday);
        stats.record_entry();
        stats.record_entry();
        stats.record_close(-600.0);

        stats.roll(Utc::now());
        assert_eq!(stats.trades_today, 0);
        assert_eq!(stats.daily_pnl, 0.0);
        // Loss streak survives the rollover
        assert_eq!(stats.consecutive_losses, 1);
        assert!(limits.check(&stats, 0).is_ok());
    }
}
