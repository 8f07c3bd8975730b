use crate::error::{ConnectionError, OrderError};
use crate::gateway::{CloseAck, OrderAck, OrderRequest, TerminalGateway, TradeSide};
use crate::models::{AccountInfo, PriceBar, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Simulated terminal for dry runs.
///
/// Synthesizes a seeded random-walk bar series aligned to timeframe
/// boundaries and fills every order instantly at the latest close.
/// Lets the full daemon run with no terminal present.
pub struct PaperGateway {
    rng: StdRng,
    last_close: f64,
    history: Vec<PriceBar>,
    next_ticket: u64,
    open: HashMap<u64, PaperFill>,
    balance: f64,
}

struct PaperFill {
    side: TradeSide,
    volume: f64,
    price: f64,
}

impl PaperGateway {
    pub fn new(seed: u64, start_price: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            last_close: start_price,
            history: Vec::new(),
            next_ticket: 100_000,
            open: HashMap::new(),
            balance: 10_000.0,
        }
    }

    fn account(&self) -> AccountInfo {
        AccountInfo {
            login: 0,
            balance: self.balance,
            currency: "USD".to_string(),
            margin_free: self.balance,
        }
    }

    fn synthesize_bar(&mut self, timestamp: DateTime<Utc>) -> PriceBar {
        let open = self.last_close;
        // ±0.3% step per bar
        let drift: f64 = self.rng.gen_range(-0.003..0.003);
        let close = open * (1.0 + drift);
        let spread = open * self.rng.gen_range(0.0005..0.002);

        let bar = PriceBar {
            timestamp,
            open,
            high: open.max(close) + spread,
            low: open.min(close) - spread,
            close,
            volume: self.rng.gen_range(1_000.0..10_000.0),
        };
        self.last_close = close;
        bar
    }

    /// Extend the synthetic series with every closed bar up to now.
    fn fill_history(&mut self, timeframe: Timeframe) {
        let step = timeframe.as_secs() as i64;
        let now = Utc::now().timestamp();
        // Most recent boundary with a fully closed bar behind it
        let latest_closed = (now / step) * step - step;

        let mut next = match self.history.last() {
            Some(bar) => bar.timestamp.timestamp() + step,
            None => latest_closed - step * 256,
        };

        while next <= latest_closed {
            let ts = DateTime::<Utc>::from_timestamp(next, 0)
                .unwrap_or_else(Utc::now);
            let bar = self.synthesize_bar(ts);
            self.history.push(bar);
            next += step;
        }
    }
}

#[async_trait]
impl TerminalGateway for PaperGateway {
    async fn initialize(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }

    async fn login(
        &mut self,
        _account: u64,
        _password: &str,
        _server: &str,
    ) -> Result<AccountInfo, ConnectionError> {
        Ok(self.account())
    }

    async fn account_info(&mut self) -> Result<AccountInfo, ConnectionError> {
        Ok(self.account())
    }

    async fn copy_rates(
        &mut self,
        _symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<PriceBar>, ConnectionError> {
        self.fill_history(timeframe);
        let start = self.history.len().saturating_sub(count);
        Ok(self.history[start..].to_vec())
    }

    async fn order_send(&mut self, request: &OrderRequest) -> Result<OrderAck, OrderError> {
        if request.volume <= 0.0 {
            return Err(OrderError::InvalidVolume);
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let price = self.last_close;

        self.open.insert(
            ticket,
            PaperFill {
                side: request.side,
                volume: request.volume,
                price,
            },
        );

        Ok(OrderAck {
            ticket,
            fill_price: price,
        })
    }

    async fn close_position(&mut self, ticket: u64) -> Result<CloseAck, OrderError> {
        let fill = self
            .open
            .remove(&ticket)
            .ok_or_else(|| OrderError::Rejected(format!("unknown ticket {}", ticket)))?;

        let close_price = self.last_close;
        let signed = match fill.side {
            TradeSide::Buy => close_price - fill.price,
            TradeSide::Sell => fill.price - close_price,
        };
        // Notional P&L on a standard 100k lot
        let profit = signed * fill.volume * 100_000.0;
        self.balance += profit;

        Ok(CloseAck {
            ticket,
            close_price,
            profit,
        })
    }

    async fn shutdown(&mut self) {}
}
