use crate::connection::ConnectionSupervisor;
use crate::error::OrderError;
use crate::gateway::{OrderRequest, TradeSide};
use crate::journal::Journal;
use crate::models::{Direction, Evaluation, Exposure, Position, Signal};
use crate::risk::{DailyStats, RiskLimits, RiskTrip};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of applying a signal to the position book.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderResult {
    /// The book already reflects the signal; nothing was sent.
    NoChange,
    /// A risk limit blocked the entry; nothing was sent.
    Blocked(RiskTrip),
    Opened {
        ticket: u64,
    },
    Closed {
        ticket: u64,
        profit: f64,
    },
    Reversed {
        closed: u64,
        opened: u64,
    },
    /// The close leg of a reversal filled but the re-entry was rejected.
    /// The book is Flat, never silently treated as still holding the old
    /// side.
    ReversalAborted {
        closed: u64,
        error: OrderError,
    },
}

/// Sizing and exit parameters applied to every entry.
#[derive(Debug, Clone)]
pub struct OrderPolicy {
    /// Lot volume per entry.
    pub volume: f64,
    /// Stop distance in ATR multiples; 0 disables stops.
    pub atr_stop_multiple: f64,
    /// Take profit at the Bollinger middle band (mean-reversion exits).
    pub take_profit_at_middle: bool,
    /// Magic number stamped on every order.
    pub magic: u64,
}

/// Turns signals into position actions against the terminal.
///
/// Owns the book as an explicit symbol-to-position map and enforces at
/// most one live position per symbol. Broker rejections leave the book
/// unchanged and are surfaced to the caller, which logs and carries on.
pub struct OrderManager {
    positions: HashMap<String, Position>,
    limits: RiskLimits,
    stats: DailyStats,
    policy: OrderPolicy,
    journal: Option<Journal>,
}

impl OrderManager {
    pub fn new(policy: OrderPolicy, limits: RiskLimits, journal: Option<Journal>) -> Self {
        Self {
            positions: HashMap::new(),
            limits,
            stats: DailyStats::new(Utc::now()),
            policy,
            journal,
        }
    }

    pub fn exposure(&self, symbol: &str) -> Exposure {
        match self.positions.get(symbol).map(|p| p.direction) {
            Some(Direction::Long) => Exposure::Long,
            Some(Direction::Short) => Exposure::Short,
            None => Exposure::Flat,
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    /// Apply one evaluation to the book.
    ///
    /// Idempotent: re-applying a signal the book already reflects is a
    /// no-op however often it is called.
    pub async fn apply(
        &mut self,
        link: &mut ConnectionSupervisor,
        eval: &Evaluation,
        symbol: &str,
    ) -> Result<OrderResult, OrderError> {
        self.stats.roll(Utc::now());

        let desired = match eval.signal {
            Signal::Hold => return Ok(OrderResult::NoChange),
            Signal::Buy => Direction::Long,
            Signal::Sell => Direction::Short,
        };

        match self.positions.get(symbol).map(|p| p.direction) {
            Some(current) if current == desired => Ok(OrderResult::NoChange),
            Some(_) => self.reverse(link, eval, symbol, desired).await,
            None => {
                if let Err(trip) = self.limits.check(&self.stats, self.positions.len()) {
                    tracing::warn!(symbol, ?trip, "entry blocked by risk limit");
                    return Ok(OrderResult::Blocked(trip));
                }
                let position = self.open(link, eval, symbol, desired).await?;
                Ok(OrderResult::Opened {
                    ticket: position.ticket,
                })
            }
        }
    }

    /// Close the opposite side, then re-enter in `desired` direction.
    ///
    /// Atomic from the caller's perspective: a failed close leaves the
    /// book unchanged, a failed re-entry leaves it Flat and says so.
    async fn reverse(
        &mut self,
        link: &mut ConnectionSupervisor,
        eval: &Evaluation,
        symbol: &str,
        desired: Direction,
    ) -> Result<OrderResult, OrderError> {
        let (closed, profit) = self.close(link, symbol).await?;

        if let Err(trip) = self.limits.check(&self.stats, self.positions.len()) {
            tracing::warn!(symbol, ?trip, "reversal re-entry blocked by risk limit");
            return Ok(OrderResult::Closed {
                ticket: closed,
                profit,
            });
        }

        match self.open(link, eval, symbol, desired).await {
            Ok(position) => Ok(OrderResult::Reversed {
                closed,
                opened: position.ticket,
            }),
            Err(error) => {
                tracing::warn!(symbol, %error, "re-entry after close failed, book is flat");
                Ok(OrderResult::ReversalAborted { closed, error })
            }
        }
    }

    async fn open(
        &mut self,
        link: &mut ConnectionSupervisor,
        eval: &Evaluation,
        symbol: &str,
        direction: Direction,
    ) -> Result<Position, OrderError> {
        let stop_loss = if self.policy.atr_stop_multiple > 0.0 {
            eval.atr.map(|atr| {
                let distance = atr * self.policy.atr_stop_multiple;
                match direction {
                    Direction::Long => eval.close - distance,
                    Direction::Short => eval.close + distance,
                }
            })
        } else {
            None
        };

        // Middle-band target only when it sits on the profitable side
        let take_profit = if self.policy.take_profit_at_middle {
            eval.bands.map(|b| b.middle).filter(|&tp| match direction {
                Direction::Long => tp > eval.close,
                Direction::Short => tp < eval.close,
            })
        } else {
            None
        };

        let request = OrderRequest {
            client_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side: match direction {
                Direction::Long => TradeSide::Buy,
                Direction::Short => TradeSide::Sell,
            },
            volume: self.policy.volume,
            stop_loss,
            take_profit,
            comment: format!("{} entry", direction),
            magic: self.policy.magic,
        };

        let ack = link.send_order(&request).await?;

        let position = Position {
            symbol: symbol.to_string(),
            direction,
            volume: request.volume,
            entry_price: ack.fill_price,
            entry_time: Utc::now(),
            ticket: ack.ticket,
            stop_loss,
            take_profit,
        };

        tracing::info!(
            symbol,
            %direction,
            ticket = ack.ticket,
            price = ack.fill_price,
            volume = request.volume,
            "position opened"
        );

        if let Some(journal) = &self.journal {
            journal.record_entry(&position, request.client_id);
        }
        self.stats.record_entry();
        self.positions.insert(symbol.to_string(), position.clone());
        Ok(position)
    }

    /// Close the live position for `symbol`. A broker rejection leaves
    /// the book unchanged.
    async fn close(
        &mut self,
        link: &mut ConnectionSupervisor,
        symbol: &str,
    ) -> Result<(u64, f64), OrderError> {
        let ticket = match self.positions.get(symbol) {
            Some(position) => position.ticket,
            None => return Err(OrderError::Rejected(format!("no position for {}", symbol))),
        };

        let ack = link.close_order(ticket).await?;

        // Only mutate the book once the broker confirmed the close
        let position = self
            .positions
            .remove(symbol)
            .expect("position vanished mid-close");

        tracing::info!(
            symbol,
            ticket,
            price = ack.close_price,
            profit = ack.profit,
            "position closed"
        );

        if let Some(journal) = &self.journal {
            journal.record_exit(&position, ack.close_price, ack.profit);
        }
        self.stats.record_close(ack.profit);
        Ok((ticket, ack.profit))
    }

    /// Close every open position, used when draining with
    /// flatten-on-exit enabled. Failures are logged per symbol and do
    /// not stop the sweep.
    pub async fn flatten_all(&mut self, link: &mut ConnectionSupervisor) {
        let symbols: Vec<String> = self.positions.keys().cloned().collect();
        for symbol in symbols {
            match self.close(link, &symbol).await {
                Ok((ticket, profit)) => {
                    tracing::info!(symbol = %symbol, ticket, profit, "flattened on exit");
                }
                Err(error) => {
                    tracing::error!(symbol = %symbol, %error, "failed to flatten position");
                }
            }
        }
    }
}
