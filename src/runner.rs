use crate::connection::ConnectionSupervisor;
use crate::error::ConnectionError;
use crate::execution::{OrderManager, OrderResult};
use crate::models::{ConnectionState, Timeframe};
use crate::strategy::SignalEngine;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Single coordinating driver: one iteration per cadence tick.
///
/// Each tick checks the link health, pulls new closed bars, feeds the
/// engine, and hands the evaluation to the order manager. The ticker is
/// anchored to the wall clock (`interval_at` + skipped missed ticks), so
/// slow iterations do not accumulate drift. A stop request drains: the
/// current iteration finishes, open positions are optionally flattened,
/// and the gateway is shut down.
pub struct StrategyLoop {
    supervisor: ConnectionSupervisor,
    engine: Box<dyn SignalEngine>,
    orders: OrderManager,
    symbol: String,
    timeframe: Timeframe,
    poll_interval: Duration,
    flatten_on_exit: bool,
    stop: watch::Receiver<bool>,
    last_bar_time: Option<DateTime<Utc>>,
}

impl StrategyLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        supervisor: ConnectionSupervisor,
        engine: Box<dyn SignalEngine>,
        orders: OrderManager,
        symbol: String,
        timeframe: Timeframe,
        poll_interval: Duration,
        flatten_on_exit: bool,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            supervisor,
            engine,
            orders,
            symbol,
            timeframe,
            poll_interval,
            flatten_on_exit,
            stop,
            last_bar_time: None,
        }
    }

    /// Run until stopped or the link dies for good.
    ///
    /// `Err` means the connection was lost and every repair path is
    /// exhausted; the caller maps that onto a non-zero exit code.
    pub async fn run(&mut self) -> Result<(), ConnectionError> {
        match self.supervisor.acquire().await {
            Ok(()) => {}
            Err(ConnectionError::Interrupted) => {
                // Stopped before the first tick; nothing to drain
                self.supervisor.release().await;
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        tracing::info!(
            symbol = %self.symbol,
            timeframe = %self.timeframe,
            engine = self.engine.name(),
            interval_secs = self.poll_interval.as_secs(),
            "strategy loop started"
        );

        // First iteration immediately, then on the fixed cadence
        let mut ticker = interval_at(Instant::now(), self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                biased;
                _ = self.stop.changed() => {
                    tracing::info!("stop requested, draining");
                    break Ok(());
                }
                _ = ticker.tick() => {}
            }

            if let Err(err) = self.iteration().await {
                break Err(err);
            }
        };

        self.drain().await;
        result
    }

    async fn iteration(&mut self) -> Result<(), ConnectionError> {
        match self.supervisor.heartbeat().await {
            ConnectionState::Authenticated => {}
            ConnectionState::Disconnected => {
                // Repair attempts exhausted; trading must halt
                return Err(ConnectionError::NotRunning);
            }
            state => {
                tracing::warn!(%state, "link not authenticated, skipping iteration");
                return Ok(());
            }
        }

        // Enough closed bars to warm the engine up on the first pull,
        // plus slack for any bars closed since the previous tick
        let count = self.engine.warmup() + 2;
        let bars = match self
            .supervisor
            .latest_bars(&self.symbol, self.timeframe, count)
            .await
        {
            Ok(bars) => bars,
            Err(err) => {
                tracing::warn!(error = %err, "bar pull failed, skipping iteration");
                return Ok(());
            }
        };

        let mut fed = 0usize;
        for bar in bars {
            if self.last_bar_time.is_some_and(|seen| bar.timestamp <= seen) {
                continue;
            }
            self.last_bar_time = Some(bar.timestamp);
            self.engine.feed(bar);
            fed += 1;
        }

        if fed == 0 {
            tracing::debug!("no new closed bar this tick");
            return Ok(());
        }

        let eval = self.engine.evaluate();
        tracing::info!(
            symbol = %self.symbol,
            signal = ?eval.signal,
            close = eval.close,
            bands = ?eval.bands,
            "evaluation"
        );

        match self
            .orders
            .apply(&mut self.supervisor, &eval, &self.symbol)
            .await
        {
            Ok(OrderResult::NoChange) => {}
            Ok(result) => tracing::info!(?result, "order action"),
            // Order rejections never kill the loop
            Err(err) => tracing::error!(error = %err, "order failed, continuing"),
        }

        Ok(())
    }

    async fn drain(&mut self) {
        if self.flatten_on_exit && self.orders.open_count() > 0 {
            tracing::info!(
                positions = self.orders.open_count(),
                "flattening open positions before exit"
            );
            self.orders.flatten_all(&mut self.supervisor).await;
        }
        self.supervisor.release().await;
        tracing::info!("strategy loop stopped");
    }

    /// Position book access for status reporting and tests.
    pub fn orders(&self) -> &OrderManager {
        &self.orders
    }
}
