use crate::error::{ConnectionError, OrderError};
use crate::gateway::{CloseAck, OrderAck, OrderRequest, TerminalGateway};
use crate::models::{AccountInfo, ConnectionState, PriceBar, Timeframe};
use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

/// Reconnect backoff: exponential from `base` doubling up to `cap`, with
/// additive jitter so a fleet of restarts does not hammer the terminal in
/// lockstep. The jitter only ever lengthens a delay.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-based), jittered.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self.floor(attempt);
        let jitter_ms = rand::thread_rng().gen_range(0..=exp.as_millis() as u64 / 2);
        exp + Duration::from_millis(jitter_ms)
    }

    /// Deterministic lower bound of `delay(attempt)`.
    pub fn floor(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let exp = self.base.saturating_mul(1u32 << shift);
        exp.min(self.cap)
    }
}

/// Credentials for the account session already open in the terminal.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub account: u64,
    pub password: String,
    pub server: String,
}

/// Owns the terminal gateway and its lifecycle.
///
/// The supervisor is the only holder of the gateway handle, so health
/// checks and trading calls are naturally serialized through `&mut self`.
/// Every gateway call runs under `call_timeout`; an elapsed deadline is a
/// failure like any other. Backoff waits select against the stop channel
/// so an operator stop is observed within one tick.
pub struct ConnectionSupervisor {
    gateway: Box<dyn TerminalGateway>,
    credentials: Credentials,
    backoff: BackoffPolicy,
    call_timeout: Duration,
    /// Consecutive failed heartbeats tolerated before the link is
    /// declared dead.
    max_degraded_strikes: u32,
    degraded_strikes: u32,
    state: ConnectionState,
    stop: watch::Receiver<bool>,
}

impl ConnectionSupervisor {
    pub fn new(
        gateway: Box<dyn TerminalGateway>,
        credentials: Credentials,
        backoff: BackoffPolicy,
        call_timeout: Duration,
        max_degraded_strikes: u32,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            gateway,
            credentials,
            backoff,
            call_timeout,
            max_degraded_strikes,
            degraded_strikes: 0,
            state: ConnectionState::Disconnected,
            stop,
        }
    }

    pub fn health(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::info!(from = %self.state, to = %next, "connection state transition");
            self.state = next;
        }
    }

    /// Sleep that aborts as soon as a stop request lands.
    async fn pause(&mut self, duration: Duration) -> Result<(), ConnectionError> {
        if *self.stop.borrow() {
            return Err(ConnectionError::Interrupted);
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.stop.changed() => Err(ConnectionError::Interrupted),
        }
    }

    /// Drive the link to Authenticated.
    ///
    /// Initialization failures retry with backoff up to the attempt
    /// ceiling. A login rejection is terminal for the whole cycle and is
    /// never blindly retried (repeated bad credentials lock accounts);
    /// a transport timeout during login is retried like any other
    /// transient failure.
    pub async fn acquire(&mut self) -> Result<(), ConnectionError> {
        self.transition(ConnectionState::Connecting);

        let mut last_err = ConnectionError::NotRunning;
        let mut initialized = false;
        for attempt in 1..=self.backoff.max_attempts {
            let deadline = self.call_timeout;
            match timeout(deadline, self.gateway.initialize()).await {
                Ok(Ok(())) => {
                    initialized = true;
                    break;
                }
                Ok(Err(err)) => last_err = err,
                Err(_) => last_err = ConnectionError::Timeout,
            }

            tracing::warn!(attempt, error = %last_err, "terminal initialize failed");
            if attempt < self.backoff.max_attempts {
                self.pause(self.backoff.delay(attempt)).await?;
            }
        }

        if !initialized {
            self.transition(ConnectionState::Disconnected);
            return Err(last_err);
        }
        self.transition(ConnectionState::Connected);

        self.login().await?;
        self.degraded_strikes = 0;
        Ok(())
    }

    async fn login(&mut self) -> Result<AccountInfo, ConnectionError> {
        let creds = self.credentials.clone();

        let mut last_err = ConnectionError::Timeout;
        for attempt in 1..=self.backoff.max_attempts {
            let result = timeout(
                self.call_timeout,
                self.gateway
                    .login(creds.account, &creds.password, &creds.server),
            )
            .await;

            match result {
                Ok(Ok(info)) => {
                    self.transition(ConnectionState::Authenticated);
                    tracing::info!(
                        account = info.login,
                        balance = info.balance,
                        currency = %info.currency,
                        "logged in"
                    );
                    return Ok(info);
                }
                Ok(Err(ConnectionError::AuthRejected)) => {
                    // Surface immediately, do not risk an account lockout
                    self.transition(ConnectionState::Disconnected);
                    return Err(ConnectionError::AuthRejected);
                }
                Ok(Err(err)) => last_err = err,
                Err(_) => last_err = ConnectionError::Timeout,
            }

            tracing::warn!(attempt, error = %last_err, "login attempt failed");
            if attempt < self.backoff.max_attempts {
                self.pause(self.backoff.delay(attempt)).await?;
            }
        }

        self.transition(ConnectionState::Disconnected);
        Err(last_err)
    }

    /// One health probe per tick.
    ///
    /// A responsive session keeps (or restores) Authenticated. A failed
    /// probe degrades the link and tries one re-login; after
    /// `max_degraded_strikes` consecutive failures the link is declared
    /// Disconnected, which the strategy loop treats as fatal.
    pub async fn heartbeat(&mut self) -> ConnectionState {
        let probe = match timeout(self.call_timeout, self.gateway.account_info()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        };

        match probe {
            Ok(_) => {
                if self.state == ConnectionState::Degraded {
                    tracing::info!("terminal session recovered");
                }
                self.degraded_strikes = 0;
                self.transition(ConnectionState::Authenticated);
            }
            Err(err) => {
                self.degraded_strikes += 1;
                tracing::warn!(
                    error = %err,
                    strikes = self.degraded_strikes,
                    "heartbeat failed"
                );
                self.transition(ConnectionState::Degraded);

                if self.degraded_strikes > self.max_degraded_strikes {
                    self.transition(ConnectionState::Disconnected);
                } else if self.login().await.is_ok() {
                    self.degraded_strikes = 0;
                }
            }
        }
        self.state
    }

    /// Latest closed bars, oldest first.
    pub async fn latest_bars(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<PriceBar>, ConnectionError> {
        let result = match timeout(
            self.call_timeout,
            self.gateway.copy_rates(symbol, timeframe, count),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        };
        if let Err(ref err) = result {
            tracing::warn!(symbol, error = %err, "rate query failed");
            self.transition(ConnectionState::Degraded);
        }
        result
    }

    pub async fn send_order(&mut self, request: &OrderRequest) -> Result<OrderAck, OrderError> {
        match timeout(self.call_timeout, self.gateway.order_send(request)).await {
            Ok(result) => result,
            Err(_) => Err(OrderError::Timeout),
        }
    }

    pub async fn close_order(&mut self, ticket: u64) -> Result<CloseAck, OrderError> {
        match timeout(self.call_timeout, self.gateway.close_position(ticket)).await {
            Ok(result) => result,
            Err(_) => Err(OrderError::Timeout),
        }
    }

    /// Shut the gateway down and drop to Disconnected.
    pub async fn release(&mut self) {
        self.gateway.shutdown().await;
        self.transition(ConnectionState::Disconnected);
    }
}
