use thiserror::Error;

/// Failures on the terminal link, surfaced by the connection supervisor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectionError {
    /// The terminal process is not running or refused the connection.
    #[error("terminal not running or unreachable")]
    NotRunning,

    /// The account session rejected the supplied credentials. Never retried
    /// automatically, repeated bad-credential attempts lock accounts.
    #[error("login rejected for account")]
    AuthRejected,

    /// The call did not complete within its deadline.
    #[error("terminal call timed out")]
    Timeout,

    /// A stop request landed while waiting; the operation was abandoned.
    #[error("interrupted by stop request")]
    Interrupted,
}

/// Broker-side order failures. Non-fatal: the strategy loop logs them and
/// continues with the position book unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("order rejected by broker: {0}")]
    Rejected(String),

    #[error("market closed for symbol")]
    MarketClosed,

    #[error("invalid volume for symbol")]
    InvalidVolume,

    #[error("order send timed out")]
    Timeout,
}

/// Startup configuration failures. Fatal: the process exits before any
/// gateway interaction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    MissingField(&'static str),

    #[error("setting {0} out of range: {1}")]
    InvalidRange(&'static str, String),

    #[error("failed to load configuration")]
    Load(#[from] config::ConfigError),
}
