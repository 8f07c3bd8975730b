// Terminal gateway: the external collaborator holding the broker session
pub mod bridge;
pub mod paper;

pub use bridge::BridgeGateway;
pub use paper::PaperGateway;

use crate::error::{ConnectionError, OrderError};
use crate::models::{AccountInfo, PriceBar, Timeframe};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Broker return codes, terminal numbering
pub const RETCODE_DONE: u32 = 10009;
pub const RETCODE_REQUOTE: u32 = 10004;
pub const RETCODE_INVALID_VOLUME: u32 = 10014;
pub const RETCODE_MARKET_CLOSED: u32 = 10018;
pub const RETCODE_NO_MONEY: u32 = 10019;
pub const RETCODE_AUTOTRADING_SERVER: u32 = 10026;
pub const RETCODE_AUTOTRADING_CLIENT: u32 = 10027;

/// Side of an order request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Market order request. `client_id` correlates the request through the
/// journal before the broker assigns a ticket.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub client_id: Uuid,
    pub symbol: String,
    pub side: TradeSide,
    pub volume: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub comment: String,
    pub magic: u64,
}

/// Broker acknowledgement of a filled order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderAck {
    pub ticket: u64,
    pub fill_price: f64,
}

/// Broker acknowledgement of a closed position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloseAck {
    pub ticket: u64,
    pub close_price: f64,
    pub profit: f64,
}

/// Map a broker return code onto the order error taxonomy.
pub fn order_error_from_retcode(retcode: u32, comment: &str) -> OrderError {
    match retcode {
        RETCODE_INVALID_VOLUME => OrderError::InvalidVolume,
        RETCODE_MARKET_CLOSED => OrderError::MarketClosed,
        RETCODE_NO_MONEY => OrderError::Rejected("insufficient margin".to_string()),
        RETCODE_AUTOTRADING_SERVER => {
            OrderError::Rejected("autotrading disabled by server".to_string())
        }
        RETCODE_AUTOTRADING_CLIENT => {
            OrderError::Rejected("autotrading disabled in terminal".to_string())
        }
        _ => OrderError::Rejected(format!("retcode {}: {}", retcode, comment)),
    }
}

/// Operations the trading core consumes from the terminal.
///
/// The terminal is a stateful, non-reentrant external process: calls must
/// be serialized, which the connection supervisor enforces by owning the
/// only handle. Every method is fallible and latent; callers wrap each in
/// a deadline.
///
/// `copy_rates` returns closed bars only, oldest first, newest last.
#[async_trait]
pub trait TerminalGateway: Send {
    async fn initialize(&mut self) -> Result<(), ConnectionError>;

    async fn login(
        &mut self,
        account: u64,
        password: &str,
        server: &str,
    ) -> Result<AccountInfo, ConnectionError>;

    async fn account_info(&mut self) -> Result<AccountInfo, ConnectionError>;

    async fn copy_rates(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<PriceBar>, ConnectionError>;

    async fn order_send(&mut self, request: &OrderRequest) -> Result<OrderAck, OrderError>;

    async fn close_position(&mut self, ticket: u64) -> Result<CloseAck, OrderError>;

    async fn shutdown(&mut self);
}
