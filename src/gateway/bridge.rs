use crate::error::{ConnectionError, OrderError};
use crate::gateway::{
    order_error_from_retcode, CloseAck, OrderAck, OrderRequest, TerminalGateway, RETCODE_DONE,
};
use crate::models::{AccountInfo, PriceBar, Timeframe};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP client for the terminal bridge sidecar.
///
/// The terminal itself has no native wire protocol we can speak from
/// here; deployments run a small bridge process next to it that exposes
/// the terminal's initialize/login/rates/order primitives as local JSON
/// endpoints. The bridge holds no state of its own, it proxies into the
/// live terminal session.
pub struct BridgeGateway {
    http: Client,
    base_url: String,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    account: u64,
    password: &'a str,
    server: &'a str,
}

#[derive(Deserialize)]
struct RatesResponse {
    bars: Vec<PriceBar>,
}

#[derive(Deserialize)]
struct TradeResponse {
    retcode: u32,
    #[serde(default)]
    ticket: u64,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    profit: f64,
    #[serde(default)]
    comment: String,
}

#[derive(Serialize)]
struct CloseBody {
    ticket: u64,
}

impl BridgeGateway {
    pub fn new(base_url: impl Into<String>, call_timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(call_timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn connection_error(err: reqwest::Error) -> ConnectionError {
        if err.is_timeout() {
            ConnectionError::Timeout
        } else {
            // Connect refused, dropped socket, bad response: the terminal
            // side is not serving us
            ConnectionError::NotRunning
        }
    }

    fn order_transport_error(err: reqwest::Error) -> OrderError {
        if err.is_timeout() {
            OrderError::Timeout
        } else {
            OrderError::Rejected(format!("bridge transport: {}", err))
        }
    }
}

#[async_trait]
impl TerminalGateway for BridgeGateway {
    async fn initialize(&mut self) -> Result<(), ConnectionError> {
        let response = self
            .http
            .post(self.url("/initialize"))
            .send()
            .await
            .map_err(Self::connection_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ConnectionError::NotRunning)
        }
    }

    async fn login(
        &mut self,
        account: u64,
        password: &str,
        server: &str,
    ) -> Result<AccountInfo, ConnectionError> {
        let response = self
            .http
            .post(self.url("/login"))
            .json(&LoginBody {
                account,
                password,
                server,
            })
            .send()
            .await
            .map_err(Self::connection_error)?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ConnectionError::AuthRejected),
            status if status.is_success() => response
                .json::<AccountInfo>()
                .await
                .map_err(Self::connection_error),
            _ => Err(ConnectionError::NotRunning),
        }
    }

    async fn account_info(&mut self) -> Result<AccountInfo, ConnectionError> {
        let response = self
            .http
            .get(self.url("/account"))
            .send()
            .await
            .map_err(Self::connection_error)?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(ConnectionError::AuthRejected),
            status if status.is_success() => response
                .json::<AccountInfo>()
                .await
                .map_err(Self::connection_error),
            _ => Err(ConnectionError::NotRunning),
        }
    }

    async fn copy_rates(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<PriceBar>, ConnectionError> {
        let url = format!(
            "{}?symbol={}&timeframe={}&count={}",
            self.url("/rates"),
            symbol,
            timeframe,
            count
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(Self::connection_error)?;

        if !response.status().is_success() {
            return Err(ConnectionError::NotRunning);
        }

        let rates: RatesResponse = response.json().await.map_err(Self::connection_error)?;
        Ok(rates.bars)
    }

    async fn order_send(&mut self, request: &OrderRequest) -> Result<OrderAck, OrderError> {
        let response = self
            .http
            .post(self.url("/order"))
            .json(request)
            .send()
            .await
            .map_err(Self::order_transport_error)?;

        let trade: TradeResponse = response
            .json()
            .await
            .map_err(Self::order_transport_error)?;

        if trade.retcode != RETCODE_DONE {
            return Err(order_error_from_retcode(trade.retcode, &trade.comment));
        }

        Ok(OrderAck {
            ticket: trade.ticket,
            fill_price: trade.price,
        })
    }

    async fn close_position(&mut self, ticket: u64) -> Result<CloseAck, OrderError> {
        let response = self
            .http
            .post(self.url("/close"))
            .json(&CloseBody { ticket })
            .send()
            .await
            .map_err(Self::order_transport_error)?;

        let trade: TradeResponse = response
            .json()
            .await
            .map_err(Self::order_transport_error)?;

        if trade.retcode != RETCODE_DONE {
            return Err(order_error_from_retcode(trade.retcode, &trade.comment));
        }

        Ok(CloseAck {
            ticket,
            close_price: trade.price,
            profit: trade.profit,
        })
    }

    async fn shutdown(&mut self) {
        // Best effort: the terminal may already be gone
        let _ = self.http.post(self.url("/shutdown")).send().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{TradeSide, RETCODE_MARKET_CLOSED};
    use uuid::Uuid;

    fn gateway(server: &mockito::ServerGuard) -> BridgeGateway {
        BridgeGateway::new(server.url(), Duration::from_secs(2))
    }

    fn order_request() -> OrderRequest {
        OrderRequest {
            client_id: Uuid::new_v4(),
            symbol: "EURUSD".to_string(),
            side: TradeSide::Buy,
            volume: 0.1,
            stop_loss: None,
            take_profit: None,
            comment: "test entry".to_string(),
            magic: 1001,
        }
    }

    #[tokio::test]
    async fn test_initialize_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/initialize")
            .with_status(200)
            .create_async()
            .await;

        let mut gw = gateway(&server);
        assert!(gw.initialize().await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_initialize_refused_maps_to_not_running() {
        // Nothing listening at this port
        let mut gw = BridgeGateway::new("http://127.0.0.1:1", Duration::from_secs(1));
        assert_eq!(gw.initialize().await, Err(ConnectionError::NotRunning));
    }

    #[tokio::test]
    async fn test_login_unauthorized_maps_to_auth_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(401)
            .create_async()
            .await;

        let mut gw = gateway(&server);
        let result = gw.login(12345678, "wrong", "Broker-Demo").await;
        assert_eq!(result, Err(ConnectionError::AuthRejected));
    }

    #[tokio::test]
    async fn test_login_returns_account_info() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"login": 12345678, "balance": 10000.0, "currency": "USD", "margin_free": 9800.0}"#,
            )
            .create_async()
            .await;

        let mut gw = gateway(&server);
        let info = gw.login(12345678, "pw", "Broker-Demo").await.unwrap();
        assert_eq!(info.login, 12345678);
        assert_eq!(info.currency, "USD");
    }

    #[tokio::test]
    async fn test_copy_rates_parses_bars() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rates")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"bars": [
                    {"timestamp": "2025-06-02T08:00:00Z", "open": 1.08, "high": 1.09, "low": 1.07, "close": 1.085, "volume": 4200.0},
                    {"timestamp": "2025-06-02T12:00:00Z", "open": 1.085, "high": 1.10, "low": 1.08, "close": 1.095, "volume": 3900.0}
                ]}"#,
            )
            .create_async()
            .await;

        let mut gw = gateway(&server);
        let bars = gw.copy_rates("EURUSD", Timeframe::H4, 2).await.unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[1].close, 1.095);
    }

    #[tokio::test]
    async fn test_order_send_done() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/order")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"retcode": 10009, "ticket": 555001, "price": 1.0851}"#)
            .create_async()
            .await;

        let mut gw = gateway(&server);
        let ack = gw.order_send(&order_request()).await.unwrap();
        assert_eq!(ack.ticket, 555001);
        assert_eq!(ack.fill_price, 1.0851);
    }

    #[tokio::test]
    async fn test_order_send_rejection_maps_retcode() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/order")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"retcode": 10018, "comment": "Market closed"}"#)
            .create_async()
            .await;

        let mut gw = gateway(&server);
        let result = gw.order_send(&order_request()).await;
        assert_eq!(result, Err(OrderError::MarketClosed));
        assert_eq!(RETCODE_MARKET_CLOSED, 10018);
    }

    #[tokio::test]
    async fn test_close_position_returns_profit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/close")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"retcode": 10009, "ticket": 555001, "price": 1.0900, "profit": 49.0}"#)
            .create_async()
            .await;

        let mut gw = gateway(&server);
        let ack = gw.close_position(555001).await.unwrap();
        assert_eq!(ack.profit, 49.0);
    }
}
