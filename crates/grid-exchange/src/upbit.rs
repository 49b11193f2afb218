//! Upbit REST 클라이언트.
//!
//! 인증은 Upbit JWT 규격을 따릅니다: 요청 파라미터를 urlencode한
//! 문자열의 SHA512 해시를 `query_hash`로 넣고, secret key로 HS256
//! 서명한 토큰을 `Authorization: Bearer`로 보냅니다.
//!
//! 시세 조회(`/ticker`)는 공개 엔드포인트라 서명 없이 호출합니다.

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, Method, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use grid_core::{OrderAck, OrderSnapshot, OrderState, Side};

use crate::client::ExchangeClient;
use crate::error::ExchangeError;

const DEFAULT_BASE_URL: &str = "https://api.upbit.com/v1";

// ============================================================================
// 설정
// ============================================================================

/// Upbit API 자격 증명.
#[derive(Clone)]
pub struct UpbitCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl UpbitCredentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl std::fmt::Debug for UpbitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpbitCredentials")
            .field("access_key", &"***")
            .field("secret_key", &"***")
            .finish()
    }
}

// ============================================================================
// API 페이로드/응답 타입
// ============================================================================

#[derive(Debug, Serialize)]
struct UpbitPayload {
    access_key: String,
    nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash_alg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpbitTicker {
    market: String,
    trade_price: f64,
}

#[derive(Debug, Deserialize)]
struct UpbitBalance {
    currency: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct UpbitOrder {
    uuid: String,
    side: String,
    state: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    remaining_volume: Option<String>,
    #[serde(default)]
    executed_volume: Option<String>,
    #[serde(default)]
    paid_fee: Option<String>,
}

impl UpbitOrder {
    /// 중립 `OrderSnapshot`으로 변환.
    fn into_snapshot(self) -> Result<OrderSnapshot, ExchangeError> {
        let state = OrderState::parse(&self.state)
            .ok_or_else(|| ExchangeError::Parse(format!("알 수 없는 주문 상태: {}", self.state)))?;
        let side = match self.side.as_str() {
            "bid" => Side::Buy,
            "ask" => Side::Sell,
            other => {
                return Err(ExchangeError::Parse(format!("알 수 없는 주문 방향: {}", other)))
            }
        };

        let dec = |v: Option<String>| v.and_then(|s| Decimal::from_str(&s).ok());

        Ok(OrderSnapshot {
            order_id: self.uuid,
            state,
            side,
            executed_volume: dec(self.executed_volume),
            remaining_volume: dec(self.remaining_volume),
            price: dec(self.price),
            paid_fee: dec(self.paid_fee),
        })
    }
}

// ============================================================================
// 클라이언트
// ============================================================================

/// 실거래 Upbit REST 클라이언트.
///
/// `public()`으로 만들면 자격 증명 없이 시세 조회만 가능합니다
/// (dry-run 클라이언트가 가격 조회용으로 사용).
pub struct UpbitExchange {
    http: Client,
    credentials: Option<UpbitCredentials>,
    base_url: String,
}

impl UpbitExchange {
    /// 자격 증명이 있는 실거래 클라이언트 생성.
    pub fn new(credentials: UpbitCredentials) -> Self {
        Self {
            http: Client::new(),
            credentials: Some(credentials),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// 시세 조회 전용(무인증) 클라이언트 생성.
    pub fn public() -> Self {
        Self {
            http: Client::new(),
            credentials: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// 테스트용 base URL 교체.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn generate_token(&self, query_hash: Option<String>) -> Result<String, ExchangeError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            ExchangeError::Authentication("자격 증명 없이 개인 엔드포인트 호출".to_string())
        })?;

        let payload = UpbitPayload {
            access_key: credentials.access_key.clone(),
            nonce: Uuid::new_v4().to_string(),
            query_hash,
            query_hash_alg: Some("SHA512".to_string()),
        };

        let token = encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(credentials.secret_key.as_bytes()),
        )
        .map_err(|e| ExchangeError::Authentication(e.to_string()))?;

        Ok(format!("Bearer {}", token))
    }

    /// 파라미터를 urlencode한 문자열의 SHA512 hex (Upbit JWT 규격).
    fn hash_params(params: &serde_json::Value) -> Option<String> {
        let query_string = serde_urlencoded::to_string(params).unwrap_or_default();
        if query_string.is_empty() {
            return None;
        }
        use sha2::{Digest, Sha512};
        let mut hasher = Sha512::new();
        hasher.update(query_string.as_bytes());
        Some(hex::encode(hasher.finalize()))
    }

    /// 서명된 개인 엔드포인트 요청.
    async fn signed(
        &self,
        method: Method,
        endpoint: &str,
        query: Option<&serde_json::Value>,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ExchangeError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut builder = self.http.request(method, &url);

        let mut query_hash = None;

        if let Some(q) = query {
            query_hash = Self::hash_params(q);
            builder = builder.query(q);
        }

        // POST/DELETE: body를 query string으로 변환 후 해싱
        if let Some(b) = body {
            query_hash = Self::hash_params(b);
            builder = builder.json(b);
        }

        let token = self.generate_token(query_hash)?;

        builder
            .header("Authorization", token)
            .send()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))
    }

    /// 성공 응답 본문을 JSON으로 디코드.
    async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, ExchangeError> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExchangeError::Api(format!("{}: {}", status, error_text)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ExchangeError::Parse(e.to_string()))
    }
}

// ============================================================================
// ExchangeClient 구현
// ============================================================================

#[async_trait]
impl ExchangeClient for UpbitExchange {
    async fn get_price(&self, market: &str) -> Result<Decimal, ExchangeError> {
        let url = format!("{}/ticker", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("markets", market)])
            .send()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?;

        let tickers: Vec<UpbitTicker> = Self::decode(response).await?;
        let ticker = tickers
            .into_iter()
            .find(|t| t.market == market)
            .ok_or_else(|| ExchangeError::Api(format!("시세 없음: {}", market)))?;

        Decimal::from_f64_retain(ticker.trade_price)
            .ok_or_else(|| ExchangeError::Parse(format!("가격 변환 실패: {}", ticker.trade_price)))
    }

    async fn buy_market(&self, market: &str, krw: i64) -> Result<OrderAck, ExchangeError> {
        // 시장가 매수: ord_type=price, price=총액
        let body = serde_json::json!({
            "market": market,
            "side": Side::Buy.as_upbit(),
            "ord_type": "price",
            "price": krw.to_string(),
        });

        info!(market = market, krw = krw, "시장가 매수 주문");

        let response = self.signed(Method::POST, "/orders", None, Some(&body)).await?;
        let order: UpbitOrder = Self::decode(response).await?;
        Ok(OrderAck::live(order.uuid))
    }

    async fn sell_limit(
        &self,
        market: &str,
        price: Decimal,
        qty: Decimal,
    ) -> Result<OrderAck, ExchangeError> {
        let body = serde_json::json!({
            "market": market,
            "side": Side::Sell.as_upbit(),
            "ord_type": "limit",
            "volume": qty.to_string(),
            "price": price.to_string(),
        });

        info!(market = market, price = %price, qty = %qty, "지정가 매도 주문");

        let response = self.signed(Method::POST, "/orders", None, Some(&body)).await?;
        let order: UpbitOrder = Self::decode(response).await?;
        Ok(OrderAck::live(order.uuid))
    }

    async fn cancel_order(&self, order_id: &str) -> Result<OrderAck, ExchangeError> {
        let query = serde_json::json!({ "uuid": order_id });

        info!(order_id = order_id, "주문 취소");

        let response = self.signed(Method::DELETE, "/order", Some(&query), None).await?;
        let order: UpbitOrder = Self::decode(response).await?;
        Ok(OrderAck::live(order.uuid))
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<OrderSnapshot>, ExchangeError> {
        let query = serde_json::json!({ "uuid": order_id });

        let response = self.signed(Method::GET, "/order", Some(&query), None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let order: UpbitOrder = Self::decode(response).await?;
        Ok(Some(order.into_snapshot()?))
    }

    async fn get_balance(&self, currency: &str) -> Result<Decimal, ExchangeError> {
        let response = self.signed(Method::GET, "/accounts", None, None).await?;
        let balances: Vec<UpbitBalance> = Self::decode(response).await?;

        match balances.into_iter().find(|b| b.currency == currency) {
            Some(b) => Decimal::from_str(&b.balance)
                .map_err(|e| ExchangeError::Parse(format!("잔고 파싱 실패: {}", e))),
            None => Ok(Decimal::ZERO),
        }
    }

    fn exchange_name(&self) -> &str {
        "upbit"
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn test_client(base_url: &str) -> UpbitExchange {
        UpbitExchange::new(UpbitCredentials::new("test-access", "test-secret"))
            .with_base_url(base_url)
    }

    #[tokio::test]
    async fn test_get_price() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ticker")
            .match_query(Matcher::UrlEncoded("markets".into(), "KRW-BTC".into()))
            .with_status(200)
            .with_body(r#"[{"market":"KRW-BTC","trade_price":50000000.0}]"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let price = client.get_price("KRW-BTC").await.unwrap();

        assert_eq!(price, dec!(50000000));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_price_unknown_market() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ticker")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[]"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client.get_price("KRW-NOPE").await;

        assert!(matches!(result, Err(ExchangeError::Api(_))));
    }

    #[tokio::test]
    async fn test_buy_market_sends_signed_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders")
            .match_header("authorization", Matcher::Regex("^Bearer .+".to_string()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "market": "KRW-BTC",
                "side": "bid",
                "ord_type": "price",
                "price": "40000",
            })))
            .with_status(201)
            .with_body(r#"{"uuid":"order-uuid-1","side":"bid","state":"wait"}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let ack = client.buy_market("KRW-BTC", 40_000).await.unwrap();

        assert_eq!(ack.order_id, "order-uuid-1");
        assert!(!ack.dry_run);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sell_limit_sends_volume_and_price() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders")
            .match_header("authorization", Matcher::Regex("^Bearer .+".to_string()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "side": "ask",
                "ord_type": "limit",
                "volume": "0.0008",
                "price": "51500000",
            })))
            .with_status(201)
            .with_body(r#"{"uuid":"order-uuid-2","side":"ask","state":"wait"}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let ack = client
            .sell_limit("KRW-BTC", dec!(51500000), dec!(0.0008))
            .await
            .unwrap();

        assert_eq!(ack.order_id, "order-uuid-2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_order_done_state() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/order")
            .match_query(Matcher::UrlEncoded("uuid".into(), "order-uuid-1".into()))
            .with_status(200)
            .with_body(
                r#"{"uuid":"order-uuid-1","side":"bid","state":"done",
                    "price":"40000","executed_volume":"0.0008","paid_fee":"20.0"}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server.url());
        let snapshot = client.get_order("order-uuid-1").await.unwrap().unwrap();

        assert!(snapshot.state.is_filled());
        assert_eq!(snapshot.side, Side::Buy);
        assert_eq!(snapshot.executed_volume, Some(dec!(0.0008)));
    }

    #[tokio::test]
    async fn test_get_order_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/order")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"name":"order_not_found"}}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client.get_order("missing").await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_balance_missing_currency_is_zero() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/accounts")
            .with_status(200)
            .with_body(r#"[{"currency":"KRW","balance":"123456.78"}]"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        assert_eq!(client.get_balance("KRW").await.unwrap(), dec!(123456.78));
        assert_eq!(client.get_balance("BTC").await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_public_client_rejects_private_calls() {
        let client = UpbitExchange::public();
        let result = client.buy_market("KRW-BTC", 40_000).await;

        assert!(matches!(result, Err(ExchangeError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_api_error_propagates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/orders")
            .with_status(400)
            .with_body(r#"{"error":{"name":"insufficient_funds_bid"}}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client.buy_market("KRW-BTC", 40_000).await;

        assert!(matches!(result, Err(ExchangeError::Api(_))));
    }
}
