//! Dry-run 거래소 클라이언트.
//!
//! 개인 엔드포인트는 절대 호출하지 않고 주문 접수를 로컬에서
//! 합성합니다. 시세 조회만 공개 엔드포인트로 위임하므로 (가격 조회는
//! 리스크가 없음) 러너는 전체 로직을 무위험으로 돌려볼 수 있습니다.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use grid_core::{OrderAck, OrderSnapshot};

use crate::client::ExchangeClient;
use crate::error::ExchangeError;
use crate::upbit::UpbitExchange;

/// 주문을 합성하는 dry-run 클라이언트.
///
/// 합성 주문번호는 `종류-타임스탬프` 형태입니다 (`dry-buy-1733...`).
/// `get_order`는 항상 None을 돌려주므로 체결 동기화 경로는
/// dry-run에서 조용히 건너뛰어집니다.
pub struct DryRunExchange {
    quote: UpbitExchange,
}

impl DryRunExchange {
    /// 공개 시세 전용 Upbit 클라이언트 위에 생성.
    pub fn new() -> Self {
        Self {
            quote: UpbitExchange::public(),
        }
    }

    /// 테스트용: 시세 클라이언트를 직접 주입.
    pub fn with_quote_client(quote: UpbitExchange) -> Self {
        Self { quote }
    }

    fn synth_id(kind: &str) -> String {
        format!("dry-{}-{}", kind, Utc::now().timestamp_millis())
    }
}

impl Default for DryRunExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for DryRunExchange {
    async fn get_price(&self, market: &str) -> Result<Decimal, ExchangeError> {
        self.quote.get_price(market).await
    }

    async fn buy_market(&self, market: &str, krw: i64) -> Result<OrderAck, ExchangeError> {
        let ack = OrderAck::synthetic(Self::synth_id("buy"));
        info!(market = market, krw = krw, order_id = %ack.order_id, "[dry-run] 시장가 매수");
        Ok(ack)
    }

    async fn sell_limit(
        &self,
        market: &str,
        price: Decimal,
        qty: Decimal,
    ) -> Result<OrderAck, ExchangeError> {
        let ack = OrderAck::synthetic(Self::synth_id("sell"));
        info!(
            market = market,
            price = %price,
            qty = %qty,
            order_id = %ack.order_id,
            "[dry-run] 지정가 매도"
        );
        Ok(ack)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<OrderAck, ExchangeError> {
        info!(order_id = order_id, "[dry-run] 주문 취소");
        Ok(OrderAck::synthetic(order_id))
    }

    async fn get_order(&self, _order_id: &str) -> Result<Option<OrderSnapshot>, ExchangeError> {
        Ok(None)
    }

    async fn get_balance(&self, _currency: &str) -> Result<Decimal, ExchangeError> {
        Ok(Decimal::ZERO)
    }

    fn exchange_name(&self) -> &str {
        "upbit-dry-run"
    }
}
