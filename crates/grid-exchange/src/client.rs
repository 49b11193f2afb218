//! 거래소 클라이언트 추상화.

use async_trait::async_trait;
use rust_decimal::Decimal;

use grid_core::{OrderAck, OrderSnapshot};

use crate::error::ExchangeError;

/// 거래소 클라이언트 trait.
///
/// 러너는 이 trait만 바라보므로 실거래/dry-run/테스트 목을
/// 동일한 코드 경로로 구동할 수 있습니다.
///
/// # 계약
///
/// - `buy_market`은 원화 총액(notional) 기준 시장가 매수
/// - `sell_limit`은 가격+수량 기준 지정가 매도
/// - 이 계층은 재시도하지 않음: 실패는 그대로 전파
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// 현재가 조회 (공개 시세 엔드포인트).
    async fn get_price(&self, market: &str) -> Result<Decimal, ExchangeError>;

    /// 시장가 매수 (원화 총액 기준).
    async fn buy_market(&self, market: &str, krw: i64) -> Result<OrderAck, ExchangeError>;

    /// 지정가 매도.
    async fn sell_limit(
        &self,
        market: &str,
        price: Decimal,
        qty: Decimal,
    ) -> Result<OrderAck, ExchangeError>;

    /// 주문 취소.
    async fn cancel_order(&self, order_id: &str) -> Result<OrderAck, ExchangeError>;

    /// 주문 단건 조회. 존재하지 않으면 None.
    async fn get_order(&self, order_id: &str) -> Result<Option<OrderSnapshot>, ExchangeError>;

    /// 통화별 주문 가능 잔고.
    async fn get_balance(&self, currency: &str) -> Result<Decimal, ExchangeError>;

    /// 거래소 이름 (로깅용).
    fn exchange_name(&self) -> &str;
}
