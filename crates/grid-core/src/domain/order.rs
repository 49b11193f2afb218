//! 거래소 중립 주문 타입.
//!
//! Upbit API의 느슨한 dict 응답 대신 필드가 명시된 타입으로 표현합니다.
//! 호출자가 누락 키를 암묵적으로 넘기는 실수를 컴파일 타임에 막습니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 주문 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Upbit 주문 파라미터 표현 (bid/ask).
    pub fn as_upbit(&self) -> &'static str {
        match self {
            Side::Buy => "bid",
            Side::Sell => "ask",
        }
    }
}

/// 주문 접수 확인.
///
/// `dry_run`이 true면 주문번호는 로컬에서 합성된 것이며
/// 실거래소에는 아무것도 제출되지 않았음을 뜻합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// 거래소 주문번호 (dry-run에서는 합성 ID)
    pub order_id: String,
    /// dry-run 여부
    pub dry_run: bool,
}

impl OrderAck {
    pub fn live(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            dry_run: false,
        }
    }

    pub fn synthetic(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            dry_run: true,
        }
    }
}

/// 주문 상태 (Upbit state 문자열 대응).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// 체결 대기
    Wait,
    /// 예약 주문 대기
    Watch,
    /// 전체 체결 완료
    Done,
    /// 취소됨
    Cancel,
}

impl OrderState {
    /// Upbit `state` 필드 파싱. 알 수 없는 값은 None.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wait" => Some(Self::Wait),
            "watch" => Some(Self::Watch),
            "done" => Some(Self::Done),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// 주문 단건 조회 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// 거래소 주문번호
    pub order_id: String,
    /// 주문 상태
    pub state: OrderState,
    /// 주문 방향
    pub side: Side,
    /// 체결된 수량
    pub executed_volume: Option<Decimal>,
    /// 미체결 잔량
    pub remaining_volume: Option<Decimal>,
    /// 주문 가격 (시장가 매수는 총액)
    pub price: Option<Decimal>,
    /// 지불 수수료
    pub paid_fee: Option<Decimal>,
}
