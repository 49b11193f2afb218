//! 봇 상태와 랏(Lot) 모델.
//!
//! `BotState`는 id=1 단일 행으로 유지되는 봇 전역 상태이며,
//! `Lot`은 그리드 한 레벨의 매수-매도 사이클 하나를 기록합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 봇 전역 상태 (단일 행, id=1).
///
/// 불변식:
/// - `slices_bought <= slices_total` (설정값)
/// - `first_entry_price`는 한 번 설정되면 명시적 리셋 전까지 변하지 않음
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotState {
    /// 마스터 on/off 스위치
    pub enabled: bool,
    /// 기준가 (첫 거래 시점에 한 번 고정)
    pub first_entry_price: Option<Decimal>,
    /// 체결된 그리드 레벨 수 (활성 상태에서 단조 증가)
    pub slices_bought: i64,
    pub updated_at: DateTime<Utc>,
}

/// 랏 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LotStatus {
    Open,
    Sold,
}

impl LotStatus {
    /// DB 저장 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Open => "OPEN",
            LotStatus::Sold => "SOLD",
        }
    }
}

impl fmt::Display for LotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LotStatus {
    type Err = UnknownLotStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(LotStatus::Open),
            "SOLD" => Ok(LotStatus::Sold),
            other => Err(UnknownLotStatus(other.to_string())),
        }
    }
}

/// 저장소에 알 수 없는 랏 상태 문자열이 있을 때.
#[derive(Debug, thiserror::Error)]
#[error("알 수 없는 랏 상태: {0}")]
pub struct UnknownLotStatus(pub String);

/// 그리드 한 레벨의 매수-매도 사이클.
///
/// 매수 체결 즉시 `Open`으로 생성되고, 짝지어진 지정가 매도가
/// 전량 체결되면 `Sold`로 전이합니다. `status == Open`이면서
/// `sell_order_id`가 없는 랏은 "매도 미제출" 상태로, 재기동 시
/// 정합 복구 대상입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: i64,
    /// 매수 체결 기준 가격
    pub buy_price: Decimal,
    /// 매수 수량
    pub buy_qty: Decimal,
    /// 투입 원화 (notional)
    pub buy_krw: i64,
    /// 익절 목표가 (tick 반올림 완료 값)
    pub sell_target_price: Decimal,
    pub status: LotStatus,
    pub buy_order_id: Option<String>,
    pub sell_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lot {
    /// 매도 주문이 아직 제출되지 않은 열린 랏인지.
    pub fn awaiting_sell(&self) -> bool {
        self.status == LotStatus::Open && self.sell_order_id.is_none()
    }
}

/// 랏 삽입 페이로드.
#[derive(Debug, Clone)]
pub struct NewLot {
    pub buy_price: Decimal,
    pub buy_qty: Decimal,
    pub buy_krw: i64,
    pub sell_target_price: Decimal,
    pub buy_order_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_lot_status_roundtrip() {
        assert_eq!(LotStatus::Open.as_str(), "OPEN");
        assert_eq!(LotStatus::Sold.as_str(), "SOLD");
        assert_eq!("OPEN".parse::<LotStatus>().unwrap(), LotStatus::Open);
        assert_eq!("SOLD".parse::<LotStatus>().unwrap(), LotStatus::Sold);
        assert!("open".parse::<LotStatus>().is_err());
    }

    #[test]
    fn test_awaiting_sell() {
        let mut lot = Lot {
            id: 1,
            buy_price: dec!(50_000_000),
            buy_qty: dec!(0.0008),
            buy_krw: 40_000,
            sell_target_price: dec!(51_500_000),
            status: LotStatus::Open,
            buy_order_id: Some("uuid-buy".to_string()),
            sell_order_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(lot.awaiting_sell());

        lot.sell_order_id = Some("uuid-sell".to_string());
        assert!(!lot.awaiting_sell());

        lot.status = LotStatus::Sold;
        assert!(!lot.awaiting_sell());
    }
}
