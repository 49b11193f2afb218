//! 그리드 분할매수(DCA) 결정 엔진.
//!
//! 기준가(first entry) 아래로 `buy_step_pct`% 내려갈 때마다 다음
//! 슬라이스를 매수하고, 각 매수에 `sell_tp_pct`% 익절 지정가를
//! 짝지어 배치하는 전략의 순수 결정 함수입니다.
//!
//! # 규칙
//!
//! 1. 비활성 → 아무것도 하지 않음
//! 2. 기준가 미설정 → 현재가를 기준가로 고정만 하고 매수하지 않음
//! 3. 그리드 소진 (`slices_bought + 1 > slices_total`) → 대기
//! 4. `cur_price <= 기준가 * (1 - step/100 * (level-1))` → 매수 +
//!    익절 매도 계획 (레벨 1은 기준가 그대로, 이후 레벨은 선형 하강)
//! 5. 그 외 → 다음 레벨 대기
//!
//! 이 crate는 시각/DB/네트워크에 의존하지 않으므로 어떤 입력
//! 조합이든 결정만 단위 테스트할 수 있습니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use grid_core::TickTable;

/// 결정 입력 스냅샷.
///
/// 러너가 매 사이클 `BotState` + 설정 + 현재가로 구성합니다.
#[derive(Debug, Clone)]
pub struct DecisionInput {
    /// 마스터 스위치
    pub enabled: bool,
    /// 현재가
    pub cur_price: Decimal,
    /// 기준가 (미설정이면 None)
    pub first_entry_price: Option<Decimal>,
    /// 체결된 그리드 레벨 수
    pub slices_bought: i64,
    /// 전체 그리드 깊이
    pub slices_total: i64,
    /// 슬라이스당 투입 원화
    pub slice_krw: i64,
    /// 레벨당 하락 간격 (%)
    pub buy_step_pct: Decimal,
    /// 랏별 익절 목표 (%)
    pub sell_tp_pct: Decimal,
}

/// 결정 사유.
///
/// Display 문자열은 로그/대시보드와의 호환을 위해 고정되어 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanReason {
    /// 봇 비활성
    BotDisabled,
    /// 이번 호출은 기준가 고정만 수행
    AnchorOnly,
    /// 모든 슬라이스 소진
    AllSlicesUsed,
    /// 해당 레벨 매수 트리거
    LevelTriggered { level: i64 },
    /// 다음 레벨 대기
    Waiting,
}

impl fmt::Display for PlanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanReason::BotDisabled => f.write_str("bot_disabled"),
            PlanReason::AnchorOnly => f.write_str("set_first_entry_anchor_only"),
            PlanReason::AllSlicesUsed => f.write_str("all_slices_used"),
            PlanReason::LevelTriggered { level } => {
                write!(f, "price<=target_level({})", level)
            }
            PlanReason::Waiting => f.write_str("waiting_for_next_level"),
        }
    }
}

/// 한 사이클의 실행 계획.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub should_buy: bool,
    /// 매수 투입 원화 (매수 없으면 0)
    pub buy_krw: i64,
    pub reason: PlanReason,
    pub should_place_sell: bool,
    /// 익절 지정가 (tick 반올림 완료, 매도 없으면 0)
    pub sell_price: Decimal,
}

impl Plan {
    /// 아무 주문도 내지 않는 계획.
    fn hold(reason: PlanReason) -> Self {
        Self {
            should_buy: false,
            buy_krw: 0,
            reason,
            should_place_sell: false,
            sell_price: Decimal::ZERO,
        }
    }
}

/// 레벨별 목표 매수가.
///
/// 레벨 1은 기준가 그대로, 이후 레벨은 기준가에서 `step_pct`%씩
/// 선형(비복리)으로 내려갑니다.
pub fn target_buy_price(anchor: Decimal, step_pct: Decimal, level: i64) -> Decimal {
    let steps = Decimal::from(level - 1);
    anchor * (Decimal::ONE - step_pct / Decimal::ONE_HUNDRED * steps)
}

/// 다음 행동 결정.
///
/// 반환값은 `(유지/고정할 기준가, 계획)` 입니다. 기준가는 규칙 2에서만
/// 새로 고정되며, 그 외에는 입력값이 그대로 돌아옵니다 (기준가 안정성).
pub fn decide_next(input: &DecisionInput, ticks: &TickTable) -> (Option<Decimal>, Plan) {
    if !input.enabled {
        return (input.first_entry_price, Plan::hold(PlanReason::BotDisabled));
    }

    // 기준가 미설정: 현재가로 고정만 하고 매수는 하지 않음
    let Some(anchor) = input.first_entry_price else {
        debug!(anchor = %input.cur_price, "기준가 고정");
        return (Some(input.cur_price), Plan::hold(PlanReason::AnchorOnly));
    };

    let next_level = input.slices_bought + 1; // 1-based
    if next_level > input.slices_total {
        return (Some(anchor), Plan::hold(PlanReason::AllSlicesUsed));
    }

    let target = target_buy_price(anchor, input.buy_step_pct, next_level);

    if input.cur_price <= target {
        let tp_multiplier = Decimal::ONE + input.sell_tp_pct / Decimal::ONE_HUNDRED;
        let sell_price = ticks.round_down(input.cur_price * tp_multiplier);

        debug!(
            level = next_level,
            cur_price = %input.cur_price,
            target = %target,
            sell_price = %sell_price,
            "매수 트리거"
        );

        return (
            Some(anchor),
            Plan {
                should_buy: true,
                buy_krw: input.slice_krw,
                reason: PlanReason::LevelTriggered { level: next_level },
                should_place_sell: true,
                sell_price,
            },
        );
    }

    (Some(anchor), Plan::hold(PlanReason::Waiting))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reason_strings() {
        assert_eq!(PlanReason::BotDisabled.to_string(), "bot_disabled");
        assert_eq!(
            PlanReason::AnchorOnly.to_string(),
            "set_first_entry_anchor_only"
        );
        assert_eq!(PlanReason::AllSlicesUsed.to_string(), "all_slices_used");
        assert_eq!(
            PlanReason::LevelTriggered { level: 3 }.to_string(),
            "price<=target_level(3)"
        );
        assert_eq!(PlanReason::Waiting.to_string(), "waiting_for_next_level");
    }

    #[test]
    fn test_target_buy_price_linear() {
        // 레벨 1 = 기준가, 이후 2%씩 선형 하강 (비복리)
        let anchor = dec!(50_000_000);
        assert_eq!(target_buy_price(anchor, dec!(2.0), 1), dec!(50_000_000));
        assert_eq!(target_buy_price(anchor, dec!(2.0), 2), dec!(49_000_000));
        assert_eq!(target_buy_price(anchor, dec!(2.0), 3), dec!(48_000_000));
        assert_eq!(target_buy_price(anchor, dec!(2.0), 11), dec!(40_000_000));
    }
}
