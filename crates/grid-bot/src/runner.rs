//! 폴링 루프와 사이클 실행.
//!
//! 사이클 순서:
//!
//! 1. 봇 상태 로드 + 현재가 조회
//! 2. 나가 있는 매도 주문 체결 동기화 (OPEN → SOLD)
//! 3. 전략 결정, 처음이면 기준가 고정
//! 4. 매수 계획이면: 시장가 매수 → 체결 수량 확정 → 랏 기록 →
//!    익절 지정가 제출 → 주문번호 기록
//! 5. `updated_at` 갱신
//!
//! 랏은 매도 제출 *전에* 먼저 기록됩니다. 매도 제출 직전에 죽어도
//! `sell_order_id`가 비어 있는 랏이 원장에 남아 재기동 정합 복구가
//! 이어받습니다.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use grid_core::{Lot, NewLot, OrderAck, TickTable};
use grid_data::LedgerStore;
use grid_exchange::ExchangeClient;
use grid_strategy::{decide_next, DecisionInput, Plan, PlanReason};

use crate::config::Settings;
use crate::error::BotError;

/// 실거래 체결 수량 조회 재시도 횟수/간격.
const FILL_POLL_ATTEMPTS: u32 = 3;
const FILL_POLL_DELAY: Duration = Duration::from_millis(200);

/// 프로세스 수명 동안 유지되는 실행 컨텍스트.
///
/// 기동 시 한 번 조립해 루프에 명시적으로 전달합니다.
/// 모듈 전역 싱글턴은 없습니다.
pub struct BotContext {
    pub settings: Settings,
    pub store: LedgerStore,
    pub exchange: Arc<dyn ExchangeClient>,
    pub ticks: TickTable,
}

/// 한 사이클의 실행 결과 (로깅/테스트용).
#[derive(Debug)]
pub struct CycleReport {
    pub price: Decimal,
    pub reason: PlanReason,
    /// 이번 사이클에 생성된 랏
    pub lot_id: Option<i64>,
    /// 이번 사이클에 제출된 매도 주문번호
    pub sell_order_id: Option<String>,
    /// 체결 동기화로 SOLD 처리된 랏 수
    pub sells_filled: usize,
}

/// 그리드 봇 러너.
pub struct BotRunner {
    ctx: BotContext,
}

impl BotRunner {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    /// 메인 루프. 사이클 실패는 로그만 남기고 다음 틱으로 넘어갑니다.
    pub async fn run(self) -> Result<(), BotError> {
        // 재기동 정합 복구: 매도 미제출 랏부터 처리
        if let Err(e) = self.reconcile().await {
            error!(error = %e, "기동 정합 복구 실패 (다음 사이클에서 재시도)");
        }

        let mut ticker = interval(self.ctx.settings.poll_interval());

        loop {
            ticker.tick().await;

            match self.run_cycle().await {
                Ok(report) => {
                    debug!(
                        price = %report.price,
                        reason = %report.reason,
                        lot_id = ?report.lot_id,
                        sells_filled = report.sells_filled,
                        "사이클 완료"
                    );
                }
                Err(e) => {
                    error!(error = %e, "사이클 실패, 다음 틱에서 계속");
                }
            }
        }
    }

    /// 정합 복구 패스.
    ///
    /// 1. 매도 제출 중에 죽어 `sell_order_id`가 비어 있는 랏에
    ///    저장된 목표가/수량으로 지정가 매도를 제출
    /// 2. 나가 있는 매도 주문의 체결 여부 동기화
    pub async fn reconcile(&self) -> Result<(), BotError> {
        let placed = self.place_missing_sells().await?;
        let filled = self.sync_sell_fills().await?;

        if placed > 0 || filled > 0 {
            info!(placed = placed, filled = filled, "정합 복구 완료");
        }
        Ok(())
    }

    /// 한 사이클 실행.
    pub async fn run_cycle(&self) -> Result<CycleReport, BotError> {
        let settings = &self.ctx.settings;

        let state = self.ctx.store.ensure_state().await?;
        let price = self.ctx.exchange.get_price(&settings.market).await?;

        // 매도 체결 동기화를 결정보다 먼저 수행
        let sells_filled = self.sync_sell_fills().await?;

        let input = DecisionInput {
            enabled: state.enabled,
            cur_price: price,
            first_entry_price: state.first_entry_price,
            slices_bought: state.slices_bought,
            slices_total: settings.slices,
            slice_krw: settings.slice_krw(),
            buy_step_pct: settings.buy_step_pct,
            sell_tp_pct: settings.sell_tp_pct,
        };
        let (anchor, plan) = decide_next(&input, &self.ctx.ticks);

        // 처음 고정된 기준가 영속화
        if state.first_entry_price.is_none() {
            if let Some(anchor) = anchor {
                if self.ctx.store.set_anchor(anchor).await? {
                    info!(anchor = %anchor, "기준가 영속화");
                }
            }
        }

        let mut lot_id = None;
        let mut sell_order_id = None;

        if plan.should_buy {
            let (lot, sell_ack) = self.execute_buy(&plan, price).await?;
            lot_id = Some(lot.id);
            sell_order_id = sell_ack.map(|a| a.order_id);
        }

        self.ctx.store.touch().await?;

        Ok(CycleReport {
            price,
            reason: plan.reason,
            lot_id,
            sell_order_id,
            sells_filled,
        })
    }

    /// 매수 실행: 시장가 매수 → 랏 기록 → 익절 매도 제출.
    async fn execute_buy(
        &self,
        plan: &Plan,
        cur_price: Decimal,
    ) -> Result<(Lot, Option<OrderAck>), BotError> {
        let settings = &self.ctx.settings;

        let buy_ack = self
            .ctx
            .exchange
            .buy_market(&settings.market, plan.buy_krw)
            .await?;

        let qty = self.resolve_fill_qty(&buy_ack, plan.buy_krw, cur_price).await;

        info!(
            market = %settings.market,
            krw = plan.buy_krw,
            qty = %qty,
            order_id = %buy_ack.order_id,
            reason = %plan.reason,
            "매수 체결"
        );

        // 매도 제출 전에 랏부터 기록 (pending-sell 마커)
        let lot = self
            .ctx
            .store
            .record_buy(
                &NewLot {
                    buy_price: cur_price,
                    buy_qty: qty,
                    buy_krw: plan.buy_krw,
                    sell_target_price: plan.sell_price,
                    buy_order_id: Some(buy_ack.order_id.clone()),
                },
                settings.slices,
            )
            .await?;

        if !plan.should_place_sell || qty <= Decimal::ZERO {
            warn!(lot_id = lot.id, "매도 미제출 (수량 0 또는 계획 없음)");
            return Ok((lot, None));
        }

        let sell_ack = self
            .ctx
            .exchange
            .sell_limit(&settings.market, plan.sell_price, qty)
            .await?;
        self.ctx
            .store
            .attach_sell_order(lot.id, &sell_ack.order_id)
            .await?;

        info!(
            lot_id = lot.id,
            sell_price = %plan.sell_price,
            order_id = %sell_ack.order_id,
            "익절 매도 제출"
        );

        Ok((lot, Some(sell_ack)))
    }

    /// 체결 수량 확정.
    ///
    /// 실거래에서는 주문 조회로 실제 체결 수량(`executed_volume`)을
    /// 읽습니다. 시장가 매수는 호가를 타고 체결되므로
    /// `notional / 현재가` 근사는 부정확하며, 근사값은 dry-run과
    /// 체결 조회가 아직 비어 있을 때의 폴백으로만 씁니다.
    async fn resolve_fill_qty(&self, ack: &OrderAck, krw: i64, cur_price: Decimal) -> Decimal {
        let approx = if cur_price > Decimal::ZERO {
            Decimal::from(krw) / cur_price
        } else {
            Decimal::ZERO
        };

        if ack.dry_run {
            return approx;
        }

        for attempt in 0..FILL_POLL_ATTEMPTS {
            match self.ctx.exchange.get_order(&ack.order_id).await {
                Ok(Some(snapshot)) if snapshot.state.is_filled() => {
                    if let Some(volume) = snapshot.executed_volume {
                        if volume > Decimal::ZERO {
                            return volume;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(order_id = %ack.order_id, error = %e, "체결 조회 실패");
                    break;
                }
            }
            if attempt + 1 < FILL_POLL_ATTEMPTS {
                tokio::time::sleep(FILL_POLL_DELAY).await;
            }
        }

        warn!(order_id = %ack.order_id, approx = %approx, "체결 수량 확정 실패, 근사값 사용");
        approx
    }

    /// 매도 미제출 랏에 지정가 매도 제출 (재기동 복구).
    async fn place_missing_sells(&self) -> Result<usize, BotError> {
        let settings = &self.ctx.settings;
        let mut placed = 0;

        for lot in self.ctx.store.lots_awaiting_sell().await? {
            if lot.buy_qty <= Decimal::ZERO {
                warn!(lot_id = lot.id, "수량 0 랏, 매도 제출 건너뜀");
                continue;
            }

            let ack = self
                .ctx
                .exchange
                .sell_limit(&settings.market, lot.sell_target_price, lot.buy_qty)
                .await?;
            self.ctx.store.attach_sell_order(lot.id, &ack.order_id).await?;

            warn!(
                lot_id = lot.id,
                sell_price = %lot.sell_target_price,
                order_id = %ack.order_id,
                "미제출 매도 복구"
            );
            placed += 1;
        }

        Ok(placed)
    }

    /// 나가 있는 매도 주문의 체결을 동기화 (OPEN → SOLD).
    async fn sync_sell_fills(&self) -> Result<usize, BotError> {
        let mut filled = 0;

        for lot in self.ctx.store.lots_with_pending_sell().await? {
            // 쿼리 조건상 sell_order_id는 항상 Some
            let Some(order_id) = lot.sell_order_id.as_deref() else {
                continue;
            };

            match self.ctx.exchange.get_order(order_id).await? {
                Some(snapshot) if snapshot.state.is_filled() => {
                    self.ctx.store.mark_sold(lot.id).await?;
                    info!(lot_id = lot.id, order_id = order_id, "매도 체결, 랏 종료");
                    filled += 1;
                }
                _ => {}
            }
        }

        Ok(filled)
    }
}
