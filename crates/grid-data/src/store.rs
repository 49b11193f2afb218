//! SQLite 원장 저장소.
//!
//! 금액/가격 컬럼은 TEXT로 저장하고 `Decimal::from_str`로 복원합니다
//! (SQLite에는 Decimal 매핑이 없음). 행 타입은 내부에 두고 도메인
//! 타입으로 변환해 반환합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::info;

use grid_core::{BotState, Lot, LotStatus, NewLot};

use crate::error::LedgerError;

// ============================================================================
// 행 타입
// ============================================================================

#[derive(Debug, FromRow)]
struct BotStateRow {
    enabled: bool,
    first_entry_price: Option<String>,
    slices_bought: i64,
    updated_at: DateTime<Utc>,
}

impl BotStateRow {
    fn into_state(self) -> Result<BotState, LedgerError> {
        let first_entry_price = self
            .first_entry_price
            .map(|s| {
                Decimal::from_str(&s)
                    .map_err(|e| LedgerError::Corrupt(format!("first_entry_price={}: {}", s, e)))
            })
            .transpose()?;

        Ok(BotState {
            enabled: self.enabled,
            first_entry_price,
            slices_bought: self.slices_bought,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LotRow {
    id: i64,
    buy_price: String,
    buy_qty: String,
    buy_krw: i64,
    sell_target_price: String,
    status: String,
    buy_order_id: Option<String>,
    sell_order_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LotRow {
    fn into_lot(self) -> Result<Lot, LedgerError> {
        let dec = |field: &str, s: &str| {
            Decimal::from_str(s)
                .map_err(|e| LedgerError::Corrupt(format!("{}={}: {}", field, s, e)))
        };

        Ok(Lot {
            id: self.id,
            buy_price: dec("buy_price", &self.buy_price)?,
            buy_qty: dec("buy_qty", &self.buy_qty)?,
            buy_krw: self.buy_krw,
            sell_target_price: dec("sell_target_price", &self.sell_target_price)?,
            status: LotStatus::from_str(&self.status)
                .map_err(|e| LedgerError::Corrupt(e.to_string()))?,
            buy_order_id: self.buy_order_id,
            sell_order_id: self.sell_order_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_LOT: &str = "SELECT id, buy_price, buy_qty, buy_krw, sell_target_price, status, \
     buy_order_id, sell_order_id, created_at, updated_at FROM lots";

// ============================================================================
// 저장소
// ============================================================================

/// 포지션 원장 저장소.
#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// DB 연결 (파일이 없으면 생성).
    ///
    /// 러너가 유일한 writer이므로 커넥션은 1개로 고정합니다.
    pub async fn connect(db_url: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(db_url)
            .map_err(LedgerError::Database)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// 테이블 생성 (idempotent).
    pub async fn init(&self) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bot_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                enabled INTEGER NOT NULL DEFAULT 0,
                first_entry_price TEXT,
                slices_bought INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                buy_price TEXT NOT NULL,
                buy_qty TEXT NOT NULL,
                buy_krw INTEGER NOT NULL,
                sell_target_price TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'OPEN',
                buy_order_id TEXT,
                sell_order_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_lots_status ON lots(status)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ========================================================================
    // BotState
    // ========================================================================

    /// id=1 행을 보장하고 반환. 없으면 비활성 상태로 생성.
    pub async fn ensure_state(&self) -> Result<BotState, LedgerError> {
        sqlx::query(
            "INSERT INTO bot_state (id, enabled, slices_bought, updated_at) \
             VALUES (1, 0, 0, ?) ON CONFLICT(id) DO NOTHING",
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.load_state().await
    }

    /// 현재 봇 상태 조회.
    pub async fn load_state(&self) -> Result<BotState, LedgerError> {
        let row: BotStateRow = sqlx::query_as(
            "SELECT enabled, first_entry_price, slices_bought, updated_at \
             FROM bot_state WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await?;

        row.into_state()
    }

    /// 마스터 스위치 변경 (대시보드 패치 표면).
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), LedgerError> {
        sqlx::query("UPDATE bot_state SET enabled = ?, updated_at = ? WHERE id = 1")
            .bind(enabled)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// 기준가 고정.
    ///
    /// 기준가가 NULL일 때만 기록됩니다 (한 번 고정되면 명시적 리셋
    /// 전까지 불변). 이미 설정돼 있으면 false를 반환합니다.
    pub async fn set_anchor(&self, price: Decimal) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE bot_state SET first_entry_price = ?, updated_at = ? \
             WHERE id = 1 AND first_entry_price IS NULL",
        )
        .bind(price.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 기준가 명시적 리셋 (대시보드 패치 표면).
    pub async fn reset_anchor(&self) -> Result<(), LedgerError> {
        sqlx::query("UPDATE bot_state SET first_entry_price = NULL, updated_at = ? WHERE id = 1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// 사이클 완료 표시 (`updated_at` 갱신).
    pub async fn touch(&self) -> Result<(), LedgerError> {
        sqlx::query("UPDATE bot_state SET updated_at = ? WHERE id = 1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Lot
    // ========================================================================

    /// 매수 기록: 랏 삽입 + `slices_bought` 증가를 한 트랜잭션으로.
    ///
    /// 전략 규칙 3을 저장 계층에서도 강제합니다:
    /// `slices_bought >= slices_total`이면 `GridExhausted`로 거부.
    pub async fn record_buy(&self, new_lot: &NewLot, slices_total: i64) -> Result<Lot, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let (slices_bought,): (i64,) =
            sqlx::query_as("SELECT slices_bought FROM bot_state WHERE id = 1")
                .fetch_one(&mut *tx)
                .await?;

        if slices_bought >= slices_total {
            return Err(LedgerError::GridExhausted {
                slices_bought,
                slices_total,
            });
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO lots \
             (buy_price, buy_qty, buy_krw, sell_target_price, status, buy_order_id, \
              created_at, updated_at) \
             VALUES (?, ?, ?, ?, 'OPEN', ?, ?, ?)",
        )
        .bind(new_lot.buy_price.to_string())
        .bind(new_lot.buy_qty.to_string())
        .bind(new_lot.buy_krw)
        .bind(new_lot.sell_target_price.to_string())
        .bind(new_lot.buy_order_id.as_deref())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let lot_id = result.last_insert_rowid();

        sqlx::query("UPDATE bot_state SET slices_bought = slices_bought + 1, updated_at = ? WHERE id = 1")
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let row: LotRow = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_LOT))
            .bind(lot_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(lot_id = lot_id, slices_bought = slices_bought + 1, "랏 기록");
        row.into_lot()
    }

    /// 매도 주문번호 기록 (pending-sell 해소).
    pub async fn attach_sell_order(
        &self,
        lot_id: i64,
        sell_order_id: &str,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query("UPDATE lots SET sell_order_id = ?, updated_at = ? WHERE id = ?")
            .bind(sell_order_id)
            .bind(Utc::now())
            .bind(lot_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::LotNotFound(lot_id));
        }
        Ok(())
    }

    /// 매도 체결 완료 처리.
    pub async fn mark_sold(&self, lot_id: i64) -> Result<(), LedgerError> {
        let result = sqlx::query("UPDATE lots SET status = 'SOLD', updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(lot_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::LotNotFound(lot_id));
        }
        Ok(())
    }

    /// 열린 랏 전체.
    pub async fn open_lots(&self) -> Result<Vec<Lot>, LedgerError> {
        let rows: Vec<LotRow> =
            sqlx::query_as(&format!("{} WHERE status = 'OPEN' ORDER BY id", SELECT_LOT))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(LotRow::into_lot).collect()
    }

    /// 매도 주문이 아직 제출되지 않은 열린 랏 (재기동 복구 대상).
    pub async fn lots_awaiting_sell(&self) -> Result<Vec<Lot>, LedgerError> {
        let rows: Vec<LotRow> = sqlx::query_as(&format!(
            "{} WHERE status = 'OPEN' AND sell_order_id IS NULL ORDER BY id",
            SELECT_LOT
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LotRow::into_lot).collect()
    }

    /// 매도 주문이 나가 있는 열린 랏 (체결 동기화 대상).
    pub async fn lots_with_pending_sell(&self) -> Result<Vec<Lot>, LedgerError> {
        let rows: Vec<LotRow> = sqlx::query_as(&format!(
            "{} WHERE status = 'OPEN' AND sell_order_id IS NOT NULL ORDER BY id",
            SELECT_LOT
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LotRow::into_lot).collect()
    }

    /// 최근 랏 조회 (대시보드 표시용).
    pub async fn recent_lots(&self, limit: i64) -> Result<Vec<Lot>, LedgerError> {
        let rows: Vec<LotRow> =
            sqlx::query_as(&format!("{} ORDER BY id DESC LIMIT ?", SELECT_LOT))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(LotRow::into_lot).collect()
    }
}

// ============================================================================
// 테스트
// ============================================================================
