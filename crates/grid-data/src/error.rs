//! 원장 에러 타입.

use thiserror::Error;

/// 원장 에러.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(#[from] sqlx::Error),

    /// 저장된 값이 도메인 타입으로 변환 불가
    #[error("손상된 원장 데이터: {0}")]
    Corrupt(String),

    /// 그리드 소진 상태에서의 매수 기록 시도 (쓰기 시점 불변식)
    #[error("그리드 소진: slices_bought={slices_bought} >= slices_total={slices_total}")]
    GridExhausted {
        slices_bought: i64,
        slices_total: i64,
    },

    /// 존재하지 않는 랏
    #[error("랏 없음: id={0}")]
    LotNotFound(i64),
}
