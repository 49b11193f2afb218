//! 러너 에러 타입.

use thiserror::Error;

use grid_data::LedgerError;
use grid_exchange::ExchangeError;

/// 러너 에러.
///
/// 사이클 내부의 어떤 실패든 이 타입으로 모여 루프 상단에서
/// 로그만 남기고 다음 사이클로 넘어갑니다.
#[derive(Debug, Error)]
pub enum BotError {
    /// 거래소 호출 실패 (시세/주문)
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// 원장 읽기/쓰기 실패
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// 설정 오류 (기동 시점에만 발생해야 함)
    #[error("설정 오류: {0}")]
    Config(String),
}
