//! 거래소 에러 타입.

use thiserror::Error;

/// 거래소 호출 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 인증 실패 (API 키 누락/오류)
    #[error("인증 실패: {0}")]
    Authentication(String),

    /// 거래소 API 에러
    #[error("Upbit API 에러: {0}")]
    Api(String),

    /// 응답 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),
}
