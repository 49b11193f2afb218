//! 환경변수 기반 설정 모듈.

use rust_decimal::Decimal;
use std::time::Duration;

use crate::error::BotError;

/// Upbit 최소 주문 금액 (KRW).
const MIN_ORDER_KRW: i64 = 5_000;

/// 봇 전체 설정 (프로세스 수명 동안 불변).
#[derive(Debug, Clone)]
pub struct Settings {
    /// 거래 마켓 (예: KRW-BTC)
    pub market: String,
    /// 총 투입 원화
    pub total_krw: i64,
    /// 그리드 깊이 (슬라이스 수)
    pub slices: i64,
    /// 레벨당 하락 간격 (%)
    pub buy_step_pct: Decimal,
    /// 랏별 익절 목표 (%)
    pub sell_tp_pct: Decimal,
    /// dry-run 여부
    pub dry_run: bool,
    pub upbit_access_key: String,
    pub upbit_secret_key: String,
    /// 원장 DB URL
    pub db_url: String,
    /// 폴링 주기 (초)
    pub poll_sec: f64,
}

impl Settings {
    /// 환경변수에서 설정 로드 (모든 값에 기본값 있음).
    pub fn from_env() -> Self {
        Self {
            market: env_var_string("MARKET", "KRW-BTC"),
            total_krw: env_var_parse("TOTAL_KRW", 2_000_000),
            slices: env_var_parse("SLICES", 50),
            buy_step_pct: env_var_parse("BUY_STEP_PCT", Decimal::TWO),
            sell_tp_pct: env_var_parse("SELL_TP_PCT", Decimal::new(3, 0)),
            // "0"/"false"만 false, 그 외는 전부 dry-run (안전한 쪽이 기본)
            dry_run: env_var_flag("DRY_RUN", true),
            upbit_access_key: env_var_string("UPBIT_ACCESS_KEY", ""),
            upbit_secret_key: env_var_string("UPBIT_SECRET_KEY", ""),
            db_url: env_var_string("DB_URL", "sqlite://grid.db"),
            poll_sec: env_var_parse("POLL_SEC", 2.0),
        }
    }

    /// 슬라이스당 투입 원화. 거래소 최소 주문 금액 아래로는 내려가지 않음.
    pub fn slice_krw(&self) -> i64 {
        (self.total_krw / self.slices.max(1)).max(MIN_ORDER_KRW)
    }

    /// 폴링 주기.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_sec.max(0.1))
    }

    /// 기동 시점 설정 검증.
    ///
    /// 실거래 모드에서 자격 증명이 없으면 루프 중간이 아니라
    /// 여기서 바로 실패합니다.
    pub fn validate(&self) -> Result<(), BotError> {
        if self.market.trim().is_empty() {
            return Err(BotError::Config("MARKET이 비어 있음".to_string()));
        }
        if self.slices < 1 {
            return Err(BotError::Config(format!(
                "SLICES는 1 이상이어야 함: {}",
                self.slices
            )));
        }
        if self.total_krw < MIN_ORDER_KRW {
            return Err(BotError::Config(format!(
                "TOTAL_KRW는 최소 주문 금액({}) 이상이어야 함: {}",
                MIN_ORDER_KRW, self.total_krw
            )));
        }
        if self.buy_step_pct <= Decimal::ZERO || self.sell_tp_pct <= Decimal::ZERO {
            return Err(BotError::Config(format!(
                "BUY_STEP_PCT/SELL_TP_PCT는 양수여야 함: {} / {}",
                self.buy_step_pct, self.sell_tp_pct
            )));
        }
        if !self.dry_run
            && (self.upbit_access_key.is_empty() || self.upbit_secret_key.is_empty())
        {
            return Err(BotError::Config(
                "실거래 모드에는 UPBIT_ACCESS_KEY/UPBIT_SECRET_KEY가 필요함".to_string(),
            ));
        }
        Ok(())
    }
}

/// 환경변수에서 값을 파싱 (없거나 실패 시 기본값).
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수 문자열 (없으면 기본값).
fn env_var_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// 끄는 값("0"/"false")만 false로 취급하는 플래그 파싱.
fn env_var_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => !matches!(v.as_str(), "0" | "false" | "False"),
        Err(_) => default,
    }
}
