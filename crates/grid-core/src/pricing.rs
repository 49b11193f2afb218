//! 호가 단위(tick) 반올림.
//!
//! Upbit KRW 마켓은 가격 구간별로 허용 호가 단위가 다르며, 단위에
//! 맞지 않는 지정가 주문은 거절됩니다. 구간 테이블은 데이터로 들고
//! 있어 다른 마켓을 겨냥할 때 자산별 테이블을 주입할 수 있습니다.
//!
//! | 가격 구간 | 단위 |
//! |---|---|
//! | < 10 | 0.01 |
//! | < 100 | 0.1 |
//! | < 1,000 | 1 |
//! | < 10,000 | 5 |
//! | < 100,000 | 10 |
//! | < 500,000 | 50 |
//! | < 1,000,000 | 100 |
//! | < 2,000,000 | 500 |
//! | 이상 | 1,000 |

use rust_decimal::Decimal;

/// 가격 구간별 호가 단위 테이블.
///
/// `bands`는 (상한 미만, 단위) 쌍의 오름차순 목록이고, 어떤 구간에도
/// 걸리지 않는 가격에는 `top_unit`이 적용됩니다.
#[derive(Debug, Clone, PartialEq)]
pub struct TickTable {
    bands: Vec<(Decimal, Decimal)>,
    top_unit: Decimal,
}

impl TickTable {
    /// 사용자 정의 테이블 생성. `bands`는 상한 오름차순이어야 합니다.
    pub fn new(bands: Vec<(Decimal, Decimal)>, top_unit: Decimal) -> Self {
        debug_assert!(
            bands.windows(2).all(|w| w[0].0 < w[1].0),
            "tick band 상한은 오름차순이어야 함"
        );
        Self { bands, top_unit }
    }

    /// Upbit KRW 마켓 기본 테이블.
    pub fn krw() -> Self {
        let d = |n: i64, scale: u32| Decimal::new(n, scale);
        Self::new(
            vec![
                (d(10, 0), d(1, 2)),        // < 10 → 0.01
                (d(100, 0), d(1, 1)),       // < 100 → 0.1
                (d(1_000, 0), d(1, 0)),     // < 1,000 → 1
                (d(10_000, 0), d(5, 0)),    // < 10,000 → 5
                (d(100_000, 0), d(10, 0)),  // < 100,000 → 10
                (d(500_000, 0), d(50, 0)),  // < 500,000 → 50
                (d(1_000_000, 0), d(100, 0)), // < 1,000,000 → 100
                (d(2_000_000, 0), d(500, 0)), // < 2,000,000 → 500
            ],
            d(1_000, 0),
        )
    }

    /// 가격이 속한 구간의 호가 단위.
    pub fn unit_for(&self, price: Decimal) -> Decimal {
        for (upper, unit) in &self.bands {
            if price < *upper {
                return *unit;
            }
        }
        self.top_unit
    }

    /// 호가 단위로 내림 (floor). 멱등이며 입력을 초과하지 않습니다.
    pub fn round_down(&self, price: Decimal) -> Decimal {
        let unit = self.unit_for(price);
        (price / unit).floor() * unit
    }
}

impl Default for TickTable {
    fn default() -> Self {
        Self::krw()
    }
}
