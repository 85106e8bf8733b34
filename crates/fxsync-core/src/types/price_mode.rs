//! 캔들 가격 구성 요소 선택.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 요청할 가격 구성 요소 (mid / bid / ask 조합).
///
/// OHLC는 mid가 있으면 mid에서, 없으면 bid, 그다음 ask에서 가져옵니다.
/// bid와 ask가 모두 있으면 스프레드를 계산할 수 있습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceMode {
    /// 중간가
    M,
    /// 매수호가
    B,
    /// 매도호가
    A,
    /// 중간가 + 매수호가
    MB,
    /// 중간가 + 매도호가
    MA,
    /// 매수 + 매도호가
    BA,
    /// 전부
    #[default]
    MBA,
}

impl PriceMode {
    /// API 파라미터 값.
    pub fn code(&self) -> &'static str {
        match self {
            PriceMode::M => "M",
            PriceMode::B => "B",
            PriceMode::A => "A",
            PriceMode::MB => "MB",
            PriceMode::MA => "MA",
            PriceMode::BA => "BA",
            PriceMode::MBA => "MBA",
        }
    }

    /// 중간가 포함 여부.
    pub fn includes_mid(&self) -> bool {
        self.code().contains('M')
    }

    /// 매수호가 포함 여부.
    pub fn includes_bid(&self) -> bool {
        self.code().contains('B')
    }

    /// 매도호가 포함 여부.
    pub fn includes_ask(&self) -> bool {
        self.code().contains('A')
    }

    /// 스프레드 계산 가능 여부.
    pub fn has_spread(&self) -> bool {
        self.includes_bid() && self.includes_ask()
    }
}

impl fmt::Display for PriceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PriceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "M" => Ok(PriceMode::M),
            "B" => Ok(PriceMode::B),
            "A" => Ok(PriceMode::A),
            "MB" => Ok(PriceMode::MB),
            "MA" => Ok(PriceMode::MA),
            "BA" => Ok(PriceMode::BA),
            "MBA" => Ok(PriceMode::MBA),
            _ => Err(format!("Invalid price mode: {}", s)),
        }
    }
}
