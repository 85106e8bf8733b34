//! 통화쌍 상품 식별자.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 통화쌍 상품 코드 (예: `EUR_USD`).
///
/// 설정에서 고정된 집합으로 주어지며 파티션 키로만 사용됩니다.
/// 항상 `BASE_QUOTE` 형식의 대문자 코드입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Instrument(String);

impl Instrument {
    /// 코드 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 쉼표로 구분된 목록을 파싱합니다. 중복은 제거하고 순서는 유지합니다.
    pub fn parse_list(list: &str) -> Result<Vec<Instrument>, String> {
        let mut instruments: Vec<Instrument> = Vec::new();
        for code in list.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let instrument: Instrument = code.parse()?;
            if !instruments.contains(&instrument) {
                instruments.push(instrument);
            }
        }
        if instruments.is_empty() {
            return Err("instrument list is empty".to_string());
        }
        Ok(instruments)
    }
}

fn is_currency_code(part: &str) -> bool {
    (2..=10).contains(&part.len()) && part.chars().all(|c| c.is_ascii_alphanumeric())
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        match code.split_once('_') {
            Some((base, quote)) if is_currency_code(base) && is_currency_code(quote) => {
                Ok(Instrument(code))
            }
            _ => Err(format!("Invalid instrument: {}", s)),
        }
    }
}

impl TryFrom<String> for Instrument {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Instrument> for String {
    fn from(instrument: Instrument) -> Self {
        instrument.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
