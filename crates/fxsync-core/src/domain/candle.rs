//! 캔들 데이터 구조체.
//!
//! 캔들은 두 단계를 거칩니다:
//! 1. `RawCandle` - API 응답에서 바로 만든 값. 필드가 비어 있을 수 있습니다.
//! 2. `Candle` - 검증을 통과해 저장 스키마로 변환된 불변 행.

use crate::error::SyncError;
use crate::types::Instrument;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 가격 타입.
pub type Price = Decimal;

/// API에서 받은 검증 전 캔들.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandle {
    /// 봉 시작 시각 (UTC)
    pub time: DateTime<Utc>,
    /// 시가
    pub open: Option<Price>,
    /// 고가
    pub high: Option<Price>,
    /// 저가
    pub low: Option<Price>,
    /// 종가
    pub close: Option<Price>,
    /// 틱 거래량
    pub volume: Option<i64>,
    /// 봉 완성 여부
    pub complete: Option<bool>,
    /// 매도 종가 - 매수 종가
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spread: Option<Price>,
}

impl RawCandle {
    /// 누락된 필수 필드 이름 목록.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.open.is_none() {
            missing.push("open");
        }
        if self.high.is_none() {
            missing.push("high");
        }
        if self.low.is_none() {
            missing.push("low");
        }
        if self.close.is_none() {
            missing.push("close");
        }
        if self.volume.is_none() {
            missing.push("volume");
        }
        if self.complete.is_none() {
            missing.push("complete");
        }
        missing
    }
}

/// 저장 가능한 OHLCV 캔들.
///
/// `(instrument, timestamp)`가 저장소의 복합 키입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// 상품
    pub instrument: Instrument,
    /// 봉 시작 시각 (UTC, 봉 경계)
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 틱 거래량 (0 이상)
    pub volume: i64,
    /// 봉 완성 여부
    pub complete: bool,
    /// 스프레드 (bid/ask를 모두 요청한 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spread: Option<Price>,
}

impl Candle {
    /// 원시 캔들을 저장용 캔들로 변환합니다.
    ///
    /// 필수 필드가 비어 있으면 `DataValidation` 에러를 반환합니다.
    /// 가격 관계는 여기서 확인하지 않습니다 (`CandleValidator` 담당).
    pub fn from_raw(instrument: &Instrument, raw: &RawCandle) -> Result<Self, SyncError> {
        match (
            raw.open, raw.high, raw.low, raw.close, raw.volume, raw.complete,
        ) {
            (Some(open), Some(high), Some(low), Some(close), Some(volume), Some(complete)) => {
                Ok(Self {
                    instrument: instrument.clone(),
                    timestamp: raw.time,
                    open,
                    high,
                    low,
                    close,
                    volume,
                    complete,
                    spread: raw.spread,
                })
            }
            _ => Err(SyncError::DataValidation(format!(
                "{} @ {}: missing {}",
                instrument,
                raw.time,
                raw.missing_fields().join(", ")
            ))),
        }
    }

    /// 저장소에 기록하는 타임스탬프 문자열 (`YYYY-MM-DDTHH:MM:SSZ`).
    pub fn timestamp_key(&self) -> String {
        format_timestamp(self.timestamp)
    }

    /// 행 내용의 SHA-256 해시 (hex).
    ///
    /// 같은 키로 다른 값이 다시 들어왔는지 감지하는 데 사용합니다.
    pub fn content_hash(&self) -> String {
        let canonical = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.instrument,
            self.timestamp_key(),
            self.open.normalize(),
            self.high.normalize(),
            self.low.normalize(),
            self.close.normalize(),
            self.volume,
            self.complete,
            self.spread
                .map(|s| s.normalize().to_string())
                .unwrap_or_default(),
        );
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

/// 저장소와 API에서 공통으로 쓰는 초 단위 RFC3339 UTC 문자열.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// RFC3339 문자열을 UTC 시각으로 파싱합니다.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn raw() -> RawCandle {
        RawCandle {
            time: Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 10).unwrap(),
            open: Some(dec!(1.10010)),
            high: Some(dec!(1.10050)),
            low: Some(dec!(1.10000)),
            close: Some(dec!(1.10020)),
            volume: Some(12),
            complete: Some(true),
            spread: Some(dec!(0.00012)),
        }
    }

    #[test]
    fn test_from_raw() {
        let instrument: Instrument = "EUR_USD".parse().unwrap();
        let candle = Candle::from_raw(&instrument, &raw()).unwrap();
        assert_eq!(candle.volume, 12);
        assert_eq!(candle.timestamp_key(), "2024-01-02T03:00:10Z");
        assert_eq!(candle.spread, Some(dec!(0.00012)));
    }

    #[test]
    fn test_from_raw_missing_fields() {
        let instrument: Instrument = "EUR_USD".parse().unwrap();
        let mut broken = raw();
        broken.high = None;
        broken.volume = None;

        let err = Candle::from_raw(&instrument, &broken).unwrap_err();
        assert!(matches!(err, SyncError::DataValidation(ref msg) if msg.contains("high, volume")));
    }

    #[test]
    fn test_content_hash_ignores_trailing_zeros() {
        let instrument: Instrument = "EUR_USD".parse().unwrap();
        let a = Candle::from_raw(&instrument, &raw()).unwrap();
        let mut b = a.clone();
        b.open = dec!(1.100100);
        assert_eq!(a.content_hash(), b.content_hash());

        b.close = dec!(1.10021);
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_timestamp_roundtrip_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_timestamp(ts), "2024-01-01T00:00:00Z");
        assert_eq!(
            parse_timestamp("2024-01-01T00:00:00.000000000Z"),
            Some(ts)
        );
        assert_eq!(parse_timestamp("not a time"), None);
    }
}
