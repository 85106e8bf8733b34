//! 캔들 배치 검증기.
//!
//! 입출력이 없는 순수 함수들로 구성되어 있으며, 입력을 변경하지 않습니다.
//!
//! # 검사 항목
//!
//! - **필드**: 모든 필수 필드가 채워져 있고 거래량이 0 이상 (`DataValidation`)
//! - **가격 관계**: `low ≤ open, close ≤ high`, `low ≤ high` (`PriceIntegrity`)
//! - **타임스탬프**: 배치 내 엄격한 증가, 봉 경계 정렬, 설명되지 않는 공백 (`DataValidation`)

use chrono::{DateTime, Duration, Utc};

use crate::domain::{spans_weekend, RawCandle};
use crate::error::{SyncError, SyncResult};
use crate::types::Granularity;

/// 캔들 사이 공백 허용 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapPolicy {
    /// 휴장과 무관하게 허용하는 최대 공백
    pub max_gap: Duration,
    /// true면 설명되지 않는 공백을 에러로 처리
    pub strict: bool,
}

impl Default for GapPolicy {
    fn default() -> Self {
        Self {
            max_gap: Duration::hours(1),
            strict: false,
        }
    }
}

/// 연속한 두 캔들 사이의 설명되지 않는 공백.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// 공백 직전 캔들 시각
    pub after: DateTime<Utc>,
    /// 공백 직후 캔들 시각
    pub before: DateTime<Utc>,
    /// 빠진 봉 수
    pub missing_bars: i64,
}

/// 캔들 배치 검증기.
#[derive(Debug, Clone, Default)]
pub struct CandleValidator {
    granularity: Option<Granularity>,
    gap_policy: GapPolicy,
}

impl CandleValidator {
    /// 간격 검사 없이 순서만 확인하는 검증기.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기대 간격을 지정합니다 (정렬/공백 검사 활성화).
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    /// 공백 허용 정책을 지정합니다.
    pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }

    /// 필드 및 가격 관계를 검증합니다. 빈 배치는 통과합니다.
    pub fn validate(&self, batch: &[RawCandle]) -> SyncResult<()> {
        check_fields(batch)?;
        check_prices(batch)
    }

    /// 타임스탬프 순서와 연속성을 검사합니다.
    ///
    /// 엄격하지 않은 정책에서는 설명되지 않는 공백을 에러 대신 반환합니다.
    pub fn check_timestamps(&self, batch: &[RawCandle]) -> SyncResult<Vec<Gap>> {
        for pair in batch.windows(2) {
            if pair[1].time <= pair[0].time {
                return Err(SyncError::DataValidation(format!(
                    "timestamps not strictly increasing: {} then {}",
                    pair[0].time, pair[1].time
                )));
            }
        }

        let Some(granularity) = self.granularity else {
            return Ok(Vec::new());
        };

        if let Some(misaligned) = batch.iter().find(|c| !granularity.is_aligned(c.time)) {
            return Err(SyncError::DataValidation(format!(
                "timestamp {} is not aligned to {}",
                misaligned.time, granularity
            )));
        }

        let gaps = self.find_gaps(batch, granularity);
        if self.gap_policy.strict {
            if let Some(gap) = gaps.first() {
                return Err(SyncError::DataValidation(format!(
                    "{} unexplained gaps, first between {} and {} ({} bars missing)",
                    gaps.len(),
                    gap.after,
                    gap.before,
                    gap.missing_bars
                )));
            }
        }
        Ok(gaps)
    }

    fn find_gaps(&self, batch: &[RawCandle], granularity: Granularity) -> Vec<Gap> {
        let step = granularity.duration();
        batch
            .windows(2)
            .filter_map(|pair| {
                let (prev, next) = (pair[0].time, pair[1].time);
                let delta = next - prev;
                if delta <= step || delta <= self.gap_policy.max_gap {
                    return None;
                }
                if spans_weekend(prev, next) {
                    return None;
                }
                Some(Gap {
                    after: prev,
                    before: next,
                    missing_bars: delta.num_seconds() / granularity.as_secs() - 1,
                })
            })
            .collect()
    }
}

fn check_fields(batch: &[RawCandle]) -> SyncResult<()> {
    for candle in batch {
        let missing = candle.missing_fields();
        if !missing.is_empty() {
            return Err(SyncError::DataValidation(format!(
                "missing values at {}: {}",
                candle.time,
                missing.join(", ")
            )));
        }
        if candle.volume.is_some_and(|v| v < 0) {
            return Err(SyncError::DataValidation(format!(
                "negative volume at {}",
                candle.time
            )));
        }
    }
    Ok(())
}

fn check_prices(batch: &[RawCandle]) -> SyncResult<()> {
    for candle in batch {
        let (Some(open), Some(high), Some(low), Some(close)) =
            (candle.open, candle.high, candle.low, candle.close)
        else {
            continue;
        };

        let invalid = high < low
            || open > high
            || open < low
            || close > high
            || close < low;

        if invalid {
            return Err(SyncError::PriceIntegrity(format!(
                "invalid price relationships at {}: o={} h={} l={} c={}",
                candle.time, open, high, low, close
            )));
        }
    }
    Ok(())
}
