//! 스케줄러가 사용하는 저장소 인터페이스.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxsync_core::{AuditStatus, Candle, Instrument};

use crate::Result;

/// 배치 저장 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    /// 새로 저장된 행 수
    pub inserted: u64,
    /// 이미 있던 키 (무시됨)
    pub duplicates: u64,
    /// 중복 키 중 저장된 내용과 해시가 다른 행 수
    pub drifted: u64,
}

impl SaveOutcome {
    /// 다른 결과를 더합니다.
    pub fn merge(&mut self, other: SaveOutcome) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.drifted += other.drifted;
    }
}

/// 캔들 저장소.
#[async_trait]
pub trait CandleRepository: Send + Sync {
    /// 상품의 마지막 저장 시각.
    ///
    /// 저장된 행이 없으면 `now`에서 초기 조회 기간을 뺀 시각을 반환합니다.
    async fn get_last_timestamp(
        &self,
        instrument: &Instrument,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>>;

    /// 캔들 배치를 하나의 트랜잭션으로 저장합니다.
    ///
    /// 이미 있는 키는 덮어쓰지 않고 무시합니다. 실패하면 배치 전체가 롤백됩니다.
    async fn save_candles(&self, candles: &[Candle]) -> Result<SaveOutcome>;

    /// 감사 기록을 남깁니다. 실패는 로그만 남기고 삼킵니다.
    async fn log_audit(&self, operation: &str, details: &str, status: AuditStatus);
}
