//! 틱 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::scheduler::SyncOutcome;

/// 디스패치 틱 하나의 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickStats {
    /// 디스패치한 상품 수
    pub total: usize,
    /// 완료 수
    pub completed: usize,
    /// 건너뛴 수 (주말 또는 동기화 주기 미도래)
    pub skipped: usize,
    /// 실패 수 (요청 한도 초과 제외)
    pub failed: usize,
    /// 요청 한도 초과로 다음 틱에 재시도할 수
    pub rate_limited: usize,
    /// 처리한 청크 수
    pub chunks: usize,
    /// 새로 저장한 캔들 수
    pub candles_saved: u64,
    /// 이미 있던 캔들 수
    pub duplicates: u64,
    /// 저장된 값과 내용이 다른 중복 수
    pub drifted: u64,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl TickStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 상품 하나의 결과를 반영
    pub fn record(&mut self, outcome: &SyncOutcome) {
        self.total += 1;
        match outcome {
            SyncOutcome::Completed { chunks, saved } => {
                self.completed += 1;
                self.chunks += chunks;
                self.candles_saved += saved.inserted;
                self.duplicates += saved.duplicates;
                self.drifted += saved.drifted;
            }
            SyncOutcome::Skipped { .. } => self.skipped += 1,
            SyncOutcome::RateLimited { .. } => self.rate_limited += 1,
            SyncOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// 작업 중단(panic 등)으로 결과를 받지 못한 상품
    pub fn record_lost(&mut self) {
        self.total += 1;
        self.failed += 1;
    }

    /// 성공률 계산 (%, 건너뛴 상품 제외)
    pub fn success_rate(&self) -> f64 {
        let attempted = self.total - self.skipped;
        if attempted == 0 {
            0.0
        } else {
            (self.completed as f64 / attempted as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            completed = self.completed,
            skipped = self.skipped,
            failed = self.failed,
            rate_limited = self.rate_limited,
            chunks = self.chunks,
            candles_saved = self.candles_saved,
            duplicates = self.duplicates,
            drifted = self.drifted,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 틱 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SkipReason;
    use fxsync_data::SaveOutcome;

    #[test]
    fn test_record_outcomes() {
        let mut stats = TickStats::new();
        stats.record(&SyncOutcome::Completed {
            chunks: 2,
            saved: SaveOutcome {
                inserted: 10,
                duplicates: 3,
                drifted: 1,
            },
        });
        stats.record(&SyncOutcome::Skipped {
            reason: SkipReason::Weekend,
        });
        stats.record(&SyncOutcome::RateLimited {
            message: "429".into(),
        });
        stats.record_lost();

        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.rate_limited, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.candles_saved, 10);
        assert_eq!(stats.drifted, 1);
        assert!((stats.success_rate() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_empty() {
        assert_eq!(TickStats::new().success_rate(), 0.0);
    }
}
