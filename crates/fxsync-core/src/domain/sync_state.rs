//! 상품별 동기화 상태.
//!
//! 마지막 커밋 시각은 매 스케줄링 판단마다 저장소에서 다시 읽어 옵니다.
//! 나머지 필드는 프로세스 메모리에만 있는 관측용 값입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 실행 상태.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// 아직 실행되지 않음
    #[default]
    Idle,
    /// 실행 중
    Running,
    /// 동기화 대상 아님 (주말 또는 주기 미도래)
    Skipped,
    /// 완료
    Completed,
    /// 실패
    Failed,
}

impl SyncStatus {
    /// 문자열로 변환.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Running => "running",
            SyncStatus::Skipped => "skipped",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 청크 진행률.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProgress {
    /// 완료한 청크 수
    pub completed: usize,
    /// 전체 청크 수
    pub total: usize,
}

impl ChunkProgress {
    /// 진행률 (%). 청크가 없으면 100.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

impl fmt::Display for ChunkProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

/// 상품 하나의 동기화 상태.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    /// 실행 상태
    pub status: SyncStatus,
    /// 사람이 읽을 수 있는 상태 메시지
    pub message: String,
    /// 청크 진행률
    pub progress: ChunkProgress,
    /// 마지막으로 확인한 커밋 시각
    pub last_timestamp: Option<DateTime<Utc>>,
    /// 상태 갱신 시각
    pub updated_at: DateTime<Utc>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            status: SyncStatus::Idle,
            message: String::new(),
            progress: ChunkProgress::default(),
            last_timestamp: None,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        let progress = ChunkProgress {
            completed: 1,
            total: 4,
        };
        assert_eq!(progress.percent(), 25.0);
        assert_eq!(progress.to_string(), "1/4");
        assert_eq!(ChunkProgress::default().percent(), 100.0);
    }

    #[test]
    fn test_status_str() {
        assert_eq!(SyncStatus::default(), SyncStatus::Idle);
        assert_eq!(SyncStatus::Skipped.as_str(), "skipped");
    }
}
