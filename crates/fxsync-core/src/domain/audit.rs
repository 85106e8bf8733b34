//! 감사 기록.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 감사 기록 결과 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// 정상 완료
    Completed,
    /// 실패
    Failed,
    /// 요청 한도 초과로 다음 틱에 재시도
    RateLimited,
}

impl AuditStatus {
    /// 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Completed => "completed",
            AuditStatus::Failed => "failed",
            AuditStatus::RateLimited => "rate_limited",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 감사 로그 작업 이름.
pub mod operations {
    /// 상품 하나의 동기화 시도
    pub const SYNC_INSTRUMENT: &str = "sync_instrument";
    /// 프로세스 시작 (계좌 확인 완료)
    pub const STARTUP: &str = "startup";
    /// 정상 종료
    pub const SHUTDOWN: &str = "shutdown";
}

/// 추가 전용 감사 기록 한 건.
///
/// 한 번 기록되면 수정/삭제되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// 자동 증가 ID
    pub id: i64,
    /// 기록 시각
    pub timestamp: DateTime<Utc>,
    /// 작업 이름
    pub operation: String,
    /// 자유 형식 상세
    pub details: String,
    /// 결과 상태 (`AuditStatus::as_str`)
    pub status: String,
}
