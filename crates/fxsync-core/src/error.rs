//! 동기화 엔진의 에러 분류 체계.
//!
//! 각 변형은 처리 방식이 다릅니다:
//! - `Security`: 시작 시 치명적, 프로세스 종료
//! - `RateLimitExceeded`: 다음 틱에서 재시도
//! - `DataIntegrity` / `DataValidation` / `PriceIntegrity`: 해당 청크 폐기, 상품 실패 처리
//! - `Database`: 해당 상품의 청크 시퀀스 중단

use thiserror::Error;

/// 동기화 에러.
#[derive(Debug, Error)]
pub enum SyncError {
    /// 자격증명 형식 오류
    #[error("보안 에러: {0}")]
    Security(String),

    /// 요청 한도 초과 (재시도 한도 소진)
    #[error("요청 한도 초과: {0}")]
    RateLimitExceeded(String),

    /// 응답 형식 오류 (필수 필드 누락)
    #[error("데이터 무결성 에러: {0}")]
    DataIntegrity(String),

    /// 캔들 필드 누락 또는 타임스탬프 순서/연속성 위반
    #[error("데이터 검증 에러: {0}")]
    DataValidation(String),

    /// OHLC 가격 관계 위반
    #[error("가격 무결성 에러: {0}")]
    PriceIntegrity(String),

    /// 저장소 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 네트워크/서버 에러 (재시도 후 실패 포함)
    #[error("전송 에러: {0}")]
    Transport(String),
}

/// 동기화 작업을 위한 Result 타입.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// 다음 틱에 다시 시도하면 회복될 수 있는 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::RateLimitExceeded(_) | SyncError::Transport(_)
        )
    }

    /// 감사 로그에 기록할 짧은 분류 이름.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Security(_) => "security",
            SyncError::RateLimitExceeded(_) => "rate_limited",
            SyncError::DataIntegrity(_) => "data_integrity",
            SyncError::DataValidation(_) => "data_validation",
            SyncError::PriceIntegrity(_) => "price_integrity",
            SyncError::Database(_) => "database",
            SyncError::Transport(_) => "transport",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let rate_err = SyncError::RateLimitExceeded("429".to_string());
        assert!(rate_err.is_retryable());

        let price_err = SyncError::PriceIntegrity("high < low".to_string());
        assert!(!price_err.is_retryable());
        assert!(SyncError::Transport("503".to_string()).is_retryable());
        assert!(!SyncError::Database("locked".to_string()).is_retryable());
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            SyncError::RateLimitExceeded(String::new()).kind(),
            "rate_limited"
        );
        assert_eq!(SyncError::Database(String::new()).kind(), "database");
    }
}
