//! 거래소 API 에러 타입.

use fxsync_core::SyncError;
use thiserror::Error;

/// API 호출 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 요청 한도 초과 (HTTP 429)
    #[error("Rate limited")]
    RateLimited,

    /// 재시도를 모두 소진했는데도 요청 한도 초과
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// 서버 에러 (HTTP 5xx)
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// 재시도를 모두 소진한 전송 실패
    #[error("Gave up after {attempts} attempts ({reason}): {last}")]
    RetriesExhausted {
        attempts: u32,
        reason: String,
        last: String,
    },

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 자격증명 형식 오류 (네트워크 호출 전)
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// 상품 또는 가격 없음 (재시도 대상 아님)
    #[error("Not found: {0}")]
    NotFound(String),

    /// 기타 API 에러
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    /// 응답 역직렬화 실패
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 응답에 필요한 필드가 없음
    #[error("Malformed response: {0}")]
    DataIntegrity(String),
}

impl ExchangeError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_)
                | ExchangeError::Timeout(_)
                | ExchangeError::RateLimited
                | ExchangeError::ServerError { .. }
        )
    }

    /// "없음" 계열 의미적 실패인지 확인 (빈 결과로 처리).
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExchangeError::NotFound(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            ExchangeError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<ExchangeError> for SyncError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::RateLimited | ExchangeError::RateLimitExceeded { .. } => {
                SyncError::RateLimitExceeded(err.to_string())
            }
            ExchangeError::ParseError(_) | ExchangeError::DataIntegrity(_) => {
                SyncError::DataIntegrity(err.to_string())
            }
            ExchangeError::InvalidCredentials(_) | ExchangeError::Unauthorized(_) => {
                SyncError::Security(err.to_string())
            }
            _ => SyncError::Transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(ExchangeError::RateLimited.is_retryable());
        assert!(ExchangeError::ServerError {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(!ExchangeError::NotFound("EUR_XXX".into()).is_retryable());
        assert!(!ExchangeError::DataIntegrity("no candles".into()).is_retryable());
    }

    #[test]
    fn test_sync_error_mapping() {
        let err: SyncError = ExchangeError::RateLimitExceeded { attempts: 5 }.into();
        assert!(matches!(err, SyncError::RateLimitExceeded(_)));

        let err: SyncError = ExchangeError::DataIntegrity("missing candles".into()).into();
        assert!(matches!(err, SyncError::DataIntegrity(_)));

        let err: SyncError = ExchangeError::InvalidCredentials("short".into()).into();
        assert!(matches!(err, SyncError::Security(_)));

        let err: SyncError = ExchangeError::RetriesExhausted {
            attempts: 5,
            reason: "max attempts".into(),
            last: "503".into(),
        }
        .into();
        assert!(matches!(err, SyncError::Transport(_)));
    }
}
