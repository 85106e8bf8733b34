//! 에러 타입 정의.

use std::fmt;

use fxsync_core::SyncError;
use fxsync_data::DataError;
use fxsync_exchange::ExchangeError;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 설정 에러
    Config(String),
    /// 데이터베이스 에러
    Database(DataError),
    /// API 에러 (계좌 확인, 자격증명)
    Exchange(ExchangeError),
    /// 동기화 에러
    Sync(SyncError),
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::Exchange(e) => write!(f, "Exchange error: {}", e),
            Self::Sync(e) => write!(f, "Sync error: {}", e),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        Self::Database(err)
    }
}

impl From<ExchangeError> for CollectorError {
    fn from(err: ExchangeError) -> Self {
        Self::Exchange(err)
    }
}

impl From<SyncError> for CollectorError {
    fn from(err: SyncError) -> Self {
        Self::Sync(err)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
