//! 시장 데이터 API 연결.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `CandleSource` trait: 캔들 조회 인터페이스
//! - OANDA v20 REST 커넥터
//! - 요청 간 최소 간격 보장 (`RequestThrottle`, 모든 호출자가 공유)
//! - 지수 백오프 재시도 상태 머신 (`Backoff`)

pub mod connector;
pub mod error;
pub mod retry;
pub mod throttle;
pub mod traits;

pub use connector::oanda::{AccountSummary, Environment, OandaClient, OandaConfig};
pub use error::*;
pub use retry::{with_retry, Backoff, BackoffStep, GiveUpReason, RetryConfig};
pub use throttle::RequestThrottle;
pub use traits::*;
