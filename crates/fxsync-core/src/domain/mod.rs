//! 동기화 도메인 모델.
//!
//! - `candle`: API에서 받은 원시 캔들과 저장용 캔들
//! - `audit`: 추가 전용 감사 기록
//! - `sync_state`: 상품별 동기화 상태
//! - `calendar`: 외환 시장 휴장 달력

pub mod audit;
pub mod calendar;
pub mod candle;
pub mod sync_state;

pub use audit::*;
pub use calendar::*;
pub use candle::*;
pub use sync_state::*;
