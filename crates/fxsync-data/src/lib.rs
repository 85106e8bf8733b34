//! 캔들 시계열 저장소.
//!
//! 이 crate는 다음을 제공합니다:
//! - `(instrument, timestamp)` 복합 키 기반 SQLite 캔들 저장소
//! - 배치 단위 원자적 저장 (중복 키는 무시, 내용 변경은 drift로 집계)
//! - 추가 전용 감사 로그
//! - 스케줄러가 사용하는 `CandleRepository` trait

pub mod error;
pub mod repository;
pub mod storage;

pub use error::{DataError, Result};
pub use repository::{CandleRepository, SaveOutcome};
pub use storage::sqlite::{CandleStore, StoreConfig};
