//! # FxSync Core
//!
//! FX 캔들 동기화 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 동기화 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 상품(Instrument), 캔들 간격(Granularity), 가격 모드(PriceMode)
//! - 캔들 및 감사 기록 구조체
//! - 상품별 동기화 상태
//! - 외환 시장 달력 (주말 휴장)
//! - 캔들 검증기
//! - 에러 분류 체계
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;
pub mod types;
pub mod validator;

pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
pub use validator::{CandleValidator, Gap, GapPolicy};
