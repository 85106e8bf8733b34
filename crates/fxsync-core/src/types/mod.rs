//! 동기화 전반에서 사용되는 공통 타입.

mod granularity;
mod instrument;
mod price_mode;

pub use granularity::*;
pub use instrument::*;
pub use price_mode::*;
