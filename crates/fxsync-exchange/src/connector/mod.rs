//! 시장 데이터 API 커넥터.

pub mod oanda;

pub use oanda::*;
