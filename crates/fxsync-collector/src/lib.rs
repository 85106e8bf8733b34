//! OANDA 캔들 동기화 수집기.
//!
//! 이 crate는 다음을 제공합니다:
//! - 상품별 동기화 스케줄러 (대상 여부 판단, 구간 분할, 조회 → 검증 → 저장)
//! - 고정 폭 워커 풀로 상품을 병렬 처리하는 실행 루프
//! - 환경변수 기반 설정과 `fxsync` CLI

pub mod config;
pub mod error;
pub mod runner;
pub mod scheduler;
pub mod stats;
pub mod status;

pub use config::{CollectorConfig, DaemonConfig, SchedulerConfig};
pub use error::{CollectorError, Result};
pub use runner::{is_dispatch_minute, run_tick, shutdown_signal, Daemon};
pub use scheduler::{compute_range, eligibility, plan_chunks, Eligibility, SyncOutcome, SyncScheduler};
pub use stats::TickStats;
pub use status::SyncStatusBoard;
