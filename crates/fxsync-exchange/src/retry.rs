//! 지수 백오프 재시도.
//!
//! 재시도 흐름을 명시적인 상태 머신(`Backoff`)으로 표현하여
//! 네트워크 없이도 단독으로 테스트할 수 있습니다.
//!
//! ```text
//! 실패 ──> attempts += 1 ──[attempts ≥ max_attempts]──> GiveUp(MaxAttempts)
//!                 │
//!                 └──[elapsed + delay > max_elapsed]──> GiveUp(MaxElapsed)
//!                 │
//!                 └──> Retry(delay), next_delay = min(delay × multiplier, max_delay)
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::warn;

use crate::{ExchangeError, ExchangeResult};

/// 재시도 설정.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 첫 시도부터 포기까지 최대 경과 시간
    pub max_elapsed: Duration,
    /// 첫 재시도 대기 시간
    pub initial_delay: Duration,
    /// 대기 시간 상한
    pub max_delay: Duration,
    /// 대기 시간 증가 배수
    pub multiplier: f64,
    /// full jitter 적용 여부 (0 ~ delay 사이 무작위)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_elapsed: Duration::from_secs(300),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// 지터 없이 고정된 지연으로 빠르게 재시도하는 설정 (테스트용).
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            max_elapsed: Duration::from_secs(60),
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            multiplier: 1.0,
            jitter: false,
        }
    }
}

/// 포기 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// 최대 시도 횟수 도달
    MaxAttempts,
    /// 최대 경과 시간 초과
    MaxElapsed,
}

impl fmt::Display for GiveUpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GiveUpReason::MaxAttempts => write!(f, "max attempts"),
            GiveUpReason::MaxElapsed => write!(f, "max elapsed time"),
        }
    }
}

/// 실패 후 다음 동작.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    /// 주어진 시간만큼 기다린 뒤 재시도
    Retry(Duration),
    /// 포기
    GiveUp(GiveUpReason),
}

/// 백오프 상태 머신.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    attempts: u32,
    next_delay: Duration,
}

impl Backoff {
    /// 새 상태 머신 생성.
    pub fn new(config: RetryConfig) -> Self {
        let next_delay = config.initial_delay;
        Self {
            config,
            attempts: 0,
            next_delay,
        }
    }

    /// 지금까지 실패한 시도 횟수.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 실패를 기록하고 다음 동작을 결정합니다.
    ///
    /// `elapsed`는 첫 시도 시작부터 지금까지의 경과 시간입니다.
    pub fn on_failure(&mut self, elapsed: Duration) -> BackoffStep {
        self.attempts += 1;
        if self.attempts >= self.config.max_attempts {
            return BackoffStep::GiveUp(GiveUpReason::MaxAttempts);
        }

        let delay = self.jittered(self.next_delay);
        if elapsed + delay > self.config.max_elapsed {
            return BackoffStep::GiveUp(GiveUpReason::MaxElapsed);
        }

        let grown = self.next_delay.mul_f64(self.config.multiplier.max(1.0));
        self.next_delay = grown.min(self.config.max_delay);
        BackoffStep::Retry(delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.config.jitter || delay.is_zero() {
            return delay;
        }
        let millis = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
    }
}

/// 재시도 가능한 에러에 대해 백오프하며 작업을 반복합니다.
///
/// 재시도 불가능한 에러는 즉시 반환합니다. 한도를 넘으면 요청 한도 초과는
/// `RateLimitExceeded`로, 나머지는 `RetriesExhausted`로 반환합니다.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut attempt: F,
) -> ExchangeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ExchangeResult<T>>,
{
    let started = Instant::now();
    let mut backoff = Backoff::new(config.clone());

    loop {
        let err = match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => err,
            Err(err) => return Err(err),
        };

        match backoff.on_failure(started.elapsed()) {
            BackoffStep::Retry(delay) => {
                warn!(
                    operation = operation,
                    attempt = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "재시도 가능한 에러, 백오프 후 재시도"
                );
                tokio::time::sleep(delay).await;
            }
            BackoffStep::GiveUp(reason) => {
                warn!(
                    operation = operation,
                    attempts = backoff.attempts(),
                    reason = %reason,
                    error = %err,
                    "재시도 한도 도달"
                );
                return Err(match err {
                    ExchangeError::RateLimited => ExchangeError::RateLimitExceeded {
                        attempts: backoff.attempts(),
                    },
                    other => ExchangeError::RetriesExhausted {
                        attempts: backoff.attempts(),
                        reason: reason.to_string(),
                        last: other.to_string(),
                    },
                });
            }
        }
    }
}
