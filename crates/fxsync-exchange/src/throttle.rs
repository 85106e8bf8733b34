//! 요청 간 최소 간격 보장.
//!
//! 하나의 `RequestThrottle`을 모든 워커가 공유하므로 처리량 상한은
//! 워커 수와 무관하게 원격 API 전체 기준으로 적용됩니다.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

use crate::ExchangeResult;

/// 공유 요청 페이싱.
#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    /// 최소 요청 간격으로 생성.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// 최소 요청 간격.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// 마지막으로 완료된 요청 시각.
    pub async fn last_request(&self) -> Option<Instant> {
        *self.last_request.lock().await
    }

    /// 남은 간격만큼 기다린 뒤 요청을 실행합니다.
    ///
    /// 대기와 요청 동안 잠금을 유지합니다. 요청이 성공했거나
    /// "없음"으로 처리된 경우에만 마지막 요청 시각을 갱신합니다.
    pub async fn run<T, Fut>(&self, request: Fut) -> ExchangeResult<T>
    where
        Fut: Future<Output = ExchangeResult<T>>,
    {
        let mut last = self.last_request.lock().await;

        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                trace!(wait_ms = (ready_at - now).as_millis() as u64, "요청 간격 대기");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let result = request.await;
        match &result {
            Ok(_) => *last = Some(Instant::now()),
            Err(e) if e.is_not_found() => *last = Some(Instant::now()),
            Err(_) => {}
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExchangeError;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_not_delayed() {
        let throttle = RequestThrottle::new(Duration::from_millis(100));
        let start = Instant::now();

        throttle.run(async { Ok(()) }).await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(throttle.last_request().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_requests_spaced() {
        let throttle = RequestThrottle::new(Duration::from_millis(100));
        let start = Instant::now();

        for _ in 0..3 {
            throttle.run(async { Ok(()) }).await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_across_tasks() {
        let throttle = Arc::new(RequestThrottle::new(Duration::from_millis(100)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let throttle = Arc::clone(&throttle);
            handles.push(tokio::spawn(async move {
                throttle.run(async { Ok(Instant::now()) }).await.unwrap()
            }));
        }

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap());
        }
        stamps.sort();

        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_request_does_not_advance_watermark() {
        let throttle = RequestThrottle::new(Duration::from_millis(100));

        let result: ExchangeResult<()> = throttle
            .run(async { Err(ExchangeError::RateLimited) })
            .await;
        assert!(result.is_err());
        assert!(throttle.last_request().await.is_none());

        let result: ExchangeResult<()> = throttle
            .run(async { Err(ExchangeError::NotFound("PRICE_NOT_FOUND".into())) })
            .await;
        assert!(result.is_err());
        assert!(throttle.last_request().await.is_some());
    }
}
