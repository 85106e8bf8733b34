//! 실행 루프.
//!
//! 매 분 틱을 돌고, UTC 분이 0인 틱(매 정시)에만 모든 상품을 고정 폭 워커 풀에
//! 분배합니다. 종료 신호는 틱 경계에서만 확인하므로 진행 중인 동기화는 끝까지
//! 실행된 뒤 루프가 종료됩니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use fxsync_core::{operations, AuditStatus, Instrument};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::DaemonConfig;
use crate::scheduler::{SyncOutcome, SyncScheduler};
use crate::stats::TickStats;

/// 정시 틱인지 확인 (UTC 분 == 0)
pub fn is_dispatch_minute(now: DateTime<Utc>) -> bool {
    now.minute() == 0
}

/// 가장 가까운 분으로 반올림 (틱이 경계보다 조금 일찍 깨어나는 경우 대비)
fn nearest_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    now + chrono::Duration::seconds(30)
}

/// 다음 분 경계까지 남은 시간
fn until_next_minute(now: DateTime<Utc>) -> Duration {
    let into_minute =
        Duration::from_secs(u64::from(now.second())) + Duration::from_nanos(u64::from(now.nanosecond()));
    Duration::from_secs(60).saturating_sub(into_minute)
}

/// 상품 목록을 워커 풀에 분배하고 모든 결과를 모읍니다.
///
/// 한 상품의 실패나 panic은 통계에만 반영되고 다른 상품에 영향을 주지 않습니다.
pub async fn run_tick(
    scheduler: Arc<SyncScheduler>,
    instruments: &[Instrument],
    max_workers: usize,
    now: DateTime<Utc>,
    force: bool,
) -> TickStats {
    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut tasks = JoinSet::new();

    info!(
        instruments = instruments.len(),
        workers = max_workers,
        force = force,
        "동기화 틱 시작"
    );

    for instrument in instruments.iter().cloned() {
        let scheduler = Arc::clone(&scheduler);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let outcome = scheduler.sync_instrument(&instrument, now, force).await;
            (instrument, outcome)
        });
    }

    let mut stats = TickStats::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((instrument, outcome)) => {
                match &outcome {
                    SyncOutcome::Failed { kind, message } => {
                        warn!(instrument = %instrument, kind = kind, error = %message, "상품 동기화 실패");
                    }
                    other => {
                        debug!(instrument = %instrument, status = %other.status(), "상품 동기화 종료");
                    }
                }
                stats.record(&outcome);
            }
            Err(e) => {
                error!(error = %e, "동기화 작업 비정상 종료");
                stats.record_lost();
            }
        }
    }

    stats.elapsed = started.elapsed();
    stats
}

/// 데몬 모드 실행 루프
pub struct Daemon {
    scheduler: Arc<SyncScheduler>,
    instruments: Vec<Instrument>,
    config: DaemonConfig,
}

impl Daemon {
    /// 새 데몬 생성
    pub fn new(scheduler: Arc<SyncScheduler>, instruments: Vec<Instrument>, config: DaemonConfig) -> Self {
        Self {
            scheduler,
            instruments,
            config,
        }
    }

    /// 종료 신호가 올 때까지 틱 루프를 실행합니다.
    ///
    /// 종료 전에 shutdown 감사 기록을 남깁니다.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            instruments = self.instruments.len(),
            workers = self.config.max_workers,
            "=== 데몬 모드 시작 (매 정시 동기화) ==="
        );

        let first_tick = Instant::now() + until_next_minute(Utc::now());
        let mut ticker = tokio::time::interval_at(first_tick, self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("종료 신호 수신, 데몬 종료 중...");
                    break;
                }
                _ = ticker.tick() => {
                    let now = Utc::now();
                    if !is_dispatch_minute(nearest_minute(now)) {
                        trace!(now = %now, "정시 아님, 대기");
                        continue;
                    }

                    ticks += 1;
                    let stats = run_tick(
                        Arc::clone(&self.scheduler),
                        &self.instruments,
                        self.config.max_workers,
                        now,
                        false,
                    )
                    .await;
                    stats.log_summary("sync_tick");
                }
            }
        }

        self.scheduler
            .store()
            .log_audit(
                operations::SHUTDOWN,
                &format!("graceful shutdown after {} dispatch ticks", ticks),
                AuditStatus::Completed,
            )
            .await;
        info!("데몬 종료");
    }
}

/// SIGINT/SIGTERM을 기다렸다가 토큰을 취소합니다.
pub async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Ctrl+C 핸들러 설치 실패");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "SIGTERM 핸들러 설치 실패");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to run loop");
}
