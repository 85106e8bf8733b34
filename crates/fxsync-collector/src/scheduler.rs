//! 상품별 동기화 스케줄러.
//!
//! 매 틱마다 상품 하나에 대해 다음 순서로 진행합니다:
//!
//! 1. **대상 여부** - 주말이거나 마지막 커밋 후 동기화 주기가 지나지 않았으면 건너뜀
//! 2. **구간 계산** - `[마지막 커밋 시각(정시 내림), now]`을 요청당 최대 행 수 이하의
//!    연속 청크로 분할
//! 3. **청크 처리** - 오래된 청크부터 조회 → 검증 → 저장. 빈 결과는 다음 청크로 진행
//! 4. **결과** - 완료/요청 한도 초과/실패를 상태 보드와 감사 로그에 기록
//!
//! 한 상품의 실패는 결과 값으로만 보고되며 다른 상품에 영향을 주지 않습니다.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fxsync_core::{
    floor_to_hour, is_weekend, operations, sync_span, AuditStatus, Candle, CandleValidator,
    Granularity, Instrument, SyncError, SyncResult, SyncStatus,
};
use fxsync_data::{CandleRepository, SaveOutcome};
use fxsync_exchange::CandleSource;
use tracing::Instrument as _;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::status::SyncStatusBoard;

/// 건너뛴 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 주말 휴장
    Weekend,
    /// 마지막 커밋 후 동기화 주기 미도래
    NotDue {
        /// 마지막 커밋 후 경과 시간 (초)
        elapsed_secs: i64,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Weekend => write!(f, "Market closed (weekend)"),
            SkipReason::NotDue { elapsed_secs } => {
                write!(f, "Not due for sync ({}s since last candle)", elapsed_secs)
            }
        }
    }
}

/// 동기화 대상 여부
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// 동기화 대상
    Eligible,
    /// 이번 틱은 건너뜀
    Ineligible(SkipReason),
}

/// 상품 하나의 동기화 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// 대상 아님
    Skipped { reason: SkipReason },
    /// 모든 청크 완료 (청크가 0개인 경우 포함)
    Completed { chunks: usize, saved: SaveOutcome },
    /// 요청 한도 초과, 다음 틱에 다시 대상이 됨
    RateLimited { message: String },
    /// 그 밖의 실패
    Failed { kind: &'static str, message: String },
}

impl SyncOutcome {
    /// 상태 보드에 표시할 상태
    pub fn status(&self) -> SyncStatus {
        match self {
            SyncOutcome::Skipped { .. } => SyncStatus::Skipped,
            SyncOutcome::Completed { .. } => SyncStatus::Completed,
            SyncOutcome::RateLimited { .. } | SyncOutcome::Failed { .. } => SyncStatus::Failed,
        }
    }

    /// 완료 여부
    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed { .. })
    }
}

/// 마지막 커밋 시각과 현재 시각으로 동기화 대상 여부를 판단합니다.
///
/// 주말이 아니고 `now - last ≥ interval`일 때만 대상입니다.
pub fn eligibility(last: DateTime<Utc>, now: DateTime<Utc>, interval: Duration) -> Eligibility {
    if is_weekend(now) {
        return Eligibility::Ineligible(SkipReason::Weekend);
    }
    let elapsed = now - last;
    if elapsed < interval {
        return Eligibility::Ineligible(SkipReason::NotDue {
            elapsed_secs: elapsed.num_seconds(),
        });
    }
    Eligibility::Eligible
}

/// 조회 구간 `[floor_to_hour(last), now]`. 비어 있으면 `None`.
pub fn compute_range(
    last: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = floor_to_hour(last);
    (start < now).then_some((start, now))
}

/// 구간을 청크당 `batch_size`개 봉 이하의 연속 청크로 나눕니다 (오래된 순).
pub fn plan_chunks(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    batch_size: u32,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let span = granularity.span_of(batch_size.max(1));
    let mut chunks = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + span).min(end);
        chunks.push((cursor, next));
        cursor = next;
    }
    chunks
}

#[derive(Debug, Default)]
struct ChunkResult {
    saved: SaveOutcome,
    latest: Option<DateTime<Utc>>,
}

/// 상품별 동기화 스케줄러
pub struct SyncScheduler {
    source: Arc<dyn CandleSource>,
    store: Arc<dyn CandleRepository>,
    board: Arc<SyncStatusBoard>,
    config: SchedulerConfig,
    validator: CandleValidator,
}

impl SyncScheduler {
    /// 새 스케줄러 생성
    pub fn new(
        source: Arc<dyn CandleSource>,
        store: Arc<dyn CandleRepository>,
        board: Arc<SyncStatusBoard>,
        config: SchedulerConfig,
    ) -> Self {
        let validator = CandleValidator::new()
            .with_granularity(config.granularity)
            .with_gap_policy(config.gap_policy);

        Self {
            source,
            store,
            board,
            config,
            validator,
        }
    }

    /// 설정
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// 상태 보드
    pub fn board(&self) -> &Arc<SyncStatusBoard> {
        &self.board
    }

    /// 저장소
    pub fn store(&self) -> &Arc<dyn CandleRepository> {
        &self.store
    }

    /// 상품 하나를 동기화합니다.
    ///
    /// `force`가 true면 주말/주기 검사를 생략합니다. 에러는 반환하지 않고
    /// 결과 값으로 보고합니다.
    pub async fn sync_instrument(
        &self,
        instrument: &Instrument,
        now: DateTime<Utc>,
        force: bool,
    ) -> SyncOutcome {
        self.run_pipeline(instrument, now, force)
            .instrument(sync_span!("sync_instrument", instrument))
            .await
    }

    async fn run_pipeline(
        &self,
        instrument: &Instrument,
        now: DateTime<Utc>,
        force: bool,
    ) -> SyncOutcome {
        let last = match self.store.get_last_timestamp(instrument, now).await {
            Ok(ts) => ts,
            Err(e) => return self.fail(instrument, e.into()).await,
        };
        self.board.set_last_timestamp(instrument, last);

        if !force {
            if let Eligibility::Ineligible(reason) =
                eligibility(last, now, self.config.sync_interval)
            {
                debug!(reason = %reason, "동기화 대상 아님");
                self.board
                    .update(instrument, SyncStatus::Skipped, reason.to_string());
                return SyncOutcome::Skipped { reason };
            }
        }

        self.board
            .update(instrument, SyncStatus::Running, "Analyzing data range...");

        let chunks = match compute_range(last, now) {
            Some((start, end)) => {
                plan_chunks(start, end, self.config.granularity, self.config.batch_size)
            }
            None => Vec::new(),
        };
        let total = chunks.len();
        self.board.set_progress(instrument, 0, total);

        info!(
            source = self.source.name(),
            from = %floor_to_hour(last),
            to = %now,
            chunks = total,
            "동기화 시작"
        );

        let mut saved = SaveOutcome::default();
        for (index, (start, end)) in chunks.into_iter().enumerate() {
            let result = self
                .sync_chunk(instrument, start, end)
                .instrument(sync_span!("chunk", instrument, index))
                .await;

            match result {
                Ok(chunk) => {
                    saved.merge(chunk.saved);
                    if let Some(latest) = chunk.latest {
                        self.board.set_last_timestamp(instrument, latest);
                    }
                    self.board.advance(instrument);
                }
                Err(e) => {
                    warn!(chunk = index, total = total, "청크 처리 중단");
                    return self.fail(instrument, e).await;
                }
            }
        }

        let details = format!(
            "{}: {} chunks, {} inserted, {} duplicates, {} drifted",
            instrument, total, saved.inserted, saved.duplicates, saved.drifted
        );
        self.board.update(
            instrument,
            SyncStatus::Completed,
            format!("Synced {} chunks, {} new candles", total, saved.inserted),
        );
        self.store
            .log_audit(operations::SYNC_INSTRUMENT, &details, AuditStatus::Completed)
            .await;

        info!(
            chunks = total,
            inserted = saved.inserted,
            duplicates = saved.duplicates,
            drifted = saved.drifted,
            "동기화 완료"
        );
        SyncOutcome::Completed {
            chunks: total,
            saved,
        }
    }

    /// 청크 하나: 조회 → 검증 → 변환 → 저장
    async fn sync_chunk(
        &self,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<ChunkResult> {
        let raw = self
            .source
            .fetch_candles(
                instrument,
                start,
                end,
                self.config.granularity,
                self.config.price_mode,
            )
            .await?;

        if raw.is_empty() {
            debug!(from = %start, to = %end, "빈 청크, 다음 청크로 진행");
            return Ok(ChunkResult::default());
        }

        self.validator.validate(&raw)?;
        for gap in self.validator.check_timestamps(&raw)? {
            warn!(
                after = %gap.after,
                before = %gap.before,
                missing_bars = gap.missing_bars,
                "설명되지 않는 공백"
            );
        }

        let candles = raw
            .iter()
            .filter(|c| self.config.include_incomplete || c.complete == Some(true))
            .map(|c| Candle::from_raw(instrument, c))
            .collect::<SyncResult<Vec<_>>>()?;

        let dropped = raw.len() - candles.len();
        if dropped > 0 {
            debug!(dropped = dropped, "미완성 봉 제외");
        }
        if candles.is_empty() {
            return Ok(ChunkResult::default());
        }

        let saved = self.store.save_candles(&candles).await?;
        debug!(
            fetched = raw.len(),
            inserted = saved.inserted,
            duplicates = saved.duplicates,
            "청크 저장"
        );

        Ok(ChunkResult {
            saved,
            latest: candles.last().map(|c| c.timestamp),
        })
    }

    async fn fail(&self, instrument: &Instrument, err: SyncError) -> SyncOutcome {
        match err {
            SyncError::RateLimitExceeded(message) => {
                warn!(error = %message, "요청 한도 초과, 다음 틱에 재시도");
                self.board.update(
                    instrument,
                    SyncStatus::Failed,
                    format!("Rate limited: {}", message),
                );
                self.store
                    .log_audit(
                        operations::SYNC_INSTRUMENT,
                        &format!("{}: rate limited: {}", instrument, message),
                        AuditStatus::RateLimited,
                    )
                    .await;
                SyncOutcome::RateLimited { message }
            }
            other => {
                let message = other.to_string();
                if other.is_retryable() {
                    warn!(kind = other.kind(), error = %message, "동기화 실패, 다음 틱에 재시도");
                } else {
                    error!(kind = other.kind(), error = %message, "동기화 실패");
                }
                self.board
                    .update(instrument, SyncStatus::Failed, message.clone());
                self.store
                    .log_audit(
                        operations::SYNC_INSTRUMENT,
                        &format!("{}: {}", instrument, message),
                        AuditStatus::Failed,
                    )
                    .await;
                SyncOutcome::Failed {
                    kind: other.kind(),
                    message,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_eligibility() {
        let interval = Duration::hours(1);

        // 2024-01-02는 화요일
        assert_eq!(
            eligibility(at(2, 9, 0), at(2, 10, 0), interval),
            Eligibility::Eligible
        );
        assert_eq!(
            eligibility(at(2, 9, 30), at(2, 10, 0), interval),
            Eligibility::Ineligible(SkipReason::NotDue { elapsed_secs: 1800 })
        );
        // 2024-01-06은 토요일
        assert_eq!(
            eligibility(at(5, 0, 0), at(6, 12, 0), interval),
            Eligibility::Ineligible(SkipReason::Weekend)
        );
    }

    #[test]
    fn test_compute_range_floors_to_hour() {
        let (start, end) = compute_range(at(2, 9, 47), at(2, 12, 5)).unwrap();
        assert_eq!(start, at(2, 9, 0));
        assert_eq!(end, at(2, 12, 5));
    }

    #[test]
    fn test_compute_range_empty() {
        assert_eq!(compute_range(at(2, 10, 0), at(2, 10, 0)), None);
        assert_eq!(compute_range(at(2, 11, 0), at(2, 10, 0)), None);
    }

    #[test]
    fn test_single_chunk_when_within_cap() {
        let chunks = plan_chunks(at(1, 0, 0), at(1, 3, 0), Granularity::S10, 5000);
        assert_eq!(chunks, vec![(at(1, 0, 0), at(1, 3, 0))]);
    }

    #[test]
    fn test_chunks_are_contiguous_and_ordered() {
        // M1 × 60 = 1시간 청크
        let chunks = plan_chunks(at(2, 0, 0), at(2, 2, 30), Granularity::M1, 60);
        assert_eq!(
            chunks,
            vec![
                (at(2, 0, 0), at(2, 1, 0)),
                (at(2, 1, 0), at(2, 2, 0)),
                (at(2, 2, 0), at(2, 2, 30)),
            ]
        );
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn test_no_chunks_for_empty_range() {
        assert!(plan_chunks(at(2, 1, 0), at(2, 1, 0), Granularity::S10, 5000).is_empty());
    }

    #[test]
    fn test_outcome_status() {
        assert_eq!(
            SyncOutcome::RateLimited {
                message: "429".into()
            }
            .status(),
            SyncStatus::Failed
        );
        assert!(SyncOutcome::Completed {
            chunks: 0,
            saved: SaveOutcome::default()
        }
        .is_completed());
    }
}
