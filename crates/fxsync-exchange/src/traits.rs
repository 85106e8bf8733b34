//! 캔들 조회 trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxsync_core::{Granularity, Instrument, PriceMode, RawCandle};

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 캔들 데이터 소스.
///
/// 구현체는 요청 간격과 재시도를 스스로 처리해야 합니다.
/// "없음" 계열 응답은 에러가 아니라 빈 결과로 반환합니다.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// 소스 이름 반환.
    fn name(&self) -> &str;

    /// `[start, end]` 구간의 캔들을 조회합니다.
    ///
    /// 한 번의 호출은 페이지 크기 이하의 행만 반환하므로
    /// 긴 구간은 호출자가 나누어 요청해야 합니다.
    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
        price_mode: PriceMode,
    ) -> ExchangeResult<Vec<RawCandle>>;
}
