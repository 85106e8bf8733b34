//! 환경변수 기반 설정 모듈.
//!
//! 시작 시 한 번 읽어 검증된 불변 구조체로 만듭니다. 형식이 잘못된 값은
//! 기본값으로 대체하지 않고 설정 에러로 처리합니다.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fxsync_core::{GapPolicy, Granularity, Instrument, PriceMode};
use fxsync_data::StoreConfig;
use fxsync_exchange::{Environment, OandaConfig, RetryConfig};

use crate::error::CollectorError;
use crate::Result;

/// 기본 동기화 대상 상품
pub const DEFAULT_INSTRUMENTS: &str = "EUR_USD,GBP_USD,USD_JPY,AUD_USD,USD_CAD";

/// OANDA 요청당 최대 캔들 수
pub const MAX_BATCH_SIZE: u32 = 5000;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// OANDA API 설정
    pub oanda: OandaConfig,
    /// 저장소 설정
    pub store: StoreConfig,
    /// 스케줄러 설정
    pub scheduler: SchedulerConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 스케줄러 설정
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 동기화 대상 상품
    pub instruments: Vec<Instrument>,
    /// 캔들 간격
    pub granularity: Granularity,
    /// 가격 구성 요소
    pub price_mode: PriceMode,
    /// 청크당 최대 캔들 수
    pub batch_size: u32,
    /// 마지막 커밋 이후 이 시간이 지나야 동기화
    pub sync_interval: chrono::Duration,
    /// 공백 허용 기준
    pub gap_policy: GapPolicy,
    /// 미완성 봉 저장 여부
    pub include_incomplete: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            instruments: Instrument::parse_list(DEFAULT_INSTRUMENTS).unwrap_or_default(),
            granularity: Granularity::S10,
            price_mode: PriceMode::MBA,
            batch_size: MAX_BATCH_SIZE,
            sync_interval: chrono::Duration::seconds(3600),
            gap_policy: GapPolicy::default(),
            include_incomplete: false,
        }
    }
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 동시 처리 상품 수
    pub max_workers: usize,
    /// 틱 주기
    pub tick_interval: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            tick_interval: Duration::from_secs(60),
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드 (`.env` 파일 포함)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 주어진 조회 함수로 설정을 만듭니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let api_token = env.required("OANDA_API_TOKEN")?;
        let account_id = env.required("OANDA_ACCOUNT_ID")?;
        let environment: Environment = env.parse_or("OANDA_ENVIRONMENT", Environment::Practice)?;

        let batch_size: u32 = env.parse_or("FXSYNC_BATCH_SIZE", MAX_BATCH_SIZE)?;
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(CollectorError::Config(format!(
                "FXSYNC_BATCH_SIZE는 1~{} 사이여야 합니다: {}",
                MAX_BATCH_SIZE, batch_size
            )));
        }

        let retry = RetryConfig {
            max_attempts: env.parse_or("FXSYNC_MAX_RETRIES", 5)?,
            max_elapsed: Duration::from_secs(env.parse_or("FXSYNC_MAX_RETRY_SECS", 300)?),
            initial_delay: Duration::from_millis(env.parse_or("FXSYNC_RETRY_INITIAL_MS", 1000)?),
            ..RetryConfig::default()
        };
        if retry.max_attempts == 0 {
            return Err(CollectorError::Config(
                "FXSYNC_MAX_RETRIES는 1 이상이어야 합니다".to_string(),
            ));
        }

        let oanda = OandaConfig::new(api_token, account_id)
            .with_environment(environment)
            .with_retry(retry)
            .with_min_request_interval(Duration::from_millis(
                env.parse_or("FXSYNC_RATE_LIMIT_DELAY_MS", 100)?,
            ))
            .with_timeout_secs(env.parse_or("FXSYNC_REQUEST_TIMEOUT_SECS", 30)?)
            .with_page_size(batch_size);

        let initial_lookback_hours: i64 = env.parse_or("FXSYNC_INITIAL_LOOKBACK_HOURS", 24)?;
        if initial_lookback_hours <= 0 {
            return Err(CollectorError::Config(
                "FXSYNC_INITIAL_LOOKBACK_HOURS는 0보다 커야 합니다".to_string(),
            ));
        }

        let store = StoreConfig {
            database_path: PathBuf::from(
                env.get("FXSYNC_DATABASE_PATH")
                    .unwrap_or_else(|| "data/fxsync.db".to_string()),
            ),
            initial_lookback_hours,
            ..StoreConfig::default()
        };

        let instruments = Instrument::parse_list(
            &env.get("FXSYNC_INSTRUMENTS")
                .unwrap_or_else(|| DEFAULT_INSTRUMENTS.to_string()),
        )
        .map_err(|e| CollectorError::Config(format!("FXSYNC_INSTRUMENTS: {}", e)))?;

        let sync_interval_secs: i64 = env.parse_or("FXSYNC_SYNC_INTERVAL_SECS", 3600)?;
        if sync_interval_secs <= 0 {
            return Err(CollectorError::Config(
                "FXSYNC_SYNC_INTERVAL_SECS는 0보다 커야 합니다".to_string(),
            ));
        }

        let scheduler = SchedulerConfig {
            instruments,
            granularity: env.parse_or("FXSYNC_GRANULARITY", Granularity::S10)?,
            price_mode: env.parse_or("FXSYNC_PRICE_MODE", PriceMode::MBA)?,
            batch_size,
            sync_interval: chrono::Duration::seconds(sync_interval_secs),
            gap_policy: GapPolicy {
                max_gap: chrono::Duration::minutes(env.parse_or("FXSYNC_MAX_GAP_MINUTES", 60)?),
                strict: env.bool_or("FXSYNC_STRICT_GAPS", false)?,
            },
            include_incomplete: env.bool_or("FXSYNC_INCLUDE_INCOMPLETE", false)?,
        };

        let max_workers: usize = env.parse_or("FXSYNC_MAX_WORKERS", 4)?;
        if max_workers == 0 {
            return Err(CollectorError::Config(
                "FXSYNC_MAX_WORKERS는 1 이상이어야 합니다".to_string(),
            ));
        }

        Ok(Self {
            oanda,
            store,
            scheduler,
            daemon: DaemonConfig {
                max_workers,
                ..DaemonConfig::default()
            },
        })
    }
}

/// 환경변수 조회 래퍼
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key).ok_or_else(|| {
            CollectorError::Config(format!("{} 환경변수가 설정되지 않았습니다", key))
        })
    }

    /// 값이 없으면 기본값, 있는데 파싱에 실패하면 에러
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| {
                CollectorError::Config(format!("{}={} 파싱 실패: {}", key, raw, e))
            }),
        }
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(|v| v.to_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(CollectorError::Config(format!(
                    "{}={} 는 true/false 값이어야 합니다",
                    key, v
                ))),
            },
        }
    }
}
