//! SQLite 캔들 저장소.
//!
//! # 스키마
//!
//! - `oanda_prices`: `(instrument, timestamp)` 기본 키, OHLCV + 스프레드 + 완성 여부 +
//!   내용 해시 + 생성 시각
//! - `audit_log`: 자동 증가 ID 기반 추가 전용 감사 로그
//!
//! 시각은 고정 폭 UTC 문자열(`YYYY-MM-DDTHH:MM:SSZ`)로 저장하여 문자열 정렬이
//! 시간 순서와 같도록 하고, 가격은 정확한 값을 유지하도록 decimal 문자열로 저장합니다.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxsync_core::{
    format_timestamp, parse_timestamp, AuditRecord, AuditStatus, Candle, Instrument,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{DataError, Result};
use crate::repository::{CandleRepository, SaveOutcome};

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS oanda_prices (
        instrument      TEXT    NOT NULL,
        timestamp       TEXT    NOT NULL,
        open            TEXT    NOT NULL,
        high            TEXT    NOT NULL,
        low             TEXT    NOT NULL,
        close           TEXT    NOT NULL,
        volume          INTEGER NOT NULL CHECK (volume >= 0),
        complete        BOOLEAN NOT NULL,
        spread          TEXT,
        validation_hash TEXT,
        created_at      TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
        PRIMARY KEY (instrument, timestamp)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_timestamp ON oanda_prices(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_instrument_time ON oanda_prices(instrument, timestamp)",
    r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        operation TEXT NOT NULL,
        details   TEXT,
        status    TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_audit_operation ON audit_log(operation)",
];

/// 저장소 설정.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite 파일 경로
    pub database_path: PathBuf,
    /// 풀의 최대 연결 수
    pub max_connections: u32,
    /// 잠금 대기 시간
    pub busy_timeout: Duration,
    /// 저장된 행이 없을 때 거슬러 올라갈 기간 (시간)
    pub initial_lookback_hours: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/fxsync.db"),
            max_connections: 5,
            busy_timeout: Duration::from_secs(30),
            initial_lookback_hours: 24,
        }
    }
}

/// 캔들 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
struct CandleRow {
    instrument: String,
    timestamp: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: i64,
    complete: bool,
    spread: Option<String>,
}

impl CandleRow {
    fn into_candle(self) -> Result<Candle> {
        let instrument: Instrument = self
            .instrument
            .parse()
            .map_err(|e: String| DataError::ParseError(e))?;
        let timestamp = parse_timestamp(&self.timestamp)
            .ok_or_else(|| DataError::ParseError(format!("timestamp '{}'", self.timestamp)))?;

        Ok(Candle {
            instrument,
            timestamp,
            open: parse_decimal(&self.open)?,
            high: parse_decimal(&self.high)?,
            low: parse_decimal(&self.low)?,
            close: parse_decimal(&self.close)?,
            volume: self.volume,
            complete: self.complete,
            spread: self.spread.as_deref().map(parse_decimal).transpose()?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct AuditRow {
    id: i64,
    timestamp: String,
    operation: String,
    details: Option<String>,
    status: Option<String>,
}

impl AuditRow {
    fn into_record(self) -> Result<AuditRecord> {
        let timestamp = parse_timestamp(&self.timestamp)
            .ok_or_else(|| DataError::ParseError(format!("timestamp '{}'", self.timestamp)))?;
        Ok(AuditRecord {
            id: self.id,
            timestamp,
            operation: self.operation,
            details: self.details.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
        })
    }
}

fn parse_decimal(value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| DataError::ParseError(format!("'{}': {}", value, e)))
}

/// SQLite 캔들 저장소.
#[derive(Clone)]
pub struct CandleStore {
    pool: SqlitePool,
    initial_lookback: chrono::Duration,
}

impl CandleStore {
    /// 파일 데이터베이스에 연결하고 스키마를 준비합니다.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        info!(path = %config.database_path.display(), "Connecting to database...");

        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DataError::ConnectionError(e.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        let store = Self::from_pool(pool, config.initial_lookback_hours);
        store.init_schema().await?;

        info!("Database connection established");
        Ok(store)
    }

    /// 메모리 데이터베이스 (테스트 및 임시 실행용).
    ///
    /// 연결이 닫히면 데이터가 사라지므로 단일 연결을 계속 유지합니다.
    pub async fn in_memory(initial_lookback_hours: i64) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        let store = Self::from_pool(pool, initial_lookback_hours);
        store.init_schema().await?;
        Ok(store)
    }

    /// 기존 풀로 생성 (스키마는 만들지 않음).
    pub fn from_pool(pool: SqlitePool, initial_lookback_hours: i64) -> Self {
        Self {
            pool,
            initial_lookback: chrono::Duration::hours(initial_lookback_hours),
        }
    }

    /// 연결 풀 참조.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 테이블과 인덱스를 생성합니다.
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DataError::SchemaError(e.to_string()))?;
        }
        debug!("schema ready");
        Ok(())
    }

    /// 연결 상태 확인.
    pub async fn health_check(&self) -> Result<bool> {
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(one == 1)
    }

    /// 저장된 캔들 중 가장 최근 시각.
    pub async fn last_stored_timestamp(
        &self,
        instrument: &Instrument,
    ) -> Result<Option<DateTime<Utc>>> {
        let last: Option<String> =
            sqlx::query_scalar("SELECT MAX(timestamp) FROM oanda_prices WHERE instrument = ?")
                .bind(instrument.as_str())
                .fetch_one(&self.pool)
                .await?;

        last.map(|s| {
            parse_timestamp(&s).ok_or_else(|| DataError::ParseError(format!("timestamp '{}'", s)))
        })
        .transpose()
    }

    /// 상품의 저장된 캔들 수.
    pub async fn count_candles(&self, instrument: &Instrument) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM oanda_prices WHERE instrument = ?")
                .bind(instrument.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// `[start, end]` 구간의 캔들 (시간 오름차순).
    pub async fn candles_between(
        &self,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let rows: Vec<CandleRow> = sqlx::query_as(
            r#"
            SELECT instrument, timestamp, open, high, low, close, volume, complete, spread
            FROM oanda_prices
            WHERE instrument = ? AND timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(instrument.as_str())
        .bind(format_timestamp(start))
        .bind(format_timestamp(end))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CandleRow::into_candle).collect()
    }

    /// 최근 감사 기록 (최신순).
    pub async fn recent_audit(&self, limit: u32) -> Result<Vec<AuditRecord>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, timestamp, operation, details, status
            FROM audit_log
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditRow::into_record).collect()
    }

    async fn insert_audit(&self, operation: &str, details: &str, status: AuditStatus) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_log (timestamp, operation, details, status) VALUES (?, ?, ?, ?)",
        )
        .bind(format_timestamp(Utc::now()))
        .bind(operation)
        .bind(details)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CandleRepository for CandleStore {
    async fn get_last_timestamp(
        &self,
        instrument: &Instrument,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        match self.last_stored_timestamp(instrument).await? {
            Some(last) => Ok(last),
            None => {
                let start = now - self.initial_lookback;
                debug!(instrument = %instrument, start = %start, "저장된 캔들 없음, 초기 조회 기간 사용");
                Ok(start)
            }
        }
    }

    #[instrument(skip(self, candles), fields(count = candles.len()))]
    async fn save_candles(&self, candles: &[Candle]) -> Result<SaveOutcome> {
        if candles.is_empty() {
            return Ok(SaveOutcome::default());
        }

        let mut outcome = SaveOutcome::default();
        let mut tx = self.pool.begin().await?;

        for candle in candles {
            let timestamp = candle.timestamp_key();
            let hash = candle.content_hash();

            let result = sqlx::query(
                r#"
                INSERT INTO oanda_prices
                    (instrument, timestamp, open, high, low, close, volume, complete, spread, validation_hash)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (instrument, timestamp) DO NOTHING
                "#,
            )
            .bind(candle.instrument.as_str())
            .bind(&timestamp)
            .bind(candle.open.to_string())
            .bind(candle.high.to_string())
            .bind(candle.low.to_string())
            .bind(candle.close.to_string())
            .bind(candle.volume)
            .bind(candle.complete)
            .bind(candle.spread.map(|s| s.to_string()))
            .bind(&hash)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                outcome.inserted += 1;
                continue;
            }

            outcome.duplicates += 1;
            let stored: Option<String> = sqlx::query_scalar(
                "SELECT validation_hash FROM oanda_prices WHERE instrument = ? AND timestamp = ?",
            )
            .bind(candle.instrument.as_str())
            .bind(&timestamp)
            .fetch_one(&mut *tx)
            .await?;

            if stored.as_deref() != Some(hash.as_str()) {
                outcome.drifted += 1;
                warn!(
                    instrument = %candle.instrument,
                    timestamp = %timestamp,
                    "저장된 캔들과 내용이 다름, 기존 행 유지"
                );
            }
        }

        tx.commit().await?;

        debug!(
            inserted = outcome.inserted,
            duplicates = outcome.duplicates,
            drifted = outcome.drifted,
            "캔들 배치 저장"
        );
        Ok(outcome)
    }

    async fn log_audit(&self, operation: &str, details: &str, status: AuditStatus) {
        if let Err(e) = self.insert_audit(operation, details, status).await {
            error!(operation = operation, error = %e, "감사 로그 기록 실패");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn candle(minute: u32, close: Decimal) -> Candle {
        Candle {
            instrument: "EUR_USD".parse().unwrap(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 10, minute, 0).unwrap(),
            open: dec!(1.1000),
            high: dec!(1.1010),
            low: dec!(1.0990),
            close,
            volume: 10,
            complete: true,
            spread: Some(dec!(0.0001)),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = CandleStore::in_memory(24).await.unwrap();
        let outcome = store.save_candles(&[]).await.unwrap();
        assert_eq!(outcome, SaveOutcome::default());
    }

    #[tokio::test]
    async fn test_roundtrip_keeps_exact_values() {
        let store = CandleStore::in_memory(24).await.unwrap();
        let original = candle(0, dec!(1.10005));
        store.save_candles(&[original.clone()]).await.unwrap();

        let loaded = store
            .candles_between(&original.instrument, original.timestamp, original.timestamp)
            .await
            .unwrap();
        assert_eq!(loaded, vec![original]);
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = CandleStore::in_memory(24).await.unwrap();
        assert!(store.health_check().await.unwrap());
    }
}
