//! SQLite 캔들 저장소 동작 테스트.

use chrono::{DateTime, Duration, TimeZone, Utc};
use fxsync_core::{AuditStatus, Candle, Instrument};
use fxsync_data::{CandleRepository, CandleStore, SaveOutcome, StoreConfig};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn eur_usd() -> Instrument {
    "EUR_USD".parse().unwrap()
}

fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, hour, minute, second).unwrap()
}

fn candle(instrument: &Instrument, ts: DateTime<Utc>, close: Decimal) -> Candle {
    Candle {
        instrument: instrument.clone(),
        timestamp: ts,
        open: dec!(1.1000),
        high: dec!(1.1050),
        low: dec!(1.0950),
        close,
        volume: 25,
        complete: true,
        spread: None,
    }
}

fn batch(instrument: &Instrument, n: u32) -> Vec<Candle> {
    (0..n)
        .map(|i| candle(instrument, at(10, 0, 0) + Duration::seconds(10 * i64::from(i)), dec!(1.1010)))
        .collect()
}

#[tokio::test]
async fn test_save_is_idempotent() {
    let store = CandleStore::in_memory(24).await.unwrap();
    let instrument = eur_usd();
    let candles = batch(&instrument, 5);

    let first = store.save_candles(&candles).await.unwrap();
    assert_eq!(
        first,
        SaveOutcome {
            inserted: 5,
            duplicates: 0,
            drifted: 0
        }
    );

    let second = store.save_candles(&candles).await.unwrap();
    assert_eq!(
        second,
        SaveOutcome {
            inserted: 0,
            duplicates: 5,
            drifted: 0
        }
    );
    assert_eq!(store.count_candles(&instrument).await.unwrap(), 5);
}

#[tokio::test]
async fn test_differing_duplicate_is_counted_not_overwritten() {
    let store = CandleStore::in_memory(24).await.unwrap();
    let instrument = eur_usd();
    let original = candle(&instrument, at(10, 0, 0), dec!(1.1010));
    store.save_candles(&[original.clone()]).await.unwrap();

    let revised = candle(&instrument, at(10, 0, 0), dec!(1.1020));
    let outcome = store.save_candles(&[revised]).await.unwrap();
    assert_eq!(outcome.duplicates, 1);
    assert_eq!(outcome.drifted, 1);

    let stored = store
        .candles_between(&instrument, at(10, 0, 0), at(10, 0, 0))
        .await
        .unwrap();
    assert_eq!(stored, vec![original]);
}

#[tokio::test]
async fn test_failed_batch_leaves_store_unchanged() {
    let store = CandleStore::in_memory(24).await.unwrap();
    let instrument = eur_usd();
    store.save_candles(&batch(&instrument, 2)).await.unwrap();

    let mut bad = vec![
        candle(&instrument, at(11, 0, 0), dec!(1.1010)),
        candle(&instrument, at(11, 0, 10), dec!(1.1010)),
    ];
    bad[1].volume = -1;

    assert!(store.save_candles(&bad).await.is_err());
    assert_eq!(store.count_candles(&instrument).await.unwrap(), 2);
    assert!(store
        .candles_between(&instrument, at(11, 0, 0), at(11, 0, 0))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_last_timestamp_defaults_to_lookback() {
    let store = CandleStore::in_memory(24).await.unwrap();
    let now = at(12, 0, 0);

    let last = store.get_last_timestamp(&eur_usd(), now).await.unwrap();
    assert_eq!(last, now - Duration::hours(24));
}

#[tokio::test]
async fn test_last_timestamp_is_max_per_instrument() {
    let store = CandleStore::in_memory(24).await.unwrap();
    let eur = eur_usd();
    let gbp: Instrument = "GBP_USD".parse().unwrap();

    store.save_candles(&batch(&eur, 3)).await.unwrap();
    store
        .save_candles(&[candle(&gbp, at(11, 30, 0), dec!(1.2700))])
        .await
        .unwrap();

    let now = at(12, 0, 0);
    assert_eq!(
        store.get_last_timestamp(&eur, now).await.unwrap(),
        at(10, 0, 20)
    );
    assert_eq!(
        store.get_last_timestamp(&gbp, now).await.unwrap(),
        at(11, 30, 0)
    );
}

#[tokio::test]
async fn test_candles_between_is_ordered() {
    let store = CandleStore::in_memory(24).await.unwrap();
    let instrument = eur_usd();
    let mut candles = batch(&instrument, 4);
    candles.reverse();
    store.save_candles(&candles).await.unwrap();

    let loaded = store
        .candles_between(&instrument, at(10, 0, 10), at(10, 0, 30))
        .await
        .unwrap();
    let times: Vec<_> = loaded.iter().map(|c| c.timestamp).collect();
    assert_eq!(times, vec![at(10, 0, 10), at(10, 0, 20), at(10, 0, 30)]);
}

#[tokio::test]
async fn test_audit_log_is_append_only() {
    let store = CandleStore::in_memory(24).await.unwrap();

    store
        .log_audit("sync_instrument", "EUR_USD: 3 chunks", AuditStatus::Completed)
        .await;
    store
        .log_audit("sync_instrument", "GBP_USD: rate limited", AuditStatus::RateLimited)
        .await;

    let records = store.recent_audit(10).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].details, "GBP_USD: rate limited");
    assert_eq!(records[0].status, "rate_limited");
    assert_eq!(records[1].status, "completed");
    assert!(records[0].id > records[1].id);

    assert_eq!(store.recent_audit(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_audit_failure_is_swallowed() {
    let store = CandleStore::in_memory(24).await.unwrap();
    sqlx::query("DROP TABLE audit_log")
        .execute(store.pool())
        .await
        .unwrap();

    store
        .log_audit("shutdown", "graceful", AuditStatus::Completed)
        .await;

    let instrument = eur_usd();
    store.save_candles(&batch(&instrument, 1)).await.unwrap();
    assert_eq!(store.count_candles(&instrument).await.unwrap(), 1);
}

#[tokio::test]
async fn test_file_store_persists_across_connections() {
    let dir = std::env::temp_dir().join(format!("fxsync-store-{}", std::process::id()));
    let config = StoreConfig {
        database_path: dir.join("nested").join("prices.db"),
        ..StoreConfig::default()
    };
    let instrument = eur_usd();

    {
        let store = CandleStore::connect(&config).await.unwrap();
        store.save_candles(&batch(&instrument, 3)).await.unwrap();
        store.pool().close().await;
    }

    let store = CandleStore::connect(&config).await.unwrap();
    assert_eq!(store.count_candles(&instrument).await.unwrap(), 3);
    store.pool().close().await;

    let _ = std::fs::remove_dir_all(&dir);
}
