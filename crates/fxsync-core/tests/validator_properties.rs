//! Property tests for the candle validator.

use chrono::{Duration, TimeZone, Utc};
use fxsync_core::{CandleValidator, Granularity, RawCandle, SyncError};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Builds a candle from integer pip values so every generated price is exact.
fn candle(open: i64, high: i64, low: i64, close: i64, volume: i64) -> RawCandle {
    RawCandle {
        time: Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap(),
        open: Some(Decimal::new(open, 5)),
        high: Some(Decimal::new(high, 5)),
        low: Some(Decimal::new(low, 5)),
        close: Some(Decimal::new(close, 5)),
        volume: Some(volume),
        complete: Some(true),
        spread: None,
    }
}

proptest! {
    #[test]
    fn well_formed_candle_always_passes(
        low in 50_000i64..200_000,
        range in 0i64..5_000,
        open_frac in 0u32..=100,
        close_frac in 0u32..=100,
        volume in 0i64..100_000,
    ) {
        let high = low + range;
        let open = low + range * i64::from(open_frac) / 100;
        let close = low + range * i64::from(close_frac) / 100;

        let validator = CandleValidator::new();
        prop_assert!(validator.validate(&[candle(open, high, low, close, volume)]).is_ok());
    }

    #[test]
    fn high_below_low_always_rejected(
        high in 50_000i64..200_000,
        below in 1i64..5_000,
        open in 0i64..300_000,
        close in 0i64..300_000,
    ) {
        let low = high + below;
        let result = CandleValidator::new().validate(&[candle(open, high, low, close, 1)]);
        prop_assert!(matches!(result, Err(SyncError::PriceIntegrity(_))));
    }

    #[test]
    fn strictly_increasing_aligned_series_passes(
        steps in proptest::collection::vec(1i64..6, 1..50),
    ) {
        let start = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let mut time = start;
        let mut batch = Vec::new();
        for step in steps {
            let mut c = candle(110_000, 110_100, 109_900, 110_050, 1);
            c.time = time;
            batch.push(c);
            time += Duration::seconds(10 * step);
        }

        let validator = CandleValidator::new().with_granularity(Granularity::S10);
        let gaps = validator.check_timestamps(&batch).unwrap();
        prop_assert!(gaps.is_empty());
    }
}

#[test]
fn all_null_candle_rejected() {
    let candle = RawCandle {
        time: Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap(),
        open: None,
        high: None,
        low: None,
        close: None,
        volume: None,
        complete: None,
        spread: None,
    };
    let result = CandleValidator::new().validate(&[candle]);
    assert!(matches!(result, Err(SyncError::DataValidation(_))));
}
