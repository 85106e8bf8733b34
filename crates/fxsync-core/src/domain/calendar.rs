//! 외환 시장 휴장 달력.
//!
//! 주말(UTC 기준 토/일)을 휴장으로 봅니다.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};

/// UTC 기준 주말인지 확인합니다.
pub fn is_weekend(ts: DateTime<Utc>) -> bool {
    matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}

/// `[start, end]` 구간이 주말에 걸치는지 확인합니다.
///
/// 캔들 사이 공백이 휴장으로 설명되는지 판단할 때 사용합니다.
pub fn spans_weekend(start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    if end < start {
        return false;
    }
    let mut day = start.date_naive();
    let last = end.date_naive();
    while day <= last {
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            return true;
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    false
}

/// 정시로 내립니다 (분/초/나노초 제거).
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts - Duration::minutes(i64::from(ts.minute()))
        - Duration::seconds(i64::from(ts.second()))
        - Duration::nanoseconds(i64::from(ts.nanosecond()))
}
