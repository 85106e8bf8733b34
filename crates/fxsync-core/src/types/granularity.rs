//! 캔들 간격(granularity) 정의.
//!
//! OANDA v20 코드(`S10`, `M1`, `H1`, `D` 등)를 그대로 사용합니다.
//! 길이가 고정된 간격만 지원하므로 주봉/월봉은 없습니다.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 캔들 간격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    /// 5초봉
    S5,
    /// 10초봉
    S10,
    /// 15초봉
    S15,
    /// 30초봉
    S30,
    /// 1분봉
    M1,
    /// 2분봉
    M2,
    /// 4분봉
    M4,
    /// 5분봉
    M5,
    /// 10분봉
    M10,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 2시간봉
    H2,
    /// 3시간봉
    H3,
    /// 4시간봉
    H4,
    /// 6시간봉
    H6,
    /// 8시간봉
    H8,
    /// 12시간봉
    H12,
    /// 일봉
    D,
}

impl Granularity {
    /// 모든 간격 (짧은 것부터).
    pub const ALL: [Granularity; 19] = [
        Granularity::S5,
        Granularity::S10,
        Granularity::S15,
        Granularity::S30,
        Granularity::M1,
        Granularity::M2,
        Granularity::M4,
        Granularity::M5,
        Granularity::M10,
        Granularity::M15,
        Granularity::M30,
        Granularity::H1,
        Granularity::H2,
        Granularity::H3,
        Granularity::H4,
        Granularity::H6,
        Granularity::H8,
        Granularity::H12,
        Granularity::D,
    ];

    /// 봉 하나의 길이(초).
    pub fn as_secs(&self) -> i64 {
        match self {
            Granularity::S5 => 5,
            Granularity::S10 => 10,
            Granularity::S15 => 15,
            Granularity::S30 => 30,
            Granularity::M1 => 60,
            Granularity::M2 => 2 * 60,
            Granularity::M4 => 4 * 60,
            Granularity::M5 => 5 * 60,
            Granularity::M10 => 10 * 60,
            Granularity::M15 => 15 * 60,
            Granularity::M30 => 30 * 60,
            Granularity::H1 => 60 * 60,
            Granularity::H2 => 2 * 60 * 60,
            Granularity::H3 => 3 * 60 * 60,
            Granularity::H4 => 4 * 60 * 60,
            Granularity::H6 => 6 * 60 * 60,
            Granularity::H8 => 8 * 60 * 60,
            Granularity::H12 => 12 * 60 * 60,
            Granularity::D => 24 * 60 * 60,
        }
    }

    /// 봉 하나의 길이.
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.as_secs())
    }

    /// OANDA API 코드.
    pub fn code(&self) -> &'static str {
        match self {
            Granularity::S5 => "S5",
            Granularity::S10 => "S10",
            Granularity::S15 => "S15",
            Granularity::S30 => "S30",
            Granularity::M1 => "M1",
            Granularity::M2 => "M2",
            Granularity::M4 => "M4",
            Granularity::M5 => "M5",
            Granularity::M10 => "M10",
            Granularity::M15 => "M15",
            Granularity::M30 => "M30",
            Granularity::H1 => "H1",
            Granularity::H2 => "H2",
            Granularity::H3 => "H3",
            Granularity::H4 => "H4",
            Granularity::H6 => "H6",
            Granularity::H8 => "H8",
            Granularity::H12 => "H12",
            Granularity::D => "D",
        }
    }

    /// 타임스탬프가 UTC 기준 봉 경계에 있는지 확인합니다.
    pub fn is_aligned(&self, ts: DateTime<Utc>) -> bool {
        ts.timestamp_subsec_nanos() == 0 && ts.timestamp().rem_euclid(self.as_secs()) == 0
    }

    /// `rows`개의 봉이 차지하는 시간 길이.
    pub fn span_of(&self, rows: u32) -> Duration {
        Duration::seconds(self.as_secs() * i64::from(rows))
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        Granularity::ALL
            .iter()
            .copied()
            .find(|g| g.code() == code)
            .ok_or_else(|| format!("Invalid granularity: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_granularity_secs() {
        assert_eq!(Granularity::S10.as_secs(), 10);
        assert_eq!(Granularity::M15.as_secs(), 900);
        assert_eq!(Granularity::H1.as_secs(), 3600);
        assert_eq!(Granularity::D.as_secs(), 86400);
    }

    #[test]
    fn test_granularity_parse() {
        assert_eq!("s10".parse::<Granularity>().unwrap(), Granularity::S10);
        assert_eq!("H4".parse::<Granularity>().unwrap(), Granularity::H4);
        assert_eq!("D".parse::<Granularity>().unwrap(), Granularity::D);
        assert!("W".parse::<Granularity>().is_err());
        for g in Granularity::ALL {
            assert_eq!(g.code().parse::<Granularity>().unwrap(), g);
        }
    }

    #[test]
    fn test_granularity_alignment() {
        let aligned = Utc.with_ymd_and_hms(2024, 1, 2, 10, 15, 30).unwrap();
        assert!(Granularity::S10.is_aligned(aligned));
        assert!(Granularity::S30.is_aligned(aligned));
        assert!(!Granularity::M1.is_aligned(aligned));

        // 일봉은 UTC 자정에 정렬 (요청 시 dailyAlignment=0)
        let midnight = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert!(Granularity::D.is_aligned(midnight));
        assert!(!Granularity::D.is_aligned(midnight + Duration::hours(17)));
    }

    #[test]
    fn test_granularity_span() {
        assert_eq!(Granularity::S10.span_of(5000), Duration::seconds(50_000));
        assert_eq!(Granularity::H1.span_of(24), Duration::days(1));
    }
}
