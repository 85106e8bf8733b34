//! OANDA v20 REST 커넥터.
//!
//! 모든 요청은 공유 `RequestThrottle`을 거쳐 최소 간격을 지키고,
//! 재시도 가능한 실패는 `with_retry`의 지수 백오프로 반복합니다.
//!
//! # 응답 매핑
//!
//! | 응답 | 결과 |
//! |------|------|
//! | 429 / `TOO_MANY_REQUESTS` | `RateLimited` (재시도) |
//! | 404 / `INSTRUMENT_NOT_FOUND` / `PRICE_NOT_FOUND` | 빈 결과 |
//! | 401, 403 | `Unauthorized` |
//! | 5xx | `ServerError` (재시도) |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxsync_core::{format_timestamp, parse_timestamp, Granularity, Instrument, PriceMode, RawCandle};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::retry::{with_retry, RetryConfig};
use crate::throttle::RequestThrottle;
use crate::traits::{CandleSource, ExchangeResult};
use crate::ExchangeError;

/// 모의투자 REST 엔드포인트.
pub const PRACTICE_URL: &str = "https://api-fxpractice.oanda.com";
/// 실거래 REST 엔드포인트.
pub const LIVE_URL: &str = "https://api-fxtrade.oanda.com";

/// 토큰 최소 길이.
const MIN_TOKEN_LEN: usize = 10;

/// 요청당 최대 캔들 수.
pub const DEFAULT_PAGE_SIZE: u32 = 5000;

/// "없음"으로 처리하는 OANDA 에러 코드.
const NOT_FOUND_CODES: [&str; 2] = ["INSTRUMENT_NOT_FOUND", "PRICE_NOT_FOUND"];

/// 거래 환경.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    /// 모의투자
    #[default]
    Practice,
    /// 실거래
    Live,
}

impl Environment {
    /// REST 기본 URL.
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Practice => PRACTICE_URL,
            Environment::Live => LIVE_URL,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Practice => write!(f, "practice"),
            Environment::Live => write!(f, "live"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "practice" | "demo" | "sandbox" => Ok(Environment::Practice),
            "live" | "trade" => Ok(Environment::Live),
            other => Err(format!("알 수 없는 환경: {}", other)),
        }
    }
}

/// OANDA 클라이언트 설정.
#[derive(Clone)]
pub struct OandaConfig {
    /// API 토큰
    pub api_token: SecretString,
    /// 계좌 ID
    pub account_id: String,
    /// 거래 환경
    pub environment: Environment,
    /// 기본 URL 대체 (테스트용)
    pub base_url_override: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 요청 간 최소 간격
    pub min_request_interval: Duration,
    /// 재시도 설정
    pub retry: RetryConfig,
    /// 요청당 최대 캔들 수
    pub page_size: u32,
}

impl fmt::Debug for OandaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = self.api_token.expose_secret();
        let chars: Vec<char> = token.chars().collect();
        let masked_token = if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("OandaConfig")
            .field("api_token", &masked_token)
            .field("account_id", &self.account_id)
            .field("environment", &self.environment)
            .field("base_url_override", &self.base_url_override)
            .field("timeout_secs", &self.timeout_secs)
            .field("min_request_interval", &self.min_request_interval)
            .field("retry", &self.retry)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl OandaConfig {
    /// 새 설정 생성.
    pub fn new(api_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            api_token: SecretString::new(api_token.into().into_boxed_str()),
            account_id: account_id.into(),
            environment: Environment::Practice,
            base_url_override: None,
            timeout_secs: 30,
            min_request_interval: Duration::from_millis(100),
            retry: RetryConfig::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// 거래 환경 설정.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// 기본 URL 대체.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url_override = Some(url.into());
        self
    }

    /// 재시도 설정.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 요청 간 최소 간격 설정.
    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    /// 요청당 최대 캔들 수 설정.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// 요청 타임아웃 설정.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// 실제 사용할 기본 URL.
    pub fn base_url(&self) -> &str {
        self.base_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }
}

/// 계좌 요약 (시작 시 확인용).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccountSummary {
    /// 계좌 ID
    pub id: String,
    /// 계좌 별칭
    pub alias: Option<String>,
    /// 기준 통화
    pub currency: Option<String>,
    /// 잔고
    pub balance: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountSummaryResponse {
    account: Option<AccountSummary>,
}

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Option<Vec<OandaCandle>>,
}

#[derive(Debug, Deserialize)]
struct OandaCandle {
    time: Option<String>,
    volume: Option<i64>,
    complete: Option<bool>,
    mid: Option<OandaPrice>,
    bid: Option<OandaPrice>,
    ask: Option<OandaPrice>,
}

#[derive(Debug, Deserialize)]
struct OandaPrice {
    o: Option<String>,
    h: Option<String>,
    l: Option<String>,
    c: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OandaErrorBody {
    error_code: Option<String>,
    error_message: Option<String>,
}

/// OANDA v20 REST 클라이언트.
#[derive(Debug)]
pub struct OandaClient {
    config: OandaConfig,
    client: Client,
    throttle: RequestThrottle,
}

impl OandaClient {
    /// 새 클라이언트 생성.
    ///
    /// 토큰 형식을 먼저 확인하므로 잘못된 토큰으로는 어떤 요청도 보내지 않습니다.
    pub fn new(config: OandaConfig) -> ExchangeResult<Self> {
        Self::validate_credentials(config.api_token.expose_secret())?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e))
            })?;

        let throttle = RequestThrottle::new(config.min_request_interval);

        Ok(Self {
            config,
            client,
            throttle,
        })
    }

    /// 토큰 형식 확인 (비어 있지 않고 최소 길이 이상).
    pub fn validate_credentials(token: &str) -> ExchangeResult<()> {
        if token.trim().is_empty() {
            return Err(ExchangeError::InvalidCredentials(
                "API 토큰이 비어 있습니다".to_string(),
            ));
        }
        if token.len() < MIN_TOKEN_LEN {
            return Err(ExchangeError::InvalidCredentials(format!(
                "API 토큰이 너무 짧습니다 (최소 {}자)",
                MIN_TOKEN_LEN
            )));
        }
        Ok(())
    }

    /// 설정 반환.
    pub fn config(&self) -> &OandaConfig {
        &self.config
    }

    /// 공유 요청 페이싱 반환.
    pub fn throttle(&self) -> &RequestThrottle {
        &self.throttle
    }

    /// 계좌 요약을 조회하여 계좌 ID와 토큰이 유효한지 확인합니다.
    pub async fn verify_account(&self) -> ExchangeResult<AccountSummary> {
        let path = format!("/v3/accounts/{}/summary", self.config.account_id);
        let response: AccountSummaryResponse = self.get_json("verify_account", &path, &[]).await?;

        let account = response.account.ok_or_else(|| {
            ExchangeError::DataIntegrity("계좌 응답에 account 필드가 없습니다".to_string())
        })?;

        info!(
            account_id = %account.id,
            currency = account.currency.as_deref().unwrap_or("-"),
            environment = %self.config.environment,
            "계좌 확인 완료"
        );
        Ok(account)
    }

    /// 페이싱과 재시도를 거쳐 GET 요청을 보냅니다.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> ExchangeResult<T> {
        with_retry(&self.config.retry, operation, move || {
            self.throttle.run(self.request_once(path, query))
        })
        .await
    }

    /// 단일 HTTP 시도.
    async fn request_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.base_url(), path);
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(self.config.api_token.expose_secret())
            .header("Accept-Datetime-Format", "RFC3339")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                warn!(error = %e, "응답 파싱 실패");
                ExchangeError::ParseError(e.to_string())
            })
        } else {
            Err(Self::map_error(status, &body))
        }
    }

    /// HTTP 상태와 에러 본문을 `ExchangeError`로 매핑.
    fn map_error(status: StatusCode, body: &str) -> ExchangeError {
        let error: OandaErrorBody = serde_json::from_str(body).unwrap_or_default();
        let code = error.error_code.unwrap_or_default();
        let message = error.error_message.unwrap_or_else(|| body.to_string());

        if status == StatusCode::TOO_MANY_REQUESTS || code == "TOO_MANY_REQUESTS" {
            return ExchangeError::RateLimited;
        }
        if status == StatusCode::NOT_FOUND || NOT_FOUND_CODES.contains(&code.as_str()) {
            let detail = if code.is_empty() { message } else { code };
            return ExchangeError::NotFound(detail);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return ExchangeError::Unauthorized(message);
        }
        if status.is_server_error() {
            return ExchangeError::ServerError {
                status: status.as_u16(),
                message,
            };
        }
        ExchangeError::ApiError {
            status: status.as_u16(),
            message,
        }
    }
}

/// 응답 캔들 하나를 `RawCandle`로 변환.
///
/// 요청한 가격 블록이나 시각이 없으면 응답 형식 오류입니다.
/// 블록 안의 개별 값이 비어 있는 경우는 검증 단계에서 거릅니다.
fn parse_candle(candle: &OandaCandle, mode: PriceMode) -> ExchangeResult<RawCandle> {
    let time_str = candle
        .time
        .as_deref()
        .ok_or_else(|| ExchangeError::DataIntegrity("캔들에 time 필드가 없습니다".to_string()))?;
    let time = parse_timestamp(time_str).ok_or_else(|| {
        ExchangeError::DataIntegrity(format!("잘못된 캔들 시각: {}", time_str))
    })?;

    let mid = required_block(candle.mid.as_ref(), mode.includes_mid(), "mid", time)?;
    let bid = required_block(candle.bid.as_ref(), mode.includes_bid(), "bid", time)?;
    let ask = required_block(candle.ask.as_ref(), mode.includes_ask(), "ask", time)?;

    let ohlc = mid.or(bid).or(ask).ok_or_else(|| {
        ExchangeError::DataIntegrity(format!("{}: 가격 블록이 없습니다", time))
    })?;

    let spread = match (bid, ask) {
        (Some(bid), Some(ask)) if mode.has_spread() => {
            match (parse_price(bid.c.as_deref())?, parse_price(ask.c.as_deref())?) {
                (Some(b), Some(a)) => Some(a - b),
                _ => None,
            }
        }
        _ => None,
    };

    Ok(RawCandle {
        time,
        open: parse_price(ohlc.o.as_deref())?,
        high: parse_price(ohlc.h.as_deref())?,
        low: parse_price(ohlc.l.as_deref())?,
        close: parse_price(ohlc.c.as_deref())?,
        volume: candle.volume,
        complete: candle.complete,
        spread,
    })
}

fn required_block<'a>(
    block: Option<&'a OandaPrice>,
    requested: bool,
    name: &str,
    time: DateTime<Utc>,
) -> ExchangeResult<Option<&'a OandaPrice>> {
    match (requested, block) {
        (false, _) => Ok(None),
        (true, Some(block)) => Ok(Some(block)),
        (true, None) => Err(ExchangeError::DataIntegrity(format!(
            "{}: {} 가격 블록이 없습니다",
            time, name
        ))),
    }
}

fn parse_price(value: Option<&str>) -> ExchangeResult<Option<Decimal>> {
    value
        .map(|s| {
            Decimal::from_str(s)
                .map_err(|e| ExchangeError::DataIntegrity(format!("잘못된 가격 '{}': {}", s, e)))
        })
        .transpose()
}

#[async_trait]
impl CandleSource for OandaClient {
    fn name(&self) -> &str {
        "oanda"
    }

    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
        price_mode: PriceMode,
    ) -> ExchangeResult<Vec<RawCandle>> {
        if start >= end {
            debug!(instrument = %instrument, "빈 구간, 요청 생략");
            return Ok(Vec::new());
        }

        let path = format!("/v3/instruments/{}/candles", instrument);
        let query = [
            ("granularity", granularity.code().to_string()),
            ("from", format_timestamp(start)),
            ("to", format_timestamp(end)),
            ("price", price_mode.code().to_string()),
            ("alignmentTimezone", "UTC".to_string()),
            // 일봉을 UTC 자정에 정렬 (기본값 17시)
            ("dailyAlignment", "0".to_string()),
            ("count", self.config.page_size.to_string()),
        ];

        debug!(
            instrument = %instrument,
            from = %format_timestamp(start),
            to = %format_timestamp(end),
            granularity = %granularity,
            "캔들 요청"
        );

        let response: CandlesResponse = match self.get_json("fetch_candles", &path, &query).await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                warn!(instrument = %instrument, error = %e, "데이터 없음, 빈 결과로 처리");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let candles = response.candles.ok_or_else(|| {
            ExchangeError::DataIntegrity(format!("{}: 응답에 candles 필드가 없습니다", instrument))
        })?;

        let parsed = candles
            .iter()
            .map(|c| parse_candle(c, price_mode))
            .collect::<ExchangeResult<Vec<_>>>()?;

        debug!(instrument = %instrument, count = parsed.len(), "캔들 수신");
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle_json(json: &str) -> OandaCandle {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("practice".parse::<Environment>().unwrap(), Environment::Practice);
        assert_eq!("LIVE".parse::<Environment>().unwrap(), Environment::Live);
        assert!("paper".parse::<Environment>().is_err());
        assert_eq!(Environment::Live.base_url(), LIVE_URL);
    }

    #[test]
    fn test_config_debug_masks_token() {
        let config = OandaConfig::new("abcd-secret-token-wxyz", "101-001-1");
        let debug = format!("{:?}", config);
        assert!(debug.contains("abcd...wxyz"));
        assert!(!debug.contains("secret"));

        // 잘라내는 위치에 멀티바이트 문자가 있어도 문자 단위로 가림
        let config = OandaConfig::new("토큰abcd-secret-wxyz키값", "101-001-1");
        let debug = format!("{:?}", config);
        assert!(debug.contains("토큰ab...yz키값"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_base_url_override() {
        let config = OandaConfig::new("0123456789abcdef", "101")
            .with_environment(Environment::Live)
            .with_base_url("http://127.0.0.1:1234");
        assert_eq!(config.base_url(), "http://127.0.0.1:1234");
    }

    #[test]
    fn test_validate_credentials() {
        assert!(OandaClient::validate_credentials("").is_err());
        assert!(OandaClient::validate_credentials("short").is_err());
        assert!(OandaClient::validate_credentials("0123456789").is_ok());
    }

    #[test]
    fn test_parse_candle_mid_with_spread() {
        let candle = candle_json(
            r#"{
                "time": "2024-01-02T10:00:00.000000000Z",
                "volume": 12,
                "complete": true,
                "mid": {"o": "1.10000", "h": "1.10050", "l": "1.09950", "c": "1.10020"},
                "bid": {"o": "1.09990", "h": "1.10040", "l": "1.09940", "c": "1.10010"},
                "ask": {"o": "1.10010", "h": "1.10060", "l": "1.09960", "c": "1.10030"}
            }"#,
        );

        let raw = parse_candle(&candle, PriceMode::MBA).unwrap();
        assert_eq!(raw.open, Some(dec!(1.10000)));
        assert_eq!(raw.close, Some(dec!(1.10020)));
        assert_eq!(raw.volume, Some(12));
        assert_eq!(raw.spread, Some(dec!(0.00020)));
    }

    #[test]
    fn test_parse_candle_bid_only() {
        let candle = candle_json(
            r#"{
                "time": "2024-01-02T10:00:00Z",
                "volume": 3,
                "complete": false,
                "bid": {"o": "150.1", "h": "150.3", "l": "150.0", "c": "150.2"}
            }"#,
        );

        let raw = parse_candle(&candle, PriceMode::B).unwrap();
        assert_eq!(raw.high, Some(dec!(150.3)));
        assert_eq!(raw.complete, Some(false));
        assert_eq!(raw.spread, None);
    }

    #[test]
    fn test_parse_candle_missing_block() {
        let candle = candle_json(r#"{"time": "2024-01-02T10:00:00Z", "volume": 1, "complete": true}"#);
        assert!(matches!(
            parse_candle(&candle, PriceMode::M),
            Err(ExchangeError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_parse_candle_null_field_kept_as_none() {
        let candle = candle_json(
            r#"{
                "time": "2024-01-02T10:00:00Z",
                "volume": null,
                "complete": true,
                "mid": {"o": "1.1", "h": null, "l": "1.0", "c": "1.05"}
            }"#,
        );

        let raw = parse_candle(&candle, PriceMode::M).unwrap();
        assert_eq!(raw.high, None);
        assert_eq!(raw.volume, None);
    }

    #[test]
    fn test_parse_candle_bad_price() {
        let candle = candle_json(
            r#"{
                "time": "2024-01-02T10:00:00Z",
                "volume": 1,
                "complete": true,
                "mid": {"o": "abc", "h": "1.1", "l": "1.0", "c": "1.05"}
            }"#,
        );
        assert!(matches!(
            parse_candle(&candle, PriceMode::M),
            Err(ExchangeError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_map_error() {
        assert!(matches!(
            OandaClient::map_error(StatusCode::TOO_MANY_REQUESTS, ""),
            ExchangeError::RateLimited
        ));
        assert!(matches!(
            OandaClient::map_error(
                StatusCode::BAD_REQUEST,
                r#"{"errorCode":"PRICE_NOT_FOUND","errorMessage":"no price"}"#
            ),
            ExchangeError::NotFound(code) if code == "PRICE_NOT_FOUND"
        ));
        assert!(matches!(
            OandaClient::map_error(StatusCode::UNAUTHORIZED, r#"{"errorMessage":"bad token"}"#),
            ExchangeError::Unauthorized(msg) if msg == "bad token"
        ));
        assert!(matches!(
            OandaClient::map_error(StatusCode::BAD_GATEWAY, "upstream"),
            ExchangeError::ServerError { status: 502, .. }
        ));
        assert!(matches!(
            OandaClient::map_error(StatusCode::BAD_REQUEST, r#"{"errorMessage":"bad"}"#),
            ExchangeError::ApiError { status: 400, .. }
        ));
    }
}
