//! JSON-RPC client for the Barry pricing API
//!
//! One POST per operation against a single fixed endpoint, bearer-token
//! authenticated. Every request carries `id: 0`; the id is not used for
//! correlation. An empty `result` means different things per method: no
//! published prices for price queries, a rejected token for the
//! metering-point lookup.

use crate::error::{OerstedError, Result};
use crate::logging::get_logger;
use async_trait::async_trait;
use chrono::{DateTime, Days, DurationRound, SecondsFormat, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Upstream controller prefix shared by all RPC methods
const RPC_METHOD_PREFIX: &str = "co.getbarry.api.v1.OpenApiController.";

/// Currency label for Danish zones
const CURRENCY_DKK: &str = "kr./KWH";

/// Currency label for everything else
const CURRENCY_EUR: &str = "€/KWH";

/// A metering point discovered on the access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeteringPoint {
    /// Unique identifier of the meter/contract
    pub mpid: String,

    /// Display address shown during meter selection
    pub address: String,

    /// Price zone code of the meter
    pub price_code: String,
}

/// One hourly slot of a daily price curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: f64,
}

/// A single current-hour price with its display currency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub value: f64,
    pub currency: String,
}

/// Current-hour CO2 intensity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Co2Quote {
    pub value: f64,
    pub unit: String,
}

/// The pricing operations the sensor and setup flow depend on.
///
/// Seam for tests: the production implementation is [`PriceClient`].
#[async_trait]
pub trait PricingApi: Send + Sync {
    /// Lightweight credential check (discovery result is discarded)
    async fn verify_access_token(&self) -> Result<()>;

    /// All metering points on the token
    async fn metering_points(&self) -> Result<Vec<MeteringPoint>>;

    /// Spot price for the current hour in the given price zone
    async fn current_spot_price(&self, price_code: &str) -> Result<Option<PriceQuote>>;

    /// All-inclusive price for the current hour on the given meter
    async fn current_total_price(&self, mpid: &str) -> Result<Option<PriceQuote>>;

    /// CO2 intensity for the current hour in the given price zone
    async fn current_co2_intensity(&self, price_code: &str) -> Result<Option<Co2Quote>>;

    /// Hourly total prices for local "today" shifted by `day_offset` days
    async fn daily_prices(&self, mpid: &str, day_offset: i64) -> Result<Vec<PriceEntry>>;
}

/// HTTP client for the pricing API
pub struct PriceClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: String,
    display_tz: Tz,
    logger: crate::logging::StructuredLogger,
}

impl PriceClient {
    /// Create a new client with a bearer token and request timeout
    pub fn new(
        endpoint: &str,
        access_token: &str,
        timeout: std::time::Duration,
        display_tz: Tz,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            access_token: access_token.trim().to_string(),
            display_tz,
            logger: get_logger("client"),
        })
    }

    /// Perform one JSON-RPC call and normalize the `result` field.
    ///
    /// `None` means the API answered with a missing, null or empty result.
    async fn call(&self, method: &str, params: Value) -> Result<Option<Value>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": format!("{}{}", RPC_METHOD_PREFIX, method),
            "params": params,
        });

        self.logger.debug(&format!("Calling {}", method));

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OerstedError::api(format!(
                "{} failed with HTTP {}",
                method, status
            )));
        }

        let payload: RpcResponse = response.json().await?;
        if let Some(err) = payload.error {
            return Err(OerstedError::api(format!(
                "{} failed: {} (code {})",
                method, err.message, err.code
            )));
        }

        Ok(normalize_result(payload.result))
    }

    /// Current-hour query window: previous rounded hour to rounded now
    fn current_hour_window(&self) -> Result<(String, String)> {
        let now = Utc::now();
        let end = round_to_hour(now)?;
        let start = round_to_hour(now - TimeDelta::hours(1))?;
        Ok((rpc_timestamp(start), rpc_timestamp(end)))
    }
}

#[async_trait]
impl PricingApi for PriceClient {
    async fn verify_access_token(&self) -> Result<()> {
        match self.call("getMeteringPoints", json!([])).await? {
            Some(_) => Ok(()),
            None => Err(OerstedError::auth("Invalid access token")),
        }
    }

    async fn metering_points(&self) -> Result<Vec<MeteringPoint>> {
        match self.call("getMeteringPoints", json!([])).await? {
            Some(result) => parse_metering_points(&result),
            None => Err(OerstedError::auth("Invalid access token")),
        }
    }

    async fn current_spot_price(&self, price_code: &str) -> Result<Option<PriceQuote>> {
        let (start, end) = self.current_hour_window()?;
        let result = self
            .call("getPrice", json!([price_code, start, end]))
            .await?;

        match result.as_ref().and_then(first_element) {
            Some(entry) => Ok(Some(parse_quote(entry)?)),
            None => {
                self.logger.debug("No spot price for current hour");
                Ok(None)
            }
        }
    }

    async fn current_total_price(&self, mpid: &str) -> Result<Option<PriceQuote>> {
        let (start, end) = self.current_hour_window()?;
        let result = self
            .call("getTotalKwHPrice", json!([mpid, start, end]))
            .await?;

        // This method answers with a bare object rather than an hourly array
        match result.as_ref().and_then(first_element) {
            Some(entry) => Ok(Some(parse_quote(entry)?)),
            None => {
                self.logger.debug("No total price for current hour");
                Ok(None)
            }
        }
    }

    async fn current_co2_intensity(&self, price_code: &str) -> Result<Option<Co2Quote>> {
        let (start, end) = self.current_hour_window()?;
        // The CO2 endpoint keys on the bare zone segment, not the full code
        let zone = strip_price_code(price_code);
        let result = self
            .call("getHourlyCo2Intensity", json!([zone, start, end]))
            .await?;

        match result.as_ref().and_then(first_element) {
            Some(entry) => {
                let value = entry
                    .get("carbonIntensity")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| OerstedError::api("CO2 entry missing carbonIntensity"))?;
                Ok(Some(Co2Quote {
                    value,
                    unit: "gCO2/kWh".to_string(),
                }))
            }
            None => Ok(None),
        }
    }

    async fn daily_prices(&self, mpid: &str, day_offset: i64) -> Result<Vec<PriceEntry>> {
        let now = Utc::now();
        let start = local_midnight_utc(now, self.display_tz, day_offset)?;
        let end = local_midnight_utc(now, self.display_tz, day_offset + 1)?;
        let result = self
            .call(
                "getTotalKwHourlyPrice",
                json!([mpid, rpc_timestamp(start), rpc_timestamp(end)]),
            )
            .await?;

        match result {
            Some(value) => {
                let entries: Vec<PriceEntry> = serde_json::from_value(value)?;
                Ok(entries)
            }
            None => Err(OerstedError::no_data(format!(
                "No hourly prices for day offset {}",
                day_offset
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Treat null and empty-array results as absent
fn normalize_result(result: Option<Value>) -> Option<Value> {
    match result {
        None | Some(Value::Null) => None,
        Some(Value::Array(a)) if a.is_empty() => None,
        other => other,
    }
}

/// First element of an array result, or the value itself for object results
fn first_element(result: &Value) -> Option<&Value> {
    match result {
        Value::Array(a) => a.first(),
        other => Some(other),
    }
}

/// Round a UTC time to the nearest hour: down for minute < 30, up otherwise.
/// Seconds and sub-second fields are always zeroed.
pub fn round_to_hour(t: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let truncated = t.duration_trunc(TimeDelta::hours(1))?;
    Ok(truncated + TimeDelta::hours(i64::from(t.minute() / 30)))
}

/// Format a timestamp the way the RPC endpoint expects it
fn rpc_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Midnight of local "today" shifted by `day_offset` days, expressed in UTC.
/// DST gaps fall forward to the earliest valid local instant.
pub fn local_midnight_utc(now: DateTime<Utc>, tz: Tz, day_offset: i64) -> Result<DateTime<Utc>> {
    let today = now.with_timezone(&tz).date_naive();
    let date = if day_offset >= 0 {
        today.checked_add_days(Days::new(day_offset.unsigned_abs()))
    } else {
        today.checked_sub_days(Days::new(day_offset.unsigned_abs()))
    }
    .ok_or_else(|| OerstedError::validation("day_offset", "date out of range"))?;

    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| OerstedError::validation("day_offset", "invalid midnight"))?;
    let local = midnight
        .and_local_timezone(tz)
        .earliest()
        .ok_or_else(|| OerstedError::validation("day_offset", "midnight not representable"))?;
    Ok(local.with_timezone(&Utc))
}

/// Resolve the display currency from a price result: Danish zones get the
/// DKK label, everything else the default euro label.
pub fn classify_currency(entry: &Value) -> &'static str {
    let country = entry.get("country").and_then(Value::as_str);
    let currency = entry.get("currency").and_then(Value::as_str);
    if country == Some("DK") || currency == Some("DKK") {
        CURRENCY_DKK
    } else {
        CURRENCY_EUR
    }
}

/// Zone segment after the last underscore of a full price code
fn strip_price_code(price_code: &str) -> &str {
    price_code.rsplit('_').next().unwrap_or(price_code)
}

fn parse_quote(entry: &Value) -> Result<PriceQuote> {
    let value = entry
        .get("value")
        .and_then(Value::as_f64)
        .ok_or_else(|| OerstedError::api("Price entry missing value"))?;
    Ok(PriceQuote {
        value,
        currency: classify_currency(entry).to_string(),
    })
}

fn parse_metering_points(result: &Value) -> Result<Vec<MeteringPoint>> {
    let entries = result
        .as_array()
        .ok_or_else(|| OerstedError::api("Metering point result is not an array"))?;

    let mut points = Vec::with_capacity(entries.len());
    for entry in entries {
        let mpid = entry
            .get("mpid")
            .and_then(Value::as_str)
            .ok_or_else(|| OerstedError::api("Metering point missing mpid"))?;
        let address = entry
            .get("address")
            .and_then(|a| a.get("formattedAddress"))
            .and_then(Value::as_str)
            .ok_or_else(|| OerstedError::api("Metering point missing address"))?;
        let price_code = entry
            .get("priceCode")
            .and_then(Value::as_str)
            .ok_or_else(|| OerstedError::api("Metering point missing priceCode"))?;
        points.push(MeteringPoint {
            mpid: mpid.to_string(),
            address: address.to_string(),
            price_code: price_code.to_string(),
        });
    }
    Ok(points)
}
