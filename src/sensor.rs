//! Price sensor entity adapter
//!
//! Maps client and aggregator output onto an observable entity: the current
//! total price is the primary state value, everything else (spot price, CO2
//! intensity, today/tomorrow curves, summary statistics) rides along as
//! attributes. All of it is ephemeral display state, rebuilt on every
//! refresh signal.

use crate::aggregate::{DailyCurve, PriceSummary, localize_and_sort};
use crate::client::PricingApi;
use crate::error::Result;
use crate::logging::get_logger;
use chrono_tz::Tz;
use serde_json::{Value, json};
use std::sync::Arc;

/// Price type segment of the sensor identity
const PRICE_TYPE: &str = "kWh";

/// State sentinel when no current price is available
const STATE_UNAVAILABLE: &str = "NA";

/// Derive the stable sensor identity from price type, zone code and meter id:
/// lower-cased, dots stripped, spaces collapsed to underscores. Unchanged
/// configuration yields the same id across restarts.
pub fn unique_id(price_code: &str, mpid: &str) -> String {
    format!("oersted_{}_{}_{}", PRICE_TYPE, price_code, mpid)
        .to_lowercase()
        .replace('.', "")
        .replace(' ', "_")
}

/// Sensor entity holding the latest published prices
pub struct PriceSensor {
    api: Arc<dyn PricingApi>,
    price_code: String,
    mpid: String,
    display_tz: Tz,

    current_total_price: Option<f64>,
    current_spot_price: Option<f64>,
    currency: Option<String>,
    co2_intensity: Option<f64>,
    today: Option<DailyCurve>,
    tomorrow: Option<DailyCurve>,
    summary: Option<PriceSummary>,

    logger: crate::logging::StructuredLogger,
}

impl PriceSensor {
    /// Create a sensor bound to one configured metering point
    pub fn new(api: Arc<dyn PricingApi>, price_code: &str, mpid: &str, display_tz: Tz) -> Self {
        let logger = get_logger("sensor");
        Self {
            api,
            price_code: price_code.to_string(),
            mpid: mpid.to_string(),
            display_tz,
            current_total_price: None,
            current_spot_price: None,
            currency: None,
            co2_intensity: None,
            today: None,
            tomorrow: None,
            summary: None,
            logger,
        }
    }

    /// Stable entity identity
    pub fn unique_id(&self) -> String {
        unique_id(&self.price_code, &self.mpid)
    }

    /// Primary observable state: current total price, or the NA sentinel
    pub fn state(&self) -> Value {
        match self.current_total_price {
            Some(v) => json!(v),
            None => json!(STATE_UNAVAILABLE),
        }
    }

    /// Display unit, known once a price has been fetched
    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    /// Secondary attributes for display
    pub fn attributes(&self) -> Value {
        json!({
            "current_total_price": self.current_total_price,
            "current_spot_price": self.current_spot_price,
            "currency": self.currency,
            "co2_intensity": self.co2_intensity,
            "raw_today": self.today.as_ref().map(|c| &c.raw),
            "raw_tomorrow": self.tomorrow.as_ref().map(|c| &c.raw),
            "today": self.today.as_ref().map(|c| &c.values),
            "tomorrow": self.tomorrow.as_ref().map(|c| &c.values),
            "average": self.summary.as_ref().map(|s| s.average),
            "min": self.summary.as_ref().map(|s| s.min),
            "max": self.summary.as_ref().map(|s| s.max),
            "peak": self.summary.as_ref().map(|s| s.peak),
            "off_peak_1": self.summary.as_ref().map(|s| s.off_peak_1),
            "off_peak_2": self.summary.as_ref().map(|s| s.off_peak_2),
        })
    }

    /// Full refresh on a "new data" signal: current prices first, then the
    /// daily curves. Current prices stay applied even when the daily fetch
    /// fails (tomorrow is routinely unpublished until the afternoon).
    pub async fn refresh(&mut self) -> Result<()> {
        self.refresh_current().await?;
        self.refresh_daily().await
    }

    /// Refresh current total and spot price plus CO2 intensity
    pub async fn refresh_current(&mut self) -> Result<()> {
        self.logger.debug("Refreshing current prices");

        let total = self.api.current_total_price(&self.mpid).await?;
        if let Some(ref quote) = total {
            self.currency = Some(quote.currency.clone());
        }
        self.current_total_price = total.map(|q| q.value);

        let spot = self.api.current_spot_price(&self.price_code).await?;
        if self.currency.is_none() {
            if let Some(ref quote) = spot {
                self.currency = Some(quote.currency.clone());
            }
        }
        self.current_spot_price = spot.map(|q| q.value);

        let co2 = self.api.current_co2_intensity(&self.price_code).await?;
        self.co2_intensity = co2.map(|q| q.value);

        self.logger.debug(&format!(
            "Current prices updated: total={:?} spot={:?}",
            self.current_total_price, self.current_spot_price
        ));
        Ok(())
    }

    /// Refresh today's and tomorrow's curves and the daily summary.
    /// Both days are fetched before anything is applied, so a missing
    /// tomorrow leaves yesterday's view intact until the next tick.
    pub async fn refresh_daily(&mut self) -> Result<()> {
        self.logger.debug("Refreshing daily price curves");

        let today_entries = self.api.daily_prices(&self.mpid, 0).await?;
        let tomorrow_entries = self.api.daily_prices(&self.mpid, 1).await?;

        let today = localize_and_sort(today_entries, self.display_tz);
        let tomorrow = localize_and_sort(tomorrow_entries, self.display_tz);

        self.summary = Some(today.summarize()?);
        self.today = Some(today);
        self.tomorrow = Some(tomorrow);

        self.logger.debug("Daily curves updated");
        Ok(())
    }
}
