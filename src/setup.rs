//! Interactive setup and options flows
//!
//! Two-step state machine producing the persisted configuration record:
//! credential validation first, then metering point selection. Form-level
//! failures are their own error type so the caller can re-show the right
//! step instead of aborting; the duplicate-meter guard is the one hard
//! abort. The options flow only ever replaces the access token.

use crate::client::{MeteringPoint, PricingApi};
use crate::config::Config;
use crate::error::{OerstedError, Result};
use crate::logging::get_logger;
use crate::sensor::unique_id;
use std::collections::HashSet;
use std::io::{BufRead, Write};
use thiserror::Error;

/// Form-level setup errors, keyed the way the setup UI labels them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SetupError {
    /// Token rejected by the metering-point lookup
    #[error("invalid_access_token")]
    InvalidAccessToken,

    /// Anything else that went wrong during validation
    #[error("unknown")]
    Unknown,

    /// Selected address does not match a discovered metering point
    #[error("missing_meter")]
    MissingMeter,

    /// A sensor with the derived identity already exists
    #[error("already_configured")]
    AlreadyConfigured,
}

/// The configuration record produced by a completed flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
    pub access_token: String,
    pub price_code: String,
    pub mpid: String,
}

/// Current step of the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Credential,
    MeterSelection,
    Complete,
}

/// Two-step setup state machine
pub struct SetupFlow {
    existing_ids: HashSet<String>,
    access_token: Option<String>,
    points: Vec<MeteringPoint>,
    step: SetupStep,
}

impl SetupFlow {
    /// Create a flow guarding against the given already-configured sensor ids
    pub fn new(existing_ids: HashSet<String>) -> Self {
        Self {
            existing_ids,
            access_token: None,
            points: Vec::new(),
            step: SetupStep::Credential,
        }
    }

    /// Current step
    pub fn step(&self) -> SetupStep {
        self.step
    }

    /// Credential step: validate the token through `api` (built by the caller
    /// from the same token) and discover the metering points on it.
    pub async fn submit_token<A: PricingApi + ?Sized>(
        &mut self,
        api: &A,
        access_token: &str,
    ) -> std::result::Result<&[MeteringPoint], SetupError> {
        if let Err(e) = api.verify_access_token().await {
            return Err(if e.is_invalid_token() {
                SetupError::InvalidAccessToken
            } else {
                SetupError::Unknown
            });
        }

        let points = api.metering_points().await.map_err(|e| {
            if e.is_invalid_token() {
                SetupError::InvalidAccessToken
            } else {
                SetupError::Unknown
            }
        })?;

        self.access_token = Some(access_token.trim().to_string());
        self.points = points;
        self.step = SetupStep::MeterSelection;
        Ok(&self.points)
    }

    /// Display addresses offered for selection
    pub fn addresses(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.address.as_str()).collect()
    }

    /// Meter selection step: pick by display address, derive the sensor
    /// identity, and abort if it is already configured.
    pub fn select_meter(&mut self, address: &str) -> std::result::Result<ConfigRecord, SetupError> {
        let Some(token) = self.access_token.clone() else {
            return Err(SetupError::Unknown);
        };

        let meter = self
            .points
            .iter()
            .find(|p| p.address == address)
            .ok_or(SetupError::MissingMeter)?;

        let id = unique_id(&meter.price_code, &meter.mpid);
        if self.existing_ids.contains(&id) {
            return Err(SetupError::AlreadyConfigured);
        }

        let record = ConfigRecord {
            access_token: token,
            price_code: meter.price_code.clone(),
            mpid: meter.mpid.clone(),
        };
        self.step = SetupStep::Complete;
        Ok(record)
    }
}

/// Options flow: validate a replacement token and swap it into the config,
/// keeping the configured zone and meter untouched.
pub async fn update_access_token<A: PricingApi + ?Sized>(
    api: &A,
    config: &mut Config,
    access_token: &str,
) -> std::result::Result<(), SetupError> {
    match api.verify_access_token().await {
        Ok(()) => {
            config.api.access_token = access_token.trim().to_string();
            Ok(())
        }
        Err(e) if e.is_invalid_token() => Err(SetupError::InvalidAccessToken),
        Err(_) => Err(SetupError::Unknown),
    }
}

/// The already-configured sensor ids of a config, for the duplicate guard
pub fn configured_ids(config: &Config) -> HashSet<String> {
    let mut ids = HashSet::new();
    if config.is_configured() {
        ids.insert(unique_id(&config.api.price_code, &config.api.mpid));
    }
    ids
}

/// First-run interactive setup over stdin, persisting the produced record
/// into `config`. Re-prompts on form errors the way the setup UI would.
pub async fn run_interactive_setup(config: &mut Config) -> Result<()> {
    let logger = get_logger("setup");
    let stdin = std::io::stdin();
    let mut flow = SetupFlow::new(configured_ids(config));
    let display_tz = config.display_timezone()?;
    let timeout = std::time::Duration::from_secs(config.api.timeout_secs);

    loop {
        print!("Access token: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        let token = line.trim();
        if token.is_empty() {
            continue;
        }

        let client =
            crate::client::PriceClient::new(&config.api.endpoint, token, timeout, display_tz)?;
        match flow.submit_token(&client, token).await {
            Ok(_) => break,
            Err(SetupError::InvalidAccessToken) => {
                println!("Invalid access token, please try again.");
            }
            Err(e) => {
                logger.warn(&format!("Token validation failed: {}", e));
                println!("Could not validate the token, please try again.");
            }
        }
    }

    let record = loop {
        println!("Available metering points:");
        let addresses: Vec<String> = flow.addresses().iter().map(|a| (*a).to_string()).collect();
        for (i, address) in addresses.iter().enumerate() {
            println!("  [{}] {}", i + 1, address);
        }
        print!("Select metering point: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;

        let Ok(choice) = line.trim().parse::<usize>() else {
            println!("Please enter a number.");
            continue;
        };
        let Some(address) = addresses.get(choice.wrapping_sub(1)) else {
            println!("No such metering point.");
            continue;
        };

        match flow.select_meter(address) {
            Ok(record) => break record,
            Err(SetupError::AlreadyConfigured) => {
                return Err(OerstedError::config(
                    "This metering point is already configured",
                ));
            }
            Err(e) => {
                println!("Selection failed ({}), please try again.", e);
            }
        }
    };

    config.api.access_token = record.access_token;
    config.api.price_code = record.price_code;
    config.api.mpid = record.mpid;
    logger.info(&format!(
        "Setup complete for metering point {}",
        config.api.mpid
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Co2Quote, PriceEntry, PriceQuote};
    use async_trait::async_trait;

    /// Stub API with scriptable credential behavior
    struct StubApi {
        token_valid: bool,
        network_down: bool,
        points: Vec<MeteringPoint>,
    }

    impl StubApi {
        fn with_points() -> Self {
            Self {
                token_valid: true,
                network_down: false,
                points: vec![
                    MeteringPoint {
                        mpid: "571313180000000001".to_string(),
                        address: "Gade 1, 2100 København".to_string(),
                        price_code: "DK_NORDPOOL_SPOT_DK2".to_string(),
                    },
                    MeteringPoint {
                        mpid: "571313180000000002".to_string(),
                        address: "Vej 2, 8000 Aarhus".to_string(),
                        price_code: "DK_NORDPOOL_SPOT_DK1".to_string(),
                    },
                ],
            }
        }
    }

    #[async_trait]
    impl PricingApi for StubApi {
        async fn verify_access_token(&self) -> Result<()> {
            if self.network_down {
                return Err(OerstedError::network("connection refused"));
            }
            if !self.token_valid {
                return Err(OerstedError::auth("Invalid access token"));
            }
            Ok(())
        }

        async fn metering_points(&self) -> Result<Vec<MeteringPoint>> {
            self.verify_access_token().await?;
            Ok(self.points.clone())
        }

        async fn current_spot_price(&self, _price_code: &str) -> Result<Option<PriceQuote>> {
            Ok(None)
        }

        async fn current_total_price(&self, _mpid: &str) -> Result<Option<PriceQuote>> {
            Ok(None)
        }

        async fn current_co2_intensity(&self, _price_code: &str) -> Result<Option<Co2Quote>> {
            Ok(None)
        }

        async fn daily_prices(&self, _mpid: &str, _day_offset: i64) -> Result<Vec<PriceEntry>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn invalid_token_is_a_distinct_form_error() {
        let api = StubApi {
            token_valid: false,
            ..StubApi::with_points()
        };
        let mut flow = SetupFlow::new(HashSet::new());
        let err = flow.submit_token(&api, "bad").await.unwrap_err();
        assert_eq!(err, SetupError::InvalidAccessToken);
        assert_eq!(flow.step(), SetupStep::Credential);
    }

    #[tokio::test]
    async fn transport_failure_maps_to_unknown() {
        let api = StubApi {
            network_down: true,
            ..StubApi::with_points()
        };
        let mut flow = SetupFlow::new(HashSet::new());
        let err = flow.submit_token(&api, "token").await.unwrap_err();
        assert_eq!(err, SetupError::Unknown);
    }

    #[tokio::test]
    async fn happy_path_produces_the_config_record() {
        let api = StubApi::with_points();
        let mut flow = SetupFlow::new(HashSet::new());

        let points = flow.submit_token(&api, " token ").await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(flow.step(), SetupStep::MeterSelection);

        let record = flow.select_meter("Vej 2, 8000 Aarhus").unwrap();
        assert_eq!(record.access_token, "token");
        assert_eq!(record.price_code, "DK_NORDPOOL_SPOT_DK1");
        assert_eq!(record.mpid, "571313180000000002");
        assert_eq!(flow.step(), SetupStep::Complete);
    }

    #[tokio::test]
    async fn unknown_address_is_missing_meter() {
        let api = StubApi::with_points();
        let mut flow = SetupFlow::new(HashSet::new());
        flow.submit_token(&api, "token").await.unwrap();

        let err = flow.select_meter("Nowhere 99").unwrap_err();
        assert_eq!(err, SetupError::MissingMeter);
        assert_eq!(flow.step(), SetupStep::MeterSelection);
    }

    #[tokio::test]
    async fn duplicate_meter_aborts_setup() {
        let api = StubApi::with_points();
        let mut existing = HashSet::new();
        existing.insert(unique_id("DK_NORDPOOL_SPOT_DK2", "571313180000000001"));
        let mut flow = SetupFlow::new(existing);
        flow.submit_token(&api, "token").await.unwrap();

        let err = flow.select_meter("Gade 1, 2100 København").unwrap_err();
        assert_eq!(err, SetupError::AlreadyConfigured);
        assert_ne!(flow.step(), SetupStep::Complete);
    }

    #[tokio::test]
    async fn options_flow_replaces_only_the_token() {
        let api = StubApi::with_points();
        let mut config = Config::default();
        config.api.access_token = "old".to_string();
        config.api.price_code = "DK_NORDPOOL_SPOT_DK2".to_string();
        config.api.mpid = "571313180000000001".to_string();

        update_access_token(&api, &mut config, " new-token ")
            .await
            .unwrap();
        assert_eq!(config.api.access_token, "new-token");
        assert_eq!(config.api.price_code, "DK_NORDPOOL_SPOT_DK2");
        assert_eq!(config.api.mpid, "571313180000000001");
    }

    #[tokio::test]
    async fn options_flow_rejects_invalid_replacement() {
        let api = StubApi {
            token_valid: false,
            ..StubApi::with_points()
        };
        let mut config = Config::default();
        config.api.access_token = "old".to_string();

        let err = update_access_token(&api, &mut config, "bad")
            .await
            .unwrap_err();
        assert_eq!(err, SetupError::InvalidAccessToken);
        assert_eq!(config.api.access_token, "old");
    }
}
