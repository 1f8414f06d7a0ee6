//! Core driver logic for Oersted
//!
//! Orchestrates the configured components: builds the price client and the
//! sensor, starts the refresh timers, and pumps the "new data" signal into
//! sensor refreshes until shutdown. A failed refresh is logged and dropped;
//! the next scheduled tick is the retry mechanism.

use crate::client::PriceClient;
use crate::config::Config;
use crate::error::{OerstedError, Result};
use crate::logging::get_logger;
use crate::refresher::ScheduledRefresher;
use crate::sensor::PriceSensor;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Main driver state
#[derive(Debug, Clone)]
pub enum DriverState {
    /// Driver is initializing
    Initializing,
    /// Driver is running normally
    Running,
    /// Driver is shutting down
    ShuttingDown,
}

/// Main driver for Oersted
pub struct PriceDriver {
    /// Configuration
    config: Config,

    /// Current driver state
    state: watch::Sender<DriverState>,

    /// Sensor entity fed by refresh signals
    sensor: PriceSensor,

    /// Refresh timers
    refresher: ScheduledRefresher,

    /// Shutdown signal
    shutdown_tx: mpsc::UnboundedSender<()>,

    /// Shutdown receiver
    shutdown_rx: mpsc::UnboundedReceiver<()>,

    /// Logger with context
    logger: crate::logging::StructuredLogger,
}

impl PriceDriver {
    /// Create a new driver instance from a validated, configured config
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        if !config.is_configured() {
            return Err(OerstedError::config(
                "No metering point configured; run setup first",
            ));
        }

        let logger = get_logger("driver");
        let display_tz = config.display_timezone()?;

        let client = PriceClient::new(
            &config.api.endpoint,
            &config.api.access_token,
            std::time::Duration::from_secs(config.api.timeout_secs),
            display_tz,
        )?;
        let sensor = PriceSensor::new(
            Arc::new(client),
            &config.api.price_code,
            &config.api.mpid,
            display_tz,
        );
        let refresher = ScheduledRefresher::new(&config.refresh)?;

        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(DriverState::Initializing);

        logger.info(&format!(
            "Initializing price sensor {}",
            sensor.unique_id()
        ));

        Ok(Self {
            config,
            state: state_tx,
            sensor,
            refresher,
            shutdown_tx,
            shutdown_rx,
            logger,
        })
    }

    /// Run the driver main loop
    pub async fn run(&mut self) -> Result<()> {
        self.logger.info("Starting price driver main loop");

        self.refresher.start();
        let mut signal_rx = self.refresher.subscribe();
        self.state.send(DriverState::Running).ok();

        // Initial refresh so the sensor does not sit empty until the next tick
        self.handle_refresh().await;

        loop {
            tokio::select! {
                signal = signal_rx.recv() => {
                    match signal {
                        Ok(()) => self.handle_refresh().await,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            // Coalesce: missed signals trigger the same full refresh
                            self.logger.warn(&format!("Skipped {} refresh signals", skipped));
                            self.handle_refresh().await;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                Some(()) = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    self.logger.info("Interrupt received");
                    break;
                }
            }
        }

        self.state.send(DriverState::ShuttingDown).ok();
        self.refresher.stop();
        self.logger.info("Driver shutdown complete");
        Ok(())
    }

    /// One refresh cycle: errors are logged, never fatal
    async fn handle_refresh(&mut self) {
        match self.sensor.refresh().await {
            Ok(()) => {
                self.logger.info(&format!(
                    "{} = {} {}",
                    self.sensor.unique_id(),
                    self.sensor.state(),
                    self.sensor.unit_of_measurement().unwrap_or("-"),
                ));
            }
            Err(e) if e.is_no_data() => {
                // Expected before tomorrow's prices are published
                self.logger.debug(&format!("Prices not yet available: {}", e));
            }
            Err(e) => {
                self.logger.warn(&format!("Refresh failed: {}", e));
            }
        }
    }

    /// Get current driver state
    pub fn get_state(&self) -> DriverState {
        self.state.borrow().clone()
    }

    /// Request shutdown
    pub fn request_shutdown(&self) {
        self.shutdown_tx.send(()).ok();
    }

    /// Get configuration reference
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sensor snapshot accessor
    pub fn sensor(&self) -> &PriceSensor {
        &self.sensor
    }
}
