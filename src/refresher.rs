//! Scheduled price refresh triggers
//!
//! Two independent timers: an hourly tick at the top of every hour for the
//! current-price refresh, and a daily tick for the today/tomorrow curves. The
//! daily tick fires at a fixed hour in the API's reference timezone, offset by
//! a random minute and second chosen once per refresher so a fleet of
//! installations does not hit the remote API at the same instant.
//!
//! Both timers publish the same payload-free signal on an instance-scoped
//! broadcast channel; subscribers decide what to refetch.

use crate::config::RefreshConfig;
use crate::error::{OerstedError, Result};
use crate::logging::get_logger;
use chrono::{DateTime, DurationRound, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Scheduled refresher owning the two recurring timers
pub struct ScheduledRefresher {
    daily_hour: u32,
    /// Jitter chosen once at construction, stable for the process lifetime
    daily_minute: u32,
    daily_second: u32,
    reference_tz: Tz,
    signal_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
    logger: crate::logging::StructuredLogger,
}

impl ScheduledRefresher {
    /// Create a refresher from config, drawing the daily jitter once
    pub fn new(config: &RefreshConfig) -> Result<Self> {
        let reference_tz = Tz::from_str(&config.reference_timezone).map_err(|_| {
            OerstedError::validation(
                "refresh.reference_timezone",
                &format!("unknown: {}", config.reference_timezone),
            )
        })?;

        let daily_minute = fastrand::u32(0..=config.daily_jitter_minutes);
        let daily_second = fastrand::u32(0..60);
        let (signal_tx, _) = broadcast::channel(8);

        Ok(Self {
            daily_hour: config.daily_hour,
            daily_minute,
            daily_second,
            reference_tz,
            signal_tx,
            tasks: Vec::new(),
            logger: get_logger("refresher"),
        })
    }

    /// Subscribe to the "new data" signal
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.signal_tx.subscribe()
    }

    /// The daily fire time as (hour, minute, second) in the reference timezone
    pub fn daily_fire_time(&self) -> (u32, u32, u32) {
        (self.daily_hour, self.daily_minute, self.daily_second)
    }

    /// Start both timers
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }

        self.logger.info(&format!(
            "Scheduling hourly tick at minute 0 and daily tick at {:02}:{:02}:{:02} {}",
            self.daily_hour, self.daily_minute, self.daily_second, self.reference_tz
        ));

        let tx = self.signal_tx.clone();
        let logger = self.logger.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                sleep_until_next(next_hourly_tick(Utc::now()), &logger).await;
                logger.debug("Hourly tick");
                let _ = tx.send(());
            }
        }));

        let tx = self.signal_tx.clone();
        let logger = self.logger.clone();
        let (hour, minute, second) = (self.daily_hour, self.daily_minute, self.daily_second);
        let tz = self.reference_tz;
        self.tasks.push(tokio::spawn(async move {
            loop {
                sleep_until_next(next_daily_tick(Utc::now(), hour, minute, second, tz), &logger)
                    .await;
                logger.debug("Daily tick");
                let _ = tx.send(());
            }
        }));
    }

    /// Unregister both timers. In-flight refreshes are not cancelled, their
    /// results are simply no longer listened to.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.logger.info("Refresh timers stopped");
    }
}

impl Drop for ScheduledRefresher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sleep_until_next(next: Result<DateTime<Utc>>, logger: &crate::logging::StructuredLogger) {
    let wait = match next {
        Ok(at) => (at - Utc::now()).to_std().unwrap_or_default(),
        Err(e) => {
            // Degenerate clock/timezone state; retry on a fixed cadence
            logger.error(&format!("Failed to compute next tick: {}", e));
            std::time::Duration::from_secs(3600)
        }
    };
    tokio::time::sleep(wait).await;
}

/// Next top-of-hour instant strictly after `now`
pub fn next_hourly_tick(now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    Ok(now.duration_trunc(TimeDelta::hours(1))? + TimeDelta::hours(1))
}

/// Next daily fire instant strictly after `now`, evaluated in `tz`.
/// A DST gap swallowing the fire time pushes it to the next day.
pub fn next_daily_tick(
    now: DateTime<Utc>,
    hour: u32,
    minute: u32,
    second: u32,
    tz: Tz,
) -> Result<DateTime<Utc>> {
    let mut date = now.with_timezone(&tz).date_naive();

    for _ in 0..3 {
        let naive = date
            .and_hms_opt(hour, minute, second)
            .ok_or_else(|| OerstedError::validation("refresh", "invalid daily fire time"))?;
        if let Some(candidate) = tz.from_local_datetime(&naive).earliest() {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return Ok(candidate);
            }
        }
        date = date
            .succ_opt()
            .ok_or_else(|| OerstedError::validation("refresh", "date out of range"))?;
    }

    Err(OerstedError::validation(
        "refresh",
        "could not resolve next daily tick",
    ))
}
