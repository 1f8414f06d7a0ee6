//! # Oersted - electricity price sensor daemon
//!
//! A Rust implementation of a spot-price integration for the Barry energy
//! API, exposing the current all-inclusive electricity price and a daily
//! price curve as a sensor entity.
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of
//! concerns:
//!
//! - `config`: Configuration management and the persisted setup record
//! - `logging`: Structured logging and tracing
//! - `client`: JSON-RPC client for the pricing API
//! - `aggregate`: Daily curve sorting and peak/off-peak statistics
//! - `refresher`: Hourly and daily refresh timers
//! - `sensor`: Sensor entity state and attributes
//! - `setup`: Interactive setup and options flows
//! - `driver`: Orchestration and main loop

pub mod aggregate;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod refresher;
pub mod sensor;
pub mod setup;

// Re-export commonly used types
pub use config::Config;
pub use driver::PriceDriver;
pub use error::{OerstedError, Result};
