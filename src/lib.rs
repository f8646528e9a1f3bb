//! # rn2483-rs - A Rust Crate for the Microchip RN2483 LoRa Module
//!
//! The rn2483-rs crate drives an RN2483 (or RN2903) LoRa/LoRaWAN module over
//! its ASCII command interface. Every interaction is one command line,
//! terminated by CR LF, answered by one response line.
//!
//! ## Features
//!
//! - Typed command catalog with argument validation before any serial I/O
//! - One transaction at a time per serial line, with resync after timeouts
//! - High-level client for system queries, MAC configuration and the raw radio
//! - ABP and OTAA join provisioning with a traceable state history
//! - Logging of every line on the wire, with key material redacted
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! rn2483-rs = "0.1.0"
//! ```
//!
//! ```rust,no_run
//! use rn2483::{connect, JoinConfig, JoinSequencer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = connect("/dev/ttyUSB0").await?;
//! println!("firmware: {}", client.version().await?);
//!
//! let config = JoinConfig::otaa(
//!     "2B7E151628AED2A6ABF7158809CF4F3C",
//!     "70B3D57ED0000001",
//! )?;
//! JoinSequencer::new(&client).run(&config).await?;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod constants;
pub mod device_client;
pub mod error;
pub mod join;
pub mod logging;
pub mod serial;
pub mod transaction;
pub mod util;

pub use crate::error::{LoRaError, Result};
pub use crate::logging::{init_logger, log_info};

// Command layer
pub use command::{Args, Command, CommandCatalog, CommandId, CommandTemplate};

// Transport and transactions
pub use serial::{open_serial, LineTransport, SerialConfig, Transport};
pub use transaction::{ProtocolConfig, Response, ResponseKind, TransactionExecutor};

// High-level API
pub use device_client::{DeviceClient, Downlink, Pin, PinLevel};
pub use join::{JoinConfig, JoinError, JoinMode, JoinSequencer, JoinStage, JoinState};

/// Connect to an RN2483 on a serial port with default settings.
///
/// # Arguments
/// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
///
/// # Returns
/// * `Ok(DeviceClient)` - Client ready to issue commands
/// * `Err(LoRaError)` - The port could not be opened
pub async fn connect(port: &str) -> Result<DeviceClient> {
    DeviceClient::open(&SerialConfig::new(port), ProtocolConfig::default())
}

/// Provision a module and ask it to join the network.
///
/// # Arguments
/// * `client` - Client connected to the module
/// * `config` - ABP or OTAA activation parameters
///
/// # Returns
/// * `Ok(())` - Every step was accepted and the join request was sent
/// * `Err(LoRaError::JoinFailed)` - A step was rejected; names the stage
pub async fn join(client: &DeviceClient, config: &JoinConfig) -> Result<()> {
    JoinSequencer::new(client).run(config).await?;
    Ok(())
}
