//! # RN2483 Serial Connection
//!
//! Opens the UART the module is attached to. The RN2483 ships configured
//! for 57600 baud, 8 data bits, no parity, one stop bit.

use std::time::Duration;

use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::constants::{DEFAULT_BAUDRATE, DEFAULT_DRAIN_WINDOW};
use crate::error::Result;
use crate::serial::transport::LineTransport;

/// Configuration for serial connection.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port path, e.g. `/dev/ttyUSB0` on Linux or `COM3` on Windows.
    pub port: String,
    pub baudrate: u32,
    /// Driver-level timeout for a single blocking read or write.
    pub timeout: Duration,
    /// Quiet period used when resynchronising after a timeout.
    pub drain_window: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: DEFAULT_BAUDRATE,
            timeout: Duration::from_secs(5),
            drain_window: DEFAULT_DRAIN_WINDOW,
        }
    }
}

impl SerialConfig {
    pub fn new(port: &str) -> Self {
        SerialConfig {
            port: port.to_string(),
            ..Default::default()
        }
    }

    pub fn with_baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate = baudrate;
        self
    }
}

/// Open the serial port (8N1, no flow control) and wrap it in a line transport.
pub fn open_serial(config: &SerialConfig) -> Result<LineTransport<SerialStream>> {
    log::debug!("opening {} at {} baud", config.port, config.baudrate);
    let port = tokio_serial::new(&config.port, config.baudrate)
        .data_bits(tokio_serial::DataBits::Eight)
        .stop_bits(tokio_serial::StopBits::One)
        .parity(tokio_serial::Parity::None)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(config.timeout)
        .open_native_async()?;

    Ok(LineTransport::new(port).with_drain_window(config.drain_window))
}
