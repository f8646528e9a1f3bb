//! RN2483 Protocol Constants
//!
//! This module defines constants used by the RN2483 serial command interface,
//! based on the RN2483 LoRa Technology Module Command Reference (DS40001784).

use std::time::Duration;

/// Line terminator appended to every command and ending every response.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Token the module sends when a command was accepted.
pub const ACK_TOKEN: &str = "ok";

/// Prefix of a generic error reply; the reason follows the prefix.
pub const ERROR_PREFIX: &str = "ERROR";

/// Bare error words the module sends in place of `ok`.
pub const DEVICE_ERROR_TOKENS: &[&str] = &[
    "invalid_param",
    "not_joined",
    "no_free_ch",
    "silent",
    "busy",
    "mac_paused",
    "denied",
    "keys_not_init",
    "invalid_data_len",
    "frame_counter_err_rejoin_needed",
    "radio_err",
    "mac_err",
    "err",
];

/// Prefix of the line carrying data received in radio listen mode.
pub const RADIO_RX_PREFIX: &str = "radio_rx";

/// Second reply to `radio tx` once the frame is on air.
pub const RADIO_TX_OK: &str = "radio_tx_ok";

/// Second reply to `mac tx` when no downlink arrived.
pub const MAC_TX_OK: &str = "mac_tx_ok";

/// Prefix of the second reply to `mac tx` carrying a downlink: `mac_rx <port> <hex>`.
pub const MAC_RX_PREFIX: &str = "mac_rx";

/// Longest response line accepted before the transport gives up.
pub const MAX_LINE_LENGTH: usize = 1024;

// ----------------------------------------------------------------------------
// Serial defaults
// ----------------------------------------------------------------------------

/// Factory default UART speed (8N1).
pub const DEFAULT_BAUDRATE: u32 = 57_600;

/// Default deadline for one command/response exchange.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the line must stay quiet before a drain is considered complete.
pub const DEFAULT_DRAIN_WINDOW: Duration = Duration::from_millis(50);

/// Wait for the second reply of `radio tx`, `mac tx` and `mac join`. Covers
/// SF12 airtime and the RX1/RX2 windows of a confirmed uplink.
pub const DEFAULT_FOLLOWUP_TIMEOUT: Duration = Duration::from_secs(30);

// ----------------------------------------------------------------------------
// Argument bounds
// ----------------------------------------------------------------------------

pub const SLEEP_MIN_MS: u64 = 100;
pub const SLEEP_MAX_MS: u64 = 4_294_967_296;

pub const PORT_MIN: u64 = 1;
pub const PORT_MAX: u64 = 223;

pub const POWER_INDEX_MAX: u64 = 5;
pub const DATA_RATE_MAX: u64 = 7;

/// Power index applied during ABP provisioning when none is configured.
pub const DEFAULT_POWER_INDEX: u8 = 1;

pub const RX_WINDOW_MAX: u64 = 65_535;

/// Largest payload the radio accepts in one `radio tx`, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 255;

/// Session keys and the application key are 16 bytes.
pub const KEY_HEX_DIGITS: usize = 32;
/// EUIs are 8 bytes.
pub const EUI_HEX_DIGITS: usize = 16;
/// Device addresses are 4 bytes.
pub const DEVADDR_HEX_DIGITS: usize = 8;

/// Digital pins accepted by `sys set pindig`.
pub const PIN_NAMES: &[&str] = &[
    "GPIO0", "GPIO1", "GPIO2", "GPIO3", "GPIO4", "GPIO5", "GPIO6", "GPIO7", "GPIO8", "GPIO9",
    "GPIO10", "GPIO11", "GPIO12", "GPIO13", "UART_CTS", "UART_RTS", "TEST0", "TEST1",
];
