//! # Utility Modules
//!
//! Helpers shared across the crate: hex handling for keys and payloads and
//! wire-level logging.

pub mod hex;
pub mod logging;

pub use hex::{check_hex, decode_hex, encode_hex_upper, HexError};
pub use logging::{log_line_in, log_line_out};
