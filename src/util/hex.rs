//! # Hex Encoding/Decoding Utilities
//!
//! The RN2483 carries every key, EUI, address and payload as an ASCII hex
//! string. These helpers wrap the `hex` crate with the checks the command
//! encoder needs.
//!
//! ## Usage
//!
//! ```rust
//! use rn2483::util::hex::{encode_hex_upper, decode_hex, check_hex};
//!
//! assert_eq!(encode_hex_upper(b"AB"), "4142");
//! assert_eq!(decode_hex("4142").unwrap(), b"AB".to_vec());
//! assert!(check_hex("26011BDA", Some(8)).is_ok());
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Invalid hex character: {0}")]
    InvalidCharacter(char),

    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Expected {expected} hex characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Encode bytes to uppercase hex string, the form the module echoes back.
pub fn encode_hex_upper(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Decode hex string to bytes
///
/// Accepts both uppercase and lowercase hex characters.
/// Whitespace is automatically stripped.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }

    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Validate a hex argument without decoding it.
///
/// With `digits` set the string must have exactly that many characters;
/// otherwise any non-empty even length is accepted.
pub fn check_hex(value: &str, digits: Option<usize>) -> Result<(), HexError> {
    if value.is_empty() {
        return Err(HexError::EmptyString);
    }

    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(HexError::InvalidCharacter(bad));
    }

    match digits {
        Some(expected) if value.len() != expected => Err(HexError::WrongLength {
            expected,
            actual: value.len(),
        }),
        None if value.len() % 2 != 0 => Err(HexError::OddLength(value.len())),
        _ => Ok(()),
    }
}
