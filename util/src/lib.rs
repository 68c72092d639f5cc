//! Small shared helpers used across the workspace.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UtilError {
    #[error("Hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Converts a hex string to bytes
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, UtilError> {
    Ok(hex::decode(hex)?)
}

/// Converts bytes to a hex string
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Formats a timestamp as an ISO 8601 string
pub fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| "Invalid timestamp".to_string())
}
