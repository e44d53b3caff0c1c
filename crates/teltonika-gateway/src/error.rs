//! Top-level gateway errors: configuration and transport binding.
//!
//! Per-connection protocol faults live in `teltonika_core::ProtocolFault`;
//! these are the failures that keep the process itself from starting.

use thiserror::Error;

/// Errors that can prevent the gateway from starting.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A required environment variable was missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
    /// The TCP or status HTTP listener failed to bind.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// The address that failed to bind.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
