//! # Error Types
//!
//! Error handling for the DHIP client.
//!
//! Every failure an open-door operation can run into is a variant of
//! [`DhipError`], from socket-level problems up to a device that simply says no.
//!
//! ## Error Categories
//! - **Connection Errors**: connect failures, transport closed mid-operation, timeouts
//! - **Framing Errors**: wrong magic, inconsistent length fields, oversized bodies
//! - **Remote Errors**: error objects returned by the device, refused operations
//! - **Handshake Errors**: malformed or endless login challenges
//! - **Usage Errors**: a second request while one is still in flight, bad configuration
//!
//! The login challenge itself is not an error: the correlator answers it
//! internally and the caller never sees it.
//!
//! ## Example Usage
//! ```rust
//! use dhip_client::error::{DhipError, Result};
//! use tracing::{info, warn};
//!
//! fn report(outcome: Result<()>) {
//!     match outcome {
//!         Ok(()) => info!("Door opened"),
//!         Err(DhipError::RefusedOperation) => warn!("Device refused to open the door"),
//!         Err(e) => warn!(error = %e, "Door operation failed"),
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Handshake errors
    pub const ERR_CHALLENGE_MISSING_REALM: &str = "Login challenge carries no realm";
    pub const ERR_CHALLENGE_MISSING_RANDOM: &str = "Login challenge carries no random";
    pub const ERR_CHALLENGE_MISSING_SESSION: &str = "Login challenge carries no session";
    pub const ERR_TOO_MANY_CHALLENGES: &str = "Device kept issuing login challenges";

    /// Connection errors
    pub const ERR_CONNECT_TIMEOUT: &str = "Timed out connecting to device";

    /// Response errors
    pub const ERR_MISSING_OBJECT: &str = "Factory call returned no object handle";
}

/// Primary error type for all DHIP client operations
#[derive(Error, Debug)]
pub enum DhipError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to connect to device: {0}")]
    ConnectFailure(String),

    #[error("Protocol mismatch: unexpected magic {0:#018x}")]
    ProtocolMismatch(u64),

    #[error("Invalid frame header")]
    InvalidHeader,

    #[error("Frame body too large: {0} bytes")]
    OversizedFrame(u64),

    #[error("Transport closed")]
    TransportClosed,

    #[error("Received error {code}: {message}")]
    RemoteError { code: i64, message: String },

    #[error("Operation not permitted by device")]
    RefusedOperation,

    #[error("A request is already in flight on this connection")]
    RequestInFlight,

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DhipError {
    /// Whether the device itself made this decision, as opposed to the
    /// connection or the framing breaking down.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            DhipError::RemoteError { .. } | DhipError::RefusedOperation
        )
    }
}

/// Type alias for Results using DhipError
pub type Result<T> = std::result::Result<T, DhipError>;
