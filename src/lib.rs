//! # dhip-client
//!
//! Client for DHIP, the binary-framed JSON request/response protocol spoken
//! by networked access-control and intercom devices.
//!
//! One call to [`open_door`] opens a TCP connection, logs in (answering the
//! device's login challenge), creates an access control object, asks it to
//! open the door, destroys the object and closes the connection.
//!
//! ## Layers
//! - [`core`]: 32-byte frame header, outbound codec, receive assembler
//! - [`protocol`]: method bodies, login handshake, request correlation
//! - [`transport`]: the TCP connection and its reader/writer tasks
//! - [`service`]: the open-door state machine and capability selection
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics
//!
//! ## Example
//! ```no_run
//! # async fn run() -> dhip_client::error::Result<()> {
//! use dhip_client::config::ClientConfig;
//! use dhip_client::service::DoorClient;
//!
//! let client = DoorClient::new(ClientConfig::default());
//! client.open_door("192.168.1.108", "1234").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::frame::{Frame, Header, HEADER_SIZE, MAGIC};
pub use crate::error::{DhipError, Result};
pub use crate::service::{Accessory, AccessoryState, Capability, DoorClient};

/// Open the door of the device at `device_address` using default client settings
pub async fn open_door(device_address: &str, short_number: &str) -> Result<()> {
    DoorClient::default()
        .open_door(device_address, short_number)
        .await
}
