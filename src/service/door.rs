//! The open-door operation.
//!
//! Each call walks a fresh connection through
//!
//! ```text
//! Connecting -> Authenticating -> CallingFactory -> OpeningDoor
//!            -> DestroyingFactory -> Closing -> Done | Failed
//! ```
//!
//! `DestroyingFactory` runs whenever a factory handle was obtained, and
//! `Closing` runs whenever the connection was opened, whatever failed before.

use std::fmt;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{constants, DhipError, Result};
use crate::protocol::message::Request;
use crate::transport::{resolve_target, Connection};
use crate::utils::metrics::{global_metrics, Timer};

/// Access control channel the factory object is created on
const ACCESS_CONTROL_CHANNEL: u32 = 0;

/// Door index passed to `accessControl.openDoor`
const DOOR_INDEX: u32 = 0;

/// Stages of one open-door operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorStage {
    Connecting,
    Authenticating,
    CallingFactory,
    OpeningDoor,
    DestroyingFactory,
    Closing,
    Done,
    Failed,
}

impl DoorStage {
    pub fn as_str(self) -> &'static str {
        match self {
            DoorStage::Connecting => "connecting",
            DoorStage::Authenticating => "authenticating",
            DoorStage::CallingFactory => "calling_factory",
            DoorStage::OpeningDoor => "opening_door",
            DoorStage::DestroyingFactory => "destroying_factory",
            DoorStage::Closing => "closing",
            DoorStage::Done => "done",
            DoorStage::Failed => "failed",
        }
    }
}

impl fmt::Display for DoorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opens doors on DHIP devices, one connection per operation
#[derive(Debug, Clone, Default)]
pub struct DoorClient {
    config: ClientConfig,
}

impl DoorClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open door 0 of the device at `device_address` with `short_number`.
    ///
    /// # Errors
    /// - `ConnectFailure` if the device cannot be reached
    /// - `RefusedOperation` if the device declined (e.g. wrong short number)
    /// - `RemoteError`, `TransportClosed`, `Timeout`, ... for any other failed stage
    #[instrument(skip(self, short_number))]
    pub async fn open_door(&self, device_address: &str, short_number: &str) -> Result<()> {
        let _timer = Timer::start("open_door");
        let target = resolve_target(device_address, self.config.port);

        debug!(stage = %DoorStage::Connecting, %target, "Connecting to device");
        let mut connection = match Connection::connect(&target, &self.config).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(stage = %DoorStage::Failed, error = %e, "Could not connect");
                global_metrics().door_failed();
                return Err(e);
            }
        };

        let outcome = run_session(&connection, short_number).await;

        debug!(stage = %DoorStage::Closing, "Closing socket");
        connection.close().await;

        match &outcome {
            Ok(()) => {
                info!(stage = %DoorStage::Done, "Door opened");
                global_metrics().door_opened();
            }
            Err(DhipError::RefusedOperation) => {
                warn!(stage = %DoorStage::Failed, "Device refused to open the door");
                global_metrics().door_refused();
            }
            Err(e) => {
                warn!(stage = %DoorStage::Failed, error = %e, "Door operation failed");
                global_metrics().door_failed();
            }
        }

        outcome
    }
}

async fn run_session(connection: &Connection, short_number: &str) -> Result<()> {
    debug!(stage = %DoorStage::Authenticating, "Logging in");
    connection.login().await?;

    debug!(stage = %DoorStage::CallingFactory, "Creating access control object");
    let response = connection
        .call(Request::factory_instance(ACCESS_CONTROL_CHANNEL))
        .await?;
    let object = match response.result {
        Some(object) if !object.is_null() => object,
        _ => {
            return Err(DhipError::DeserializeError(
                constants::ERR_MISSING_OBJECT.into(),
            ))
        }
    };

    debug!(stage = %DoorStage::OpeningDoor, "Opening door");
    let opened = open(connection, &object, short_number).await;

    debug!(stage = %DoorStage::DestroyingFactory, "Releasing access control object");
    let destroyed = connection.call(Request::destroy(object)).await;

    match (opened, destroyed) {
        (Err(e), Err(cleanup)) => {
            debug!(error = %cleanup, "Destroy after failed open also failed");
            Err(e)
        }
        (Err(e), Ok(_)) => Err(e),
        (Ok(()), destroyed) => destroyed.map(|_| ()),
    }
}

async fn open(connection: &Connection, object: &Value, short_number: &str) -> Result<()> {
    let response = connection
        .call(Request::open_door(object.clone(), DOOR_INDEX, short_number))
        .await?;

    debug!(result = ?response.result, "Open door result");
    if response.has_truthy_result() {
        Ok(())
    } else {
        Err(DhipError::RefusedOperation)
    }
}
