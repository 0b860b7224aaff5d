//! Capability selection.
//!
//! The same door client backs three presentations, picked by configuration.
//! They differ only in the state reported around an open-door operation:
//!
//! | Capability   | Before        | After success                    | After failure |
//! |--------------|---------------|----------------------------------|---------------|
//! | `Lock`       | `Secured`     | `Secured` (strike re-locks)      | unchanged     |
//! | `Switch`     | `On` (running)| `Off`                            | `Off`         |
//! | `GarageDoor` | `Closed`      | `Opening`, then `Open` after delay | unchanged   |

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::config::DoorConfig;
use crate::error::Result;
use crate::service::door::DoorClient;

/// How a door is exposed to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    #[default]
    Lock,
    Switch,
    GarageDoor,
}

impl Capability {
    pub fn initial_state(self) -> AccessoryState {
        match self {
            Capability::Lock => AccessoryState::Secured,
            Capability::Switch => AccessoryState::Off,
            Capability::GarageDoor => AccessoryState::Closed,
        }
    }
}

/// State reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessoryState {
    Secured,
    On,
    Off,
    Closed,
    Opening,
    Open,
}

/// A configured door plus the state it reports
pub struct Accessory {
    client: DoorClient,
    door: DoorConfig,
    state: Arc<watch::Sender<AccessoryState>>,
}

impl Accessory {
    pub fn new(client: DoorClient, door: DoorConfig) -> Self {
        let (state, _) = watch::channel(door.capability.initial_state());
        Self {
            client,
            door,
            state: Arc::new(state),
        }
    }

    pub fn capability(&self) -> Capability {
        self.door.capability
    }

    pub fn name(&self) -> &str {
        &self.door.name
    }

    /// Latest reported state
    pub fn state(&self) -> AccessoryState {
        *self.state.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<AccessoryState> {
        self.state.subscribe()
    }

    /// Run one open-door operation and report the resulting state
    pub async fn trigger(&self) -> Result<()> {
        match self.door.capability {
            Capability::Lock => {
                self.open().await?;
                self.state.send_replace(AccessoryState::Secured);
                Ok(())
            }
            Capability::Switch => {
                self.state.send_replace(AccessoryState::On);
                let outcome = self.open().await;
                self.state.send_replace(AccessoryState::Off);
                outcome
            }
            Capability::GarageDoor => {
                self.open().await?;
                self.state.send_replace(AccessoryState::Opening);
                report_open_after(self.state.clone(), self.door.garage_open_delay);
                Ok(())
            }
        }
    }

    async fn open(&self) -> Result<()> {
        self.client
            .open_door(&self.door.address, &self.door.short_number)
            .await
    }
}

fn report_open_after(state: Arc<watch::Sender<AccessoryState>>, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        debug!("Reporting garage door open");
        state.send_replace(AccessoryState::Open);
    });
}
