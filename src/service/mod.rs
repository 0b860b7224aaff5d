//! # Door Services
//!
//! The host-facing layer: [`door::DoorClient`] runs one open-door operation
//! per call, and [`capability::Accessory`] maps its outcome onto the state a
//! lock, switch or garage door reports.

pub mod capability;
pub mod door;

pub use capability::{Accessory, AccessoryState, Capability};
pub use door::{DoorClient, DoorStage};
