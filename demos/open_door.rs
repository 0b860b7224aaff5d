//! Example: Open a door from the command line
//!
//! Loads configuration from the TOML file given as the first argument, or
//! from `DHIP_*` environment variables when no file is given, then triggers
//! the configured door once.
//!
//! Run with: `cargo run --example open_door -- door.toml`
//! or: `DHIP_DEVICE_ADDRESS=192.168.1.108 DHIP_SHORT_NUMBER=1234 cargo run --example open_door`

use dhip_client::config::DhipConfig;
use dhip_client::utils::logging::setup_logging;
use dhip_client::{Accessory, AccessoryState, DoorClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => DhipConfig::from_file(path)?,
        None => DhipConfig::from_env()?,
    };
    config.validate_strict()?;
    setup_logging(&config.logging)?;

    let accessory = Accessory::new(DoorClient::new(config.client.clone()), config.door.clone());
    println!(
        "{} ({:?}) at {}: {:?}",
        accessory.name(),
        accessory.capability(),
        config.door.address,
        accessory.state()
    );

    let mut states = accessory.subscribe();
    match accessory.trigger().await {
        Ok(()) => println!("Door opened"),
        Err(e) => {
            eprintln!("Door not opened: {e}");
            return Err(e.into());
        }
    }

    if accessory.state() == AccessoryState::Opening {
        states
            .wait_for(|state| *state == AccessoryState::Open)
            .await?;
    }
    println!("State: {:?}", accessory.state());

    dhip_client::utils::metrics::global_metrics().log_metrics();
    Ok(())
}
