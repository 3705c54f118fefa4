//! Watch a receiver for changes made from its front panel or remote.
//!
//! Refreshes the cache on a fixed interval and prints every change event.
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=avrlib_denon=debug cargo run -p avrlib --example monitor -- /dev/ttyUSB0
//! ```

use std::sync::Arc;
use std::time::Duration;

use avrlib::{CodeTable, DenonBuilder, ReceiverEvent};
use tracing_subscriber::EnvFilter;

const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    println!("Connecting to {port}...");

    let receiver = Arc::new(DenonBuilder::new().serial_port(&port).build().await?);
    let zones = receiver.discover_zones().await?;
    println!("Zones: {zones:?}");

    let inputs = CodeTable::default_inputs();
    let modes = CodeTable::default_sound_modes();
    let state = receiver.state().await;
    println!(
        "Power {} | volume {}/{} | input {} | mode {}",
        state.power,
        state.volume,
        state.volume_max,
        inputs.label(&state.source).unwrap_or(&state.source),
        modes.label(&state.sound_mode).unwrap_or(&state.sound_mode),
    );

    let poller = Arc::clone(&receiver);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REFRESH_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = poller.refresh_all().await {
                eprintln!("refresh failed: {e}");
            }
        }
    });

    let mut events = receiver.subscribe();
    loop {
        match events.recv().await {
            Ok(ReceiverEvent::Refreshed) => {}
            Ok(ReceiverEvent::SourceChanged { code }) => {
                println!("input -> {}", inputs.label(&code).unwrap_or(&code));
            }
            Ok(ReceiverEvent::SoundModeChanged { code }) => {
                println!("sound mode -> {}", modes.label(&code).unwrap_or(&code));
            }
            Ok(event) => println!("{event:?}"),
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                println!("missed {n} events");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
    Ok(())
}
