//! DenonBuilder -- fluent builder for constructing [`DenonReceiver`] instances.
//!
//! Separates configuration from construction so that callers can set the
//! serial port, timeouts and previously confirmed zones before the link is
//! opened. Serial framing (9600 8N1) is fixed by the protocol and is not
//! configurable.
//!
//! # Example
//!
//! ```no_run
//! use avrlib_denon::builder::DenonBuilder;
//! use avrlib_core::ZoneId;
//!
//! # async fn example() -> avrlib_core::Result<()> {
//! let receiver = DenonBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .zones(&[ZoneId::Zone2])
//!     .build()
//!     .await?;
//! println!("{:?}", receiver.state().await);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::{info, warn};

use avrlib_core::error::{Error, Result};
use avrlib_core::transport::Transport;
use avrlib_core::types::ZoneId;

use crate::io::{DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
use crate::receiver::DenonReceiver;

/// Fluent builder for [`DenonReceiver`].
pub struct DenonBuilder {
    serial_port: Option<String>,
    read_timeout: Duration,
    write_timeout: Duration,
    zones: Vec<ZoneId>,
    verify_device: bool,
    refresh_on_connect: bool,
}

impl DenonBuilder {
    pub fn new() -> Self {
        DenonBuilder {
            serial_port: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            zones: Vec::new(),
            verify_device: true,
            refresh_on_connect: true,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Idle gap that ends a response (default: 1s).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Bound on each single-byte write (default: 1s).
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Zones confirmed by an earlier discovery run.
    ///
    /// `Z3` and `Z1` name the same hardware zone, so a list holding both is
    /// rejected at build time, as is a list with duplicates.
    pub fn zones(mut self, zones: &[ZoneId]) -> Self {
        self.zones = zones.to_vec();
        self
    }

    /// Probe with `PW?` and reject devices that do not answer with a power
    /// token (default: true).
    pub fn verify_device(mut self, verify: bool) -> Self {
        self.verify_device = verify;
        self
    }

    /// Seed the cache with a full refresh after connecting (default: true).
    pub fn refresh_on_connect(mut self, refresh: bool) -> Self {
        self.refresh_on_connect = refresh;
        self
    }

    /// Build a [`DenonReceiver`] over the given transport.
    ///
    /// This is the primary entry point for testing (pass a `MockTransport`)
    /// and for custom links.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] for an impossible zone list, before any
    /// traffic. [`Error::UnsupportedDevice`] if device verification fails,
    /// in which case the transport is closed. Errors from the initial
    /// refresh are returned as-is.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<DenonReceiver> {
        validate_zones(&self.zones)?;
        let receiver = DenonReceiver::new(transport, self.read_timeout, self.write_timeout);
        receiver.register_zones(&self.zones).await?;

        if self.verify_device {
            match receiver.identify().await {
                Ok(power) => info!(power = %power, "receiver identified"),
                Err(e) => {
                    warn!(error = %e, "device verification failed");
                    if let Err(close_err) = receiver.close().await {
                        warn!(error = %close_err, "failed to close transport");
                    }
                    return Err(e);
                }
            }
        }

        if self.refresh_on_connect {
            receiver.refresh_all().await?;
        }
        Ok(receiver)
    }

    /// Build a [`DenonReceiver`] over a serial port.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] without a port or for an impossible zone
    /// list, [`Error::Connection`] if the port cannot be opened.
    pub async fn build(self) -> Result<DenonReceiver> {
        validate_zones(&self.zones)?;
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;

        let transport = avrlib_transport::SerialTransport::open(port).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}

/// Reject duplicate zones and the `Z3`/`Z1` pair.
fn validate_zones(zones: &[ZoneId]) -> Result<()> {
    for (i, zone) in zones.iter().enumerate() {
        if zones[..i].contains(zone) {
            return Err(Error::InvalidParameter(format!("zone {zone} listed twice")));
        }
    }
    if zones.contains(&ZoneId::Zone3) && zones.contains(&ZoneId::Zone1) {
        return Err(Error::InvalidParameter(
            "Z3 and Z1 name the same zone; configure only one".into(),
        ));
    }
    Ok(())
}

impl Default for DenonBuilder {
    fn default() -> Self {
        Self::new()
    }
}
