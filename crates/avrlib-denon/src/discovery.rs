//! Zone discovery.
//!
//! Auxiliary zones are found by sending each candidate's status query and
//! checking whether any line comes back. `Z2` is probed first, then `Z3`;
//! `Z1` is only probed when `Z3` stays silent, since the two are alternate
//! names for the same third zone and a device answers to at most one.
//!
//! The whole probe sequence runs under a single hold of the serializer
//! lock. A confirmed zone is registered in the cache and seeded with the
//! lines that confirmed it.

use tracing::{debug, info};

use avrlib_core::{Result, ZoneId};

use crate::commands;
use crate::parser;
use crate::receiver::{DenonReceiver, Link};

impl DenonReceiver {
    /// Probe for auxiliary zones and register the ones that answer.
    ///
    /// Returns the confirmed identifiers in probe order: `[]`, `[Z2]`,
    /// `[Z2, Z3]`, `[Z2, Z1]`, `[Z3]` or `[Z1]`. Meant to run once during
    /// setup; normal operation never adds zones.
    pub async fn discover_zones(&self) -> Result<Vec<ZoneId>> {
        self.with_link(discover).await
    }
}

async fn discover(mut link: Link) -> Result<Vec<ZoneId>> {
    let mut found = Vec::new();
    for zone in [ZoneId::Zone2, ZoneId::Zone3] {
        if probe(&mut link, zone).await? {
            found.push(zone);
        }
    }
    if !found.contains(&ZoneId::Zone3) && probe(&mut link, ZoneId::Zone1).await? {
        found.push(ZoneId::Zone1);
    }
    info!(zones = ?found, "zone discovery finished");
    Ok(found)
}

async fn probe(link: &mut Link, zone: ZoneId) -> Result<bool> {
    let command = commands::cmd_query_zone(zone);
    let lines = link.round_trip(&command, true).await?;
    if lines.is_empty() {
        debug!(zone = %zone, "no answer to zone probe");
        return Ok(false);
    }

    debug!(zone = %zone, lines = ?lines, "zone answered");
    link.register_zone(zone).await;
    let zones = link.zones().await;
    link.apply(parser::interpret_response(&command, &lines, &zones))
        .await;
    Ok(true)
}
