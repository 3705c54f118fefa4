//! DenonReceiver -- the stateful driver for one serial connection.
//!
//! All traffic goes through [`DenonReceiver::execute`], which holds the
//! transport lock for the whole write-then-read exchange. The protocol has
//! no request/response correlation, so releasing the lock between the write
//! and the read could hand one caller another caller's response lines.
//!
//! Each exchange runs on its own spawned task that owns the lock guard.
//! Dropping the caller's future therefore never abandons the link
//! half-way through an exchange; the task finishes (bounded by the write
//! and read timeouts) and releases the lock.
//!
//! The [`DeviceState`] cache lives behind a separate mutex so that
//! [`DenonReceiver::state`] never waits for serial I/O. It is only mutated
//! by the task that currently holds the transport lock. A snapshot taken
//! while a refresh is running may mix old and new values.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};
use tracing::{debug, info};

use avrlib_core::error::{Error, Result};
use avrlib_core::events::ReceiverEvent;
use avrlib_core::transport::Transport;
use avrlib_core::types::{ExecuteOptions, PowerState, Reply, ZoneId};

use crate::commands;
use crate::io::{self, LineReader};
use crate::parser::{self, StateDelta, ZONE_VOLUME_MAX};
use crate::state::{DeviceState, ZoneState};

/// Capacity of the change-event channel.
const EVENT_CAPACITY: usize = 256;

/// Exclusive access to the link plus everything an exchange touches.
///
/// Holding a `Link` is holding the serializer lock.
pub(crate) struct Link {
    transport: OwnedMutexGuard<Box<dyn Transport>>,
    state: Arc<Mutex<DeviceState>>,
    event_tx: broadcast::Sender<ReceiverEvent>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl Link {
    /// Write `command` and, if asked, collect every response line.
    pub(crate) async fn round_trip(
        &mut self,
        command: &str,
        expect_response: bool,
    ) -> Result<Vec<String>> {
        self.write(command).await?;
        if !expect_response {
            return Ok(Vec::new());
        }
        self.read_response(command).await
    }

    async fn write(&mut self, command: &str) -> Result<()> {
        debug!(command = %command, "sending command");
        io::write_command(&mut **self.transport, command, self.write_timeout).await
    }

    async fn read_response(&mut self, command: &str) -> Result<Vec<String>> {
        let lines = LineReader::new(&mut **self.transport, self.read_timeout)
            .read_all()
            .await?;
        debug!(command = %command, lines = lines.len(), "response complete");
        Ok(lines)
    }

    /// One full exchange, cache updates included.
    ///
    /// The command's own effect is applied as soon as it is written, before
    /// the response is read.
    pub(crate) async fn exchange(&mut self, command: &str, options: ExecuteOptions) -> Result<Reply> {
        self.write(command).await?;

        let zones = self.zones().await;
        if options.update_cache {
            self.apply(parser::interpret_command(command, &zones)).await;
        }
        if !options.expect_response {
            return Ok(Reply::None);
        }

        let lines = self.read_response(command).await?;
        if options.update_cache {
            self.apply(parser::interpret_response(command, &lines, &zones))
                .await;
        }

        Ok(if options.want_all_lines {
            Reply::Lines(lines)
        } else {
            lines.into_iter().next().map_or(Reply::None, Reply::Line)
        })
    }

    pub(crate) async fn zones(&self) -> Vec<ZoneId> {
        self.state.lock().await.zone_ids()
    }

    /// Apply a delta to the cache and publish the resulting events.
    pub(crate) async fn apply(&self, delta: StateDelta) {
        if delta.is_empty() {
            return;
        }
        let events = self.state.lock().await.apply(&delta);
        self.publish(events);
    }

    pub(crate) async fn register_zone(&self, zone: ZoneId) {
        let event = self.state.lock().await.register_zone(zone);
        self.publish(event);
    }

    fn publish(&self, events: impl IntoIterator<Item = ReceiverEvent>) {
        for event in events {
            let _ = self.event_tx.send(event);
        }
    }
}

/// A connected Denon receiver controlled over RS-232.
///
/// Constructed via [`DenonBuilder`](crate::builder::DenonBuilder). One
/// instance owns one connection; share it (e.g. behind an `Arc`) between
/// every caller that talks to the same hardware.
pub struct DenonReceiver {
    transport: Arc<Mutex<Box<dyn Transport>>>,
    state: Arc<Mutex<DeviceState>>,
    event_tx: broadcast::Sender<ReceiverEvent>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl DenonReceiver {
    /// Create a driver over an already-open transport.
    ///
    /// This is called by [`DenonBuilder`](crate::builder::DenonBuilder);
    /// callers should use the builder API instead.
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        DenonReceiver {
            transport: Arc::new(Mutex::new(transport)),
            state: Arc::new(Mutex::new(DeviceState::new())),
            event_tx,
            read_timeout,
            write_timeout,
        }
    }

    /// Run `f` on a spawned task that holds the serializer lock.
    pub(crate) async fn with_link<T, F, Fut>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Link) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let link = Link {
            transport: Arc::clone(&self.transport).lock_owned().await,
            state: Arc::clone(&self.state),
            event_tx: self.event_tx.clone(),
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        };
        tokio::spawn(f(link))
            .await
            .map_err(|e| Error::Transport(format!("exchange task failed: {e}")))?
    }

    /// Send one command and optionally collect its response.
    ///
    /// - With `expect_response == false` this returns [`Reply::None`] as soon
    ///   as the terminator has been written.
    /// - Otherwise lines are read until the idle gap. The reply is the first
    ///   line ([`Reply::Line`], or [`Reply::None`] if the device stayed
    ///   silent) or, with `want_all_lines`, every line ([`Reply::Lines`]).
    /// - With `update_cache` the command is applied to the cache right after
    ///   the write, and the response lines are applied over it afterwards.
    ///
    /// # Errors
    ///
    /// [`Error::WriteTimeout`] if a byte write stalls, or whatever the
    /// transport reports. Silence is not an error.
    pub async fn execute(&self, command: &str, options: ExecuteOptions) -> Result<Reply> {
        let command = command.to_string();
        self.with_link(move |mut link| async move { link.exchange(&command, options).await })
            .await
    }

    /// Snapshot of the cached device state.
    pub async fn state(&self) -> DeviceState {
        self.state.lock().await.clone()
    }

    /// Confirmed zones, in probe order.
    pub async fn zones(&self) -> Vec<ZoneId> {
        self.state.lock().await.zone_ids()
    }

    /// Subscribe to cache change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReceiverEvent> {
        self.event_tx.subscribe()
    }

    /// Probe the device with `PW?` without touching the cache.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedDevice`] if the answer is not `PWON` or
    /// `PWSTANDBY` (including no answer at all).
    pub async fn identify(&self) -> Result<PowerState> {
        let reply = self
            .execute(
                &commands::cmd_query_power(),
                ExecuteOptions::query().without_cache_update(),
            )
            .await?;
        match reply.line() {
            Some(line) => PowerState::from_wire(line).ok_or_else(|| {
                Error::UnsupportedDevice(format!("power query answered {line:?}"))
            }),
            None => Err(Error::UnsupportedDevice(
                "no answer to power query".into(),
            )),
        }
    }

    /// Re-query everything the cache holds and overwrite it.
    ///
    /// Issues `PW?`, `MV?`, `MU?`, `SI?`, `MS?` and one status query per
    /// confirmed zone, then emits [`ReceiverEvent::Refreshed`]. Each query
    /// takes the lock separately, so interactive commands may run in
    /// between.
    pub async fn refresh_all(&self) -> Result<()> {
        let main = [
            commands::cmd_query_power(),
            commands::cmd_query_volume(),
            commands::cmd_query_mute(),
            commands::cmd_query_source(),
            commands::cmd_query_sound_mode(),
        ];
        for command in &main {
            self.execute(command, ExecuteOptions::query_all()).await?;
        }
        for zone in self.zones().await {
            self.execute(&commands::cmd_query_zone(zone), ExecuteOptions::query_all())
                .await?;
        }
        info!("receiver state refreshed");
        let _ = self.event_tx.send(ReceiverEvent::Refreshed);
        Ok(())
    }

    /// Mark zones as confirmed without probing, e.g. from saved setup.
    pub(crate) async fn register_zones(&self, zones: &[ZoneId]) -> Result<()> {
        let zones = zones.to_vec();
        self.with_link(move |link| async move {
            for zone in zones {
                link.register_zone(zone).await;
            }
            Ok(())
        })
        .await
    }

    /// Close the transport. Later commands fail with
    /// [`Error::NotConnected`].
    pub async fn close(&self) -> Result<()> {
        info!("closing receiver connection");
        self.transport.lock().await.close().await
    }

    /// Whether the transport reports an open link.
    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_connected()
    }

    async fn send(&self, command: String) -> Result<()> {
        self.execute(&command, ExecuteOptions::command()).await?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Main zone helpers
    // ---------------------------------------------------------------

    /// Switch the receiver on.
    pub async fn power_on(&self) -> Result<()> {
        self.send(commands::cmd_power(true)).await
    }

    /// Put the receiver in standby.
    pub async fn power_off(&self) -> Result<()> {
        self.send(commands::cmd_power(false)).await
    }

    /// Step the master volume up by one.
    pub async fn volume_up(&self) -> Result<()> {
        self.send(commands::cmd_volume_up()).await
    }

    /// Step the master volume down by one.
    pub async fn volume_down(&self) -> Result<()> {
        self.send(commands::cmd_volume_down()).await
    }

    /// Set the absolute master volume (`0..=99` on the wire).
    pub async fn set_volume(&self, volume: u8) -> Result<()> {
        self.send(commands::cmd_set_volume(volume)?).await
    }

    /// Set the master volume as a fraction of the cached `volume_max`.
    pub async fn set_volume_level(&self, level: f32) -> Result<()> {
        let max = self.state.lock().await.volume_max;
        self.set_volume(commands::volume_from_level(level, max)?)
            .await
    }

    /// Mute or unmute the main zone.
    pub async fn set_mute(&self, muted: bool) -> Result<()> {
        self.send(commands::cmd_mute(muted)).await
    }

    /// Select an input by wire code (see [`CodeTable`](crate::CodeTable)).
    pub async fn select_source(&self, code: &str) -> Result<()> {
        self.send(commands::cmd_select_source(code)?).await
    }

    /// Select a surround mode by wire code (see [`CodeTable`](crate::CodeTable)).
    pub async fn select_sound_mode(&self, code: &str) -> Result<()> {
        self.send(commands::cmd_select_sound_mode(code)?).await
    }

    /// Tune to a preset (`"A1"`) or FM frequency (`"9850"`).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] unless the cached source is the tuner and
    /// the media id is valid (see [`commands::cmd_tuner`]).
    pub async fn play_tuner(&self, media_id: &str) -> Result<()> {
        let source = self.state.lock().await.source.clone();
        if source != commands::TUNER_SOURCE {
            return Err(Error::InvalidParameter(format!(
                "tuner playback needs source {}, current source is {source:?}",
                commands::TUNER_SOURCE
            )));
        }
        self.send(commands::cmd_tuner(media_id)?).await
    }

    /// Commands addressed to one auxiliary zone.
    pub fn zone(&self, zone: ZoneId) -> ZoneControl<'_> {
        ZoneControl {
            receiver: self,
            zone,
        }
    }
}

/// Commands for one auxiliary zone, borrowed from a [`DenonReceiver`].
///
/// Commands to a zone that discovery did not confirm are still sent, but
/// they never reach the cache.
pub struct ZoneControl<'a> {
    receiver: &'a DenonReceiver,
    zone: ZoneId,
}

impl ZoneControl<'_> {
    pub fn id(&self) -> ZoneId {
        self.zone
    }

    /// Cached zone state, or `None` if the zone is not confirmed.
    pub async fn state(&self) -> Option<ZoneState> {
        self.receiver.state.lock().await.zone(self.zone).cloned()
    }

    pub async fn power_on(&self) -> Result<()> {
        self.receiver.send(commands::cmd_zone_power(self.zone, true)).await
    }

    pub async fn power_off(&self) -> Result<()> {
        self.receiver.send(commands::cmd_zone_power(self.zone, false)).await
    }

    pub async fn volume_up(&self) -> Result<()> {
        self.receiver.send(commands::cmd_zone_volume_up(self.zone)).await
    }

    pub async fn volume_down(&self) -> Result<()> {
        self.receiver.send(commands::cmd_zone_volume_down(self.zone)).await
    }

    pub async fn set_volume(&self, volume: u8) -> Result<()> {
        self.receiver
            .send(commands::cmd_zone_set_volume(self.zone, volume)?)
            .await
    }

    /// Set the zone volume as a fraction of the fixed zone scale.
    pub async fn set_volume_level(&self, level: f32) -> Result<()> {
        self.set_volume(commands::volume_from_level(level, ZONE_VOLUME_MAX)?)
            .await
    }

    pub async fn select_source(&self, code: &str) -> Result<()> {
        self.receiver
            .send(commands::cmd_zone_select_source(self.zone, code)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrlib_core::ZonePower;
    use avrlib_test_harness::{MockTransport, WireEvent};

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn receiver(mock: MockTransport) -> DenonReceiver {
        DenonReceiver::new(Box::new(mock), TIMEOUT, TIMEOUT)
    }

    // ---------------------------------------------------------------
    // execute
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn command_without_response_returns_none() {
        let mut mock = MockTransport::new();
        mock.expect("PWON", &[]);
        let rx = receiver(mock);

        let reply = rx.execute("PWON", ExecuteOptions::command()).await.unwrap();
        assert_eq!(reply, Reply::None);
        assert_eq!(rx.state().await.power, PowerState::On);
    }

    #[tokio::test]
    async fn source_updates_optimistically_without_reading() {
        let mut mock = MockTransport::new();
        // The device would echo, but nothing is read.
        mock.expect("SIPHONO", &["SIPHONO"]);
        let handle = mock.handle();
        let rx = receiver(mock);

        rx.execute("SIPHONO", ExecuteOptions::command()).await.unwrap();

        assert_eq!(rx.state().await.source, "PHONO");
        assert!(
            handle
                .wire_log()
                .iter()
                .all(|event| matches!(event, WireEvent::Tx(_)))
        );
    }

    #[tokio::test]
    async fn query_returns_first_line() {
        let mut mock = MockTransport::new();
        mock.expect("MV?", &["MVMAX 80", "MV45"]);
        let rx = receiver(mock);

        let reply = rx.execute("MV?", ExecuteOptions::query()).await.unwrap();
        assert_eq!(reply, Reply::Line("MVMAX 80".into()));
        let state = rx.state().await;
        assert_eq!(state.volume_max, 80);
        assert_eq!(state.volume, 45);
    }

    #[tokio::test]
    async fn query_all_returns_every_line() {
        let mut mock = MockTransport::new();
        mock.expect("MV?", &["MV45", "MVMAX 80"]);
        let rx = receiver(mock);

        let reply = rx.execute("MV?", ExecuteOptions::query_all()).await.unwrap();
        assert_eq!(reply, Reply::Lines(vec!["MV45".into(), "MVMAX 80".into()]));
        let state = rx.state().await;
        assert_eq!(state.volume_max, 80);
        assert_eq!(state.volume, 45);
    }

    #[tokio::test]
    async fn silent_query() {
        let mut mock = MockTransport::new();
        mock.expect("Z3?", &[]);
        mock.expect("Z3?", &[]);
        let rx = receiver(mock);

        assert_eq!(rx.execute("Z3?", ExecuteOptions::query()).await.unwrap(), Reply::None);
        assert_eq!(
            rx.execute("Z3?", ExecuteOptions::query_all()).await.unwrap(),
            Reply::Lines(Vec::new())
        );
    }

    #[tokio::test]
    async fn without_cache_update_leaves_state_alone() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", &["PWON"]);
        let rx = receiver(mock);

        rx.execute("PW?", ExecuteOptions::query().without_cache_update())
            .await
            .unwrap();
        assert_eq!(rx.state().await.power, PowerState::Unknown);
    }

    #[tokio::test]
    async fn response_overwrites_optimistic_update() {
        let mut mock = MockTransport::new();
        // The receiver refuses the level and reports the old one.
        mock.expect("MV70", &["MV40"]);
        let rx = receiver(mock);

        rx.execute("MV70", ExecuteOptions::query()).await.unwrap();
        assert_eq!(rx.state().await.volume, 40);
    }

    #[tokio::test]
    async fn volume_up_clamps_at_max() {
        let mut mock = MockTransport::new();
        mock.expect("MV60", &[]);
        mock.expect("MVUP", &[]);
        let rx = receiver(mock);

        rx.set_volume(60).await.unwrap();
        rx.volume_up().await.unwrap();
        assert_eq!(rx.state().await.volume, 60);
    }

    #[tokio::test]
    async fn volume_down_at_zero_stays_zero() {
        let mut mock = MockTransport::new();
        mock.expect("MVDOWN", &[]);
        let rx = receiver(mock);

        rx.volume_down().await.unwrap();
        assert_eq!(rx.state().await.volume, 0);
    }

    #[tokio::test]
    async fn write_stall_is_write_timeout() {
        let mut mock = MockTransport::new();
        mock.stall_writes(true);
        let rx = receiver(mock);

        let result = rx.execute("PWON", ExecuteOptions::command()).await;
        assert!(matches!(result, Err(Error::WriteTimeout)));
        // The lock was released; the cache was not touched.
        assert_eq!(rx.state().await.power, PowerState::Unknown);
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let mock = MockTransport::new();
        let rx = receiver(mock);

        let result = rx.execute("PWON", ExecuteOptions::command()).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn concurrent_commands_do_not_interleave() {
        let mut mock = MockTransport::new().with_response_delay(Duration::from_millis(20));
        mock.expect("MV?", &["MV45"]);
        mock.expect("PW?", &["PWON"]);
        let handle = mock.handle();
        let rx = receiver(mock);

        let (a, b) = tokio::join!(
            rx.execute("MV?", ExecuteOptions::query()),
            rx.execute("PW?", ExecuteOptions::query()),
        );
        assert_eq!(a.unwrap(), Reply::Line("MV45".into()));
        assert_eq!(b.unwrap(), Reply::Line("PWON".into()));

        // Every byte of the first exchange, response included, precedes
        // the first byte of the second command.
        let log = handle.wire_log();
        let first_rx = log
            .iter()
            .position(|e| matches!(e, WireEvent::Rx(_)))
            .unwrap();
        let tx_before: Vec<u8> = log[..first_rx]
            .iter()
            .filter_map(|e| match e {
                WireEvent::Tx(b) => Some(*b),
                WireEvent::Rx(_) => None,
            })
            .collect();
        assert_eq!(tx_before, b"MV?\r");
        let second_tx = log[first_rx..]
            .iter()
            .position(|e| matches!(e, WireEvent::Tx(_)))
            .unwrap()
            + first_rx;
        assert!(
            log[first_rx..second_tx]
                .iter()
                .all(|e| matches!(e, WireEvent::Rx(_)))
        );
        assert_eq!(handle.sent_commands(), vec!["MV?", "PW?"]);
    }

    #[tokio::test]
    async fn exchange_and_round_trip_share_wire_traffic() {
        let mut mock = MockTransport::new();
        mock.respond("MV?", &["MVMAX 80", "MV45"]);
        let handle = mock.handle();
        let rx = receiver(mock);

        let reply = rx.execute("MV?", ExecuteOptions::query_all()).await.unwrap();
        let exchanged = handle.wire_log();
        let lines = rx
            .with_link(|mut link| async move { link.round_trip("MV?", true).await })
            .await
            .unwrap();

        assert_eq!(reply, Reply::Lines(lines));
        assert_eq!(handle.wire_log()[exchanged.len()..], exchanged[..]);
        assert_eq!(handle.sent_commands(), vec!["MV?", "MV?"]);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_abort_exchange() {
        let mut mock = MockTransport::new().with_response_delay(Duration::from_millis(30));
        mock.expect("SI?", &["SICD"]);
        mock.expect("PW?", &["PWON"]);
        let rx = receiver(mock);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            rx.execute("SI?", ExecuteOptions::query()),
        )
        .await;
        assert!(abandoned.is_err());

        // The next exchange waits for the abandoned one and gets its own
        // answer, not the leftover SICD.
        let reply = rx.execute("PW?", ExecuteOptions::query()).await.unwrap();
        assert_eq!(reply, Reply::Line("PWON".into()));
        assert_eq!(rx.state().await.source, "CD");
    }

    // ---------------------------------------------------------------
    // Zones
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn zone_volume_line_is_volume() {
        let mut mock = MockTransport::new();
        mock.expect("Z2?", &["Z2ON", "Z210"]);
        let rx = receiver(mock);
        rx.register_zones(&[ZoneId::Zone2]).await.unwrap();

        rx.execute("Z2?", ExecuteOptions::query_all()).await.unwrap();
        let zone = rx.zone(ZoneId::Zone2).state().await.unwrap();
        assert_eq!(zone.volume, 10);
        assert_eq!(zone.source, "");
        assert_eq!(zone.power, ZonePower::On);
    }

    #[tokio::test]
    async fn zone_source_line_is_source() {
        let mut mock = MockTransport::new();
        mock.expect("Z2?", &["Z2DVD"]);
        let rx = receiver(mock);
        rx.register_zones(&[ZoneId::Zone2]).await.unwrap();

        rx.execute("Z2?", ExecuteOptions::query_all()).await.unwrap();
        assert_eq!(rx.zone(ZoneId::Zone2).state().await.unwrap().source, "DVD");
    }

    #[tokio::test]
    async fn unconfirmed_zone_is_never_cached() {
        let mut mock = MockTransport::new();
        mock.expect("Z3ON", &[]);
        mock.expect("Z3?", &["Z3ON", "Z350"]);
        let rx = receiver(mock);

        rx.zone(ZoneId::Zone3).power_on().await.unwrap();
        rx.execute("Z3?", ExecuteOptions::query_all()).await.unwrap();
        assert!(rx.state().await.zones.is_empty());
        assert!(rx.zone(ZoneId::Zone3).state().await.is_none());
    }

    #[tokio::test]
    async fn zone_helpers() {
        let mut mock = MockTransport::new();
        mock.expect("Z2ON", &[]);
        mock.expect("Z230", &[]);
        mock.expect("Z2UP", &[]);
        mock.expect("Z2CD", &[]);
        mock.expect("Z2OFF", &[]);
        let rx = receiver(mock);
        rx.register_zones(&[ZoneId::Zone2]).await.unwrap();

        let zone = rx.zone(ZoneId::Zone2);
        assert_eq!(zone.id(), ZoneId::Zone2);
        zone.power_on().await.unwrap();
        zone.set_volume_level(0.5).await.unwrap();
        zone.volume_up().await.unwrap();
        zone.select_source("CD").await.unwrap();
        zone.power_off().await.unwrap();

        let state = zone.state().await.unwrap();
        assert_eq!(state.power, ZonePower::Off);
        assert_eq!(state.volume, 31);
        assert_eq!(state.source, "CD");
    }

    // ---------------------------------------------------------------
    // refresh_all / identify / helpers
    // ---------------------------------------------------------------

    fn script_refresh(mock: &MockTransport, volume: &str, source: &str, zone_volume: &str) {
        let handle = mock.handle();
        handle.respond("PW?", &["PWON"]);
        handle.respond("MV?", &[volume, "MVMAX 80"]);
        handle.respond("MU?", &["MUOFF"]);
        handle.respond("SI?", &[source]);
        handle.respond("MS?", &["MSSTEREO"]);
        handle.respond("Z2?", &["Z2ON", "Z2TUNER", zone_volume]);
    }

    #[tokio::test]
    async fn refresh_all_overwrites_stale_cache() {
        let mock = MockTransport::new();
        script_refresh(&mock, "MV30", "SICD", "Z220");
        let handle = mock.handle();
        let rx = receiver(mock);
        rx.register_zones(&[ZoneId::Zone2]).await.unwrap();

        rx.refresh_all().await.unwrap();
        let state = rx.state().await;
        assert_eq!(state.volume, 30);
        assert_eq!(state.source, "CD");
        assert_eq!(state.zone(ZoneId::Zone2).unwrap().volume, 20);

        // Changed from the front panel.
        handle.respond("MV?", &["MV55", "MVMAX 80"]);
        handle.respond("SI?", &["SIDVD"]);
        handle.respond("Z2?", &["Z2OFF", "Z2CD", "Z235"]);

        let mut events = rx.subscribe();
        rx.refresh_all().await.unwrap();
        let state = rx.state().await;
        assert_eq!(state.power, PowerState::On);
        assert_eq!(state.volume, 55);
        assert_eq!(state.volume_max, 80);
        assert!(!state.muted);
        assert_eq!(state.source, "DVD");
        assert_eq!(state.sound_mode, "STEREO");
        let z2 = state.zone(ZoneId::Zone2).unwrap();
        assert_eq!(z2.power, ZonePower::Off);
        assert_eq!(z2.source, "CD");
        assert_eq!(z2.volume, 35);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&ReceiverEvent::VolumeChanged { volume: 55 }));
        assert!(seen.contains(&ReceiverEvent::SourceChanged { code: "DVD".into() }));
        assert_eq!(seen.last(), Some(&ReceiverEvent::Refreshed));
        assert_eq!(
            handle.sent_commands()[6..],
            ["PW?", "MV?", "MU?", "SI?", "MS?", "Z2?"]
        );
    }

    #[tokio::test]
    async fn identify_accepts_power_tokens() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", &["PWSTANDBY"]);
        let rx = receiver(mock);

        assert_eq!(rx.identify().await.unwrap(), PowerState::Standby);
        assert_eq!(rx.state().await.power, PowerState::Unknown);
    }

    #[tokio::test]
    async fn identify_rejects_other_answers() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", &["@PWR:2"]);
        mock.expect("PW?", &[]);
        let rx = receiver(mock);

        assert!(matches!(rx.identify().await, Err(Error::UnsupportedDevice(_))));
        assert!(matches!(rx.identify().await, Err(Error::UnsupportedDevice(_))));
    }

    #[tokio::test]
    async fn set_volume_level_uses_reported_max() {
        let mut mock = MockTransport::new();
        mock.expect("MV?", &["MVMAX 80", "MV10"]);
        mock.expect("MV40", &[]);
        let rx = receiver(mock);

        rx.execute("MV?", ExecuteOptions::query_all()).await.unwrap();
        rx.set_volume_level(0.5).await.unwrap();
        let state = rx.state().await;
        assert_eq!(state.volume, 40);
        assert!((state.volume_level() - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn set_volume_level_rejects_bad_fraction() {
        let rx = receiver(MockTransport::new());
        assert!(matches!(
            rx.set_volume_level(2.0).await,
            Err(Error::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn mute_and_sound_mode_helpers() {
        let mut mock = MockTransport::new();
        mock.expect("MUON", &[]);
        mock.expect("MSDOLBY DIGITAL", &[]);
        mock.expect("PWSTANDBY", &[]);
        let rx = receiver(mock);

        rx.set_mute(true).await.unwrap();
        rx.select_sound_mode("DOLBY DIGITAL").await.unwrap();
        rx.power_off().await.unwrap();
        let state = rx.state().await;
        assert!(state.muted);
        assert_eq!(state.sound_mode, "DOLBY DIGITAL");
        assert_eq!(state.power, PowerState::Standby);
    }

    #[tokio::test]
    async fn play_tuner_requires_tuner_source() {
        let mut mock = MockTransport::new();
        mock.expect("SITUNER", &[]);
        mock.expect("TPA1", &[]);
        mock.expect("TF009850", &[]);
        let handle = mock.handle();
        let rx = receiver(mock);

        assert!(matches!(
            rx.play_tuner("A1").await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(handle.sent_commands().is_empty());

        rx.select_source("TUNER").await.unwrap();
        rx.play_tuner("A1").await.unwrap();
        rx.play_tuner("9850").await.unwrap();
        assert!(matches!(
            rx.play_tuner("Z9").await,
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(handle.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn closed_receiver_is_not_connected() {
        let mut mock = MockTransport::new();
        mock.expect("PWON", &[]);
        let rx = receiver(mock);

        assert!(rx.is_connected().await);
        rx.close().await.unwrap();
        assert!(!rx.is_connected().await);
        assert!(matches!(rx.power_on().await, Err(Error::NotConnected)));
    }
}
