// avrlib test application -- CLI tool for exercising the Denon driver
// against real hardware or a scripted mock receiver.
//
// Usage:
//   avrlib-test-app --port /dev/ttyUSB0 status
//   avrlib-test-app --port /dev/ttyUSB0 discover
//   avrlib-test-app --port /dev/ttyUSB0 --zone Z2 zone Z2 volume 30
//   avrlib-test-app --port /dev/ttyUSB0 send MV? --all
//   avrlib-test-app --port /dev/ttyUSB0 watch --interval 60
//   avrlib-test-app --mock -v status
//   avrlib-test-app sources

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use avrlib::denon::commands;
use avrlib::{CodeTable, DenonBuilder, DenonReceiver, ExecuteOptions, Reply, ZoneId};
use avrlib_test_harness::{MockHandle, MockTransport};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// avrlib test application -- drives a Denon receiver from the command line.
#[derive(Parser)]
#[command(name = "avrlib-test-app", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3). Required unless --mock.
    #[arg(long)]
    port: Option<String>,

    /// Use a scripted mock receiver instead of a serial port.
    #[arg(long)]
    mock: bool,

    /// Zones confirmed by an earlier `discover` (Z2, Z3, Z1). Repeatable.
    #[arg(long = "zone", value_name = "ZONE")]
    zones: Vec<ZoneId>,

    /// Idle gap that ends a response, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    read_timeout_ms: u64,

    /// Per-byte write timeout, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    write_timeout_ms: u64,

    /// Skip the PW? device check on connect.
    #[arg(long)]
    no_verify: bool,

    /// Log protocol traffic (sets the default filter to debug).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the cached state after the initial refresh.
    Status,

    /// Probe for auxiliary zones.
    Discover,

    /// List the stock input and sound mode labels.
    Sources,

    /// Send a raw command.
    Send {
        /// Command text without the carriage return (e.g. MV?, SIPHONO).
        command: String,

        /// Read and print the first response line.
        #[arg(long)]
        response: bool,

        /// Read and print every response line.
        #[arg(long)]
        all: bool,

        /// Do not feed the exchange into the state cache.
        #[arg(long)]
        no_cache: bool,
    },

    /// Main zone power.
    Power {
        #[arg(value_enum)]
        state: OnOff,
    },

    /// Main zone volume.
    Volume {
        #[command(subcommand)]
        action: VolumeAction,
    },

    /// Main zone mute.
    Mute {
        #[arg(value_enum)]
        state: OnOff,
    },

    /// Select an input by label (see `sources`) or wire code.
    Source { name: String },

    /// Select a sound mode by label (see `sources`) or wire code.
    SoundMode { name: String },

    /// Tune to a preset (A1..G8) or FM frequency in 10 kHz units (9850).
    Tuner { media_id: String },

    /// Control an auxiliary zone.
    Zone {
        zone: ZoneId,
        #[command(subcommand)]
        action: ZoneAction,
    },

    /// Refresh periodically and print every change.
    Watch {
        /// Seconds between refreshes.
        #[arg(long, default_value_t = 60)]
        interval: u64,

        /// Stop after this many seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OnOff {
    On,
    Off,
}

impl OnOff {
    fn is_on(self) -> bool {
        matches!(self, OnOff::On)
    }
}

#[derive(Subcommand)]
enum VolumeAction {
    Up,
    Down,
    /// Absolute wire value (00-99).
    Set { value: u8 },
    /// Fraction of the reported maximum (0.0-1.0).
    Level { level: f32 },
}

#[derive(Subcommand)]
enum ZoneAction {
    Power {
        #[arg(value_enum)]
        state: OnOff,
    },
    Up,
    Down,
    /// Absolute wire value (00-99).
    Volume { value: u8 },
    /// Fraction of the zone scale (0.0-1.0).
    Level { level: f32 },
    /// Input by label or wire code.
    Source { name: String },
    /// Print the cached zone state.
    Status,
}

// ---------------------------------------------------------------------------
// Mock receiver
// ---------------------------------------------------------------------------

/// A receiver with zone 2, answering the status queries the driver issues.
fn mock_receiver() -> (MockTransport, MockHandle) {
    let mock = MockTransport::new();
    let handle = mock.handle();
    handle.respond("PW?", &["PWON"]);
    handle.respond("MV?", &["MV35", "MVMAX 80"]);
    handle.respond("MU?", &["MUOFF"]);
    handle.respond("SI?", &["SITUNER"]);
    handle.respond("MS?", &["MSSTEREO"]);
    handle.respond("Z2?", &["Z2ON", "Z2CD", "Z230"]);
    handle.respond("Z3?", &[]);
    handle.respond("Z1?", &[]);
    for command in [
        "PWON", "PWSTANDBY", "MVUP", "MVDOWN", "MUON", "MUOFF", "Z2ON", "Z2OFF", "Z2UP", "Z2DOWN",
    ] {
        handle.respond(command, &[]);
    }
    (mock, handle)
}

/// Let the mock accept whatever single command `cmd` is about to send.
fn script_mock(handle: &MockHandle, cli: &Cli) {
    let inputs = CodeTable::default_inputs();
    let modes = CodeTable::default_sound_modes();
    let command = match &cli.command {
        // Status queries keep their scripted answers.
        Command::Send { command, .. } if !command.ends_with('?') => Some(command.clone()),
        Command::Volume {
            action: VolumeAction::Set { value },
        } => commands::cmd_set_volume(*value).ok(),
        Command::Volume {
            action: VolumeAction::Level { level },
        } => commands::volume_from_level(*level, 80)
            .and_then(commands::cmd_set_volume)
            .ok(),
        Command::Source { name } => {
            commands::cmd_select_source(resolve(&inputs, name)).ok()
        }
        Command::SoundMode { name } => {
            commands::cmd_select_sound_mode(resolve(&modes, name)).ok()
        }
        Command::Tuner { media_id } => commands::cmd_tuner(media_id).ok(),
        Command::Zone { zone, action } => match action {
            ZoneAction::Volume { value } => commands::cmd_zone_set_volume(*zone, *value).ok(),
            ZoneAction::Level { level } => commands::volume_from_level(*level, 60)
                .and_then(|v| commands::cmd_zone_set_volume(*zone, v))
                .ok(),
            ZoneAction::Source { name } => {
                commands::cmd_zone_select_source(*zone, resolve(&inputs, name)).ok()
            }
            _ => None,
        },
        _ => None,
    };
    if let Some(command) = command {
        debug!(command = %command, "scripting mock reply");
        handle.respond(&command, &[]);
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

async fn create_receiver(cli: &Cli) -> Result<DenonReceiver> {
    let mut builder = DenonBuilder::new()
        .read_timeout(Duration::from_millis(cli.read_timeout_ms))
        .write_timeout(Duration::from_millis(cli.write_timeout_ms))
        .zones(&cli.zones)
        .verify_device(!cli.no_verify);

    if cli.mock {
        let (mock, handle) = mock_receiver();
        script_mock(&handle, cli);
        let receiver = builder
            .build_with_transport(Box::new(mock))
            .await
            .context("failed to build receiver with mock transport")?;
        println!("Connected (mock transport)");
        return Ok(receiver);
    }

    let port = cli
        .port
        .as_deref()
        .context("--port is required when not using --mock")?;
    builder = builder.serial_port(port);
    let receiver = builder
        .build()
        .await
        .with_context(|| format!("failed to connect to receiver on {port}"))?;
    println!("Connected to {port}");
    Ok(receiver)
}

/// Map a label to its wire code; unknown names are sent as codes.
fn resolve<'a>(table: &'a CodeTable, name: &'a str) -> &'a str {
    table.code(name).unwrap_or(name)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_status(receiver: &DenonReceiver) -> Result<()> {
    let inputs = CodeTable::default_inputs();
    let modes = CodeTable::default_sound_modes();
    let state = receiver.state().await;

    println!("Receiver:");
    println!("  Power:          {}", state.power);
    println!(
        "  Volume:         {} / {} ({:.0}%)",
        state.volume,
        state.volume_max,
        state.volume_level() * 100.0
    );
    println!("  Muted:          {}", state.muted);
    println!(
        "  Input:          {}",
        inputs.label(&state.source).unwrap_or(&state.source)
    );
    println!(
        "  Sound mode:     {}",
        modes.label(&state.sound_mode).unwrap_or(&state.sound_mode)
    );
    for (zone, zone_state) in &state.zones {
        println!(
            "  {zone}:             {} | volume {} | input {}",
            zone_state.power,
            zone_state.volume,
            inputs.label(&zone_state.source).unwrap_or(&zone_state.source)
        );
    }
    Ok(())
}

async fn cmd_discover(receiver: &DenonReceiver) -> Result<()> {
    let zones = receiver.discover_zones().await?;
    if zones.is_empty() {
        println!("No auxiliary zones answered.");
        return Ok(());
    }
    println!("Zones found (pass with --zone):");
    for zone in zones {
        println!("  {zone}");
    }
    Ok(())
}

fn cmd_sources() -> Result<()> {
    for (title, table) in [
        ("Inputs", CodeTable::default_inputs()),
        ("Sound modes", CodeTable::default_sound_modes()),
    ] {
        println!("{title}:");
        for label in table.labels() {
            println!("  {:<20} {}", label, table.code(label).unwrap_or_default());
        }
    }
    Ok(())
}

async fn cmd_send(
    receiver: &DenonReceiver,
    command: &str,
    response: bool,
    all: bool,
    no_cache: bool,
) -> Result<()> {
    let mut options = match (response, all) {
        (_, true) => ExecuteOptions::query_all(),
        (true, false) => ExecuteOptions::query(),
        (false, false) => ExecuteOptions::command(),
    };
    if no_cache {
        options = options.without_cache_update();
    }

    let start = Instant::now();
    let reply = receiver.execute(command, options).await?;
    let elapsed = start.elapsed();

    match reply {
        Reply::None if options.expect_response => println!("(no response)"),
        Reply::None => println!("Sent {command}"),
        Reply::Line(line) => println!("{line}"),
        Reply::Lines(lines) => {
            for line in &lines {
                println!("{line}");
            }
            println!("({} lines)", lines.len());
        }
    }
    println!("Exchange took {:.3} s", elapsed.as_secs_f64());
    Ok(())
}

async fn cmd_zone(receiver: &DenonReceiver, zone: ZoneId, action: &ZoneAction) -> Result<()> {
    let control = receiver.zone(zone);
    match action {
        ZoneAction::Power { state } => {
            if state.is_on() {
                control.power_on().await?
            } else {
                control.power_off().await?
            }
        }
        ZoneAction::Up => control.volume_up().await?,
        ZoneAction::Down => control.volume_down().await?,
        ZoneAction::Volume { value } => control.set_volume(*value).await?,
        ZoneAction::Level { level } => control.set_volume_level(*level).await?,
        ZoneAction::Source { name } => {
            let inputs = CodeTable::default_inputs();
            control.select_source(resolve(&inputs, name)).await?
        }
        ZoneAction::Status => {}
    }

    match control.state().await {
        Some(state) => println!(
            "{zone}: {} | volume {} ({:.0}%) | input {}",
            state.power,
            state.volume,
            state.volume_level() * 100.0,
            state.source
        ),
        None => println!("{zone} is not a confirmed zone (run `discover`, then pass --zone {zone})"),
    }
    Ok(())
}

async fn cmd_watch(receiver: &DenonReceiver, interval_secs: u64, duration_secs: u64) -> Result<()> {
    if interval_secs == 0 {
        bail!("--interval must be at least 1 second");
    }
    let mut events = receiver.subscribe();
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    let deadline = (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));

    println!("Watching receiver (Ctrl-C to stop)...");
    loop {
        if deadline.is_some_and(|dl| Instant::now() >= dl) {
            println!("Watch duration elapsed.");
            break;
        }
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = receiver.refresh_all().await {
                    eprintln!("[warning] refresh failed: {e}");
                }
            }
            event = events.recv() => match event {
                Ok(event) => println!("[event] {event:?}"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    println!("[warning] missed {n} events (consumer too slow)");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::time::sleep(Duration::from_millis(250)) => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    // The `sources` command does not require a connection.
    if matches!(cli.command, Command::Sources) {
        return cmd_sources();
    }

    let receiver = create_receiver(&cli).await?;
    let inputs = CodeTable::default_inputs();
    let modes = CodeTable::default_sound_modes();

    let result = match &cli.command {
        Command::Status => cmd_status(&receiver).await,
        Command::Discover => cmd_discover(&receiver).await,
        Command::Sources => Ok(()),
        Command::Send {
            command,
            response,
            all,
            no_cache,
        } => cmd_send(&receiver, command, *response, *all, *no_cache).await,
        Command::Power { state } => {
            let result = if state.is_on() {
                receiver.power_on().await
            } else {
                receiver.power_off().await
            };
            result.map_err(Into::into)
        }
        Command::Volume { action } => {
            let result = match action {
                VolumeAction::Up => receiver.volume_up().await,
                VolumeAction::Down => receiver.volume_down().await,
                VolumeAction::Set { value } => receiver.set_volume(*value).await,
                VolumeAction::Level { level } => receiver.set_volume_level(*level).await,
            };
            match result {
                Ok(()) => {
                    let state = receiver.state().await;
                    println!("Volume: {} / {}", state.volume, state.volume_max);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::Mute { state } => receiver.set_mute(state.is_on()).await.map_err(Into::into),
        Command::Source { name } => receiver
            .select_source(resolve(&inputs, name))
            .await
            .map_err(Into::into),
        Command::SoundMode { name } => receiver
            .select_sound_mode(resolve(&modes, name))
            .await
            .map_err(Into::into),
        Command::Tuner { media_id } => receiver.play_tuner(media_id).await.map_err(Into::into),
        Command::Zone { zone, action } => cmd_zone(&receiver, *zone, action).await,
        Command::Watch { interval, duration } => cmd_watch(&receiver, *interval, *duration).await,
    };

    receiver.close().await.ok();
    result
}
