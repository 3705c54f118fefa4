//! Mock transport for deterministic testing of the receiver driver.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! command/response pairs. Bytes written by the driver are collected until
//! the carriage-return terminator, the completed command is matched against
//! the script, and the scripted response lines are then served to
//! `receive()`. Once a response is exhausted, `receive()` reports
//! [`Error::Timeout`], which is exactly the idle gap that ends a response on
//! real hardware. A scripted pause longer than the caller's timeout also
//! reports [`Error::Timeout`], so a device that stalls mid-burst can be
//! simulated.
//!
//! # Example
//!
//! ```
//! use avrlib_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the driver sends `MV?\r`, answer with two lines.
//! mock.expect("MV?", &["MVMAX 80", "MV45"]);
//! // Any number of `PW?` queries answer `PWON`.
//! mock.respond("PW?", &["PWON"]);
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use avrlib_core::error::{Error, Result};
use avrlib_core::transport::Transport;

/// Command terminator the driver appends to every command.
const COMMAND_TERMINATOR: u8 = b'\r';

/// Line ending used when encoding scripted response lines.
const RESPONSE_LINE_ENDING: &str = "\r\n";

/// One observable event on the mock wire, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    /// A single byte written by the driver.
    Tx(u8),
    /// A chunk of response bytes handed to the driver.
    Rx(Vec<u8>),
}

/// A run of response bytes preceded by a pause.
#[derive(Debug, Clone)]
struct Segment {
    delay: Duration,
    bytes: Vec<u8>,
}

/// A pre-loaded command/response pair.
#[derive(Debug, Clone)]
struct Expectation {
    /// The command text we expect, without the terminator.
    command: String,
    /// Segments to serve once the command has been written.
    response: Vec<Segment>,
}

#[derive(Debug)]
struct MockState {
    /// Ordered queue of expected command/response pairs.
    expectations: VecDeque<Expectation>,
    /// Replies used for any command once the ordered queue is empty.
    standing: HashMap<String, Vec<Segment>>,
    /// Bytes of the command currently being written.
    partial_command: Vec<u8>,
    /// Response segments not yet handed to `receive()`.
    pending: VecDeque<Segment>,
    /// Delay between a completed command and the first response byte.
    response_delay: Duration,
    /// When set, `send()` never completes.
    stall_writes: bool,
    connected: bool,
    /// Every completed command, in order.
    sent_log: Vec<String>,
    /// Byte-level history of the link.
    wire_log: Vec<WireEvent>,
}

impl MockState {
    fn new() -> Self {
        MockState {
            expectations: VecDeque::new(),
            standing: HashMap::new(),
            partial_command: Vec::new(),
            pending: VecDeque::new(),
            response_delay: Duration::ZERO,
            stall_writes: false,
            connected: true,
            sent_log: Vec::new(),
            wire_log: Vec::new(),
        }
    }

    /// Resolve the response for a completed command.
    fn complete_command(&mut self) -> Result<()> {
        let command = String::from_utf8_lossy(&self.partial_command).into_owned();
        self.partial_command.clear();
        self.sent_log.push(command.clone());

        let response = if let Some(expectation) = self.expectations.pop_front() {
            if expectation.command != command {
                return Err(Error::Transport(format!(
                    "unexpected command: expected {:?}, got {:?}",
                    expectation.command, command
                )));
            }
            expectation.response
        } else if let Some(response) = self.standing.get(&command) {
            response.clone()
        } else {
            return Err(Error::Transport(format!(
                "no expectation for command {command:?} in mock transport"
            )));
        };

        self.pending = response.into();
        if let Some(first) = self.pending.front_mut() {
            first.delay += self.response_delay;
        }
        Ok(())
    }
}

fn encode_lines(lines: &[&str]) -> Vec<u8> {
    lines
        .iter()
        .flat_map(|line| format!("{line}{RESPONSE_LINE_ENDING}").into_bytes())
        .collect()
}

/// Build a segment list, folding the pause of an empty segment into the
/// next one.
fn segments(parts: impl IntoIterator<Item = (Duration, Vec<u8>)>) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut carried = Duration::ZERO;
    for (delay, bytes) in parts {
        carried += delay;
        if !bytes.is_empty() {
            out.push(Segment {
                delay: carried,
                bytes,
            });
            carried = Duration::ZERO;
        }
    }
    out
}

fn immediate(bytes: Vec<u8>) -> Vec<Segment> {
    segments([(Duration::ZERO, bytes)])
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A mock [`Transport`] for testing the driver without hardware.
///
/// Ordered expectations (see [`expect`](Self::expect)) are consumed first and
/// must match exactly. When the ordered queue is empty, standing replies
/// registered with [`respond`](Self::respond) are used. A command with
/// neither produces an error from `send()`.
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            state: Arc::new(Mutex::new(MockState::new())),
        }
    }

    /// Add an expected command and the lines to answer it with.
    ///
    /// Pass an empty slice for a command the device answers with silence.
    pub fn expect(&mut self, command: &str, lines: &[&str]) {
        self.expect_raw(command, &encode_lines(lines));
    }

    /// Add an expected command answered with raw bytes.
    ///
    /// Useful for exercising line framing: partial lines, bare carriage
    /// returns, blank lines.
    pub fn expect_raw(&mut self, command: &str, response: &[u8]) {
        lock(&self.state).expectations.push_back(Expectation {
            command: command.to_string(),
            response: immediate(response.to_vec()),
        });
    }

    /// Add an expected command whose answer stalls for `pause` between
    /// the `before` and `after` lines.
    ///
    /// A reader whose timeout is shorter than `pause` sees the response end
    /// after `before`.
    pub fn expect_with_pause(
        &mut self,
        command: &str,
        before: &[&str],
        pause: Duration,
        after: &[&str],
    ) {
        lock(&self.state).expectations.push_back(Expectation {
            command: command.to_string(),
            response: segments([
                (Duration::ZERO, encode_lines(before)),
                (pause, encode_lines(after)),
            ]),
        });
    }

    /// Register a standing reply used whenever `command` is sent and no
    /// ordered expectation is pending.
    pub fn respond(&mut self, command: &str, lines: &[&str]) {
        self.handle().respond(command, lines);
    }

    /// Delay every response by `delay` after its command completes.
    pub fn with_response_delay(self, delay: Duration) -> Self {
        lock(&self.state).response_delay = delay;
        self
    }

    /// Make every subsequent `send()` hang forever.
    pub fn stall_writes(&mut self, stall: bool) {
        lock(&self.state).stall_writes = stall;
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        lock(&self.state).connected = connected;
    }

    /// Return the number of ordered expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        lock(&self.state).expectations.len()
    }

    /// Every completed command sent so far, without terminators.
    pub fn sent_commands(&self) -> Vec<String> {
        lock(&self.state).sent_log.clone()
    }

    /// A handle that stays usable after the transport is boxed and moved
    /// into a driver.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared view of a [`MockTransport`] for inspection and re-scripting.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Every completed command sent so far, without terminators.
    pub fn sent_commands(&self) -> Vec<String> {
        lock(&self.state).sent_log.clone()
    }

    /// Byte-level history of the link.
    pub fn wire_log(&self) -> Vec<WireEvent> {
        lock(&self.state).wire_log.clone()
    }

    /// Return the number of ordered expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        lock(&self.state).expectations.len()
    }

    /// Add an ordered expectation.
    pub fn expect(&self, command: &str, lines: &[&str]) {
        lock(&self.state).expectations.push_back(Expectation {
            command: command.to_string(),
            response: immediate(encode_lines(lines)),
        });
    }

    /// Register or replace a standing reply.
    ///
    /// Replacing a reply simulates the device being changed by other means
    /// (front panel, IR remote) between two polls.
    pub fn respond(&self, command: &str, lines: &[&str]) {
        lock(&self.state)
            .standing
            .insert(command.to_string(), immediate(encode_lines(lines)));
    }

    /// Whether the mock is currently connected.
    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stall = {
            let mut state = lock(&self.state);
            if !state.connected {
                return Err(Error::NotConnected);
            }
            if !state.stall_writes {
                for &byte in data {
                    state.wire_log.push(WireEvent::Tx(byte));
                    if byte == COMMAND_TERMINATOR {
                        state.complete_command()?;
                    } else {
                        state.partial_command.push(byte);
                    }
                }
            }
            state.stall_writes
        };

        if stall {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let (wait, stalled) = {
            let mut state = lock(&self.state);
            if !state.connected {
                return Err(Error::NotConnected);
            }
            let Some(segment) = state.pending.front_mut() else {
                return Err(Error::Timeout);
            };
            let wait = segment.delay.min(timeout);
            segment.delay -= wait;
            (wait, !segment.delay.is_zero())
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        if stalled {
            return Err(Error::Timeout);
        }

        let mut state = lock(&self.state);
        let Some(mut segment) = state.pending.pop_front() else {
            return Err(Error::Timeout);
        };
        let n = segment.bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&segment.bytes[..n]);
        state.wire_log.push(WireEvent::Rx(segment.bytes[..n].to_vec()));
        if n < segment.bytes.len() {
            segment.bytes.drain(..n);
            state.pending.push_front(segment);
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.connected = false;
        state.pending.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn send_command(mock: &mut MockTransport, command: &str) -> Result<()> {
        mock.send(format!("{command}\r").as_bytes()).await
    }

    #[tokio::test]
    async fn mock_transport_basic_send_receive() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", &["PWON"]);

        send_command(&mut mock, "PW?").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"PWON\r\n");

        let result = mock.receive(&mut buf, Duration::from_millis(100)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn mock_transport_assembles_bytewise_commands() {
        let mut mock = MockTransport::new();
        mock.expect("MVUP", &[]);

        for byte in b"MVUP\r" {
            mock.send(&[*byte]).await.unwrap();
        }

        assert_eq!(mock.sent_commands(), vec!["MVUP".to_string()]);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn mock_transport_wrong_command_errors() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", &["PWON"]);

        let result = send_command(&mut mock, "MV?").await;
        assert!(matches!(result.unwrap_err(), Error::Transport(_)));
    }

    #[tokio::test]
    async fn mock_transport_no_expectations_errors() {
        let mut mock = MockTransport::new();
        let result = send_command(&mut mock, "PW?").await;
        assert!(matches!(result.unwrap_err(), Error::Transport(_)));
    }

    #[tokio::test]
    async fn mock_transport_standing_reply_repeats() {
        let mut mock = MockTransport::new();
        mock.respond("MU?", &["MUOFF"]);

        let mut buf = [0u8; 64];
        for _ in 0..2 {
            send_command(&mut mock, "MU?").await.unwrap();
            let n = mock
                .receive(&mut buf, Duration::from_millis(10))
                .await
                .unwrap();
            assert_eq!(&buf[..n], b"MUOFF\r\n");
        }
    }

    #[tokio::test]
    async fn mock_transport_silent_command_times_out() {
        let mut mock = MockTransport::new();
        mock.expect("Z3?", &[]);

        send_command(&mut mock, "Z3?").await.unwrap();
        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn mock_transport_partial_receive() {
        let mut mock = MockTransport::new();
        mock.expect_raw("SI?", b"SIDVD\r");

        send_command(&mut mock, "SI?").await.unwrap();

        let mut buf = [0u8; 4];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"SIDV");
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"D\r");
    }

    #[tokio::test]
    async fn mock_transport_wire_log_orders_tx_and_rx() {
        let mut mock = MockTransport::new();
        mock.expect("PW?", &["PWON"]);

        send_command(&mut mock, "PW?").await.unwrap();
        let mut buf = [0u8; 64];
        mock.receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();

        let log = mock.handle().wire_log();
        assert_eq!(log.len(), 5);
        assert_eq!(log[0], WireEvent::Tx(b'P'));
        assert_eq!(log[3], WireEvent::Tx(b'\r'));
        assert_eq!(log[4], WireEvent::Rx(b"PWON\r\n".to_vec()));
    }

    #[tokio::test]
    async fn mock_transport_disconnect() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());

        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = send_command(&mut mock, "PW?").await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn mock_transport_set_connected() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        assert!(!mock.handle().is_connected());

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn mock_transport_stalled_write_never_completes() {
        let mut mock = MockTransport::new();
        mock.stall_writes(true);

        let result =
            tokio::time::timeout(Duration::from_millis(20), mock.send(b"P")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mock_transport_pause_longer_than_timeout_times_out() {
        let mut mock = MockTransport::new();
        mock.expect_with_pause("MV?", &["MVMAX 80"], Duration::from_millis(200), &["MV45"]);

        send_command(&mut mock, "MV?").await.unwrap();
        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"MVMAX 80\r\n");

        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn mock_transport_pause_within_timeout_delivers() {
        let mut mock = MockTransport::new();
        mock.expect_with_pause("MV?", &["MVMAX 80"], Duration::from_millis(5), &["MV45"]);

        send_command(&mut mock, "MV?").await.unwrap();
        let mut buf = [0u8; 64];
        mock.receive(&mut buf, Duration::from_millis(50))
            .await
            .unwrap();
        let n = mock
            .receive(&mut buf, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"MV45\r\n");
    }

    #[tokio::test]
    async fn mock_handle_rescripts_standing_reply() {
        let mut mock = MockTransport::new();
        mock.respond("SI?", &["SICD"]);
        let handle = mock.handle();
        handle.respond("SI?", &["SITUNER"]);

        send_command(&mut mock, "SI?").await.unwrap();
        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"SITUNER\r\n");
    }
}
