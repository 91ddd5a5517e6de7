//! Mock relay for testing.
//!
//! Allows queueing daemon output and capturing sent messages for verification.

use super::{normalize_number, Relay, RelayError, RelayStream};
use async_trait::async_trait;
use parley_types::{Envelope, Timestamp, WireMessage};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};

/// A message handed to [`MockRelay::send`] or [`MockRelay::send_group`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    /// Peer number or group id.
    pub destination: String,
    /// Message text.
    pub text: String,
    /// Attached file paths.
    pub attachments: Vec<PathBuf>,
    /// Sent to a group.
    pub group: bool,
    /// Timestamp the mock assigned.
    pub timestamp: Timestamp,
}

/// Mock relay for testing.
///
/// Each `start()` yields the queued lines, then either ends (like a daemon
/// that crashed) or, with [`MockRelay::hold_open`], stays open until
/// `interrupt()`.
#[derive(Debug)]
pub struct MockRelay {
    inner: Arc<Mutex<MockRelayInner>>,
}

#[derive(Debug)]
struct MockRelayInner {
    pending: VecDeque<String>,
    sent: Vec<SentRecord>,
    start_attempts: usize,
    interrupts: usize,
    hold_open: bool,
    open_stream: Option<Arc<tokio::sync::Mutex<DuplexStream>>>,
    echo_sends: bool,
    send_delay: Option<Duration>,
    next_timestamp: Timestamp,
    fail_next_start: Option<String>,
    fail_next_send: Option<String>,
    fail_next_receive: Option<String>,
}

impl Default for MockRelayInner {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            sent: Vec::new(),
            start_attempts: 0,
            interrupts: 0,
            hold_open: false,
            open_stream: None,
            echo_sends: false,
            send_delay: None,
            next_timestamp: 1_600_000_000_000,
            fail_next_start: None,
            fail_next_send: None,
            fail_next_receive: None,
        }
    }
}

impl Default for MockRelay {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockRelayInner::default())),
        }
    }
}

impl MockRelay {
    /// Create a new mock relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw line for the next daemon stream or `receive()` call.
    pub fn queue_line(&self, line: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.pending.push_back(line.into());
    }

    /// Queue an envelope, encoded as the relay would print it.
    pub fn queue_envelope(&self, envelope: Envelope) {
        let line = WireMessage::from(envelope)
            .to_line()
            .unwrap_or_default();
        self.queue_line(line);
    }

    /// Write a line to the running daemon stream, or queue it when no
    /// stream is open.
    pub async fn push_line(&self, line: impl Into<String>) {
        let mut line = line.into();
        let writer = self.inner.lock().unwrap().open_stream.clone();
        if let Some(writer) = writer {
            line.push('\n');
            let mut writer = writer.lock().await;
            if writer.write_all(line.as_bytes()).await.is_ok() {
                return;
            }
            line.pop();
        }
        self.queue_line(line);
    }

    /// Write an envelope to the running daemon stream.
    pub async fn push_envelope(&self, envelope: Envelope) {
        let line = WireMessage::from(envelope)
            .to_line()
            .unwrap_or_default();
        self.push_line(line).await;
    }

    /// Make every send wait `delay` before it completes.
    pub fn delay_sends(&self, delay: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.send_delay = Some(delay);
    }

    /// Queue a sent-message echo for every successful send.
    pub fn echo_sends(&self, echo: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.echo_sends = echo;
    }

    /// Keep daemon streams open until `interrupt()`.
    pub fn hold_open(&self, hold: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.hold_open = hold;
    }

    /// Get all messages that were sent.
    pub fn sent_messages(&self) -> Vec<SentRecord> {
        let inner = self.inner.lock().unwrap();
        inner.sent.clone()
    }

    /// Number of `start()` calls, failed ones included.
    pub fn start_attempts(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.start_attempts
    }

    /// Number of `interrupt()` calls.
    pub fn interrupts(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.interrupts
    }

    /// Whether a held-open daemon stream is currently live.
    pub fn is_running(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.open_stream.is_some()
    }

    /// Cause the next start() to fail with the given error.
    pub fn fail_next_start(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_start = Some(error.to_string());
    }

    /// Cause the next send() or send_group() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }

    /// Cause the next receive() to fail with the given error.
    pub fn fail_next_receive(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_receive = Some(error.to_string());
    }

    async fn wait_to_send(&self) {
        let delay = self.inner.lock().unwrap().send_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn record_send(
        &self,
        destination: String,
        text: &str,
        attachments: &[PathBuf],
        group: bool,
    ) -> Result<Timestamp, RelayError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(RelayError::Failed(error));
        }

        let timestamp = inner.next_timestamp;
        inner.next_timestamp += 1;

        if inner.echo_sends {
            let echo = if group {
                Envelope::sent("", timestamp, text).in_group(&destination, "")
            } else {
                Envelope::sent(&destination, timestamp, text)
            };
            if let Ok(line) = WireMessage::from(echo).to_line() {
                inner.pending.push_back(line);
            }
        }

        inner.sent.push(SentRecord {
            destination,
            text: text.to_string(),
            attachments: attachments.to_vec(),
            group,
            timestamp,
        });
        Ok(timestamp)
    }
}

impl Clone for MockRelay {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Relay for MockRelay {
    async fn start(&self) -> Result<RelayStream, RelayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.start_attempts += 1;

        // Check for forced failure
        if let Some(error) = inner.fail_next_start.take() {
            return Err(RelayError::Failed(error));
        }

        let mut output = Vec::new();
        for line in inner.pending.drain(..) {
            output.extend_from_slice(line.as_bytes());
            output.push(b'\n');
        }
        let queued = std::io::Cursor::new(output);

        if inner.hold_open {
            let (writer, reader) = tokio::io::duplex(1024);
            inner.open_stream = Some(Arc::new(tokio::sync::Mutex::new(writer)));
            Ok(Box::new(BufReader::new(queued.chain(reader))))
        } else {
            Ok(Box::new(BufReader::new(queued)))
        }
    }

    async fn finish(&self) -> Result<(), RelayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.open_stream = None;
        Ok(())
    }

    async fn interrupt(&self) -> Result<(), RelayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.interrupts += 1;
        // Dropping the writer closes the stream, like the daemon exiting
        inner.open_stream = None;
        Ok(())
    }

    async fn receive(&self) -> Result<Vec<String>, RelayError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_receive.take() {
            return Err(RelayError::Failed(error));
        }

        Ok(inner.pending.drain(..).collect())
    }

    async fn send(
        &self,
        destination: &str,
        text: &str,
        attachments: &[PathBuf],
    ) -> Result<Timestamp, RelayError> {
        self.wait_to_send().await;
        self.record_send(normalize_number(destination), text, attachments, false)
    }

    async fn send_group(
        &self,
        group_id: &str,
        text: &str,
        attachments: &[PathBuf],
    ) -> Result<Timestamp, RelayError> {
        self.wait_to_send().await;
        self.record_send(group_id.to_string(), text, attachments, true)
    }

    async fn version(&self) -> Result<String, RelayError> {
        Ok("0.0.0-mock".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;

    async fn read_all(stream: RelayStream) -> Vec<String> {
        let mut lines = stream.lines();
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    // ===========================================
    // MockRelay Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_relay_streams_queued_lines() {
        let relay = MockRelay::new();
        relay.queue_line("one");
        relay.queue_line("two");

        let stream = relay.start().await.unwrap();
        assert_eq!(read_all(stream).await, vec!["one", "two"]);
        assert_eq!(relay.start_attempts(), 1);

        // Queue was drained
        let stream = relay.start().await.unwrap();
        assert!(read_all(stream).await.is_empty());
    }

    #[tokio::test]
    async fn mock_relay_records_sends() {
        let relay = MockRelay::new();
        let t1 = relay.send("15550001111", "hi", &[]).await.unwrap();
        let t2 = relay
            .send_group("Z3JvdXA=", "all", &[PathBuf::from("/tmp/x")])
            .await
            .unwrap();

        assert!(t2 > t1);
        let sent = relay.sent_messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].destination, "+15550001111");
        assert!(!sent[0].group);
        assert!(sent[1].group);
        assert_eq!(sent[1].attachments, vec![PathBuf::from("/tmp/x")]);
    }

    #[tokio::test]
    async fn mock_relay_echoes_sends() {
        let relay = MockRelay::new();
        relay.echo_sends(true);
        let ts = relay.send("+15550001111", "hi", &[]).await.unwrap();

        let lines = relay.receive().await.unwrap();
        assert_eq!(lines.len(), 1);
        let wire = WireMessage::from_line(lines[0].as_bytes()).unwrap();
        let sent = wire.envelope.sent_message().unwrap();
        assert_eq!(sent.timestamp, ts);
        assert_eq!(sent.text(), "hi");
    }

    #[tokio::test]
    async fn mock_relay_forced_failures() {
        let relay = MockRelay::new();
        relay.fail_next_start("no account");
        relay.fail_next_send("rate limited");
        relay.fail_next_receive("offline");

        assert!(relay.start().await.is_err());
        assert!(relay.send("+1", "x", &[]).await.is_err());
        assert!(relay.receive().await.is_err());

        // Failures are one-shot
        assert!(relay.start().await.is_ok());
        assert!(relay.send("+1", "x", &[]).await.is_ok());
        assert_eq!(relay.start_attempts(), 2);
        assert_eq!(relay.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn held_stream_closes_on_interrupt() {
        let relay = MockRelay::new();
        relay.hold_open(true);
        relay.queue_line("first");

        let stream = relay.start().await.unwrap();
        assert!(relay.is_running());
        let mut lines = stream.lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("first"));

        relay.interrupt().await.unwrap();
        assert!(!relay.is_running());
        assert_eq!(lines.next_line().await.unwrap(), None);
        assert_eq!(relay.interrupts(), 1);
    }

    #[tokio::test]
    async fn pushed_lines_reach_running_stream() {
        let relay = MockRelay::new();
        relay.hold_open(true);

        let stream = relay.start().await.unwrap();
        let mut lines = stream.lines();
        relay.push_line("live").await;
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("live"));

        // Without a stream the line waits for the next start
        relay.interrupt().await.unwrap();
        relay.push_line("later").await;
        assert_eq!(relay.receive().await.unwrap(), vec!["later"]);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_send_waits() {
        let relay = MockRelay::new();
        relay.delay_sends(Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        relay.send("+15550001111", "slow", &[]).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
