use serde::Deserialize;
use std::time::Duration;
use tetra_link::Transport;
use tracing::{trace, warn};

use crate::command::Command;
use crate::error::{CamError, Result};

/// First byte of an acknowledged control command.
pub const ACK: u8 = 65;
/// The full acknowledgement line. Reply data, if any, follows the `\r`.
pub const ACK_LINE: &[u8] = b"ACK\r";
/// Line terminator in both directions.
pub const EOL: u8 = b'\r';
/// First byte of the alternate reply; treated as a rejection.
pub const NACK: u8 = 84;
/// Size of the receive buffer. Anything past this is left on the wire.
pub const RX_BUF_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ack,
    Nack,
    Timeout,
}

impl Reply {
    pub fn is_ack(self) -> bool {
        self == Reply::Ack
    }
}

/// Wait windows, in poll iterations. Each iteration checks the link once and,
/// if nothing satisfied the wait yet, sleeps `poll_interval_us`.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_ack_polls")]
    pub ack_polls: u32,
    #[serde(default = "default_data_polls")]
    pub data_polls: u32,
    #[serde(default = "default_mean_polls")]
    pub mean_polls: u32,
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u64,
}

fn default_ack_polls() -> u32 { 40 }
fn default_data_polls() -> u32 { 40 }
fn default_mean_polls() -> u32 { 120 }
fn default_poll_interval_us() -> u64 { 100 }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            ack_polls: default_ack_polls(),
            data_polls: default_data_polls(),
            mean_polls: default_mean_polls(),
            poll_interval_us: default_poll_interval_us(),
        }
    }
}

impl PollConfig {
    /// Longest a single wait of `polls` iterations can take.
    pub fn worst_case(&self, polls: u32) -> Duration {
        Duration::from_micros(self.poll_interval_us * polls as u64)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    pub acks: u32,
    pub nacks: u32,
    pub timeouts: u32,
    pub io_errors: u32,
    pub last_command: Option<String>,
}

pub struct CommandClient<T: Transport> {
    link: T,
    rx: Vec<u8>,
    polling: PollConfig,
    stats: LinkStats,
    /// The ACK line's terminator has not arrived yet; drop input through it.
    skip_ack_line: bool,
}

impl<T: Transport> CommandClient<T> {
    pub fn new(link: T, polling: PollConfig) -> Self {
        Self {
            link,
            rx: Vec::with_capacity(RX_BUF_SIZE),
            polling,
            stats: LinkStats::default(),
            skip_ack_line: false,
        }
    }

    /// Send a control command and classify the first byte that comes back.
    ///
    /// On `Ack` the acknowledgement line is consumed and anything after its
    /// `\r` stays buffered for the reply readers. On `Timeout` the buffer is
    /// left empty. On `Nack` it keeps whatever arrived so the caller can look
    /// at it. Never retries.
    pub fn send_and_await(&mut self, cmd: &Command) -> Reply {
        let text = cmd.to_string();
        self.stats.last_command = Some(text.clone());

        // Stale bytes from an earlier exchange would be mistaken for this reply.
        self.skip_ack_line = false;
        if let Err(e) = self.link.discard_input() {
            self.io_failed("discard input", &e);
        }
        if let Err(e) = self.link.send(&cmd.encode()) {
            self.io_failed("send", &e);
            self.rx.clear();
            self.stats.timeouts += 1;
            return Reply::Timeout;
        }
        self.rx.clear();

        let reply = if !self.poll_until(1, self.polling.ack_polls) {
            Reply::Timeout
        } else {
            match self.rx[0] {
                ACK => {
                    self.skip_ack_line = true;
                    self.drop_ack_line();
                    Reply::Ack
                }
                NACK => Reply::Nack,
                _ => {
                    self.rx.clear();
                    Reply::Timeout
                }
            }
        };

        match reply {
            Reply::Ack => self.stats.acks += 1,
            Reply::Nack => self.stats.nacks += 1,
            Reply::Timeout => self.stats.timeouts += 1,
        }
        trace!("camera: `{}` -> {:?}", text, reply);
        reply
    }

    /// `send_and_await`, with anything but `Ack` turned into an error.
    pub fn expect_ack(&mut self, cmd: &Command) -> Result<()> {
        match self.send_and_await(cmd) {
            Reply::Ack => Ok(()),
            Reply::Nack => Err(CamError::Nack { command: cmd.to_string() }),
            Reply::Timeout => Err(CamError::Timeout { command: cmd.to_string() }),
        }
    }

    /// Wait (bounded) for any data at all. For replies that carry no ACK byte.
    pub fn await_full_response(&mut self) -> bool {
        self.poll_until(1, self.polling.data_polls)
    }

    /// Wait (bounded) until at least `len` bytes are buffered.
    pub fn await_reply_len(&mut self, len: usize) -> Result<&[u8]> {
        if self.poll_until(len, self.polling.mean_polls) {
            return Ok(&self.rx);
        }
        Err(CamError::MalformedReply {
            command: self.stats.last_command.clone().unwrap_or_default(),
            got: self.rx.len(),
            want: len,
        })
    }

    pub fn received(&self) -> &[u8] {
        &self.rx
    }

    pub fn clear_rx(&mut self) {
        self.rx.clear();
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn into_inner(self) -> T {
        self.link
    }

    fn poll_until(&mut self, min: usize, polls: u32) -> bool {
        let interval = Duration::from_micros(self.polling.poll_interval_us);
        for i in 0..polls {
            self.pump();
            if self.rx.len() >= min {
                return true;
            }
            if !interval.is_zero() && i + 1 < polls {
                std::thread::sleep(interval);
            }
        }
        self.rx.len() >= min
    }

    fn pump(&mut self) {
        let room = RX_BUF_SIZE - self.rx.len();
        if room == 0 {
            return;
        }
        let mut chunk = [0u8; RX_BUF_SIZE];
        match self.link.poll_read(&mut chunk[..room]) {
            Ok(n) => {
                self.rx.extend_from_slice(&chunk[..n]);
                self.drop_ack_line();
            }
            Err(e) => self.io_failed("read", &e),
        }
    }

    /// Remove the pending ACK line up to and including its terminator. The
    /// line may arrive in pieces, so until the `\r` shows up nothing is kept.
    fn drop_ack_line(&mut self) {
        if !self.skip_ack_line {
            return;
        }
        match self.rx.iter().position(|&b| b == EOL) {
            Some(end) => {
                self.rx.drain(..=end);
                self.skip_ack_line = false;
            }
            None => self.rx.clear(),
        }
    }

    fn io_failed(&mut self, what: &str, e: &std::io::Error) {
        self.stats.io_errors += 1;
        warn!("camera: link {} failed: {}", what, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tetra_link::mock::MockLink;

    fn fast() -> PollConfig {
        PollConfig { ack_polls: 4, data_polls: 4, mean_polls: 8, poll_interval_us: 0 }
    }

    #[test]
    fn ack_line_is_ack_and_leaves_buffer_empty() {
        let mut c = CommandClient::new(MockLink::new(|_| vec![b"ACK\r".to_vec()]), fast());
        assert_eq!(c.send_and_await(&Command::PollMode(true)), Reply::Ack);
        assert!(c.received().is_empty());
        assert_eq!(c.stats().acks, 1);
    }

    #[test]
    fn data_after_ack_line_in_same_read_is_kept() {
        let mut reply = ACK_LINE.to_vec();
        reply.extend_from_slice(&[255, b'M', 100, 16, 100]);
        let mut c = CommandClient::new(MockLink::new(move |_| vec![reply.clone()]), fast());
        assert!(c.send_and_await(&Command::GetMean).is_ack());
        assert_eq!(c.await_reply_len(5).unwrap(), &[255, b'M', 100, 16, 100]);
    }

    #[test]
    fn ack_line_split_across_reads_is_dropped_whole() {
        let link = MockLink::new(|_| vec![b"A".to_vec(), b"C".to_vec(), vec![b'K', b'\r', 255, b'M'], vec![100, 16, 100]]);
        let mut c = CommandClient::new(link, fast());
        assert!(c.send_and_await(&Command::GetMean).is_ack());
        assert!(c.received().is_empty());
        assert_eq!(c.await_reply_len(5).unwrap(), &[255, b'M', 100, 16, 100]);
    }

    #[test]
    fn sentinel_84_is_nack_and_keeps_buffer() {
        let mut c = CommandClient::new(MockLink::new(|_| vec![vec![NACK, b'x', b'\r']]), fast());
        assert_eq!(c.send_and_await(&Command::ReadFrame), Reply::Nack);
        assert_eq!(c.received(), &[NACK, b'x', b'\r']);
        assert_eq!(c.stats().nacks, 1);
    }

    #[test]
    fn silence_is_timeout() {
        let mut c = CommandClient::new(MockLink::silent(), fast());
        assert_eq!(c.send_and_await(&Command::GetMean), Reply::Timeout);
        assert!(c.received().is_empty());
        assert_eq!(c.stats().timeouts, 1);
    }

    #[test]
    fn unexpected_first_byte_is_timeout() {
        let mut c = CommandClient::new(MockLink::new(|_| vec![b":".to_vec()]), fast());
        assert_eq!(c.send_and_await(&Command::Reset), Reply::Timeout);
        assert!(c.received().is_empty());
    }

    #[test]
    fn stale_input_is_discarded_before_sending() {
        let mut link = MockLink::acking();
        link.inject(&[NACK]);
        let mut c = CommandClient::new(link, fast());
        assert_eq!(c.send_and_await(&Command::RawMode(1)), Reply::Ack);
    }

    #[test]
    fn no_retry_after_nack() {
        let link = MockLink::new(|_| vec![vec![NACK]]);
        let log = link.log();
        let mut c = CommandClient::new(link, fast());
        assert!(c.expect_ack(&Command::NoiseFilter(6)).is_err());
        assert_eq!(log.lines(), vec!["NF 6".to_string()]);
    }

    #[test]
    fn reply_len_collects_chunks() {
        let link = MockLink::new(|_| vec![ACK_LINE.to_vec(), vec![255, b'M'], vec![90, 16, 100, 3]]);
        let mut c = CommandClient::new(link, fast());
        assert!(c.send_and_await(&Command::GetMean).is_ack());
        let reply = c.await_reply_len(5).unwrap();
        assert_eq!(reply, &[255, b'M', 90, 16, 100, 3]);
    }

    #[test]
    fn short_reply_is_malformed() {
        let link = MockLink::new(|_| vec![ACK_LINE.to_vec(), vec![255, b'M']]);
        let mut c = CommandClient::new(link, fast());
        c.send_and_await(&Command::GetMean);
        let err = c.await_reply_len(5).unwrap_err();
        assert_eq!(
            err,
            CamError::MalformedReply { command: "GM".into(), got: 2, want: 5 }
        );
    }

    #[test]
    fn full_response_reports_any_data() {
        let link = MockLink::new(|_| vec![ACK_LINE.to_vec(), b"SV".to_vec()]);
        let mut c = CommandClient::new(link, fast());
        assert!(c.send_and_await(&Command::SetServo { servo: 0, position: 128 }).is_ack());
        assert!(c.await_full_response());

        let mut quiet = CommandClient::new(MockLink::acking(), fast());
        quiet.send_and_await(&Command::ReadFrame);
        assert!(!quiet.await_full_response());
    }
}
