//! Capability traits for the hardware and network collaborators.
//!
//! The poll loop and the HTTP reporter only talk to these traits; the
//! firmware and host binaries plug in real or simulated backends.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("temperature sensor read failed: {0}")]
    ReadFailed(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {host}: {reason}")]
    Connect { host: String, reason: String },
    #[error("request to {host} timed out")]
    Timeout { host: String },
    #[error("request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server rejected message with HTTP {status}")]
    Rejected { status: u16 },
}

#[derive(Debug, Error)]
pub enum WifiError {
    #[error("wifi credentials missing")]
    MissingCredentials,
    #[error("failed to initialize wifi radio: {0}")]
    RadioInit(String),
    #[error("failed to enable station mode: {0}")]
    StationMode(String),
    #[error("failed to connect to `{ssid}`: {reason}")]
    Connect { ssid: String, reason: String },
    #[error("no connection to `{ssid}` within {timeout_ms} ms")]
    Timeout { ssid: String, timeout_ms: u64 },
}

/// Onboard temperature sensor behind an ADC channel.
pub trait TemperatureSensor {
    /// One raw 12-bit sample.
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

/// Logical button state; implementations resolve the pin polarity.
pub trait ButtonInput {
    fn is_pressed(&mut self) -> bool;
}

/// Delivers one status message to the report server.
pub trait MessageSender {
    fn send(&mut self, message: &str) -> Result<(), SendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: String,
}

impl Response {
    /// Body text from raw bytes, at most `limit` bytes long. A multi-byte
    /// character split by the limit is dropped; other invalid sequences
    /// become U+FFFD.
    pub fn body_from_bytes(mut bytes: Vec<u8>, limit: usize) -> String {
        bytes.truncate(limit);
        if let Err(err) = std::str::from_utf8(&bytes) {
            if err.error_len().is_none() {
                bytes.truncate(err.valid_up_to());
            }
        }

        let text = String::from_utf8_lossy(&bytes).into_owned();
        if text.len() <= limit {
            return text;
        }
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text[..end].to_string()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The server announced more body than was kept.
    pub fn body_truncated(&self) -> bool {
        self.content_length
            .is_some_and(|length| length > self.body.len() as u64)
    }
}

/// One synchronous GET against `host` with `target` (path plus query).
///
/// Implementations own any TLS configuration and connection for the
/// duration of the call only; both are released before returning, on every
/// path.
pub trait Transport {
    fn get(&mut self, host: &str, target: &str) -> Result<Response, TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiCredentials<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

pub trait WifiLink {
    fn init_radio(&mut self) -> Result<(), WifiError>;

    fn enable_station(&mut self) -> Result<(), WifiError>;

    fn connect(
        &mut self,
        credentials: &WifiCredentials<'_>,
        timeout: Duration,
    ) -> Result<(), WifiError>;
}
