//! Socket transport for the EDC terminal link.
//!
//! Two independently selectable modes, chosen by configuration and never
//! mixed within one connection lifetime:
//!
//! - [`FramedClient`] speaks the raw framed protocol over TCP (optionally
//!   TLS with certificate validation disabled, simulator-grade only).
//! - [`RestClient`] talks to the vendor's HTTP/REST adapter: submit a
//!   transaction, then poll for its result.

pub mod client;
pub mod rest;

pub use client::FramedClient;
pub use rest::{RestClient, SerialDetection, SerialProbe};

use ecrsim_core::constants::DEFAULT_EDC_SERIAL;
use thiserror::Error;

/// Socket endpoint parameters, as stored in the settings document.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub host: String,
    pub port: u16,
    /// Wrap the connection in TLS. Certificate validation stays disabled:
    /// the simulator talks to lab devices with self-signed certificates.
    pub enable_ssl: bool,
    /// Use the HTTP/REST adapter instead of the raw framed protocol.
    pub enable_rest_api: bool,
    /// Device serial number; the REST password derives from it.
    pub edc_serial_number: String,
}

impl Default for SocketConfig {
    fn default() -> Self {
        SocketConfig {
            host: "127.0.0.1".to_string(),
            port: 9001,
            enable_ssl: false,
            enable_rest_api: false,
            edc_serial_number: DEFAULT_EDC_SERIAL.to_string(),
        }
    }
}

/// Errors from socket transport operations.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Device rejected the request (NAK)")]
    Nak,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ecrsim_core::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
