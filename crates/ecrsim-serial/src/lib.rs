//! Serial transport for the EDC terminal link.
//!
//! A background reader thread classifies incoming bytes into control
//! bytes, framed responses and trailing QR payloads, and delivers them as
//! [`SerialEvent`]s over a channel; the transport owns the port handle,
//! the send path, and the bounded reconnection policy.

pub mod listener;
pub mod transport;

pub use listener::{ListenerHandle, ReaderSettings, spawn_reader};
pub use transport::{PortInfo, SerialConfig, SerialError, SerialTransport, available_ports};

/// One classified unit from the serial reader.
///
/// `Frame` arrives as soon as a complete response frame is read; a
/// `Trailer` follows only when unframed QR bytes were collected after it.
/// The consumer merges the trailer into the response it just handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialEvent {
    /// Standalone positive acknowledgement.
    Ack,
    /// Standalone negative acknowledgement.
    Nak,
    /// A complete response frame (STX through LRC).
    Frame(Vec<u8>),
    /// QR bytes collected after the frame, without their ETX/LRC tail.
    Trailer(Vec<u8>),
    /// The port failed; the reader loop has ended.
    Disconnected(String),
}
