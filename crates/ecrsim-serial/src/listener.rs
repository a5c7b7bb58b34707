//! Background reader for the serial line.
//!
//! One reader thread per open port classifies the incoming byte stream
//! into control bytes, framed responses, and unframed trailer bytes:
//!
//! ```text
//! Idle ──0x06/0x15──> Ack/Nak event, stay idle
//!  │
//!  └──0x02──> read LEN(2), read LEN+2 ──> Frame event ──> CollectingTrailer
//!                                                              │
//!                 ETX + one LRC byte, or 3 s elapsed ──────────┘
//!                 (Trailer event when bytes were collected)
//! ```
//!
//! The trailer phase exists because QR-bearing transactions append their
//! QR payload after the fixed response frame with no length prefix; the
//! only terminators are an ETX-plus-checksum pair or silence. That is a
//! device convention, not a protocol guarantee.
//!
//! The reader is generic over [`std::io::Read`] with timeouts surfacing as
//! `TimedOut`/`WouldBlock` errors, which is exactly how `serialport`
//! handles blocking reads. Tests drive it with scripted readers.

use crate::SerialEvent;
use ecrsim_core::constants::{ACK, ETX, NAK, QR_COLLECT_TIMEOUT_SECS, STX};
use ecrsim_protocol::decode_length;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// How long a started frame may take to arrive in full before the reader
/// abandons it and returns to idle.
const FRAME_BODY_TIMEOUT_SECS: u64 = 2;

/// Tunable bounds for the reader loop. Production uses the defaults; tests
/// shrink them to keep scripted scenarios fast.
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    /// Bound on trailer (QR) collection after a frame.
    pub trailer_timeout: Duration,
    /// Bound on reading the body of a started frame.
    pub frame_body_timeout: Duration,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        ReaderSettings {
            trailer_timeout: Duration::from_secs(QR_COLLECT_TIMEOUT_SECS),
            frame_body_timeout: Duration::from_secs(FRAME_BODY_TIMEOUT_SECS),
        }
    }
}

/// Handle to a running reader thread.
pub struct ListenerHandle {
    thread: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    presenting: Arc<AtomicBool>,
    connection_lost: Arc<AtomicBool>,
}

impl ListenerHandle {
    /// Whether the reader is still serving the port. A reader that exited
    /// or observed a port-level failure must be restarted before the next
    /// send, or the response would be silently dropped.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.thread.is_finished() && !self.connection_lost.load(Ordering::SeqCst)
    }

    /// Clear the stale presentation state before a new request so the
    /// next standalone ACK/NAK is reported rather than swallowed.
    pub fn clear_presenting(&self) {
        self.presenting.store(false, Ordering::SeqCst);
    }

    /// Signal the loop to stop and wait for the thread to finish.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.thread.join();
    }
}

/// Spawn a reader thread over the given port half.
pub fn spawn_reader<R>(
    port: R,
    events: UnboundedSender<SerialEvent>,
    settings: ReaderSettings,
) -> ListenerHandle
where
    R: Read + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let presenting = Arc::new(AtomicBool::new(false));
    let connection_lost = Arc::new(AtomicBool::new(false));

    let reader = Reader {
        port,
        events,
        settings,
        stop: Arc::clone(&stop),
        presenting: Arc::clone(&presenting),
        connection_lost: Arc::clone(&connection_lost),
        trailer: None,
    };

    let thread = std::thread::spawn(move || reader.run());
    info!("serial reader thread started");

    ListenerHandle {
        thread,
        stop,
        presenting,
        connection_lost,
    }
}

struct TrailerState {
    buffer: Vec<u8>,
    started: Instant,
}

struct Reader<R> {
    port: R,
    events: UnboundedSender<SerialEvent>,
    settings: ReaderSettings,
    stop: Arc<AtomicBool>,
    presenting: Arc<AtomicBool>,
    connection_lost: Arc<AtomicBool>,
    trailer: Option<TrailerState>,
}

impl<R: Read> Reader<R> {
    fn run(mut self) {
        debug!("serial reader loop started");

        while !self.stop.load(Ordering::SeqCst) {
            if let Some(trailer) = &self.trailer
                && trailer.started.elapsed() >= self.settings.trailer_timeout
            {
                if !trailer.buffer.is_empty() {
                    debug!(
                        collected = trailer.buffer.len(),
                        "trailer collection timed out mid-payload, discarding"
                    );
                }
                self.trailer = None;
                self.presenting.store(false, Ordering::SeqCst);
            }

            let mut byte = [0u8; 1];
            match self.port.read(&mut byte) {
                Ok(0) => {
                    self.disconnect("port closed");
                    break;
                }
                Ok(_) => self.handle_byte(byte[0]),
                Err(e) if is_timeout(&e) => {}
                Err(e) => {
                    self.disconnect(&e.to_string());
                    break;
                }
            }
        }

        debug!("serial reader loop ended");
    }

    fn handle_byte(&mut self, byte: u8) {
        match byte {
            ACK | NAK => {
                if self.trailer.is_some() || self.presenting.load(Ordering::SeqCst) {
                    debug!(byte = format!("0x{byte:02X}"), "control byte while presenting, skipped");
                } else if byte == ACK {
                    info!("received ACK");
                    let _ = self.events.send(SerialEvent::Ack);
                } else {
                    info!("received NAK");
                    let _ = self.events.send(SerialEvent::Nak);
                }
            }
            STX => {
                // A frame start always wins: a response may arrive with no
                // separate ACK, and a new frame ends any trailer collection.
                if let Some(trailer) = self.trailer.take()
                    && !trailer.buffer.is_empty()
                {
                    debug!(collected = trailer.buffer.len(), "new frame interrupts trailer collection");
                }
                self.read_frame();
            }
            ETX if self.trailer.is_some() => self.finish_trailer(),
            other => {
                if let Some(trailer) = &mut self.trailer {
                    trailer.buffer.push(other);
                } else {
                    warn!(byte = format!("0x{other:02X}"), "unexpected byte outside any frame");
                }
            }
        }
    }

    /// Read the remainder of a frame after its STX byte: two length bytes,
    /// then payload plus ETX plus LRC.
    fn read_frame(&mut self) {
        let deadline = Instant::now() + self.settings.frame_body_timeout;

        let mut length_bytes = [0u8; 2];
        if !self.read_exact_deadline(&mut length_bytes, deadline) {
            warn!("frame length field did not arrive, dropping frame");
            return;
        }

        let payload_len = decode_length(&length_bytes);
        let mut rest = vec![0u8; payload_len + 2];
        if !self.read_exact_deadline(&mut rest, deadline) {
            warn!(payload_len, "frame body did not arrive, dropping frame");
            return;
        }

        let mut frame = Vec::with_capacity(3 + rest.len());
        frame.push(STX);
        frame.extend_from_slice(&length_bytes);
        frame.extend_from_slice(&rest);

        let etx_terminated = rest[rest.len() - 2] == ETX;
        if etx_terminated {
            debug!(len = frame.len(), "complete response frame received");
        } else {
            // Tolerated: the codec logs the anomaly and still parses.
            warn!(len = frame.len(), "frame ended without ETX at expected offset");
        }

        self.presenting.store(true, Ordering::SeqCst);
        let _ = self.events.send(SerialEvent::Frame(frame));

        self.trailer = Some(TrailerState {
            buffer: Vec::new(),
            started: Instant::now(),
        });
    }

    /// ETX seen during trailer collection: one more byte (the trailer's
    /// own LRC) closes the payload.
    fn finish_trailer(&mut self) {
        let deadline = Instant::now() + self.settings.frame_body_timeout;
        let mut lrc = [0u8; 1];
        if !self.read_exact_deadline(&mut lrc, deadline) {
            warn!("trailer ETX without LRC byte");
        }

        if let Some(trailer) = self.trailer.take() {
            info!(len = trailer.buffer.len(), "trailer collection complete");
            if !trailer.buffer.is_empty() {
                let _ = self.events.send(SerialEvent::Trailer(trailer.buffer));
            }
        }
        self.presenting.store(false, Ordering::SeqCst);
    }

    /// Fill `buf` from the port, riding out read timeouts until `deadline`.
    /// Returns false when the deadline passes or the port fails; a port
    /// failure is left for the main loop to observe on its next read.
    fn read_exact_deadline(&mut self, buf: &mut [u8], deadline: Instant) -> bool {
        let mut filled = 0;
        while filled < buf.len() {
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => return false,
                Ok(n) => filled += n,
                Err(e) if is_timeout(&e) => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }
        true
    }

    fn disconnect(&mut self, reason: &str) {
        warn!(reason, "serial connection lost");
        self.connection_lost.store(true, Ordering::SeqCst);
        let _ = self.events.send(SerialEvent::Disconnected(reason.to_string()));
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}
