//! Tokio codec for the socket transport's byte stream.
//!
//! The device answers a framed request with an optional standalone ACK/NAK
//! byte followed by the fixed-size response frame, possibly with unframed
//! QR bytes appended. This codec turns that stream into discrete items:
//!
//! ```text
//! 0x06                      -> SocketItem::Ack
//! 0x15                      -> SocketItem::Nak
//! STX LEN payload ETX LRC.. -> SocketItem::Frame (plus any buffered tail)
//! ```
//!
//! A frame is emitted only once the full fixed size (length header plus
//! overhead) has been buffered; bytes already buffered beyond that point
//! travel with the frame, because trailing QR data carries no length
//! prefix and belongs to the response that precedes it.

use crate::frame::decode_length;
use bytes::{Buf, Bytes, BytesMut};
use ecrsim_core::constants::{ACK, FRAME_OVERHEAD, NAK, STX};
use ecrsim_core::Error;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// One decoded unit from the device stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketItem {
    /// Standalone positive acknowledgement.
    Ack,
    /// Standalone negative acknowledgement.
    Nak,
    /// A complete response frame, including any trailing bytes that were
    /// already buffered behind it.
    Frame(Bytes),
}

/// Decoder/encoder for the framed socket exchange.
#[derive(Debug, Default)]
pub struct FmsFrameCodec;

impl FmsFrameCodec {
    #[must_use]
    pub fn new() -> Self {
        FmsFrameCodec
    }
}

impl Decoder for FmsFrameCodec {
    type Item = SocketItem;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<SocketItem>, Error> {
        loop {
            let Some(&first) = src.first() else {
                return Ok(None);
            };

            match first {
                ACK => {
                    src.advance(1);
                    return Ok(Some(SocketItem::Ack));
                }
                NAK => {
                    src.advance(1);
                    return Ok(Some(SocketItem::Nak));
                }
                STX => {
                    if src.len() < 3 {
                        return Ok(None);
                    }
                    let payload_len = decode_length(&[src[1], src[2]]);
                    let frame_len = payload_len + FRAME_OVERHEAD;
                    if src.len() < frame_len {
                        // The length field bounds the wait: at most ~1 KB
                        // can buffer before a frame completes.
                        src.reserve(frame_len - src.len());
                        return Ok(None);
                    }
                    // Take the frame and everything buffered behind it:
                    // trailing QR bytes have no framing of their own.
                    let frame = src.split_to(src.len()).freeze();
                    return Ok(Some(SocketItem::Frame(frame)));
                }
                other => {
                    warn!(byte = format!("0x{other:02X}"), "discarding unexpected byte");
                    src.advance(1);
                }
            }
        }
    }
}

impl Encoder<Vec<u8>> for FmsFrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<(), Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::build_frame;

    fn response_frame() -> Vec<u8> {
        build_frame(&[0u8; 300])
    }

    #[test]
    fn decodes_standalone_ack_and_nak() {
        let mut codec = FmsFrameCodec::new();
        let mut buf = BytesMut::from(&[ACK, NAK][..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(SocketItem::Ack));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(SocketItem::Nak));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn buffers_partial_frame() {
        let mut codec = FmsFrameCodec::new();
        let frame = response_frame();

        let mut buf = BytesMut::from(&frame[..100]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(&frame[100..]);
        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(item, SocketItem::Frame(Bytes::from(frame)));
    }

    #[test]
    fn ack_then_frame() {
        let mut codec = FmsFrameCodec::new();
        let frame = response_frame();

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[ACK]);
        buf.extend_from_slice(&frame);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(SocketItem::Ack));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(SocketItem::Frame(Bytes::from(frame)))
        );
    }

    #[test]
    fn trailer_bytes_travel_with_the_frame() {
        let mut codec = FmsFrameCodec::new();
        let mut frame = response_frame();
        frame.extend_from_slice(b"0002hQRDATA");

        let mut buf = BytesMut::from(&frame[..]);
        let item = codec.decode(&mut buf).unwrap().unwrap();
        match item {
            SocketItem::Frame(bytes) => {
                assert_eq!(bytes.len(), 305 + 11);
                assert!(bytes.ends_with(b"QRDATA"));
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn garbage_before_frame_is_discarded() {
        let mut codec = FmsFrameCodec::new();
        let frame = response_frame();

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x7F, 0x00]);
        buf.extend_from_slice(&frame);

        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(item, SocketItem::Frame(Bytes::from(frame)));
    }

    #[test]
    fn encoder_passes_frames_through() {
        let mut codec = FmsFrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(vec![0x02, 0x00, 0x05], &mut buf).unwrap();
        assert_eq!(&buf[..], &[0x02, 0x00, 0x05]);
    }
}
