//! Byte-level framing for FMS messages.
//!
//! A frame wraps a fixed-size payload as
//! `STX | LEN(2) | PAYLOAD | ETX | LRC`. The length field is packed
//! decimal (high byte = hundreds, low byte = tens and ones), and the LRC
//! is an XOR fold over every byte from STX through ETX inclusive.
//!
//! Including STX in the checksum deviates from the written bank
//! specification. The deployed devices compute it that way, and matching
//! them is what interoperability means here.

use ecrsim_core::constants::{ETX, FRAME_OVERHEAD, STX};

/// XOR-fold checksum over the given bytes. No special casing.
#[must_use]
pub fn compute_lrc(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Encode a payload length as the 2-byte packed-decimal field.
///
/// 200 encodes as `[0x02, 0x00]`, 300 as `[0x03, 0x00]`.
#[must_use]
pub fn encode_length(len: usize) -> [u8; 2] {
    [(len / 100) as u8, (len % 100) as u8]
}

/// Decode the 2-byte packed-decimal length field.
#[must_use]
pub fn decode_length(bytes: &[u8; 2]) -> usize {
    bytes[0] as usize * 100 + bytes[1] as usize
}

/// Wrap a payload into a complete wire frame.
#[must_use]
pub fn build_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    frame.push(STX);
    frame.extend_from_slice(&encode_length(payload.len()));
    frame.extend_from_slice(payload);
    frame.push(ETX);
    let lrc = compute_lrc(&frame);
    frame.push(lrc);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn lrc_is_plain_xor() {
        assert_eq!(compute_lrc(&[]), 0x00);
        assert_eq!(compute_lrc(&[0xAB]), 0xAB);
        assert_eq!(compute_lrc(&[0x01, 0x02, 0x03]), 0x00);
        assert_eq!(compute_lrc(&[0xFF, 0x0F]), 0xF0);
    }

    #[rstest]
    #[case(200, [0x02, 0x00])]
    #[case(300, [0x03, 0x00])]
    #[case(5, [0x00, 0x05])]
    #[case(99, [0x00, 0x63])]
    fn length_field_round_trips(#[case] len: usize, #[case] encoded: [u8; 2]) {
        assert_eq!(encode_length(len), encoded);
        assert_eq!(decode_length(&encoded), len);
    }

    #[test]
    fn frame_layout() {
        let payload = [0x41u8; 200];
        let frame = build_frame(&payload);

        assert_eq!(frame.len(), 205);
        assert_eq!(frame[0], STX);
        assert_eq!(frame[1], 0x02);
        assert_eq!(frame[2], 0x00);
        assert_eq!(frame[203], ETX);
        // LRC covers STX..=ETX, so XOR of the whole frame is zero.
        assert_eq!(compute_lrc(&frame), 0x00);
    }

    #[test]
    fn frame_lrc_includes_stx() {
        let payload = [0x00u8; 200];
        let frame = build_frame(&payload);
        // XOR of STX(0x02), LEN(0x02,0x00), 200 zero bytes and ETX(0x03).
        assert_eq!(frame[204], 0x02 ^ 0x02 ^ 0x00 ^ 0x03);
    }
}
