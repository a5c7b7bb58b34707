//! Protocol-level constants for the FMS EDC message dialect.
//!
//! The FMS protocol frames fixed-size binary payloads between STX/ETX
//! markers with a packed-decimal length field and an XOR checksum:
//!
//! ```text
//! <STX> <LEN hi> <LEN lo> <PAYLOAD ...> <ETX> <LRC>
//! 0x02  0x02     0x00     200 bytes     0x03  xor
//! ```
//!
//! The length field is packed decimal, not binary: the high byte carries
//! the hundreds digit and the low byte the tens and ones (200 -> 0x02 0x00,
//! 300 -> 0x03 0x00).
//!
//! # Checksum scope
//!
//! The LRC is the XOR of every byte from STX through ETX inclusive. The
//! written bank specification excludes STX, but the shipped devices include
//! it; interoperability requires matching the devices, not the document.

// ============================================================================
// Framing bytes
// ============================================================================

/// Start of text marker.
pub const STX: u8 = 0x02;

/// End of text marker.
pub const ETX: u8 = 0x03;

/// Positive acknowledgement, sent standalone by the device.
pub const ACK: u8 = 0x06;

/// Negative acknowledgement, sent standalone by the device.
pub const NAK: u8 = 0x15;

// ============================================================================
// Frame geometry
// ============================================================================

/// Request payload size in bytes:
/// transType(1) + amount(12) + addAmount(12) + invoiceNo(12) + cardNo(19) + filler(144).
pub const REQUEST_PAYLOAD_LEN: usize = 200;

/// Complete request frame size: STX + LEN(2) + payload + ETX + LRC.
pub const REQUEST_FRAME_LEN: usize = REQUEST_PAYLOAD_LEN + FRAME_OVERHEAD;

/// Response payload size in bytes (20 named fields + 84-byte filler).
pub const RESPONSE_PAYLOAD_LEN: usize = 300;

/// Complete response frame size: STX + LEN(2) + payload + ETX + LRC.
pub const RESPONSE_FRAME_LEN: usize = RESPONSE_PAYLOAD_LEN + FRAME_OVERHEAD;

/// Bytes of framing around a payload: STX + LEN(2) + ETX + LRC.
pub const FRAME_OVERHEAD: usize = 5;

/// Width of the amount, add-amount and invoice fields on the wire.
pub const AMOUNT_FIELD_LEN: usize = 12;

/// Width of the invoice/trace/reference field on the wire.
pub const INVOICE_FIELD_LEN: usize = 12;

/// Width of the card number field on the wire.
pub const CARD_FIELD_LEN: usize = 19;

/// Request filler, reserved for bank use.
pub const REQUEST_FILLER_LEN: usize = 144;

/// Response filler; carries either a status message or residual QR data.
pub const RESPONSE_FILLER_LEN: usize = 84;

// ============================================================================
// Transaction type range
// ============================================================================

/// Lowest valid transaction type code (SALE).
pub const MIN_TRANSACTION_TYPE: u8 = 0x01;

/// Highest valid transaction type code (INFO KARTU BRIZZI).
pub const MAX_TRANSACTION_TYPE: u8 = 0x1E;

// ============================================================================
// Timing
// ============================================================================

/// Poll cadence for both the native socket receive loop and REST result
/// polling, matching the device vendor's reference client.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Upper bound on waiting for a native-socket response. The device may
/// legitimately take minutes (cardholder interaction), so the bound is
/// a safety net, not an expectation.
pub const SOCKET_RESPONSE_TIMEOUT_SECS: u64 = 600;

/// REST result polling bound: 6000 polls at 100 ms = 10 minutes.
pub const REST_MAX_POLLS: u32 = 6000;

/// Per-request timeout for the REST submit call.
pub const REST_SUBMIT_TIMEOUT_SECS: u64 = 60;

/// Per-request timeout for each REST result poll.
pub const REST_POLL_TIMEOUT_SECS: u64 = 5;

/// How long the serial reader collects unframed trailer bytes (QR data)
/// after a complete response before giving up.
pub const QR_COLLECT_TIMEOUT_SECS: u64 = 3;

/// Pause after a native-socket send before the first ACK read.
pub const ACK_WAIT_MS: u64 = 500;

/// Blocking-read timeout for the serial reader loop.
pub const SERIAL_READ_TIMEOUT_MS: u64 = 100;

/// Serial reconnection policy: bounded attempts with a fixed pause.
pub const SERIAL_RECONNECT_ATTEMPTS: u32 = 3;
pub const SERIAL_RECONNECT_PAUSE_SECS: u64 = 2;

// ============================================================================
// Response codes
// ============================================================================

/// Response codes the host treats as a successful business outcome.
pub const SUCCESS_RESPONSE_CODES: [&str; 2] = ["00", "Z1"];

/// Response code signalling a device-side error; the failure reason then
/// travels in the QR/message field.
pub const RESPONSE_CODE_ERROR: &str = "ER";

// ============================================================================
// REST adapter contract
// ============================================================================

/// Fixed HTTP Basic username of the REST adapter.
pub const REST_USERNAME: &str = "VfiF4BRI";

/// The Basic password is this prefix followed by the device serial number.
pub const REST_PASSWORD_PREFIX: &str = "VFI";

/// Factory-default device serial number.
pub const DEFAULT_EDC_SERIAL: &str = "V1E1012320";

/// Transaction submit endpoint on the REST adapter.
pub const REST_TRANSACTION_PATH: &str = "/transaction/bri";

/// Result polling endpoint on the REST adapter.
pub const REST_RESULT_PATH: &str = "/result/bri";

/// Serial numbers tried by credential auto-discovery, in order.
pub const CANDIDATE_EDC_SERIALS: [&str; 4] =
    ["V1E0212639", "V1E1012320", "V1E0000001", "V1E0000000"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_sizes_add_up() {
        assert_eq!(REQUEST_FRAME_LEN, 205);
        assert_eq!(RESPONSE_FRAME_LEN, 305);
        assert_eq!(
            REQUEST_PAYLOAD_LEN,
            1 + AMOUNT_FIELD_LEN * 2 + INVOICE_FIELD_LEN + CARD_FIELD_LEN + REQUEST_FILLER_LEN
        );
    }
}
