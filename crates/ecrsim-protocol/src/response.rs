//! Response-side parsing: a framed device response to structured fields.
//!
//! Response payload layout (300 bytes, fixed offsets):
//!
//! ```text
//! transType(1) tid(8) mid(15) batchNumber(6) issuerName(25) traceNo(6)
//! invoiceNo(6) entryMode(1) transAmount(12) totalAmount(12) cardNo(19)
//! cardholderName(26) date(8) time(6) approvalCode(8) responseCode(2)
//! refNumber(12) balancePrepaid(12) topupCardNo(19) transAddAmount(12)
//! filler(84)
//! ```
//!
//! The device is known to violate its own framing in the field: a missing
//! ETX or a wrong LRC is logged at WARN and the data is still surfaced.
//! Strict rejection would discard real responses from real terminals.

use crate::frame::{compute_lrc, decode_length};
use ecrsim_core::constants::{ETX, FRAME_OVERHEAD, RESPONSE_FRAME_LEN, RESPONSE_PAYLOAD_LEN, STX};
use ecrsim_core::{Error, Result, constants};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A parsed device response with display-formatted fields.
///
/// Amounts are converted back from wire minor units to display form, the
/// date is reshaped `YYYYMMDD -> YYYY-MM-DD` and the time `HHMMSS -> HH:MM`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedResponse {
    pub trans_type: String,
    pub tid: String,
    pub mid: String,
    pub batch_number: String,
    pub issuer_name: String,
    pub trace_no: String,
    pub invoice_no: String,
    pub entry_mode: String,
    pub trans_amount: String,
    pub total_amount: String,
    pub card_no: String,
    pub cardholder_name: String,
    pub date: String,
    pub time: String,
    pub approval_code: String,
    pub response_code: String,
    pub ref_number: String,
    pub balance_prepaid: String,
    pub topup_card_no: String,
    pub trans_add_amount: String,
    /// Free-text status message carried in the filler field.
    pub filler: String,
    /// Residual QR data, from the filler heuristic or a serial trailer.
    pub qr_code: String,
    /// Bytes that trailed the 305-byte frame, preserved for the caller.
    #[serde(skip)]
    pub trailing: Vec<u8>,
}

impl ParsedResponse {
    /// Whether the device reported a successful business outcome.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure_reason().is_none()
    }

    /// The reason this response counts as a failure, if it does.
    ///
    /// Code `ER` carries its reason in the QR/message field; any code other
    /// than the accepted success codes fails with the code itself.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        let code = self.response_code.as_str();
        if code == constants::RESPONSE_CODE_ERROR {
            let reason = if self.qr_code.trim().is_empty() {
                "Transaction failed".to_string()
            } else {
                self.qr_code.clone()
            };
            return Some(reason);
        }
        if constants::SUCCESS_RESPONSE_CODES.contains(&code) {
            None
        } else {
            Some(format!("Response code: {code}"))
        }
    }

    /// Device-reported timestamp as `YYYY-MM-DD HH:MM:SS`, when both the
    /// date and time fields parsed cleanly.
    #[must_use]
    pub fn device_timestamp(&self) -> Option<String> {
        // date is already reshaped to YYYY-MM-DD; time to HH:MM.
        if self.date.len() != 10 || self.time.len() != 5 {
            return None;
        }
        let valid = self.date.chars().enumerate().all(|(i, c)| match i {
            4 | 7 => c == '-',
            _ => c.is_ascii_digit(),
        }) && self.time.chars().enumerate().all(|(i, c)| match i {
            2 => c == ':',
            _ => c.is_ascii_digit(),
        });
        valid.then(|| format!("{} {}:00", self.date, self.time))
    }
}

/// Decode a field slice, dropping trailing NULs and whitespace.
pub(crate) fn clean_field(bytes: &[u8]) -> String {
    let text: String = bytes
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();
    text.trim_end_matches('\0').trim().to_string()
}

/// Convert a wire amount (minor units) back to display form: integer when
/// whole, two decimals otherwise. Non-numeric input passes through.
pub(crate) fn format_display_amount(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match raw.parse::<i64>() {
        Ok(value) => {
            if value % 100 == 0 {
                (value / 100).to_string()
            } else {
                format!("{}.{:02}", value / 100, (value % 100).abs())
            }
        }
        Err(_) => raw.to_string(),
    }
}

/// Reshape `YYYYMMDD` into `YYYY-MM-DD`; anything else passes through.
pub(crate) fn format_date(raw: &str) -> String {
    if raw.len() != 8 {
        return raw.to_string();
    }
    format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..8])
}

/// Reshape `HHMMSS` into `HH:MM` (seconds dropped); anything else passes
/// through.
pub(crate) fn format_time(raw: &str) -> String {
    if raw.len() != 6 {
        return raw.to_string();
    }
    format!("{}:{}", &raw[..2], &raw[2..4])
}

/// Walks the fixed-offset fields of a response payload.
struct FieldCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl FieldCursor<'_> {
    fn byte(&mut self) -> u8 {
        let value = self.data[self.offset];
        self.offset += 1;
        value
    }

    fn text(&mut self, len: usize) -> String {
        let value = clean_field(&self.data[self.offset..self.offset + len]);
        self.offset += len;
        value
    }
}

/// Split the trimmed filler content into a status message and QR data.
///
/// A leading ASCII `"00"` marks residual QR data, anything else is a
/// free-text status message. This is a device convention, not a protocol
/// guarantee; a firmware change could break the sniffing.
pub(crate) fn split_filler(filler_content: String) -> (String, String) {
    if !filler_content.is_empty() && !filler_content.starts_with("00") {
        (filler_content, String::new())
    } else {
        (String::new(), filler_content)
    }
}

/// Parse a framed device response.
///
/// Accepts frames longer than the fixed 305 bytes: the surplus is exposed
/// on [`ParsedResponse::trailing`], never silently dropped, because QR
/// payloads trail the primary frame with no length prefix.
///
/// # Errors
/// - `FrameTooShort` below the 5-byte header or the full frame size
/// - `MissingStx` when the first byte is not 0x02
/// - `UnexpectedLength` when the length field is not 300
///
/// Missing ETX and LRC mismatch are deliberate soft failures (WARN only).
pub fn parse_response(bytes: &[u8]) -> Result<ParsedResponse> {
    if bytes.len() < FRAME_OVERHEAD {
        return Err(Error::FrameTooShort {
            expected: FRAME_OVERHEAD,
            actual: bytes.len(),
        });
    }
    if bytes[0] != STX {
        return Err(Error::MissingStx(bytes[0]));
    }

    let length_bytes = [bytes[1], bytes[2]];
    let payload_len = decode_length(&length_bytes);
    if payload_len != RESPONSE_PAYLOAD_LEN {
        return Err(Error::UnexpectedLength {
            expected: RESPONSE_PAYLOAD_LEN,
            actual: payload_len,
        });
    }

    if bytes.len() < RESPONSE_FRAME_LEN {
        return Err(Error::FrameTooShort {
            expected: RESPONSE_FRAME_LEN,
            actual: bytes.len(),
        });
    }
    if bytes.len() > RESPONSE_FRAME_LEN {
        debug!(
            surplus = bytes.len() - RESPONSE_FRAME_LEN,
            "response longer than frame, keeping trailing bytes"
        );
    }

    let data = &bytes[3..3 + RESPONSE_PAYLOAD_LEN];
    let etx_offset = 3 + RESPONSE_PAYLOAD_LEN;
    let etx = bytes[etx_offset];
    if etx != ETX {
        warn!(found = format!("0x{etx:02X}"), offset = etx_offset, "ETX not at expected offset");
    } else {
        let received_lrc = bytes[etx_offset + 1];
        let mut checked = Vec::with_capacity(RESPONSE_FRAME_LEN - 1);
        checked.push(bytes[0]);
        checked.extend_from_slice(&length_bytes);
        checked.extend_from_slice(data);
        checked.push(etx);
        let computed_lrc = compute_lrc(&checked);
        if received_lrc != computed_lrc {
            // The physical device occasionally violates its own checksum;
            // surfacing the data beats strict rejection.
            warn!(
                received = format!("0x{received_lrc:02X}"),
                computed = format!("0x{computed_lrc:02X}"),
                "LRC mismatch"
            );
        }
    }

    let mut cursor = FieldCursor { data, offset: 0 };

    let trans_type = format!("{:02X}", cursor.byte());
    let tid = cursor.text(8);
    let mid = cursor.text(15);
    let batch_number = cursor.text(6);
    let issuer_name = cursor.text(25);
    let trace_no = cursor.text(6);
    let invoice_no = cursor.text(6);
    let entry_mode_byte = cursor.byte();
    let entry_mode = if entry_mode_byte == 0 {
        String::new()
    } else {
        (entry_mode_byte as char).to_string()
    };
    let trans_amount = cursor.text(12);
    let total_amount = cursor.text(12);
    let card_no = cursor.text(19);
    let cardholder_name = cursor.text(26);
    let date = cursor.text(8);
    let time = cursor.text(6);
    let approval_code = cursor.text(8);
    let response_code = cursor.text(2);
    let ref_number = cursor.text(12);
    let balance_prepaid = cursor.text(12);
    let topup_card_no = cursor.text(19);
    let trans_add_amount = cursor.text(12);
    let filler_content = cursor.text(84);
    debug_assert_eq!(cursor.offset, RESPONSE_PAYLOAD_LEN);

    let (filler, qr_code) = split_filler(filler_content);

    Ok(ParsedResponse {
        trans_type,
        tid,
        mid,
        batch_number,
        issuer_name,
        trace_no,
        invoice_no,
        entry_mode,
        trans_amount: format_display_amount(&trans_amount),
        total_amount: format_display_amount(&total_amount),
        card_no,
        cardholder_name,
        date: format_date(&date),
        time: format_time(&time),
        approval_code,
        response_code,
        ref_number,
        balance_prepaid: format_display_amount(&balance_prepaid),
        topup_card_no,
        trans_add_amount: format_display_amount(&trans_add_amount),
        filler,
        qr_code,
        trailing: bytes[RESPONSE_FRAME_LEN..].to_vec(),
    })
}
