//! Request-side packing: a logical transaction request to the 205-byte frame.
//!
//! Request payload layout (200 bytes):
//!
//! ```text
//! transType(1) | amount(12) | addAmount(12) | invoiceNo(12) | cardNo(19) | filler(144)
//! ```
//!
//! Amounts travel as 12 ASCII digits of minor units: the logical integer
//! amount formatted `%010d` with a literal `"00"` appended, i.e. always
//! multiplied by 100. The invoice/trace/reference field is capped per
//! transaction type (6/10/12 digits) but always zero-padded to 12 on the
//! wire.

use crate::frame::build_frame;
use ecrsim_core::constants::{
    AMOUNT_FIELD_LEN, CARD_FIELD_LEN, INVOICE_FIELD_LEN, REQUEST_FILLER_LEN, REQUEST_PAYLOAD_LEN,
};
use ecrsim_core::{Error, Result, TransactionType};
use serde::{Deserialize, Serialize};

/// A logical transaction request as entered by the operator.
///
/// Amounts are kept as the operator typed them (integer strings, commas
/// tolerated); validation and wire formatting happen at pack time so a
/// request can be previewed without mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub transaction_type: TransactionType,
    pub amount: String,
    pub add_amount: String,
    pub invoice_no: String,
    pub card_no: String,
}

impl TransactionRequest {
    /// Convenience constructor for amount-only transactions.
    #[must_use]
    pub fn new(transaction_type: TransactionType, amount: impl Into<String>) -> Self {
        TransactionRequest {
            transaction_type,
            amount: amount.into(),
            add_amount: "0".to_string(),
            invoice_no: String::new(),
            card_no: String::new(),
        }
    }

    #[must_use]
    pub fn with_add_amount(mut self, add_amount: impl Into<String>) -> Self {
        self.add_amount = add_amount.into();
        self
    }

    #[must_use]
    pub fn with_invoice(mut self, invoice_no: impl Into<String>) -> Self {
        self.invoice_no = invoice_no.into();
        self
    }

    #[must_use]
    pub fn with_card(mut self, card_no: impl Into<String>) -> Self {
        self.card_no = card_no.into();
        self
    }
}

/// Format an operator amount as the 12-digit wire field.
///
/// The wire always carries minor units: `%010d` + `"00"`, so amount `10`
/// becomes `"000000001000"`.
///
/// # Errors
/// Returns `Error::InvalidAmount` for non-numeric, negative, or
/// field-overflowing values.
pub fn format_amount(amount: &str) -> Result<String> {
    let cleaned = amount.replace(',', "");
    let value: i64 = cleaned
        .trim()
        .parse()
        .map_err(|_| Error::InvalidAmount(format!("'{amount}' is not a valid number")))?;
    if value < 0 {
        return Err(Error::InvalidAmount("amount must be non-negative".to_string()));
    }
    let formatted = format!("{value:010}00");
    if formatted.len() != AMOUNT_FIELD_LEN {
        return Err(Error::InvalidAmount(format!(
            "'{amount}' does not fit the {AMOUNT_FIELD_LEN}-digit wire field"
        )));
    }
    Ok(formatted)
}

/// Validate and format the invoice/trace/reference number for the wire.
///
/// The UI cap depends on the transaction type (6 digits for VOID-class
/// trace numbers, 10 for QRIS refund references, 12 otherwise); the wire
/// field is always zero-padded to 12 regardless.
///
/// # Errors
/// Returns `Error::InvalidInvoiceLength` when the value exceeds the cap,
/// or `Error::InvalidAmount`-style rejection for non-numeric input.
pub fn format_invoice(invoice_no: &str, transaction_type: TransactionType) -> Result<String> {
    let value = if invoice_no.trim().is_empty() { "0" } else { invoice_no.trim() };
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidInvoiceLength {
            field: transaction_type.invoice_display_label(),
            max_digits: transaction_type.max_invoice_digits(),
            actual: value.len(),
        });
    }

    let max_digits = transaction_type.max_invoice_digits();
    if value.len() > max_digits {
        return Err(Error::InvalidInvoiceLength {
            field: transaction_type.invoice_display_label(),
            max_digits,
            actual: value.len(),
        });
    }

    Ok(format!("{value:0>width$}", width = INVOICE_FIELD_LEN))
}

/// Validate the card number: empty, or alphanumeric with spaces.
///
/// # Errors
/// Returns `Error::InvalidCardFormat` otherwise.
pub fn validate_card(card_no: &str) -> Result<()> {
    if !card_no.is_empty()
        && !card_no.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ')
    {
        return Err(Error::InvalidCardFormat(card_no.to_string()));
    }
    Ok(())
}

/// A request after validation, with every field in its wire shape.
///
/// Shared between the pure and the native codec so validation runs exactly
/// once regardless of which implementation produces the bytes.
#[derive(Debug, Clone)]
pub struct PackedFields {
    pub trans_code: u8,
    pub amount: String,
    pub add_amount: String,
    pub invoice_no: String,
    pub card_no: String,
}

impl PackedFields {
    /// The 19-byte NUL-padded card field.
    #[must_use]
    pub fn card_field(&self) -> [u8; CARD_FIELD_LEN] {
        let mut card = [0u8; CARD_FIELD_LEN];
        for (slot, byte) in card.iter_mut().zip(self.card_no.bytes()) {
            *slot = byte;
        }
        card
    }

    /// Assemble the 200-byte request payload.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(REQUEST_PAYLOAD_LEN);
        payload.push(self.trans_code);
        payload.extend_from_slice(self.amount.as_bytes());
        payload.extend_from_slice(self.add_amount.as_bytes());
        payload.extend_from_slice(self.invoice_no.as_bytes());
        payload.extend_from_slice(&self.card_field());
        payload.extend_from_slice(&[0u8; REQUEST_FILLER_LEN]);
        debug_assert_eq!(payload.len(), REQUEST_PAYLOAD_LEN);
        payload
    }
}

/// Validate a request and bring every field into wire shape.
///
/// # Errors
/// Any of the request validation errors; nothing is retried here.
pub fn prepare_request(request: &TransactionRequest) -> Result<PackedFields> {
    let amount = format_amount(&request.amount)?;
    let add_amount = format_amount(&request.add_amount)?;
    let invoice_no = format_invoice(&request.invoice_no, request.transaction_type)?;
    validate_card(&request.card_no)?;

    Ok(PackedFields {
        trans_code: request.transaction_type.code(),
        amount,
        add_amount,
        invoice_no,
        card_no: request.card_no.clone(),
    })
}

/// Validate a request and pack it into the complete 205-byte wire frame.
///
/// `pre_multiplied` records whether the caller already converted the amount
/// to minor units upstream; the wire format multiplies by 100 either way,
/// so the flag never changes the produced bytes.
///
/// # Errors
/// Any of the request validation errors; nothing is retried here.
pub fn pack_request(request: &TransactionRequest, pre_multiplied: bool) -> Result<Vec<u8>> {
    let _ = pre_multiplied;
    let fields = prepare_request(request)?;
    Ok(build_frame(&fields.to_payload()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecrsim_core::constants::{ETX, REQUEST_FRAME_LEN, STX};
    use rstest::rstest;

    fn sale(amount: &str) -> TransactionRequest {
        TransactionRequest::new(TransactionType::Sale, amount)
    }

    #[rstest]
    #[case("10", "000000001000")]
    #[case("0", "000000000000")]
    #[case("1500", "000000150000")]
    #[case("1,500", "000000150000")]
    #[case("9999999999", "999999999900")]
    fn amount_wire_format(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(format_amount(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("-5")]
    #[case("10000000000")] // 11 digits overflows the 10-digit integer part
    fn bad_amounts_rejected(#[case] input: &str) {
        assert!(format_amount(input).is_err());
    }

    #[rstest]
    #[case("123456", TransactionType::Sale, "000000123456")]
    #[case("", TransactionType::Sale, "000000000000")]
    #[case("123456", TransactionType::Void, "000000123456")]
    #[case("1234567890", TransactionType::QrisRefund, "001234567890")]
    #[case("123456789012", TransactionType::QrisStatus, "123456789012")]
    fn invoice_wire_format(
        #[case] input: &str,
        #[case] t: TransactionType,
        #[case] expected: &str,
    ) {
        assert_eq!(format_invoice(input, t).unwrap(), expected);
    }

    #[rstest]
    // 15 digits over the 12-digit SALE cap
    #[case("123456789012345", TransactionType::Sale)]
    // and over the 6-digit VOID trace cap
    #[case("123456789012345", TransactionType::Void)]
    #[case("1234567", TransactionType::Void)]
    #[case("12345678901", TransactionType::QrisRefund)]
    #[case("12a456", TransactionType::Sale)]
    fn bad_invoices_rejected(#[case] input: &str, #[case] t: TransactionType) {
        let err = format_invoice(input, t).unwrap_err();
        assert!(matches!(err, Error::InvalidInvoiceLength { .. }));
    }

    #[test]
    fn card_validation() {
        assert!(validate_card("").is_ok());
        assert!(validate_card("6013500012345678901").is_ok());
        assert!(validate_card("ABC 123").is_ok());
        assert!(validate_card("1234-5678").is_err());
        assert!(validate_card("café").is_err());
    }

    #[test]
    fn packed_frame_geometry() {
        let frame = pack_request(&sale("10"), true).unwrap();

        assert_eq!(frame.len(), REQUEST_FRAME_LEN);
        assert_eq!(frame[0], STX);
        assert_eq!(&frame[1..3], &[0x02, 0x00]);
        assert_eq!(frame[3], 0x01); // SALE
        assert_eq!(&frame[4..16], b"000000001000");
        assert_eq!(&frame[16..28], b"000000000000"); // add amount
        assert_eq!(&frame[28..40], b"000000000000"); // invoice
        assert_eq!(frame[203], ETX);
    }

    #[test]
    fn card_field_is_nul_padded() {
        let req = TransactionRequest::new(TransactionType::TopupBrizziTertunda, "5000")
            .with_card("6013500099");
        let frame = pack_request(&req, true).unwrap();

        let card_field = &frame[40..59];
        assert_eq!(&card_field[..10], b"6013500099");
        assert!(card_field[10..].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn pre_multiplied_flag_does_not_change_wire_bytes() {
        let serial = pack_request(&sale("10"), true).unwrap();
        let socket = pack_request(&sale("10"), false).unwrap();
        assert_eq!(serial, socket);
    }

    #[test]
    fn filler_is_nul() {
        let frame = pack_request(&sale("10"), true).unwrap();
        assert!(frame[59..203].iter().all(|&b| b == 0x00));
    }
}
