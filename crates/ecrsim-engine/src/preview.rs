//! Operator-facing request preview.
//!
//! Runs full codec validation without sending anything, then renders the
//! request the way the terminal's paper slip would describe it.

use ecrsim_core::{Result, TransactionType};
use ecrsim_protocol::{MessageCodec, TransactionRequest};

/// Group an integer with thousands separators: 1500000 -> "1,500,000".
fn group_thousands(value: i64) -> String {
    let digits = value.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if value < 0 { format!("-{grouped}") } else { grouped }
}

fn parsed_amount(raw: &str) -> Option<i64> {
    raw.replace(',', "").trim().parse().ok()
}

/// Validate the request through the codec and build the preview text.
///
/// # Errors
/// Request validation errors, exactly as a real submit would raise them.
pub fn build_preview(codec: &dyn MessageCodec, request: &TransactionRequest) -> Result<String> {
    codec.pack(request, true)?;

    let t = request.transaction_type;
    let mut preview = format!("Transaction Type: {}", t.name());

    if t.requires_amount() {
        let label = match parsed_amount(&request.amount) {
            Some(value) if value > 0 => group_thousands(value),
            Some(_) => "0".to_string(),
            None => request.amount.clone(),
        };
        preview.push_str(&format!("\nAmount: {label}"));
    }

    if !request.invoice_no.trim().is_empty() {
        preview.push_str(&format!(
            "\n{}: {}",
            t.invoice_display_label(),
            request.invoice_no.trim()
        ));
    }

    if request.add_amount != "0"
        && let Some(value) = parsed_amount(&request.add_amount)
        && value > 0
    {
        let label = match t {
            TransactionType::SaleTip | TransactionType::GenerateQr => "Tip Amount",
            TransactionType::FareNonFare => "Non-Fare Amount",
            _ => "Additional Amount",
        };
        preview.push_str(&format!("\n{label}: {}", group_thousands(value)));
    }

    if !request.card_no.trim().is_empty() {
        preview.push_str(&format!("\nCard Number: {}", request.card_no.trim()));
    }

    Ok(preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecrsim_protocol::PureCodec;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0")]
    #[case(999, "999")]
    #[case(1500, "1,500")]
    #[case(1500000, "1,500,000")]
    #[case(25000000, "25,000,000")]
    fn thousands_grouping(#[case] value: i64, #[case] expected: &str) {
        assert_eq!(group_thousands(value), expected);
    }

    #[test]
    fn sale_preview_shows_amount() {
        let request = TransactionRequest::new(TransactionType::Sale, "1500000");
        let preview = build_preview(&PureCodec, &request).unwrap();

        assert_eq!(preview, "Transaction Type: SALE\nAmount: 1,500,000");
    }

    #[test]
    fn void_preview_shows_trace_number_without_amount() {
        let request = TransactionRequest::new(TransactionType::Void, "0").with_invoice("123456");
        let preview = build_preview(&PureCodec, &request).unwrap();

        assert_eq!(preview, "Transaction Type: VOID\nTrace Number: 123456");
    }

    #[test]
    fn sale_tip_preview_labels_the_tip() {
        let request = TransactionRequest::new(TransactionType::SaleTip, "20000")
            .with_add_amount("2000");
        let preview = build_preview(&PureCodec, &request).unwrap();

        assert!(preview.contains("Amount: 20,000"));
        assert!(preview.contains("Tip Amount: 2,000"));
    }

    #[test]
    fn fare_preview_labels_the_non_fare_amount() {
        let request = TransactionRequest::new(TransactionType::FareNonFare, "5000")
            .with_add_amount("1000");
        let preview = build_preview(&PureCodec, &request).unwrap();

        assert!(preview.contains("Non-Fare Amount: 1,000"));
    }

    #[test]
    fn card_number_is_included_when_present() {
        let request = TransactionRequest::new(TransactionType::TopupBrizziTertunda, "50000")
            .with_card("6013500012345678901");
        let preview = build_preview(&PureCodec, &request).unwrap();

        assert!(preview.contains("Card Number: 6013500012345678901"));
    }

    #[test]
    fn invalid_requests_fail_preview() {
        let request = TransactionRequest::new(TransactionType::Sale, "ten");
        assert!(build_preview(&PureCodec, &request).is_err());

        let request = TransactionRequest::new(TransactionType::Void, "0")
            .with_invoice("1234567");
        assert!(build_preview(&PureCodec, &request).is_err());
    }
}
