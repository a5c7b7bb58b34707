//! The static transaction-type table of the FMS dialect.
//!
//! Every transaction the terminal supports is a single byte code in the
//! range `0x01..=0x1E`, bound to a fixed display name and a fixed input
//! profile: which of amount / additional amount / invoice / card the
//! operator must supply, the labels those inputs carry, and the UI cap on
//! the invoice field. The table is part of the device contract and is
//! reproduced here verbatim; changing an entry breaks compatibility with
//! the deployed terminals.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transaction type supported by the terminal, one per wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Sale,
    Installment,
    Void,
    GenerateQr,
    QrisStatus,
    QrisRefund,
    InfoSaldoBrizzi,
    PembayaranBrizzi,
    TopupBrizziTertunda,
    TopupBrizziOnline,
    UpdateSaldoTertundaBrizzi,
    VoidBrizzi,
    FareNonFare,
    Contactless,
    SaleTip,
    KeyIn,
    Logon,
    Settlement,
    SettlementBrizzi,
    ReprintTransaksiTerakhir,
    ReprintTransaksi,
    DetailReport,
    SummaryReport,
    ReprintBrizziTransaksiTerakhir,
    ReprintBrizziTransaksi,
    BrizziDetailReport,
    BrizziSummaryReport,
    QrisDetailReport,
    QrisSummaryReport,
    InfoKartuBrizzi,
}

/// Which inputs a transaction type requires from the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// No operator input (settlements, reports, logon).
    NoInput,
    /// Amount only.
    AmountOnly,
    /// Invoice/trace/reference number only.
    InvoiceOnly,
    /// Amount plus additional amount (tip or non-fare).
    AmountWithAddAmount,
    /// Amount plus a card number.
    AmountWithCard,
}

/// Operator-facing input profile for one transaction type.
#[derive(Debug, Clone, Copy)]
pub struct InputProfile {
    pub mode: InputMode,
    pub amount_label: &'static str,
    pub add_amount_label: &'static str,
    pub invoice_label: &'static str,
    pub card_label: &'static str,
    /// UI cap on the invoice field in digits (the wire field is always
    /// padded to 12 regardless).
    pub ui_invoice_digits: usize,
}

impl TransactionType {
    /// All 30 transaction types in wire-code order.
    pub const ALL: [TransactionType; 30] = [
        TransactionType::Sale,
        TransactionType::Installment,
        TransactionType::Void,
        TransactionType::GenerateQr,
        TransactionType::QrisStatus,
        TransactionType::QrisRefund,
        TransactionType::InfoSaldoBrizzi,
        TransactionType::PembayaranBrizzi,
        TransactionType::TopupBrizziTertunda,
        TransactionType::TopupBrizziOnline,
        TransactionType::UpdateSaldoTertundaBrizzi,
        TransactionType::VoidBrizzi,
        TransactionType::FareNonFare,
        TransactionType::Contactless,
        TransactionType::SaleTip,
        TransactionType::KeyIn,
        TransactionType::Logon,
        TransactionType::Settlement,
        TransactionType::SettlementBrizzi,
        TransactionType::ReprintTransaksiTerakhir,
        TransactionType::ReprintTransaksi,
        TransactionType::DetailReport,
        TransactionType::SummaryReport,
        TransactionType::ReprintBrizziTransaksiTerakhir,
        TransactionType::ReprintBrizziTransaksi,
        TransactionType::BrizziDetailReport,
        TransactionType::BrizziSummaryReport,
        TransactionType::QrisDetailReport,
        TransactionType::QrisSummaryReport,
        TransactionType::InfoKartuBrizzi,
    ];

    /// Wire code for this transaction type (`0x01..=0x1E`).
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            TransactionType::Sale => 0x01,
            TransactionType::Installment => 0x02,
            TransactionType::Void => 0x03,
            TransactionType::GenerateQr => 0x04,
            TransactionType::QrisStatus => 0x05,
            TransactionType::QrisRefund => 0x06,
            TransactionType::InfoSaldoBrizzi => 0x07,
            TransactionType::PembayaranBrizzi => 0x08,
            TransactionType::TopupBrizziTertunda => 0x09,
            TransactionType::TopupBrizziOnline => 0x0A,
            TransactionType::UpdateSaldoTertundaBrizzi => 0x0B,
            TransactionType::VoidBrizzi => 0x0C,
            TransactionType::FareNonFare => 0x0D,
            TransactionType::Contactless => 0x0E,
            TransactionType::SaleTip => 0x0F,
            TransactionType::KeyIn => 0x10,
            TransactionType::Logon => 0x11,
            TransactionType::Settlement => 0x12,
            TransactionType::SettlementBrizzi => 0x13,
            TransactionType::ReprintTransaksiTerakhir => 0x14,
            TransactionType::ReprintTransaksi => 0x15,
            TransactionType::DetailReport => 0x16,
            TransactionType::SummaryReport => 0x17,
            TransactionType::ReprintBrizziTransaksiTerakhir => 0x18,
            TransactionType::ReprintBrizziTransaksi => 0x19,
            TransactionType::BrizziDetailReport => 0x1A,
            TransactionType::BrizziSummaryReport => 0x1B,
            TransactionType::QrisDetailReport => 0x1C,
            TransactionType::QrisSummaryReport => 0x1D,
            TransactionType::InfoKartuBrizzi => 0x1E,
        }
    }

    /// Resolve a wire code to a transaction type.
    ///
    /// # Errors
    /// Returns `Error::InvalidTransactionType` for codes outside `0x01..=0x1E`.
    pub fn from_code(code: u8) -> Result<Self> {
        TransactionType::ALL
            .iter()
            .find(|t| t.code() == code)
            .copied()
            .ok_or_else(|| Error::InvalidTransactionType(format!("{code:02X}")))
    }

    /// Resolve a two-digit hex code string ("01".."1E") to a transaction type.
    ///
    /// # Errors
    /// Returns `Error::InvalidTransactionType` for strings that are not a
    /// valid hex code in range.
    pub fn from_hex_code(code: &str) -> Result<Self> {
        let value = u8::from_str_radix(code, 16)
            .map_err(|_| Error::InvalidTransactionType(code.to_string()))?;
        Self::from_code(value)
    }

    /// Wire code formatted as the two-digit uppercase hex string used in
    /// JSON payloads and transaction records.
    #[must_use]
    pub fn hex_code(&self) -> String {
        format!("{:02X}", self.code())
    }

    /// Fixed display name of this transaction type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TransactionType::Sale => "SALE",
            TransactionType::Installment => "INSTALLMENT",
            TransactionType::Void => "VOID",
            TransactionType::GenerateQr => "GENERATE QR",
            TransactionType::QrisStatus => "QRIS STATUS TRANSAKSI",
            TransactionType::QrisRefund => "QRIS REFUND",
            TransactionType::InfoSaldoBrizzi => "INFO SALDO BRIZZI",
            TransactionType::PembayaranBrizzi => "PEMBAYARAN BRIZZI",
            TransactionType::TopupBrizziTertunda => "TOPUP BRIZZI TERTUNDA",
            TransactionType::TopupBrizziOnline => "TOPUP BRIZZI ONLINE",
            TransactionType::UpdateSaldoTertundaBrizzi => "UPDATE SALDO TERTUNDA BRIZZI",
            TransactionType::VoidBrizzi => "VOID BRIZZI",
            TransactionType::FareNonFare => "FARE NON-FARE",
            TransactionType::Contactless => "CONTACTLESS",
            TransactionType::SaleTip => "SALE TIP",
            TransactionType::KeyIn => "KEY IN",
            TransactionType::Logon => "LOGON",
            TransactionType::Settlement => "SETTLEMENT",
            TransactionType::SettlementBrizzi => "SETTLEMENT BRIZZI",
            TransactionType::ReprintTransaksiTerakhir => "REPRINT TRANSAKSI TERAKHIR",
            TransactionType::ReprintTransaksi => "REPRINT TRANSAKSI",
            TransactionType::DetailReport => "DETAIL REPORT",
            TransactionType::SummaryReport => "SUMMARY REPORT",
            TransactionType::ReprintBrizziTransaksiTerakhir => "REPRINT BRIZZI TRANSAKSI TERAKHIR",
            TransactionType::ReprintBrizziTransaksi => "REPRINT BRIZZI TRANSAKSI",
            TransactionType::BrizziDetailReport => "BRIZZI DETAIL REPORT",
            TransactionType::BrizziSummaryReport => "BRIZZI SUMMARY REPORT",
            TransactionType::QrisDetailReport => "QRIS DETAIL REPORT",
            TransactionType::QrisSummaryReport => "QRIS SUMMARY REPORT",
            TransactionType::InfoKartuBrizzi => "INFO KARTU BRIZZI",
        }
    }

    /// Resolve a display name (case-insensitive) to a transaction type.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_uppercase();
        TransactionType::ALL.iter().find(|t| t.name() == upper).copied()
    }

    /// Operator input profile for this transaction type.
    #[must_use]
    pub fn input_profile(&self) -> InputProfile {
        use InputMode::*;
        let (mode, amount_label, add_amount_label, invoice_label, card_label, ui_invoice_digits) =
            match self {
                TransactionType::Sale => (AmountOnly, "Amount", "", "", "", 6),
                TransactionType::Installment => (AmountOnly, "Amount", "", "", "", 6),
                TransactionType::Void => (InvoiceOnly, "", "", "Trace No", "", 6),
                TransactionType::GenerateQr => {
                    (AmountWithAddAmount, "Amount", "Tip Amount", "", "", 6)
                }
                TransactionType::QrisStatus => (InvoiceOnly, "", "", "Reff No", "", 12),
                TransactionType::QrisRefund => (InvoiceOnly, "", "", "Reff Id", "", 10),
                TransactionType::InfoSaldoBrizzi => (NoInput, "", "", "", "", 6),
                TransactionType::PembayaranBrizzi => (AmountOnly, "Amount", "", "", "", 6),
                TransactionType::TopupBrizziTertunda => {
                    (AmountWithCard, "Amount", "", "", "Brizzi Card", 6)
                }
                TransactionType::TopupBrizziOnline => (AmountOnly, "Amount", "", "", "", 6),
                TransactionType::UpdateSaldoTertundaBrizzi => (NoInput, "", "", "", "", 6),
                TransactionType::VoidBrizzi => (InvoiceOnly, "", "", "Trace No", "", 6),
                TransactionType::FareNonFare => (AmountWithAddAmount, "Fare", "Non Fare", "", "", 6),
                TransactionType::Contactless => (AmountOnly, "Amount", "", "", "", 6),
                TransactionType::SaleTip => (AmountWithAddAmount, "Amount", "Tip Amount", "", "", 6),
                TransactionType::KeyIn => (AmountOnly, "Amount", "", "", "", 6),
                TransactionType::Logon => (NoInput, "", "", "", "", 6),
                TransactionType::Settlement => (NoInput, "", "", "", "", 6),
                TransactionType::SettlementBrizzi => (NoInput, "", "", "", "", 6),
                TransactionType::ReprintTransaksiTerakhir => (NoInput, "", "", "", "", 6),
                TransactionType::ReprintTransaksi => (InvoiceOnly, "", "", "Trace No", "", 6),
                TransactionType::DetailReport => (NoInput, "", "", "", "", 6),
                TransactionType::SummaryReport => (NoInput, "", "", "", "", 6),
                TransactionType::ReprintBrizziTransaksiTerakhir => (NoInput, "", "", "", "", 6),
                TransactionType::ReprintBrizziTransaksi => (InvoiceOnly, "", "", "Trace No", "", 6),
                TransactionType::BrizziDetailReport => (NoInput, "", "", "", "", 6),
                TransactionType::BrizziSummaryReport => (NoInput, "", "", "", "", 6),
                TransactionType::QrisDetailReport => (NoInput, "", "", "", "", 6),
                TransactionType::QrisSummaryReport => (NoInput, "", "", "", "", 6),
                TransactionType::InfoKartuBrizzi => (NoInput, "", "", "", "", 6),
            };
        InputProfile {
            mode,
            amount_label,
            add_amount_label,
            invoice_label,
            card_label,
            ui_invoice_digits,
        }
    }

    /// Whether the operator must provide an amount.
    #[must_use]
    pub fn requires_amount(&self) -> bool {
        matches!(
            self.input_profile().mode,
            InputMode::AmountOnly | InputMode::AmountWithAddAmount | InputMode::AmountWithCard
        )
    }

    /// Whether the operator must provide an additional amount (tip/non-fare).
    #[must_use]
    pub fn requires_add_amount(&self) -> bool {
        matches!(self.input_profile().mode, InputMode::AmountWithAddAmount)
    }

    /// Whether the operator must provide an invoice/trace/reference number.
    #[must_use]
    pub fn requires_invoice(&self) -> bool {
        matches!(self.input_profile().mode, InputMode::InvoiceOnly)
    }

    /// Whether the operator must provide a card number.
    #[must_use]
    pub fn requires_card(&self) -> bool {
        matches!(self.input_profile().mode, InputMode::AmountWithCard)
    }

    /// Maximum digits accepted in the invoice/trace/reference field before
    /// wire padding. VOID-class types carry a 6-digit trace number, QRIS
    /// refunds a 10-digit reference id, everything else up to 12 digits.
    #[must_use]
    pub fn max_invoice_digits(&self) -> usize {
        match self {
            TransactionType::Void | TransactionType::VoidBrizzi => 6,
            TransactionType::QrisRefund => 10,
            _ => 12,
        }
    }

    /// Label for the invoice field in operator-facing output, falling back
    /// to the generic label for types whose profile leaves it unnamed.
    #[must_use]
    pub fn invoice_display_label(&self) -> &'static str {
        match self {
            TransactionType::Void | TransactionType::VoidBrizzi => "Trace Number",
            TransactionType::QrisStatus => "Reference ID",
            _ => "Invoice Number",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Describe an entry-mode code from a device response.
#[must_use]
pub fn entry_mode_description(entry_mode: &str) -> &'static str {
    match entry_mode.to_uppercase().as_str() {
        "D" => "Dip (EMV Chip)",
        "S" => "Swipe (Magnetic Stripe)",
        "F" => "Fallback",
        "M" => "Manual (Key In)",
        "T" => "Tap (Contactless)",
        "`" => "QRIS MPM",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn table_is_complete_and_contiguous() {
        assert_eq!(TransactionType::ALL.len(), 30);
        for (i, t) in TransactionType::ALL.iter().enumerate() {
            assert_eq!(t.code() as usize, i + 1);
        }
    }

    #[rstest]
    #[case(0x01, TransactionType::Sale, "SALE")]
    #[case(0x03, TransactionType::Void, "VOID")]
    #[case(0x06, TransactionType::QrisRefund, "QRIS REFUND")]
    #[case(0x0A, TransactionType::TopupBrizziOnline, "TOPUP BRIZZI ONLINE")]
    #[case(0x12, TransactionType::Settlement, "SETTLEMENT")]
    #[case(0x1E, TransactionType::InfoKartuBrizzi, "INFO KARTU BRIZZI")]
    fn code_and_name_round_trip(
        #[case] code: u8,
        #[case] expected: TransactionType,
        #[case] name: &str,
    ) {
        let t = TransactionType::from_code(code).unwrap();
        assert_eq!(t, expected);
        assert_eq!(t.name(), name);
        assert_eq!(TransactionType::from_name(name), Some(expected));
        assert_eq!(TransactionType::from_hex_code(&t.hex_code()).unwrap(), t);
    }

    #[rstest]
    #[case(0x00)]
    #[case(0x1F)]
    #[case(0xFF)]
    fn out_of_range_codes_rejected(#[case] code: u8) {
        assert!(TransactionType::from_code(code).is_err());
    }

    #[rstest]
    #[case(TransactionType::Void, 6)]
    #[case(TransactionType::VoidBrizzi, 6)]
    #[case(TransactionType::QrisRefund, 10)]
    #[case(TransactionType::QrisStatus, 12)]
    #[case(TransactionType::Sale, 12)]
    fn invoice_caps(#[case] t: TransactionType, #[case] max: usize) {
        assert_eq!(t.max_invoice_digits(), max);
    }

    #[test]
    fn input_profiles() {
        assert!(TransactionType::Sale.requires_amount());
        assert!(!TransactionType::Sale.requires_invoice());
        assert!(TransactionType::Void.requires_invoice());
        assert!(!TransactionType::Void.requires_amount());
        assert!(TransactionType::TopupBrizziTertunda.requires_card());
        assert!(TransactionType::SaleTip.requires_add_amount());
        assert!(!TransactionType::Logon.requires_amount());
        assert_eq!(
            TransactionType::FareNonFare.input_profile().add_amount_label,
            "Non Fare"
        );
        assert_eq!(TransactionType::QrisStatus.input_profile().ui_invoice_digits, 12);
    }

    #[test]
    fn entry_modes() {
        assert_eq!(entry_mode_description("D"), "Dip (EMV Chip)");
        assert_eq!(entry_mode_description("t"), "Tap (Contactless)");
        assert_eq!(entry_mode_description("`"), "QRIS MPM");
        assert_eq!(entry_mode_description("X"), "");
    }
}
