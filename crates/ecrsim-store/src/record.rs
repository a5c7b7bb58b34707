//! Transaction records as persisted in the history document.

use chrono::{DateTime, Utc};
use ecrsim_core::{TransactionStatus, TransactionType};
use ecrsim_protocol::{ParsedResponse, TransactionRequest};
use serde::{Deserialize, Serialize};

/// The request fields as they were submitted, kept with the record for
/// history display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedRequest {
    /// Display name, e.g. "SALE".
    pub trans_type: String,
    /// Wire code as two hex digits, e.g. "01".
    pub trans_code: String,
    pub amount: String,
    pub add_amount: String,
    pub invoice_no: String,
    pub card_no: String,
}

impl From<&TransactionRequest> for RecordedRequest {
    fn from(request: &TransactionRequest) -> Self {
        RecordedRequest {
            trans_type: request.transaction_type.name().to_string(),
            trans_code: request.transaction_type.hex_code(),
            amount: request.amount.clone(),
            add_amount: request.add_amount.clone(),
            invoice_no: request.invoice_no.clone(),
            card_no: request.card_no.clone(),
        }
    }
}

impl RecordedRequest {
    /// Resolve the recorded code back to its transaction type.
    #[must_use]
    pub fn transaction_type(&self) -> Option<TransactionType> {
        TransactionType::from_hex_code(&self.trans_code).ok()
    }
}

/// One transaction's lifecycle, owned and mutated through the store.
///
/// Created as `processing` on submit and resolved to a terminal status
/// exactly once when the asynchronous result arrives. Records are never
/// deleted, only hidden from the user-facing view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub status: TransactionStatus,
    pub request: RecordedRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ParsedResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TransactionRecord {
    /// A fresh `processing` record for a just-submitted request.
    #[must_use]
    pub fn processing(request: &TransactionRequest, user_id: Option<i64>) -> Self {
        TransactionRecord {
            status: TransactionStatus::Processing,
            request: RecordedRequest::from(request),
            response: None,
            raw_response_hex: None,
            error: None,
            timestamp: Utc::now(),
            user_id,
            note: None,
        }
    }

    /// The timestamp to display: the device-reported one when the
    /// response carries a parseable date and time, the submit time
    /// otherwise.
    #[must_use]
    pub fn display_timestamp(&self) -> String {
        if let Some(response) = &self.response
            && let Some(device_time) = response.device_timestamp()
        {
            return device_time;
        }
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale_record() -> TransactionRecord {
        let request = TransactionRequest::new(TransactionType::Sale, "1500").with_invoice("42");
        TransactionRecord::processing(&request, Some(7))
    }

    #[test]
    fn fresh_records_are_processing() {
        let record = sale_record();
        assert_eq!(record.status, TransactionStatus::Processing);
        assert_eq!(record.request.trans_type, "SALE");
        assert_eq!(record.request.trans_code, "01");
        assert_eq!(record.user_id, Some(7));
        assert!(record.response.is_none());
    }

    #[test]
    fn recorded_code_resolves_back_to_the_type() {
        let record = sale_record();
        assert_eq!(record.request.transaction_type(), Some(TransactionType::Sale));
    }

    #[test]
    fn serialized_records_are_newline_free() {
        let json = serde_json::to_string(&sale_record()).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"transCode\":\"01\""));
    }

    #[test]
    fn display_timestamp_prefers_the_device_clock() {
        let mut record = sale_record();
        assert!(!record.display_timestamp().is_empty());

        record.response = Some(ParsedResponse {
            date: "2026-08-07".to_string(),
            time: "14:30".to_string(),
            ..Default::default()
        });
        assert_eq!(record.display_timestamp(), "2026-08-07 14:30:00");
    }
}
