//! REST-adapter socket mode.
//!
//! The vendor's ECR adapter fronts the device with two HTTP endpoints:
//! submit a transaction, then poll for its result. Authentication is HTTP
//! Basic with a fixed username and a password derived from the device
//! serial number; a wrong serial number is the single most common
//! misconfiguration, hence the credential auto-discovery helper.
//!
//! Result polling mirrors the vendor's reference client: 100 ms cadence,
//! 503 means "still processing", bounded at 6000 polls (10 minutes). On a
//! final result the adapter's `traceNo` and `invoiceNo` are swapped to
//! line up with the serial-mode field semantics.

use crate::{SocketConfig, SocketError};
use ecrsim_core::constants::{
    CANDIDATE_EDC_SERIALS, POLL_INTERVAL_MS, REST_MAX_POLLS, REST_PASSWORD_PREFIX,
    REST_POLL_TIMEOUT_SECS, REST_RESULT_PATH, REST_SUBMIT_TIMEOUT_SECS, REST_TRANSACTION_PATH,
    REST_USERNAME,
};
use ecrsim_protocol::{ParsedResponse, TransactionRequest, prepare_request};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Submit payload for the transaction endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody {
    trans_type: String,
    trans_amount: String,
    invoice_no: String,
    trans_add_amount: String,
    card_number: String,
}

/// Submit response: the adapter-side transaction id to poll with.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReply {
    trx_id: Option<String>,
}

/// Poll payload for the result endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultQuery<'a> {
    trx_id: &'a str,
}

/// Outcome of probing one candidate serial number.
#[derive(Debug, Clone)]
pub struct SerialProbe {
    pub serial: String,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub success: bool,
}

/// Outcome of credential auto-discovery.
#[derive(Debug, Clone)]
pub struct SerialDetection {
    pub working_serial: Option<String>,
    pub probes: Vec<SerialProbe>,
}

/// Client for the HTTP/REST adapter mode.
pub struct RestClient {
    config: SocketConfig,
    http: reqwest::Client,
    max_polls: u32,
    poll_interval: Duration,
}

impl RestClient {
    /// Build a client with the production polling bounds.
    ///
    /// # Errors
    /// `Http` when the underlying client cannot be constructed.
    pub fn new(config: SocketConfig) -> Result<Self, SocketError> {
        Self::with_poll_bounds(config, REST_MAX_POLLS, Duration::from_millis(POLL_INTERVAL_MS))
    }

    /// Build a client with explicit polling bounds (tests shrink them).
    ///
    /// # Errors
    /// `Http` when the underlying client cannot be constructed.
    pub fn with_poll_bounds(
        config: SocketConfig,
        max_polls: u32,
        poll_interval: Duration,
    ) -> Result<Self, SocketError> {
        // Lab adapters run self-signed HTTPS; validation stays off, same
        // as the raw-socket TLS mode.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(RestClient { config, http, max_polls, poll_interval })
    }

    /// Replace the endpoint parameters.
    pub fn update_config(&mut self, config: SocketConfig) {
        self.config = config;
    }

    fn base_url(&self) -> String {
        let scheme = if self.config.enable_ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.config.host, self.config.port)
    }

    fn credentials(&self) -> (String, String) {
        (
            REST_USERNAME.to_string(),
            format!("{REST_PASSWORD_PREFIX}{}", self.config.edc_serial_number),
        )
    }

    /// Probe the adapter port with a plain TCP connect. The adapter has no
    /// health endpoint; an open port is the best available signal.
    pub async fn test_connection(&self) -> bool {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        match tokio::time::timeout(
            Duration::from_secs(3),
            tokio::net::TcpStream::connect(&addr),
        )
        .await
        {
            Ok(Ok(_)) => {
                info!(addr = %addr, "adapter port reachable");
                true
            }
            Ok(Err(e)) => {
                warn!(addr = %addr, "adapter port unreachable: {e}");
                false
            }
            Err(_) => {
                warn!(addr = %addr, "adapter connect timed out");
                false
            }
        }
    }

    /// Submit a transaction and poll until the adapter reports a result.
    ///
    /// # Errors
    /// `AuthenticationFailed` on 401, `UnexpectedStatus` on any other
    /// non-200 submit status, `MalformedResponse` when the reply lacks a
    /// transaction id, `Timeout` when polling exhausts its bound, plus
    /// request validation errors surfaced before any I/O.
    pub async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<ParsedResponse, SocketError> {
        // Same validation gate as the framed path; rejected requests never
        // reach the adapter.
        let fields = prepare_request(request)?;

        let body = SubmitBody {
            trans_type: request.transaction_type.hex_code(),
            trans_amount: request.amount.replace(',', ""),
            invoice_no: fields.invoice_no.clone(),
            trans_add_amount: request.add_amount.replace(',', ""),
            card_number: request.card_no.clone(),
        };

        let (username, password) = self.credentials();
        let url = format!("{}{REST_TRANSACTION_PATH}", self.base_url());
        info!(url = %url, trans_type = %body.trans_type, "submitting transaction to adapter");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .basic_auth(&username, Some(&password))
            .timeout(Duration::from_secs(REST_SUBMIT_TIMEOUT_SECS))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(SocketError::AuthenticationFailed(format!(
                "adapter rejected credentials for serial {}",
                self.config.edc_serial_number
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SocketError::UnexpectedStatus { status: status.as_u16(), body });
        }

        let reply: SubmitReply = response
            .json()
            .await
            .map_err(|e| SocketError::MalformedResponse(e.to_string()))?;
        let trx_id = reply.trx_id.ok_or_else(|| {
            SocketError::MalformedResponse("no transaction id in adapter reply".to_string())
        })?;

        info!(trx_id = %trx_id, "transaction accepted, polling for result");
        self.poll_result(&trx_id).await
    }

    /// Poll the result endpoint until a final status arrives or the bound
    /// is hit. 503 means the cardholder is still interacting with the
    /// device; transient network errors are ridden out the same way.
    async fn poll_result(&self, trx_id: &str) -> Result<ParsedResponse, SocketError> {
        let (username, password) = self.credentials();
        let url = format!("{}{REST_RESULT_PATH}", self.base_url());

        for poll in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let response = match self
                .http
                .post(&url)
                .json(&ResultQuery { trx_id })
                .basic_auth(&username, Some(&password))
                .timeout(Duration::from_secs(REST_POLL_TIMEOUT_SECS))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(poll, "result poll failed: {e}");
                    continue;
                }
            };

            match response.status().as_u16() {
                503 => {
                    if poll % 50 == 0 {
                        debug!(poll, "transaction still processing");
                    }
                }
                200 => {
                    let mut parsed: ParsedResponse = response
                        .json()
                        .await
                        .map_err(|e| SocketError::MalformedResponse(e.to_string()))?;

                    // The adapter reports these two the other way around
                    // from the framed response layout.
                    std::mem::swap(&mut parsed.trace_no, &mut parsed.invoice_no);

                    info!(
                        poll,
                        response_code = %parsed.response_code,
                        "transaction completed"
                    );
                    return Ok(parsed);
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(SocketError::UnexpectedStatus { status, body });
                }
            }
        }

        let minutes = self.max_polls as f64 * self.poll_interval.as_secs_f64() / 60.0;
        Err(SocketError::Timeout(format!(
            "no result after {} polls ({minutes:.1} minutes)",
            self.max_polls
        )))
    }

    /// Try the known candidate serial numbers against the transaction
    /// endpoint and report the first working credential.
    pub async fn auto_detect_serial_number(&self) -> SerialDetection {
        let url = format!("{}{REST_TRANSACTION_PATH}", self.base_url());
        let probe_body = serde_json::json!({
            "transType": "09",
            "transAmount": "0",
            "invoiceNo": "",
            "cardNumber": "",
        });

        let mut probes = Vec::new();
        for serial in CANDIDATE_EDC_SERIALS {
            let password = format!("{REST_PASSWORD_PREFIX}{serial}");
            debug!(serial, "probing candidate serial number");

            match self
                .http
                .post(&url)
                .json(&probe_body)
                .basic_auth(REST_USERNAME, Some(&password))
                .timeout(Duration::from_secs(REST_POLL_TIMEOUT_SECS))
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let success = status == 200;
                    probes.push(SerialProbe {
                        serial: serial.to_string(),
                        status: Some(status),
                        error: None,
                        success,
                    });
                    if success {
                        info!(serial, "found working serial number");
                        return SerialDetection {
                            working_serial: Some(serial.to_string()),
                            probes,
                        };
                    }
                }
                Err(e) => probes.push(SerialProbe {
                    serial: serial.to_string(),
                    status: None,
                    error: Some(e.to_string()),
                    success: false,
                }),
            }
        }

        SerialDetection { working_serial: None, probes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_derive_from_serial_number() {
        let config = SocketConfig {
            edc_serial_number: "V1E0000042".to_string(),
            ..Default::default()
        };
        let client = RestClient::new(config).unwrap();
        let (username, password) = client.credentials();

        assert_eq!(username, "VfiF4BRI");
        assert_eq!(password, "VFIV1E0000042");
    }

    #[test]
    fn base_url_follows_ssl_flag() {
        let mut config = SocketConfig { port: 9001, ..Default::default() };
        let client = RestClient::new(config.clone()).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9001");

        config.enable_ssl = true;
        let client = RestClient::new(config).unwrap();
        assert_eq!(client.base_url(), "https://127.0.0.1:9001");
    }

    #[test]
    fn submit_body_serializes_in_adapter_shape() {
        let body = SubmitBody {
            trans_type: "01".to_string(),
            trans_amount: "1500".to_string(),
            invoice_no: "000000123456".to_string(),
            trans_add_amount: "0".to_string(),
            card_number: String::new(),
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["transType"], "01");
        assert_eq!(json["transAmount"], "1500");
        assert_eq!(json["invoiceNo"], "000000123456");
        assert_eq!(json["transAddAmount"], "0");
        assert_eq!(json["cardNumber"], "");
    }
}
