//! The transaction processor: record lifecycle and transport dispatch.
//!
//! Per-record state machine: `processing -> {success, failed, error}`,
//! terminal states resolved exactly once. `failed` means the device
//! answered with a non-success response code; `error` means a transport,
//! parse or network fault prevented a definitive business outcome.
//!
//! The record is created BEFORE dispatch so a client can poll its status
//! immediately, even while the device still has the cardholder at the
//! PIN pad. The serial path returns right after the write and the
//! background reader resolves the record later; the socket paths resolve
//! inline.

use crate::{serial_config, socket_config};
use ecrsim_core::{Error, Result, TransactionId, TransactionStatus};
use ecrsim_protocol::{CodecHandle, MessageCodec, ParsedResponse, TransactionRequest};
use ecrsim_network::{FramedClient, RestClient, SerialDetection};
use ecrsim_serial::{SerialEvent, SerialTransport};
use ecrsim_store::{Settings, SettingsStore, TransactionRecord, TransactionStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

fn to_hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// What `process` hands back to the caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessOutcome {
    pub id: TransactionId,
    pub status: TransactionStatus,
    pub response: Option<ParsedResponse>,
    pub error: Option<String>,
}

/// A record viewed through `status`, with the display timestamp applied.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusView {
    pub id: TransactionId,
    pub status: TransactionStatus,
    pub timestamp: String,
    pub response: Option<ParsedResponse>,
    pub raw_response_hex: Option<String>,
    pub error: Option<String>,
    pub note: Option<String>,
}

/// The orchestrator. Owns the transports, the codec selection, and every
/// record mutation.
pub struct TransactionProcessor<S> {
    store: Arc<S>,
    codec: CodecHandle,
    serial: Arc<Mutex<SerialTransport>>,
    framed: Arc<Mutex<FramedClient>>,
    connected: Arc<AtomicBool>,
    /// The record a late serial trailer (QR payload) belongs to.
    last_resolved: std::sync::Mutex<Option<TransactionId>>,
}

impl<S> TransactionProcessor<S>
where
    S: SettingsStore + TransactionStore,
{
    /// Build the processor and the receiver half of the serial event
    /// channel. The caller drives [`Self::run_serial_events`] with the
    /// receiver, typically on a spawned task.
    pub fn new(store: Arc<S>) -> (Self, UnboundedReceiver<SerialEvent>) {
        let settings = store.get_settings();
        let codec = CodecHandle::select(settings.disable_native_codec);
        let (serial, events) = SerialTransport::new(serial_config(&settings));
        let framed = FramedClient::new(socket_config(&settings));

        let processor = TransactionProcessor {
            store,
            codec,
            serial: Arc::new(Mutex::new(serial)),
            framed: Arc::new(Mutex::new(framed)),
            connected: Arc::new(AtomicBool::new(false)),
            last_resolved: std::sync::Mutex::new(None),
        };
        (processor, events)
    }

    /// The connection manager sharing this processor's transports.
    #[must_use]
    pub fn connection(&self) -> crate::ConnectionManager<S> {
        crate::ConnectionManager::new(
            Arc::clone(&self.store),
            Arc::clone(&self.serial),
            Arc::clone(&self.framed),
            Arc::clone(&self.connected),
        )
    }

    /// Mark the transport session up or down.
    pub fn update_connection_status(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Validate a request without sending it and render the operator
    /// preview.
    ///
    /// # Errors
    /// Request validation errors.
    pub fn build_preview(&self, request: &TransactionRequest) -> Result<String> {
        crate::preview::build_preview(&self.codec, request)
    }

    /// Submit a transaction on the configured transport.
    ///
    /// # Errors
    /// `NotConnected` without an active session, `TransactionInFlight`
    /// when the serial line already has an unresolved request, request
    /// validation errors, and transport faults (which also resolve the
    /// record to `error`).
    pub async fn process(
        &self,
        request: TransactionRequest,
        user_id: Option<i64>,
    ) -> Result<ProcessOutcome> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }

        let settings = self.store.get_settings();
        match settings.communication {
            ecrsim_core::CommunicationMode::Serial => {
                self.process_serial(request, user_id).await
            }
            ecrsim_core::CommunicationMode::Socket => {
                self.process_socket(request, user_id, &settings).await
            }
        }
    }

    /// Serial dispatch: pack, write, and leave the record `processing`
    /// for the background reader to resolve.
    async fn process_serial(
        &self,
        request: TransactionRequest,
        user_id: Option<i64>,
    ) -> Result<ProcessOutcome> {
        // The serial link has no request multiplexing: strictly one in
        // flight until its terminal state is known.
        if let Some(pending) = self.store.latest_processing() {
            return Err(Error::TransactionInFlight(pending.to_string()));
        }

        let id = self.create_record(&request, user_id)?;

        let frame = match self.codec.pack(&request, true) {
            Ok(frame) => frame,
            Err(e) => {
                self.fail_record(&id, &e.to_string());
                return Err(e);
            }
        };

        let mut serial = self.serial.lock().await;
        match serial.send(&frame) {
            Ok(()) => {
                let _ = self.store.update_transaction(&id, &mut |r| {
                    r.note = Some("Waiting for EDC response".to_string());
                });
                info!(id = %id, "transaction sent on serial, awaiting device response");
                Ok(ProcessOutcome {
                    id,
                    status: TransactionStatus::Processing,
                    response: None,
                    error: None,
                })
            }
            Err(e) => {
                self.fail_record(&id, &e.to_string());
                Err(Error::ConnectionFailed(e.to_string()))
            }
        }
    }

    /// Socket dispatch: both socket modes resolve inline.
    async fn process_socket(
        &self,
        request: TransactionRequest,
        user_id: Option<i64>,
        settings: &Settings,
    ) -> Result<ProcessOutcome> {
        let id = self.create_record(&request, user_id)?;

        let outcome = if settings.enable_rest_api {
            self.run_rest_transaction(&id, &request, settings).await
        } else {
            self.run_framed_transaction(&id, &request).await
        };

        match outcome {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.fail_record(&id, &e.to_string());
                Err(e)
            }
        }
    }

    async fn run_rest_transaction(
        &self,
        id: &TransactionId,
        request: &TransactionRequest,
        settings: &Settings,
    ) -> Result<ProcessOutcome> {
        let client = RestClient::new(socket_config(settings))
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let parsed = client
            .send_transaction(request)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        Ok(self.resolve_with_response(id, parsed, None))
    }

    async fn run_framed_transaction(
        &self,
        id: &TransactionId,
        request: &TransactionRequest,
    ) -> Result<ProcessOutcome> {
        let frame = self.codec.pack(request, false)?;

        let mut framed = self.framed.lock().await;
        if !framed.is_connected() {
            return Err(Error::NotConnected);
        }

        let bytes = framed
            .send_transaction(frame)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let raw_hex = to_hex_upper(&bytes);
        let parsed = self.codec.parse(&bytes)?;
        Ok(self.resolve_with_response(id, parsed, Some(raw_hex)))
    }

    /// Consume classified serial events until the channel closes. Run
    /// this on its own task next to the processor.
    pub async fn run_serial_events(&self, mut events: UnboundedReceiver<SerialEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_serial_event(event).await;
        }
        debug!("serial event channel closed");
    }

    /// Apply one serial event to the record it belongs to.
    pub async fn handle_serial_event(&self, event: SerialEvent) {
        match event {
            SerialEvent::Ack => debug!("device acknowledged request"),
            SerialEvent::Nak => warn!("device rejected request (NAK)"),
            SerialEvent::Frame(bytes) => self.handle_serial_frame(&bytes),
            SerialEvent::Trailer(bytes) => self.handle_serial_trailer(&bytes),
            SerialEvent::Disconnected(reason) => self.handle_serial_disconnect(&reason).await,
        }
    }

    /// A response frame arrived: resolve the most recent `processing`
    /// record. There is exactly one by the in-flight rule, but the device
    /// can also volunteer frames nobody asked for.
    fn handle_serial_frame(&self, bytes: &[u8]) {
        let Some(id) = self.store.latest_processing() else {
            warn!("received response but no processing transaction");
            return;
        };

        let raw_hex = to_hex_upper(bytes);
        match self.codec.parse(bytes) {
            Ok(parsed) => {
                self.resolve_with_response(&id, parsed, Some(raw_hex));
            }
            Err(e) => {
                error!(id = %id, "failed to parse device response: {e}");
                let message = format!("Parse error: {e}");
                let _ = self.store.update_transaction(&id, &mut |r| {
                    r.status = TransactionStatus::Error;
                    r.raw_response_hex = Some(raw_hex.clone());
                    r.error = Some(message.clone());
                });
            }
        }
    }

    /// Trailer bytes arrived after the frame: merge the QR payload into
    /// the record that was just resolved. This augments the response; the
    /// record's terminal status does not change.
    fn handle_serial_trailer(&self, bytes: &[u8]) {
        let id = match self.last_resolved.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(id) = id else {
            warn!(len = bytes.len(), "trailer bytes with no resolved transaction, dropped");
            return;
        };

        let text: String = bytes
            .iter()
            .filter(|b| b.is_ascii())
            .map(|&b| b as char)
            .collect();
        let qr_code = if text.starts_with("00") { text } else { format!("00{text}") };

        info!(id = %id, len = qr_code.len(), "merging QR trailer into response");
        let _ = self.store.update_transaction(&id, &mut |r| {
            if let Some(response) = &mut r.response {
                response.qr_code = qr_code.clone();
            }
        });
    }

    /// The reader lost the port: attempt bounded reconnection, and when
    /// that fails resolve the in-flight record so it does not sit in
    /// `processing` forever.
    async fn handle_serial_disconnect(&self, reason: &str) {
        warn!(reason, "serial connection lost, attempting recovery");

        let recovered = self.serial.lock().await.reconnect().await.is_ok();
        if recovered {
            info!("serial connection recovered");
            return;
        }

        self.connected.store(false, Ordering::SeqCst);
        if let Some(id) = self.store.latest_processing() {
            let message = format!("Connection lost: {reason}");
            self.fail_record(&id, &message);
        }
    }

    /// Look up a record for status polling.
    ///
    /// # Errors
    /// `TransactionNotFound` for unknown ids.
    pub fn status(&self, id: &TransactionId) -> Result<StatusView> {
        let record = self
            .store
            .get_transaction(id)
            .ok_or_else(|| Error::TransactionNotFound(id.to_string()))?;

        Ok(StatusView {
            id: id.clone(),
            timestamp: record.display_timestamp(),
            status: record.status,
            response: record.response,
            raw_response_hex: record.raw_response_hex,
            error: record.error,
            note: record.note,
        })
    }

    /// History records visible to the given user.
    #[must_use]
    pub fn visible_history(
        &self,
        user_id: Option<i64>,
    ) -> Vec<(TransactionId, TransactionRecord)> {
        self.store.visible_transactions(user_id)
    }

    /// Hide history from the user-facing view (additive, never undone).
    pub fn clear_history(&self, user_id: Option<i64>) {
        self.store.clear_history(user_id);
    }

    /// Probe the candidate device serial numbers against the REST
    /// adapter.
    ///
    /// # Errors
    /// `Config` when the adapter mode is not enabled.
    pub async fn auto_detect_serial_number(&self) -> Result<SerialDetection> {
        let settings = self.store.get_settings();
        if !settings.enable_rest_api {
            return Err(Error::Config("REST API mode not enabled".to_string()));
        }

        let client = RestClient::new(socket_config(&settings))
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(client.auto_detect_serial_number().await)
    }

    fn create_record(
        &self,
        request: &TransactionRequest,
        user_id: Option<i64>,
    ) -> Result<TransactionId> {
        let id = TransactionId::generate();
        self.store
            .add_transaction(&id, TransactionRecord::processing(request, user_id))
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(id)
    }

    /// Resolve a record from a parsed device response: `failed` when the
    /// response code is not an accepted success code, `success` otherwise.
    fn resolve_with_response(
        &self,
        id: &TransactionId,
        parsed: ParsedResponse,
        raw_hex: Option<String>,
    ) -> ProcessOutcome {
        let failure = parsed.failure_reason();
        let status = if failure.is_some() {
            TransactionStatus::Failed
        } else {
            TransactionStatus::Success
        };

        let _ = self.store.update_transaction(id, &mut |r| {
            r.status = status;
            r.response = Some(parsed.clone());
            r.raw_response_hex = raw_hex.clone();
            r.error = failure.clone();
            r.note = None;
        });
        if let Ok(mut guard) = self.last_resolved.lock() {
            *guard = Some(id.clone());
        }

        info!(id = %id, %status, "transaction resolved");
        ProcessOutcome {
            id: id.clone(),
            status,
            response: Some(parsed),
            error: failure,
        }
    }

    /// Resolve a record to `error` after a transport or validation fault.
    fn fail_record(&self, id: &TransactionId, message: &str) {
        error!(id = %id, message, "transaction errored");
        let _ = self.store.update_transaction(id, &mut |r| {
            r.status = TransactionStatus::Error;
            r.error = Some(message.to_string());
            r.note = None;
        });
    }
}
