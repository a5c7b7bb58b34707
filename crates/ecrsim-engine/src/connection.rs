//! Connection management for both transport modes.

use crate::{serial_config, socket_config};
use ecrsim_core::{CommunicationMode, Error, Result};
use ecrsim_network::{FramedClient, RestClient};
use ecrsim_serial::SerialTransport;
use ecrsim_store::SettingsStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::info;

/// Current session state, for status endpoints.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub mode: CommunicationMode,
}

/// Opens and closes the transport selected by the settings document. The
/// transports themselves are shared with the processor; this type only
/// manages their session lifecycle.
pub struct ConnectionManager<S> {
    store: Arc<S>,
    serial: Arc<Mutex<SerialTransport>>,
    framed: Arc<Mutex<FramedClient>>,
    connected: Arc<AtomicBool>,
}

impl<S> ConnectionManager<S>
where
    S: SettingsStore,
{
    pub(crate) fn new(
        store: Arc<S>,
        serial: Arc<Mutex<SerialTransport>>,
        framed: Arc<Mutex<FramedClient>>,
        connected: Arc<AtomicBool>,
    ) -> Self {
        ConnectionManager { store, serial, framed, connected }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.is_connected(),
            mode: self.store.get_settings().communication,
        }
    }

    /// Connect the transport selected by the current settings.
    ///
    /// # Errors
    /// `ConnectionFailed` with the transport's reason.
    pub async fn connect(&self) -> Result<String> {
        let settings = self.store.get_settings();

        let message = match settings.communication {
            CommunicationMode::Serial => {
                let mut serial = self.serial.lock().await;
                serial.update_config(serial_config(&settings));
                serial
                    .connect()
                    .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
                format!("Successfully connected to {}", settings.serial_port)
            }
            CommunicationMode::Socket => {
                let endpoint = format!("{}:{}", settings.socket_ip, settings.socket_port);
                if settings.enable_rest_api {
                    // The adapter has no session; a reachable port is the
                    // connection.
                    let client = RestClient::new(socket_config(&settings))
                        .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
                    if !client.test_connection().await {
                        return Err(Error::ConnectionFailed(format!(
                            "adapter at {endpoint} is not reachable"
                        )));
                    }
                } else {
                    let mut framed = self.framed.lock().await;
                    framed.update_config(socket_config(&settings));
                    framed
                        .connect()
                        .await
                        .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
                }
                format!("Successfully connected to {endpoint}")
            }
        };

        self.connected.store(true, Ordering::SeqCst);
        info!(%message, "session connected");
        Ok(message)
    }

    /// Close whatever the current mode holds open.
    pub async fn disconnect(&self) -> String {
        let settings = self.store.get_settings();

        let message = match settings.communication {
            CommunicationMode::Serial => {
                self.serial.lock().await.disconnect();
                if settings.serial_port.is_empty() {
                    "Disconnected from serial port".to_string()
                } else {
                    format!("Disconnected from {}", settings.serial_port)
                }
            }
            CommunicationMode::Socket => {
                self.framed.lock().await.close().await;
                format!(
                    "Disconnected from {}:{}",
                    settings.socket_ip, settings.socket_port
                )
            }
        };

        self.connected.store(false, Ordering::SeqCst);
        info!(%message, "session disconnected");
        message
    }
}
