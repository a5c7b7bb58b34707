//! Serial transport: port ownership, the send path, and reconnection.
//!
//! The transport owns the serial-port handle exclusively. A background
//! reader (see [`crate::listener`]) holds a clone of the handle and feeds
//! classified events into the transport's channel; the send path writes
//! the packed frame and arms the reader for the response.
//!
//! The protocol is strictly request/response with no multiplexing: one
//! request in flight per connection, enforced a layer up by the
//! orchestrator.

use crate::listener::{ListenerHandle, ReaderSettings, spawn_reader};
use crate::SerialEvent;
use ecrsim_core::constants::{
    SERIAL_READ_TIMEOUT_MS, SERIAL_RECONNECT_ATTEMPTS, SERIAL_RECONNECT_PAUSE_SECS,
};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{error, info, warn};

/// Serial line parameters, as stored in the settings document.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    /// `N`, `E` or `O`.
    pub parity: char,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: String::new(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: 'N',
        }
    }
}

/// Errors from serial transport operations.
#[derive(Debug, Error)]
pub enum SerialError {
    #[error("No serial port specified")]
    NoPortConfigured,

    #[error("Not connected")]
    NotConnected,

    #[error("Failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Reconnection failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Invalid serial parameter: {0}")]
    InvalidParameter(String),

    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Basic information about a serial port on this machine.
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub device: String,
    pub description: String,
}

/// Enumerate serial ports available on this machine.
#[must_use]
pub fn available_ports() -> Vec<PortInfo> {
    match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|p| {
                let description = match p.port_type {
                    serialport::SerialPortType::UsbPort(usb) => {
                        usb.product.unwrap_or_else(|| "USB serial device".to_string())
                    }
                    serialport::SerialPortType::BluetoothPort => "Bluetooth serial".to_string(),
                    serialport::SerialPortType::PciPort => "PCI serial".to_string(),
                    serialport::SerialPortType::Unknown => "Unknown".to_string(),
                };
                PortInfo { device: p.port_name, description }
            })
            .collect(),
        Err(e) => {
            warn!("failed to enumerate serial ports: {e}");
            Vec::new()
        }
    }
}

fn map_data_bits(bits: u8) -> Result<DataBits, SerialError> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(SerialError::InvalidParameter(format!("data bits: {other}"))),
    }
}

fn map_stop_bits(bits: u8) -> Result<StopBits, SerialError> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(SerialError::InvalidParameter(format!("stop bits: {other}"))),
    }
}

fn map_parity(parity: char) -> Result<Parity, SerialError> {
    match parity.to_ascii_uppercase() {
        'N' => Ok(Parity::None),
        'E' => Ok(Parity::Even),
        'O' => Ok(Parity::Odd),
        other => Err(SerialError::InvalidParameter(format!("parity: {other}"))),
    }
}

/// The serial transport. Owns the port handle and the reader thread.
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
    listener: Option<ListenerHandle>,
    events: UnboundedSender<SerialEvent>,
    reader_settings: ReaderSettings,
}

impl SerialTransport {
    /// Create a disconnected transport and the receiving half of its
    /// event channel. The caller owns the receiver; the reader thread
    /// pushes into it once connected.
    #[must_use]
    pub fn new(config: SerialConfig) -> (Self, UnboundedReceiver<SerialEvent>) {
        let (events, receiver) = unbounded_channel();
        let transport = SerialTransport {
            config,
            port: None,
            listener: None,
            events,
            reader_settings: ReaderSettings::default(),
        };
        (transport, receiver)
    }

    /// Replace the line parameters. Takes effect on the next connect.
    pub fn update_config(&mut self, config: SerialConfig) {
        self.config = config;
    }

    #[must_use]
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Open the configured port, flush both buffers, and start the reader.
    ///
    /// # Errors
    /// `NoPortConfigured` when no port path is set, `Open` when the OS
    /// rejects the open.
    pub fn connect(&mut self) -> Result<(), SerialError> {
        if self.config.port.is_empty() {
            return Err(SerialError::NoPortConfigured);
        }

        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .data_bits(map_data_bits(self.config.data_bits)?)
            .stop_bits(map_stop_bits(self.config.stop_bits)?)
            .parity(map_parity(self.config.parity)?)
            .timeout(Duration::from_millis(SERIAL_READ_TIMEOUT_MS))
            .open()
            .map_err(|source| SerialError::Open { port: self.config.port.clone(), source })?;

        port.clear(ClearBuffer::All)?;

        info!(port = %self.config.port, baud = self.config.baud_rate, "serial port opened");
        self.port = Some(port);
        self.start_listener()?;
        Ok(())
    }

    /// Stop the reader and close the port.
    pub fn disconnect(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
        }
        if self.port.take().is_some() {
            info!(port = %self.config.port, "serial port closed");
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Whether the reader thread is alive and still serving the port.
    #[must_use]
    pub fn is_listener_alive(&self) -> bool {
        self.listener.as_ref().is_some_and(ListenerHandle::is_alive)
    }

    /// Send a packed request frame.
    ///
    /// Before writing: the reader is checked for liveness and restarted if
    /// dead (a dead reader would silently drop the response), the stale
    /// presentation state is cleared so the coming ACK/NAK is reported,
    /// and the input buffer is flushed so a leftover response cannot be
    /// attributed to this request.
    ///
    /// # Errors
    /// `NotConnected` without an open port; `Io` on write failure.
    pub fn send(&mut self, frame: &[u8]) -> Result<(), SerialError> {
        if self.port.is_none() {
            return Err(SerialError::NotConnected);
        }

        if !self.is_listener_alive() {
            warn!("serial reader not alive, restarting before send");
            self.start_listener()?;
        }
        if let Some(listener) = &self.listener {
            listener.clear_presenting();
        }

        let port = self.port.as_mut().ok_or(SerialError::NotConnected)?;
        port.clear(ClearBuffer::Input)?;
        port.write_all(frame)?;
        port.flush()?;

        info!(bytes = frame.len(), "request frame written to serial port");
        Ok(())
    }

    /// Bounded reconnection after a connection loss: up to
    /// [`SERIAL_RECONNECT_ATTEMPTS`] attempts with a fixed pause between
    /// them. On success the reader is running again; on exhaustion the
    /// transport stays disconnected and the failure surfaces to the
    /// orchestrator.
    ///
    /// # Errors
    /// `ReconnectExhausted` when every attempt failed.
    pub async fn reconnect(&mut self) -> Result<(), SerialError> {
        self.disconnect();

        for attempt in 1..=SERIAL_RECONNECT_ATTEMPTS {
            info!(attempt, max = SERIAL_RECONNECT_ATTEMPTS, "serial reconnection attempt");
            tokio::time::sleep(Duration::from_secs(SERIAL_RECONNECT_PAUSE_SECS)).await;

            match self.connect() {
                Ok(()) => {
                    info!("serial reconnection successful");
                    return Ok(());
                }
                Err(e) => warn!(attempt, "reconnection attempt failed: {e}"),
            }
        }

        error!(attempts = SERIAL_RECONNECT_ATTEMPTS, "serial reconnection exhausted");
        Err(SerialError::ReconnectExhausted { attempts: SERIAL_RECONNECT_ATTEMPTS })
    }

    fn start_listener(&mut self) -> Result<(), SerialError> {
        let port = self.port.as_ref().ok_or(SerialError::NotConnected)?;
        let reader_port = port.try_clone().map_err(|source| SerialError::Open {
            port: self.config.port.clone(),
            source,
        })?;

        if let Some(old) = self.listener.take() {
            old.shutdown();
        }
        self.listener = Some(spawn_reader(
            reader_port,
            self.events.clone(),
            self.reader_settings.clone(),
        ));
        Ok(())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_config_is_9600_8n1() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.parity, 'N');
    }

    #[rstest]
    #[case('N', Parity::None)]
    #[case('E', Parity::Even)]
    #[case('o', Parity::Odd)]
    fn parity_mapping(#[case] input: char, #[case] expected: Parity) {
        assert_eq!(map_parity(input).unwrap(), expected);
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(map_parity('X').is_err());
        assert!(map_data_bits(9).is_err());
        assert!(map_stop_bits(3).is_err());
    }

    #[test]
    fn connect_requires_a_port_path() {
        let (mut transport, _rx) = SerialTransport::new(SerialConfig::default());
        assert!(matches!(transport.connect(), Err(SerialError::NoPortConfigured)));
    }

    #[test]
    fn connect_fails_for_missing_device() {
        let config = SerialConfig { port: "/dev/ttyECRSIM_NONE".to_string(), ..Default::default() };
        let (mut transport, _rx) = SerialTransport::new(config);

        assert!(matches!(transport.connect(), Err(SerialError::Open { .. })));
        assert!(!transport.is_connected());
    }

    #[test]
    fn send_without_connect_is_rejected() {
        let (mut transport, _rx) = SerialTransport::new(SerialConfig::default());
        assert!(matches!(transport.send(&[0x02]), Err(SerialError::NotConnected)));
    }

    #[test]
    fn listener_not_alive_when_disconnected() {
        let (transport, _rx) = SerialTransport::new(SerialConfig::default());
        assert!(!transport.is_listener_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_gives_up_after_bounded_attempts() {
        let config = SerialConfig { port: "/dev/ttyECRSIM_NONE".to_string(), ..Default::default() };
        let (mut transport, _rx) = SerialTransport::new(config);

        let result = transport.reconnect().await;
        assert!(matches!(result, Err(SerialError::ReconnectExhausted { attempts: 3 })));
        assert!(!transport.is_connected());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut transport, _rx) = SerialTransport::new(SerialConfig::default());
        transport.disconnect();
        transport.disconnect();
        assert!(!transport.is_connected());
    }
}
