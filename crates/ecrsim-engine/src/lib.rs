//! Transaction orchestrator: maps logical requests onto the configured
//! transport, owns the record lifecycle, and resolves each record exactly
//! once from whichever transport eventually reports a result.

pub mod connection;
pub mod preview;
pub mod processor;

pub use connection::{ConnectionManager, ConnectionStatus};
pub use preview::build_preview;
pub use processor::{ProcessOutcome, StatusView, TransactionProcessor};

use ecrsim_network::SocketConfig;
use ecrsim_serial::SerialConfig;
use ecrsim_store::Settings;

/// Serial line parameters from the settings document.
#[must_use]
pub fn serial_config(settings: &Settings) -> SerialConfig {
    SerialConfig {
        port: settings.serial_port.clone(),
        baud_rate: settings.speed_baud,
        data_bits: settings.data_bits,
        stop_bits: settings.stop_bits,
        parity: settings.parity,
    }
}

/// Socket endpoint parameters from the settings document.
#[must_use]
pub fn socket_config(settings: &Settings) -> SocketConfig {
    SocketConfig {
        host: settings.socket_ip.clone(),
        port: settings.socket_port,
        enable_ssl: settings.enable_ssl,
        enable_rest_api: settings.enable_rest_api,
        edc_serial_number: settings.edc_serial_number.clone(),
    }
}
