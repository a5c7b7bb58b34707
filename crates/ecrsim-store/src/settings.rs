//! Typed application settings.
//!
//! The settings document is a single flat JSON object; unknown keys are
//! ignored on load and every field has a default, so a missing or partial
//! file never blocks startup.

use ecrsim_core::CommunicationMode;
use ecrsim_core::constants::DEFAULT_EDC_SERIAL;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Settings {
    /// Transport selection: Serial or Socket.
    pub communication: CommunicationMode,

    // Serial line
    pub serial_port: String,
    pub speed_baud: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: char,

    // Socket endpoint
    pub socket_ip: String,
    pub socket_port: u16,
    pub enable_ssl: bool,
    pub enable_rest_api: bool,
    pub edc_serial_number: String,

    /// Force the pure codec even when the vendor library is present.
    /// A runtime flag by design: the equivalence tests flip it without
    /// rebuilding.
    pub disable_native_codec: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            communication: CommunicationMode::Socket,
            serial_port: String::new(),
            speed_baud: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: 'N',
            socket_ip: "127.0.0.1".to_string(),
            socket_port: 9001,
            enable_ssl: false,
            enable_rest_api: false,
            edc_serial_number: DEFAULT_EDC_SERIAL.to_string(),
            disable_native_codec: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_device_factory_setup() {
        let settings = Settings::default();
        assert_eq!(settings.communication, CommunicationMode::Socket);
        assert_eq!(settings.speed_baud, 9600);
        assert_eq!(settings.data_bits, 8);
        assert_eq!(settings.parity, 'N');
        assert_eq!(settings.socket_ip, "127.0.0.1");
        assert_eq!(settings.socket_port, 9001);
        assert!(!settings.disable_native_codec);
    }

    #[test]
    fn partial_documents_fill_from_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"communication":"Serial","serial_port":"/dev/ttyUSB0"}"#)
                .unwrap();
        assert_eq!(settings.communication, CommunicationMode::Serial);
        assert_eq!(settings.serial_port, "/dev/ttyUSB0");
        assert_eq!(settings.speed_baud, 9600);
    }

    #[test]
    fn round_trips_through_json() {
        let mut settings = Settings::default();
        settings.enable_rest_api = true;
        settings.edc_serial_number = "V1E0000042".to_string();

        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains('\n'));

        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
