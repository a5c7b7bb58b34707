use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque transaction identifier (8 uppercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        let id = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        TransactionId(id)
    }

    /// Wrap an existing identifier (e.g. read back from the store).
    #[must_use]
    pub fn from_string(id: String) -> Self {
        TransactionId(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which transport carries transactions to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommunicationMode {
    Serial,
    Socket,
}

impl CommunicationMode {
    /// Parse the mode from its settings value.
    ///
    /// # Errors
    /// Returns `Error::Config` for anything other than "Serial" or "Socket".
    pub fn from_setting(value: &str) -> Result<Self> {
        match value {
            "Serial" => Ok(CommunicationMode::Serial),
            "Socket" => Ok(CommunicationMode::Socket),
            other => Err(Error::Config(format!("Invalid communication mode: {other}"))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationMode::Serial => "Serial",
            CommunicationMode::Socket => "Socket",
        }
    }
}

impl fmt::Display for CommunicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a submitted transaction.
///
/// `Processing` is the only non-terminal state. `Failed` means the device
/// answered with a non-success response code; `Error` means a transport or
/// parsing fault prevented a definitive business outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Processing,
    Success,
    Failed,
    Error,
}

impl TransactionStatus {
    /// Whether this status is terminal (no further mutation expected).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Processing)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Processing => "processing",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}
