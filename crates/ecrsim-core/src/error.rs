use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Request validation errors
    #[error("Invalid transaction type: {0}")]
    InvalidTransactionType(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid invoice length: {field} must be {max_digits} digits or less, got {actual}")]
    InvalidInvoiceLength {
        field: &'static str,
        max_digits: usize,
        actual: usize,
    },

    #[error("Invalid card format: {0}")]
    InvalidCardFormat(String),

    // Frame errors
    #[error("Frame too short: {actual} bytes, expected at least {expected}")]
    FrameTooShort { expected: usize, actual: usize },

    #[error("Missing STX, found 0x{0:02X}")]
    MissingStx(u8),

    #[error("Unexpected payload length: {actual}, expected {expected}")]
    UnexpectedLength { expected: usize, actual: usize },

    // Transport errors
    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Response timeout: {0}")]
    ResponseTimeout(String),

    // Orchestrator errors
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("A transaction is already in flight: {0}")]
    TransactionInFlight(String),

    // Store errors
    #[error("Store error: {0}")]
    Store(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
