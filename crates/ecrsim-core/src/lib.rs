pub mod constants;
pub mod error;
pub mod transactions;
pub mod types;

pub use error::{Error, Result};
pub use transactions::{InputMode, InputProfile, TransactionType, entry_mode_description};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
