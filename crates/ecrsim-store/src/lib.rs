//! Persistence layer: typed settings and the transaction history map,
//! stored as newline-free JSON documents.
//!
//! The store is the single owner of record state. The orchestrator never
//! holds its own copy of history; every mutation goes through
//! [`TransactionStore::update_transaction`], which serializes writers per
//! record and persists before returning.

pub mod json_store;
pub mod record;
pub mod settings;

pub use json_store::JsonStore;
pub use record::{RecordedRequest, TransactionRecord};
pub use settings::Settings;

use ecrsim_core::TransactionId;
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read and mutate the settings document.
pub trait SettingsStore: Send + Sync {
    fn get_settings(&self) -> Settings;

    /// Apply a mutation to the settings and persist the result.
    ///
    /// # Errors
    /// Persistence failures.
    fn update_settings(&self, update: &mut dyn FnMut(&mut Settings))
    -> Result<Settings, StoreError>;
}

/// Read and mutate the transaction history.
///
/// Visibility is subtractive: records enter a hidden set when history is
/// cleared and never leave it. Nothing is deleted.
pub trait TransactionStore: Send + Sync {
    /// Insert a new record under the given id.
    ///
    /// # Errors
    /// Persistence failures.
    fn add_transaction(
        &self,
        id: &TransactionId,
        record: TransactionRecord,
    ) -> Result<(), StoreError>;

    /// Apply a mutation to an existing record and persist the result.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, plus persistence failures.
    fn update_transaction(
        &self,
        id: &TransactionId,
        update: &mut dyn FnMut(&mut TransactionRecord),
    ) -> Result<(), StoreError>;

    fn get_transaction(&self, id: &TransactionId) -> Option<TransactionRecord>;

    /// Records not hidden by a clear-history operation, optionally
    /// restricted to one user's transactions.
    fn visible_transactions(
        &self,
        user_id: Option<i64>,
    ) -> Vec<(TransactionId, TransactionRecord)>;

    /// Hide records from the user-facing view (additive, one-way).
    fn clear_history(&self, user_id: Option<i64>);

    /// The most recently submitted record still in `processing`, which is
    /// the one an asynchronous serial response belongs to.
    fn latest_processing(&self) -> Option<TransactionId>;
}
