//! JSON-file store: settings plus the transaction history map.
//!
//! Both documents are flat, newline-free JSON. Every mutation rewrites
//! the affected file; the documents are small (a settings object and a
//! bounded history of simulator transactions) and crash consistency
//! beyond last-write-wins is not a requirement here.
//!
//! The hidden set lives in memory only: "clear history" hides records
//! from the user-facing view without deleting them, and a restart brings
//! everything back, matching the terminal vendor's tooling.

use crate::record::TransactionRecord;
use crate::settings::Settings;
use crate::{SettingsStore, StoreError, TransactionStore};
use ecrsim_core::{TransactionId, TransactionStatus};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

struct Inner {
    settings: Settings,
    history: BTreeMap<String, TransactionRecord>,
    hidden: HashSet<String>,
}

/// File-backed store for settings and transaction history.
pub struct JsonStore {
    settings_path: PathBuf,
    history_path: PathBuf,
    inner: Mutex<Inner>,
}

impl JsonStore {
    /// Open (or initialize) the store in the given directory.
    ///
    /// Unreadable or corrupt documents are replaced by defaults with a
    /// warning; refusing to start over a bad history file would brick the
    /// simulator for no benefit.
    ///
    /// # Errors
    /// `Io` when the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let settings_path = dir.join("settings.json");
        let history_path = dir.join("transaction_history.json");

        let settings = match std::fs::read_to_string(&settings_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("settings document unreadable ({e}), using defaults");
                Settings::default()
            }),
            Err(_) => {
                info!("no settings document, using defaults");
                Settings::default()
            }
        };

        let history = match std::fs::read_to_string(&history_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("history document unreadable ({e}), starting empty");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        info!(transactions = history.len(), "transaction history loaded");

        Ok(JsonStore {
            settings_path,
            history_path,
            inner: Mutex::new(Inner { settings, history, hidden: HashSet::new() }),
        })
    }

    fn persist_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let json = serde_json::to_string(settings)?;
        std::fs::write(&self.settings_path, json)?;
        Ok(())
    }

    fn persist_history(
        &self,
        history: &BTreeMap<String, TransactionRecord>,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(history)?;
        std::fs::write(&self.history_path, json)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mutex means a panic mid-update; the store data is
        // still the best available state.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SettingsStore for JsonStore {
    fn get_settings(&self) -> Settings {
        self.lock().settings.clone()
    }

    fn update_settings(
        &self,
        update: &mut dyn FnMut(&mut Settings),
    ) -> Result<Settings, StoreError> {
        let mut inner = self.lock();
        update(&mut inner.settings);
        self.persist_settings(&inner.settings)?;
        debug!("settings updated");
        Ok(inner.settings.clone())
    }
}

impl TransactionStore for JsonStore {
    fn add_transaction(
        &self,
        id: &TransactionId,
        record: TransactionRecord,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.history.insert(id.as_str().to_string(), record);
        self.persist_history(&inner.history)?;
        debug!(id = %id, "transaction added");
        Ok(())
    }

    fn update_transaction(
        &self,
        id: &TransactionId,
        update: &mut dyn FnMut(&mut TransactionRecord),
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let record = inner
            .history
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        update(record);
        self.persist_history(&inner.history)?;
        debug!(id = %id, "transaction updated");
        Ok(())
    }

    fn get_transaction(&self, id: &TransactionId) -> Option<TransactionRecord> {
        self.lock().history.get(id.as_str()).cloned()
    }

    fn visible_transactions(
        &self,
        user_id: Option<i64>,
    ) -> Vec<(TransactionId, TransactionRecord)> {
        let inner = self.lock();
        inner
            .history
            .iter()
            .filter(|(id, _)| !inner.hidden.contains(*id))
            .filter(|(_, record)| match user_id {
                Some(uid) => record.user_id == Some(uid),
                None => true,
            })
            .map(|(id, record)| (TransactionId::from_string(id.clone()), record.clone()))
            .collect()
    }

    fn clear_history(&self, user_id: Option<i64>) {
        let mut inner = self.lock();
        let to_hide: Vec<String> = inner
            .history
            .iter()
            .filter(|(_, record)| match user_id {
                Some(uid) => record.user_id == Some(uid),
                None => true,
            })
            .map(|(id, _)| id.clone())
            .collect();
        let hidden_count = to_hide.len();
        inner.hidden.extend(to_hide);
        info!(hidden = hidden_count, "transactions hidden from view");
    }

    fn latest_processing(&self) -> Option<TransactionId> {
        let inner = self.lock();
        inner
            .history
            .iter()
            .filter(|(_, record)| record.status == TransactionStatus::Processing)
            .max_by_key(|(_, record)| record.timestamp)
            .map(|(id, _)| TransactionId::from_string(id.clone()))
    }
}
