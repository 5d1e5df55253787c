//! Wallet selection persisted in `localStorage`

use crate::wallet::{SelectionStore, StoredSelection};
use crate::WasmBeneficiaryError;
use gloo_storage::errors::StorageError;
use gloo_storage::{LocalStorage, Storage};

/// Selection stored as `{selectedWallet, selectedAccount}` JSON under one key
#[derive(Debug, Clone)]
pub struct LocalStorageSelectionStore {
    key: String,
}

impl LocalStorageSelectionStore {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
        }
    }
}

impl SelectionStore for LocalStorageSelectionStore {
    fn load(&self) -> Result<Option<StoredSelection>, WasmBeneficiaryError> {
        match LocalStorage::get::<StoredSelection>(&self.key) {
            Ok(selection) => Ok(Some(selection)),
            Err(StorageError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(WasmBeneficiaryError::Storage(e.to_string())),
        }
    }

    fn save(&self, selection: &StoredSelection) -> Result<(), WasmBeneficiaryError> {
        LocalStorage::set(&self.key, selection)
            .map_err(|e| WasmBeneficiaryError::Storage(e.to_string()))
    }

    fn clear(&self) -> Result<(), WasmBeneficiaryError> {
        LocalStorage::delete(&self.key);
        Ok(())
    }
}
