//! Substrate wallet extensions and the connection store
//!
//! Extensions, persistence and timers are traits so the store runs natively in
//! tests and against browser objects in the WASM layer.

pub mod store;

use crate::error::WasmBeneficiaryError;
use async_trait::async_trait;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

pub use store::{ConnectionStatus, WalletSnapshot, WalletState, WalletStore};

/// Account exposed by an extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Extension name the account came from
    #[serde(default)]
    pub source: String,
}

/// What the wallet picker shows for an extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDescriptor {
    pub extension_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub installed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_url: Option<String>,
}

/// Persisted wallet choice; addresses only, never key material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSelection {
    pub selected_wallet: String,
    pub selected_account: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    NotFound(String),
    NotInstalled { title: String },
    ExtensionUnavailable(String),
    ConnectionTimeout,
    NoAccounts { title: String },
    /// User refused access in the extension
    Rejected(String),
    InvalidAccount(String),
    Extension(String),
}

impl std::error::Error for WalletError {}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::NotFound(name) => write!(f, "Wallet not found: {}", name),
            WalletError::NotInstalled { title } => write!(
                f,
                "{} is not installed. Please install the extension first.",
                title
            ),
            WalletError::ExtensionUnavailable(name) => {
                write!(f, "Extension not available for {}", name)
            }
            WalletError::ConnectionTimeout => write!(f, "Connection timeout"),
            WalletError::NoAccounts { title } => write!(
                f,
                "No accounts found in {}. Please create an account first.",
                title
            ),
            WalletError::Rejected(s) => write!(f, "{}", s),
            WalletError::InvalidAccount(s) => write!(f, "Invalid account address: {}", s),
            WalletError::Extension(s) => write!(f, "{}", s),
        }
    }
}

/// A browser wallet extension
#[async_trait(?Send)]
pub trait InjectedWallet {
    /// Opaque signing handle handed to the chain client
    type Signer: Clone;

    fn descriptor(&self) -> WalletDescriptor;

    async fn enable(&self, dapp_name: &str) -> Result<Self::Signer, WalletError>;

    async fn accounts(&self) -> Result<Vec<WalletAccount>, WalletError>;
}

/// All extensions the page knows about
pub trait WalletRegistry {
    type Wallet: InjectedWallet;

    fn wallets(&self) -> Vec<WalletDescriptor>;

    fn by_source(&self, extension_name: &str) -> Option<Self::Wallet>;
}

/// Persistence for the wallet selection
pub trait SelectionStore {
    fn load(&self) -> Result<Option<StoredSelection>, WasmBeneficiaryError>;
    fn save(&self, selection: &StoredSelection) -> Result<(), WasmBeneficiaryError>;
    fn clear(&self) -> Result<(), WasmBeneficiaryError>;
}

/// Selection kept in memory only
#[derive(Debug, Default)]
pub struct MemorySelectionStore {
    inner: RefCell<Option<StoredSelection>>,
}

impl MemorySelectionStore {
    pub fn new(initial: Option<StoredSelection>) -> Self {
        Self {
            inner: RefCell::new(initial),
        }
    }

    pub fn current(&self) -> Option<StoredSelection> {
        self.inner.borrow().clone()
    }
}

impl SelectionStore for MemorySelectionStore {
    fn load(&self) -> Result<Option<StoredSelection>, WasmBeneficiaryError> {
        Ok(self.current())
    }

    fn save(&self, selection: &StoredSelection) -> Result<(), WasmBeneficiaryError> {
        *self.inner.borrow_mut() = Some(selection.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), WasmBeneficiaryError> {
        *self.inner.borrow_mut() = None;
        Ok(())
    }
}

impl<S: SelectionStore + ?Sized> SelectionStore for std::rc::Rc<S> {
    fn load(&self) -> Result<Option<StoredSelection>, WasmBeneficiaryError> {
        (**self).load()
    }

    fn save(&self, selection: &StoredSelection) -> Result<(), WasmBeneficiaryError> {
        (**self).save(selection)
    }

    fn clear(&self) -> Result<(), WasmBeneficiaryError> {
        (**self).clear()
    }
}
