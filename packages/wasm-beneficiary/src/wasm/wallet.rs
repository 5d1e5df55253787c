//! Wallet extensions backed by the page's JS registry
//!
//! The registry object exposes `getWallets()` and `getWalletBySource(name)`.
//! Each wallet has async `enable(dappName)` and `getAccounts()`, and after
//! enabling carries an `extension` whose `signer` is passed through untouched.

use crate::config::install_url;
use crate::wallet::{
    InjectedWallet, WalletAccount, WalletDescriptor, WalletError, WalletRegistry, WalletStore,
};
use crate::wasm::storage::LocalStorageSelectionStore;
use crate::wasm::timer::GlooTimer;
use crate::wasm::try_into_js_value::TryIntoJsValue;
use crate::wasm::{
    call_method, call_method_sync, config_from_js, is_user_rejection, js_error_message,
    to_js_value,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

/// Registry entry as reported by the JS side
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWallet {
    extension_name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    installed: bool,
}

impl From<RawWallet> for WalletDescriptor {
    fn from(raw: RawWallet) -> Self {
        WalletDescriptor {
            install_url: install_url(&raw.extension_name).map(str::to_string),
            title: raw.title.unwrap_or_else(|| raw.extension_name.clone()),
            extension_name: raw.extension_name,
            installed: raw.installed,
        }
    }
}

fn descriptor_of(value: &JsValue) -> Option<WalletDescriptor> {
    serde_wasm_bindgen::from_value::<RawWallet>(value.clone())
        .map(WalletDescriptor::from)
        .map_err(|e| log::warn!("Ignoring malformed wallet entry: {}", e))
        .ok()
}

fn is_present(value: &JsValue) -> bool {
    !value.is_undefined() && !value.is_null()
}

/// One injected Substrate extension
#[derive(Debug, Clone)]
pub struct JsInjectedWallet {
    wallet: JsValue,
    descriptor: WalletDescriptor,
}

#[async_trait(?Send)]
impl InjectedWallet for JsInjectedWallet {
    type Signer = JsValue;

    fn descriptor(&self) -> WalletDescriptor {
        self.descriptor.clone()
    }

    async fn enable(&self, dapp_name: &str) -> Result<JsValue, WalletError> {
        let enabled = call_method(&self.wallet, "enable", &[JsValue::from_str(dapp_name)])
            .await
            .map_err(|e| {
                let message = js_error_message(&e);
                if is_user_rejection(&e) {
                    WalletError::Rejected(message)
                } else {
                    WalletError::Extension(message)
                }
            })?;

        let extension = js_sys::Reflect::get(&self.wallet, &JsValue::from_str("extension"))
            .ok()
            .filter(is_present)
            .unwrap_or(enabled);
        js_sys::Reflect::get(&extension, &JsValue::from_str("signer"))
            .ok()
            .filter(is_present)
            .ok_or_else(|| WalletError::ExtensionUnavailable(self.descriptor.title.clone()))
    }

    async fn accounts(&self) -> Result<Vec<WalletAccount>, WalletError> {
        let accounts = call_method(&self.wallet, "getAccounts", &[])
            .await
            .map_err(|e| WalletError::Extension(js_error_message(&e)))?;
        let mut accounts: Vec<WalletAccount> = serde_wasm_bindgen::from_value(accounts)
            .map_err(|e| WalletError::Extension(format!("Invalid accounts: {}", e)))?;
        for account in accounts.iter_mut().filter(|a| a.source.is_empty()) {
            account.source = self.descriptor.extension_name.clone();
        }
        Ok(accounts)
    }
}

/// The page's wallet registry object
#[derive(Debug, Clone)]
pub struct JsWalletRegistry {
    registry: JsValue,
}

impl JsWalletRegistry {
    pub fn new(registry: JsValue) -> Self {
        Self { registry }
    }
}

impl WalletRegistry for JsWalletRegistry {
    type Wallet = JsInjectedWallet;

    fn wallets(&self) -> Vec<WalletDescriptor> {
        match call_method_sync(&self.registry, "getWallets", &[]) {
            Ok(list) => js_sys::Array::from(&list)
                .iter()
                .filter_map(|w| descriptor_of(&w))
                .collect(),
            Err(e) => {
                log::error!("Failed to list wallets: {}", js_error_message(&e));
                Vec::new()
            }
        }
    }

    fn by_source(&self, extension_name: &str) -> Option<JsInjectedWallet> {
        let wallet = call_method_sync(
            &self.registry,
            "getWalletBySource",
            &[JsValue::from_str(extension_name)],
        )
        .ok()
        .filter(is_present)?;
        let descriptor = descriptor_of(&wallet)?;
        Some(JsInjectedWallet { wallet, descriptor })
    }
}

type JsWalletStore = WalletStore<JsWalletRegistry, LocalStorageSelectionStore, GlooTimer>;

/// WASM-exposed wallet connection store
#[wasm_bindgen]
pub struct WasmWalletStore {
    inner: Rc<JsWalletStore>,
}

#[wasm_bindgen]
impl WasmWalletStore {
    /// Create the store and restore the persisted selection
    ///
    /// # Arguments
    /// * `registry` - Wallet registry object
    /// * `config` - Optional partial `BeneficiaryConfig`
    #[wasm_bindgen(constructor)]
    pub fn new(registry: JsValue, config: Option<JsValue>) -> Result<WasmWalletStore, JsValue> {
        let config = config_from_js(config)?;
        let persistence = LocalStorageSelectionStore::new(&config.storage_key);
        let inner = WalletStore::new(
            JsWalletRegistry::new(registry),
            persistence,
            GlooTimer,
            config,
        );
        Ok(WasmWalletStore {
            inner: Rc::new(inner),
        })
    }

    /// Supported installed-or-not extensions, deduplicated
    #[wasm_bindgen(js_name = detectWallets)]
    pub fn detect_wallets(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.inner.detect_wallets())
    }

    /// Connect to an extension; resolves once connected, rejects with the message shown to the user
    #[wasm_bindgen(js_name = connectWallet)]
    pub fn connect_wallet(&self, extension_name: String) -> js_sys::Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            inner
                .connect_wallet(&extension_name)
                .await
                .map(|_| JsValue::UNDEFINED)
                .map_err(|e| js_sys::Error::new(&e.to_string()).into())
        })
    }

    /// Silent reconnection to the persisted selection; never rejects
    #[wasm_bindgen(js_name = initializeConnection)]
    pub fn initialize_connection(&self) -> js_sys::Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            inner.initialize_connection().await;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = disconnectWallet)]
    pub fn disconnect_wallet(&self) {
        self.inner.disconnect_wallet()
    }

    #[wasm_bindgen(js_name = selectAccount)]
    pub fn select_account(&self, address: &str) {
        self.inner.select_account(address)
    }

    #[wasm_bindgen(js_name = clearError)]
    pub fn clear_error(&self) {
        self.inner.clear_error()
    }

    /// `disconnected`, `connecting`, `initializing`, `connected` or `error`
    #[wasm_bindgen(getter)]
    pub fn status(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.inner.status())
    }

    #[wasm_bindgen(getter, js_name = isConnected)]
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    #[wasm_bindgen(getter, js_name = isConnecting)]
    pub fn is_connecting(&self) -> bool {
        self.inner.is_connecting()
    }

    #[wasm_bindgen(getter, js_name = isInitializing)]
    pub fn is_initializing(&self) -> bool {
        self.inner.is_initializing()
    }

    #[wasm_bindgen(getter, js_name = canConnect)]
    pub fn can_connect(&self) -> bool {
        self.inner.can_connect()
    }

    #[wasm_bindgen(getter, js_name = hasWallets)]
    pub fn has_wallets(&self) -> bool {
        self.inner.has_wallets()
    }

    #[wasm_bindgen(getter, js_name = selectedAddress)]
    pub fn selected_address(&self) -> Option<String> {
        self.inner.selected_address()
    }

    #[wasm_bindgen(getter, js_name = connectionError)]
    pub fn connection_error(&self) -> Option<String> {
        self.inner.connection_error()
    }

    /// Accounts of the connected extension
    #[wasm_bindgen(getter)]
    pub fn accounts(&self) -> Result<JsValue, JsValue> {
        Ok(self.inner.snapshot().accounts.try_to_js_value()?)
    }

    /// Full state for rendering
    #[wasm_bindgen]
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.inner.snapshot())
    }
}

impl WasmWalletStore {
    pub(crate) fn selected_address_and_signer(&self) -> (Option<String>, Option<JsValue>) {
        (self.inner.selected_address(), self.inner.signer())
    }
}
