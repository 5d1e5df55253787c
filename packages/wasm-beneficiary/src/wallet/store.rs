//! Wallet connection state
//!
//! One explicit store per page. Methods take `&self`; state lives in a
//! `RefCell` whose borrows never span an `.await`, so a second call made while
//! a connection is in flight observes the busy status and backs off.

use super::{
    InjectedWallet, SelectionStore, StoredSelection, WalletAccount, WalletDescriptor, WalletError,
    WalletRegistry,
};
use crate::config::BeneficiaryConfig;
use crate::ss58::reencode_ss58;
use crate::time::{with_timeout, Timer};
use serde::Serialize;
use std::cell::RefCell;

pub type SignerOf<R> = <<R as WalletRegistry>::Wallet as InjectedWallet>::Signer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Initializing,
    Connected,
    Error,
}

#[derive(Debug, Clone)]
pub struct WalletState<S> {
    pub status: ConnectionStatus,
    pub connection_error: Option<String>,
    pub selected_wallet: Option<String>,
    pub selected_account: Option<WalletAccount>,
    pub accounts: Vec<WalletAccount>,
    pub signer: Option<S>,
    pub available_wallets: Vec<WalletDescriptor>,
}

impl<S> Default for WalletState<S> {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            connection_error: None,
            selected_wallet: None,
            selected_account: None,
            accounts: Vec::new(),
            signer: None,
            available_wallets: Vec::new(),
        }
    }
}

impl<S> WalletState<S> {
    fn is_busy(&self) -> bool {
        matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Initializing
        )
    }

    /// Drop the live connection, keeping the selection
    fn reset_connection(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.accounts.clear();
        self.signer = None;
    }

    fn forget_selection(&mut self) {
        self.reset_connection();
        self.selected_wallet = None;
        self.selected_account = None;
    }
}

/// Serializable view of the store for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub status: ConnectionStatus,
    pub is_connected: bool,
    pub is_connecting: bool,
    pub is_initializing: bool,
    pub is_loading: bool,
    pub can_connect: bool,
    pub has_wallets: bool,
    pub connection_error: Option<String>,
    pub selected_wallet: Option<String>,
    pub selected_account: Option<WalletAccount>,
    pub selected_address: Option<String>,
    pub accounts: Vec<WalletAccount>,
    pub available_wallets: Vec<WalletDescriptor>,
}

struct Session<S> {
    accounts: Vec<WalletAccount>,
    signer: S,
}

pub struct WalletStore<R: WalletRegistry, P, T> {
    registry: R,
    persistence: P,
    timer: T,
    config: BeneficiaryConfig,
    state: RefCell<WalletState<SignerOf<R>>>,
}

impl<R, P, T> WalletStore<R, P, T>
where
    R: WalletRegistry,
    P: SelectionStore,
    T: Timer,
{
    /// Create the store, restoring any persisted selection
    pub fn new(registry: R, persistence: P, timer: T, config: BeneficiaryConfig) -> Self {
        let mut state = WalletState::default();
        match persistence.load() {
            Ok(Some(selection)) => {
                state.selected_account = Some(WalletAccount {
                    address: selection.selected_account,
                    name: None,
                    source: selection.selected_wallet.clone(),
                });
                state.selected_wallet = Some(selection.selected_wallet);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to load wallet selection: {}", e),
        }

        Self {
            registry,
            persistence,
            timer,
            config,
            state: RefCell::new(state),
        }
    }

    pub fn config(&self) -> &BeneficiaryConfig {
        &self.config
    }

    /// Refresh the supported, deduplicated extension list
    pub fn detect_wallets(&self) -> Vec<WalletDescriptor> {
        let mut supported: Vec<WalletDescriptor> = Vec::new();
        for wallet in self.registry.wallets() {
            // Nova injects itself under the polkadot-js name
            if wallet.title.to_lowercase().contains("nova") {
                continue;
            }
            if !self.config.is_supported_wallet(&wallet.extension_name) {
                continue;
            }
            if supported
                .iter()
                .any(|w| w.extension_name == wallet.extension_name)
            {
                continue;
            }
            supported.push(wallet);
        }

        log::debug!("detected {} supported wallets", supported.len());
        self.state.borrow_mut().available_wallets = supported.clone();
        supported
    }

    /// User-initiated connection; ignored while another attempt is in flight
    pub async fn connect_wallet(&self, extension_name: &str) -> Result<(), WalletError> {
        {
            let mut state = self.state.borrow_mut();
            if state.is_busy() {
                log::warn!("Connection already in progress, ignoring new attempt");
                return Ok(());
            }
            state.status = ConnectionStatus::Connecting;
            state.connection_error = None;
        }

        match self.open_session(extension_name).await {
            Ok(session) => {
                let first = session.accounts.first().cloned();
                {
                    let mut state = self.state.borrow_mut();
                    state.status = ConnectionStatus::Connected;
                    state.selected_wallet = Some(extension_name.to_string());
                    state.selected_account = first;
                    state.accounts = session.accounts;
                    state.signer = Some(session.signer);
                    state.connection_error = None;
                }
                log::info!("Connected to {}", extension_name);
                self.persist();
                Ok(())
            }
            Err(e) => {
                log::error!("Wallet connection failed: {}", e);
                let mut state = self.state.borrow_mut();
                state.status = ConnectionStatus::Error;
                state.connection_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Silent reconnection to the persisted selection
    pub async fn initialize_connection(&self) {
        let (wallet_name, stored_address) = {
            let mut state = self.state.borrow_mut();
            if state.is_busy() || state.status == ConnectionStatus::Connected {
                return;
            }
            let selection = match (&state.selected_wallet, &state.selected_account) {
                (Some(wallet), Some(account)) => (wallet.clone(), account.address.clone()),
                _ => return,
            };
            state.status = ConnectionStatus::Initializing;
            state.connection_error = None;
            selection
        };

        let installed = self
            .registry
            .by_source(&wallet_name)
            .is_some_and(|w| w.descriptor().installed);
        if !installed {
            log::info!("Wallet no longer installed, clearing persisted data");
            self.state.borrow_mut().forget_selection();
            self.clear_persisted();
            return;
        }

        match self.open_session(&wallet_name).await {
            Ok(session) => {
                let target = self.canonical_address(&stored_address);
                let account = session
                    .accounts
                    .iter()
                    .find(|a| Some(&a.address) == target.as_ref())
                    .cloned();

                match account {
                    Some(account) => {
                        let mut state = self.state.borrow_mut();
                        state.status = ConnectionStatus::Connected;
                        state.selected_account = Some(account);
                        state.accounts = session.accounts;
                        state.signer = Some(session.signer);
                        log::info!("Successfully reconnected to wallet");
                    }
                    None => {
                        log::info!("Account no longer exists, clearing persisted data");
                        self.state.borrow_mut().forget_selection();
                        self.clear_persisted();
                    }
                }
            }
            Err(e) => {
                log::warn!("Silent reconnection failed: {}", e);
                self.state.borrow_mut().reset_connection();
            }
        }
    }

    pub fn disconnect_wallet(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.forget_selection();
            state.connection_error = None;
        }
        self.clear_persisted();
    }

    pub fn select_account(&self, address: &str) {
        let target = self.canonical_address(address);
        {
            let mut state = self.state.borrow_mut();
            if state.status != ConnectionStatus::Connected {
                log::warn!("Cannot select account when wallet is not connected");
                return;
            }
            let found = state
                .accounts
                .iter()
                .find(|a| Some(&a.address) == target.as_ref())
                .cloned();
            match found {
                Some(account) => state.selected_account = Some(account),
                None => {
                    log::warn!("Account not found: {}", address);
                    return;
                }
            }
        }
        self.persist();
    }

    pub fn clear_error(&self) {
        self.state.borrow_mut().connection_error = None;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status() == ConnectionStatus::Connecting
    }

    pub fn is_initializing(&self) -> bool {
        self.status() == ConnectionStatus::Initializing
    }

    pub fn can_connect(&self) -> bool {
        let state = self.state.borrow();
        !state.is_busy() && state.status != ConnectionStatus::Connected
    }

    pub fn has_wallets(&self) -> bool {
        !self.state.borrow().available_wallets.is_empty()
    }

    pub fn selected_address(&self) -> Option<String> {
        self.state
            .borrow()
            .selected_account
            .as_ref()
            .map(|a| a.address.clone())
    }

    pub fn connection_error(&self) -> Option<String> {
        self.state.borrow().connection_error.clone()
    }

    /// Signer of the connected extension
    pub fn signer(&self) -> Option<SignerOf<R>> {
        self.state.borrow().signer.clone()
    }

    pub fn snapshot(&self) -> WalletSnapshot {
        let state = self.state.borrow();
        WalletSnapshot {
            status: state.status,
            is_connected: state.status == ConnectionStatus::Connected,
            is_connecting: state.status == ConnectionStatus::Connecting,
            is_initializing: state.status == ConnectionStatus::Initializing,
            is_loading: state.is_busy(),
            can_connect: !state.is_busy() && state.status != ConnectionStatus::Connected,
            has_wallets: !state.available_wallets.is_empty(),
            connection_error: state.connection_error.clone(),
            selected_wallet: state.selected_wallet.clone(),
            selected_account: state.selected_account.clone(),
            selected_address: state.selected_account.as_ref().map(|a| a.address.clone()),
            accounts: state.accounts.clone(),
            available_wallets: state.available_wallets.clone(),
        }
    }

    async fn open_session(&self, extension_name: &str) -> Result<Session<SignerOf<R>>, WalletError> {
        let wallet = self
            .registry
            .by_source(extension_name)
            .ok_or_else(|| WalletError::NotFound(extension_name.to_string()))?;

        let descriptor = wallet.descriptor();
        if !descriptor.installed {
            return Err(WalletError::NotInstalled {
                title: descriptor.title,
            });
        }

        let signer = with_timeout(
            &self.timer,
            self.config.connection_timeout(),
            wallet.enable(&self.config.dapp_name),
        )
        .await
        .map_err(|_| WalletError::ConnectionTimeout)??;

        let raw = wallet.accounts().await?;
        if raw.is_empty() {
            return Err(WalletError::NoAccounts {
                title: descriptor.title,
            });
        }

        let accounts = raw
            .into_iter()
            .map(|account| {
                let address = reencode_ss58(&account.address, self.config.ss58_prefix)
                    .map_err(|_| WalletError::InvalidAccount(account.address.clone()))?;
                Ok(WalletAccount { address, ..account })
            })
            .collect::<Result<Vec<_>, WalletError>>()?;

        Ok(Session { accounts, signer })
    }

    /// Addresses compare in the configured prefix, independent of the format they were stored in
    fn canonical_address(&self, address: &str) -> Option<String> {
        reencode_ss58(address, self.config.ss58_prefix).ok()
    }

    fn persist(&self) {
        let selection = {
            let state = self.state.borrow();
            match (&state.selected_wallet, &state.selected_account) {
                (Some(wallet), Some(account)) => StoredSelection {
                    selected_wallet: wallet.clone(),
                    selected_account: account.address.clone(),
                },
                _ => return,
            }
        };
        if let Err(e) = self.persistence.save(&selection) {
            log::warn!("Failed to persist wallet selection: {}", e);
        }
    }

    fn clear_persisted(&self) {
        if let Err(e) = self.persistence.clear() {
            log::warn!("Failed to clear wallet selection: {}", e);
        }
    }
}
