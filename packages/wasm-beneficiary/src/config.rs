//! Network endpoints, timeouts and wallet defaults

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name announced to wallet extensions on `enable`
pub const DAPP_NAME: &str = "Autonomys Beneficiary Verification";

/// localStorage key holding the persisted wallet selection
pub const WALLET_STORAGE_KEY: &str = "substrate-wallet-demo-preferences";

/// Time allowed for a submitted extrinsic to reach a terminal state (5 minutes)
pub const TRANSACTION_TIMEOUT_MS: u64 = 300_000;

/// Time allowed for a wallet extension to answer `enable`
pub const CONNECTION_TIMEOUT_MS: u64 = 30_000;

/// Generic Substrate prefix; account addresses start with '5'
pub const DEFAULT_SS58_PREFIX: u16 = 42;

/// Extension names accepted by the wallet picker
pub const SUPPORTED_WALLET_EXTENSIONS: [&str; 3] = ["talisman", "subwallet-js", "polkadot-js"];

/// Chrome web store page for a supported extension
pub fn install_url(extension_name: &str) -> Option<&'static str> {
    match extension_name {
        "talisman" => Some("https://chrome.google.com/webstore/detail/talisman-polkadot-wallet/fijngjgcjhjmmpcmkeiomlglpeiijkld"),
        "subwallet-js" => Some("https://chrome.google.com/webstore/detail/subwallet-polkadot-extens/onhogfjeacnfoofkfgppdlbmlmnplgbn"),
        "polkadot-js" => Some("https://chrome.google.com/webstore/detail/polkadot%7Bjs%7D-extension/mopnmbcafieddcagagdcbnhejhlodfdd"),
        _ => None,
    }
}

/// Autonomys network to submit to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Public WebSocket RPC endpoint
    pub fn endpoint(self) -> &'static str {
        match self {
            Network::Mainnet => "wss://rpc.mainnet.subspace.foundation/ws",
            Network::Testnet => "wss://rpc.chronos.autonomys.xyz/ws",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl core::fmt::Display for Network {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime configuration, deserializable from a partial JS object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeneficiaryConfig {
    #[serde(default)]
    pub network: Network,
    /// Overrides the network's default endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_ss58_prefix")]
    pub ss58_prefix: u16,
    #[serde(default = "default_dapp_name")]
    pub dapp_name: String,
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default = "default_supported_wallets")]
    pub supported_wallets: Vec<String>,
}

fn default_transaction_timeout_ms() -> u64 {
    TRANSACTION_TIMEOUT_MS
}

fn default_connection_timeout_ms() -> u64 {
    CONNECTION_TIMEOUT_MS
}

fn default_ss58_prefix() -> u16 {
    DEFAULT_SS58_PREFIX
}

fn default_dapp_name() -> String {
    DAPP_NAME.to_string()
}

fn default_storage_key() -> String {
    WALLET_STORAGE_KEY.to_string()
}

fn default_supported_wallets() -> Vec<String> {
    SUPPORTED_WALLET_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for BeneficiaryConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            endpoint: None,
            transaction_timeout_ms: default_transaction_timeout_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
            ss58_prefix: default_ss58_prefix(),
            dapp_name: default_dapp_name(),
            storage_key: default_storage_key(),
            supported_wallets: default_supported_wallets(),
        }
    }
}

impl BeneficiaryConfig {
    /// Endpoint override if set, otherwise the network default
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(self.network.endpoint())
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn is_supported_wallet(&self, extension_name: &str) -> bool {
        self.supported_wallets.iter().any(|w| w == extension_name)
    }
}
