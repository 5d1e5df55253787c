//! wasm-beneficiary: WASM module for the Autonomys beneficiary association dApp
//!
//! This crate provides:
//! - EVM address validation and EIP-55 checksumming
//! - SS58 address helpers
//! - The association remark payload and its `System.remark` call data
//! - The optional EVM wallet self-check (EIP-191 signature recovery)
//! - Wallet connection state and the transaction status state machine
//!
//! # Architecture
//!
//! The crate follows a two-layer architecture:
//! - **Core layer** (`src/*.rs`): Pure Rust logic, no WASM dependencies
//! - **WASM layer** (`src/wasm/*.rs`): Thin wrappers with `#[wasm_bindgen]`
//!   and adapters over the JS wallet, chain and storage objects

pub mod association;
pub mod chain;
pub mod config;
pub mod error;
pub mod evm;
pub mod remark;
pub mod self_check;
pub mod ss58;
pub mod time;
pub mod tx_status;
pub mod types;
pub mod wallet;
pub mod wasm;

// Re-export main types for convenience
pub use association::{AssociationError, AssociationRequest};
pub use chain::{AssociationService, ChainClient, SharedConnection};
pub use config::{BeneficiaryConfig, Network};
pub use error::WasmBeneficiaryError;
pub use evm::{to_checksum_address, validate_evm_address, EvmAddressError};
pub use remark::AssociationRemark;
pub use self_check::{SelfCheckStatus, SelfCheckSummary, WalletType};
pub use ss58::{decode_ss58, encode_ss58, validate_ss58_address};
pub use tx_status::{TransactionError, TransactionStatus, TxStatusKind};
pub use types::{AccountBalance, NetworkInfo};
pub use wallet::{WalletSnapshot, WalletStore};
