//! Error types for wasm-beneficiary

use crate::association::AssociationError;
use crate::evm::EvmAddressError;
use crate::remark::RemarkError;
use crate::self_check::SelfCheckError;
use crate::tx_status::TransactionError;
use crate::wallet::WalletError;
use core::fmt;
use wasm_bindgen::prelude::*;

/// Main error type for wasm-beneficiary operations
#[derive(Debug, Clone)]
pub enum WasmBeneficiaryError {
    /// EVM address failed format or checksum validation
    InvalidEvmAddress(EvmAddressError),
    /// Invalid SS58 address
    InvalidAddress(String),
    /// Remark payload does not follow the association format
    InvalidRemark(RemarkError),
    /// Wallet extension failure
    Wallet(WalletError),
    /// Transaction submission failure
    Transaction(TransactionError),
    /// EVM self-check failure (informational only)
    SelfCheck(SelfCheckError),
    /// Persisted selection could not be read or written
    Storage(String),
    /// Invalid input
    InvalidInput(String),
    /// Generic string error
    StringError(String),
}

impl std::error::Error for WasmBeneficiaryError {}

impl fmt::Display for WasmBeneficiaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WasmBeneficiaryError::InvalidEvmAddress(e) => write!(f, "{}", e),
            WasmBeneficiaryError::InvalidAddress(s) => write!(f, "Invalid address: {}", s),
            WasmBeneficiaryError::InvalidRemark(s) => write!(f, "Invalid remark: {}", s),
            WasmBeneficiaryError::Wallet(e) => write!(f, "{}", e),
            WasmBeneficiaryError::Transaction(e) => write!(f, "{}", e),
            WasmBeneficiaryError::SelfCheck(e) => write!(f, "{}", e),
            WasmBeneficiaryError::Storage(s) => write!(f, "Storage error: {}", s),
            WasmBeneficiaryError::InvalidInput(s) => write!(f, "Invalid input: {}", s),
            WasmBeneficiaryError::StringError(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for WasmBeneficiaryError {
    fn from(s: &str) -> Self {
        WasmBeneficiaryError::StringError(s.to_string())
    }
}

impl From<String> for WasmBeneficiaryError {
    fn from(s: String) -> Self {
        WasmBeneficiaryError::StringError(s)
    }
}

impl From<EvmAddressError> for WasmBeneficiaryError {
    fn from(err: EvmAddressError) -> Self {
        WasmBeneficiaryError::InvalidEvmAddress(err)
    }
}

impl From<RemarkError> for WasmBeneficiaryError {
    fn from(err: RemarkError) -> Self {
        WasmBeneficiaryError::InvalidRemark(err)
    }
}

impl From<SelfCheckError> for WasmBeneficiaryError {
    fn from(err: SelfCheckError) -> Self {
        WasmBeneficiaryError::SelfCheck(err)
    }
}

impl From<AssociationError> for WasmBeneficiaryError {
    fn from(err: AssociationError) -> Self {
        match err {
            AssociationError::InvalidEvmAddress(e) => WasmBeneficiaryError::InvalidEvmAddress(e),
            other => WasmBeneficiaryError::StringError(other.to_string()),
        }
    }
}

impl From<WalletError> for WasmBeneficiaryError {
    fn from(err: WalletError) -> Self {
        WasmBeneficiaryError::Wallet(err)
    }
}

impl From<TransactionError> for WasmBeneficiaryError {
    fn from(err: TransactionError) -> Self {
        WasmBeneficiaryError::Transaction(err)
    }
}

impl From<parity_scale_codec::Error> for WasmBeneficiaryError {
    fn from(err: parity_scale_codec::Error) -> Self {
        WasmBeneficiaryError::InvalidInput(format!("SCALE decode error: {}", err))
    }
}

// REQUIRED: Converts to JS Error with stack trace
impl From<WasmBeneficiaryError> for JsValue {
    fn from(err: WasmBeneficiaryError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}
