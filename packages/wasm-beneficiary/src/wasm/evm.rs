//! WASM bindings for EVM address validation
//!
//! EvmNamespace provides static methods for the beneficiary address input

use crate::evm::{
    evm_addresses_equal, is_valid_evm_address_checksum, is_valid_evm_address_format,
    to_checksum_address, validate_evm_address,
};
use crate::wasm::to_js_value;
use crate::WasmBeneficiaryError;
use wasm_bindgen::prelude::*;

/// Namespace for EVM address operations
#[wasm_bindgen]
pub struct EvmNamespace;

#[wasm_bindgen]
impl EvmNamespace {
    /// Validate user input
    ///
    /// # Returns
    /// `{ isValid, hasValidFormat, hasValidChecksum, normalizedAddress, error }`
    #[wasm_bindgen(js_name = validateEvmAddress)]
    pub fn validate_evm_address_wasm(input: &str) -> Result<JsValue, JsValue> {
        to_js_value(&validate_evm_address(input))
    }

    #[wasm_bindgen(js_name = isValidFormat)]
    pub fn is_valid_format(address: &str) -> bool {
        is_valid_evm_address_format(address)
    }

    /// True for all-lowercase and all-uppercase bodies as well
    #[wasm_bindgen(js_name = isValidChecksum)]
    pub fn is_valid_checksum(address: &str) -> bool {
        is_valid_evm_address_checksum(address)
    }

    /// EIP-55 form of a well-formed address
    #[wasm_bindgen(js_name = toChecksumAddress)]
    pub fn to_checksum_address_wasm(address: &str) -> Result<String, JsValue> {
        to_checksum_address(address)
            .map_err(WasmBeneficiaryError::from)
            .map_err(JsValue::from)
    }

    /// Case-insensitive comparison of two well-formed addresses
    #[wasm_bindgen(js_name = addressesEqual)]
    pub fn addresses_equal(a: &str, b: &str) -> bool {
        evm_addresses_equal(a, b)
    }
}
