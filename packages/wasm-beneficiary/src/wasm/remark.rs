//! WASM bindings for the association remark
//!
//! RemarkNamespace builds, parses and encodes association remarks

use crate::remark::{encode_remark_call, encode_remark_call_at, AssociationRemark};
use crate::self_check::SelfCheckStatus;
use crate::wasm::to_js_value;
use crate::WasmBeneficiaryError;
use wasm_bindgen::prelude::*;

/// Namespace for remark operations
#[wasm_bindgen]
pub struct RemarkNamespace;

#[wasm_bindgen]
impl RemarkNamespace {
    /// Build a fresh remark payload
    ///
    /// # Arguments
    /// * `ss58` - Sender account
    /// * `evm` - Checksummed beneficiary address
    /// * `self_check` - `matched`, `not_matched` or `not_performed` (default)
    #[wasm_bindgen(js_name = buildRemark)]
    pub fn build_remark(ss58: &str, evm: &str, self_check: Option<String>) -> Result<String, JsValue> {
        let status = match self_check {
            Some(s) => s
                .parse::<SelfCheckStatus>()
                .map_err(WasmBeneficiaryError::InvalidInput)?,
            None => SelfCheckStatus::NotPerformed,
        };
        Ok(AssociationRemark::new(ss58, evm, status).to_payload())
    }

    /// Parse a remark into `{ ss58, evm, evmSelfCheck, nonce, timestamp }`
    #[wasm_bindgen(js_name = parseRemark)]
    pub fn parse_remark(payload: &str) -> Result<JsValue, JsValue> {
        let remark = AssociationRemark::parse(payload).map_err(WasmBeneficiaryError::from)?;
        to_js_value(&remark)
    }

    /// `System.remark` call data resolved through runtime metadata
    ///
    /// # Arguments
    /// * `payload` - Remark text
    /// * `metadata_hex` - SCALE-encoded runtime metadata (hex, with or without 0x)
    #[wasm_bindgen(js_name = encodeRemarkCall)]
    pub fn encode_remark_call_wasm(payload: &str, metadata_hex: &str) -> Result<Vec<u8>, JsValue> {
        let hex = metadata_hex.strip_prefix("0x").unwrap_or(metadata_hex);
        let bytes = hex::decode(hex)
            .map_err(|e| WasmBeneficiaryError::InvalidInput(format!("Invalid hex: {}", e)))?;
        let metadata =
            subxt_core::metadata::decode_from(&bytes).map_err(WasmBeneficiaryError::from)?;
        Ok(encode_remark_call(payload, &metadata).map_err(WasmBeneficiaryError::from)?)
    }

    /// `System.remark` call data for known pallet and call indices
    #[wasm_bindgen(js_name = encodeRemarkCallAt)]
    pub fn encode_remark_call_at_wasm(pallet_index: u8, call_index: u8, payload: &str) -> Vec<u8> {
        encode_remark_call_at(pallet_index, call_index, payload)
    }
}
