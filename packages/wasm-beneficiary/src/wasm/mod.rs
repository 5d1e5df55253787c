//! WASM bindings for wasm-beneficiary
//!
//! This module contains thin wrappers with #[wasm_bindgen] that delegate
//! to the core Rust implementations, plus the adapters that back the core
//! traits with browser objects.

pub mod address;
pub mod chain;
pub mod evm;
pub mod logging;
pub mod remark;
pub mod self_check;
pub mod storage;
pub mod timer;
pub mod try_into_js_value;
pub mod wallet;

// Re-export WASM types
pub use address::AddressNamespace;
pub use chain::{JsChainClient, WasmAssociationService};
pub use evm::EvmNamespace;
pub use remark::RemarkNamespace;
pub use self_check::SelfCheckNamespace;
pub use storage::LocalStorageSelectionStore;
pub use timer::GlooTimer;
pub use wallet::{JsInjectedWallet, JsWalletRegistry, WasmWalletStore};

use crate::config::BeneficiaryConfig;
use crate::self_check::ProviderCode;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

/// Serialize with serde_wasm_bindgen, maps (and u128 strings) as plain objects
pub(crate) fn to_js_value<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Config from an optional, possibly partial, JS object
pub(crate) fn config_from_js(config: Option<JsValue>) -> Result<BeneficiaryConfig, JsValue> {
    match config {
        Some(value) if !value.is_undefined() && !value.is_null() => {
            serde_wasm_bindgen::from_value(value)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))
        }
        _ => Ok(BeneficiaryConfig::default()),
    }
}

fn method(target: &JsValue, name: &str) -> Result<js_sys::Function, JsValue> {
    let value = js_sys::Reflect::get(target, &JsValue::from_str(name))?;
    value
        .dyn_into::<js_sys::Function>()
        .map_err(|_| JsValue::from_str(&format!("Method {} is not a function", name)))
}

/// Call `target[name](...args)` without awaiting the result
pub(crate) fn call_method_sync(
    target: &JsValue,
    name: &str,
    args: &[JsValue],
) -> Result<JsValue, JsValue> {
    method(target, name)?.apply(target, &js_sys::Array::from_iter(args.iter()))
}

/// Call `target[name](...args)`, awaiting the result if it is a promise
pub(crate) async fn call_method(
    target: &JsValue,
    name: &str,
    args: &[JsValue],
) -> Result<JsValue, JsValue> {
    let result = call_method_sync(target, name, args)?;
    if result.has_type::<js_sys::Promise>() {
        JsFuture::from(js_sys::Promise::from(result)).await
    } else {
        Ok(result)
    }
}

/// `message` of a thrown JS error, or its string form
pub(crate) fn js_error_message(err: &JsValue) -> String {
    if let Some(s) = err.as_string() {
        return s;
    }
    js_sys::Reflect::get(err, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", err))
}

/// `code` of a thrown JS error, numeric or named
pub(crate) fn js_error_code(err: &JsValue) -> Option<ProviderCode> {
    if !err.is_object() {
        return None;
    }
    let code = js_sys::Reflect::get(err, &JsValue::from_str("code")).ok()?;
    if let Some(n) = code.as_f64() {
        Some(ProviderCode::Numeric(n as i64))
    } else {
        code.as_string().map(ProviderCode::Named)
    }
}

/// Wallet refusals arrive as errors mentioning a cancel/reject, or EIP-1193 code 4001
pub(crate) fn is_user_rejection(err: &JsValue) -> bool {
    if js_error_code(err) == Some(ProviderCode::Numeric(4001)) {
        return true;
    }
    let message = js_error_message(err).to_lowercase();
    message.contains("cancelled") || message.contains("rejected")
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_error_helpers() {
        let err: JsValue = js_sys::Error::new("User Rejected Request").into();
        assert_eq!(js_error_message(&err), "User Rejected Request");
        assert!(is_user_rejection(&err));

        let coded = js_sys::Object::new();
        js_sys::Reflect::set(&coded, &"code".into(), &JsValue::from_f64(4001.0)).unwrap();
        assert_eq!(js_error_code(&coded), Some(ProviderCode::Numeric(4001)));
        assert!(is_user_rejection(&coded));

        assert!(!is_user_rejection(&JsValue::from_str("network down")));
    }

    #[wasm_bindgen_test]
    fn test_config_from_partial_object() {
        let obj = js_sys::Object::new();
        js_sys::Reflect::set(&obj, &"network".into(), &"testnet".into()).unwrap();
        let config = config_from_js(Some(obj.into())).unwrap();
        assert_eq!(config.endpoint(), "wss://rpc.chronos.autonomys.xyz/ws");
        assert_eq!(config.ss58_prefix, 42);

        assert_eq!(config_from_js(None).unwrap(), BeneficiaryConfig::default());
    }
}
