//! Rust to JavaScript value conversion
//!
//! Status updates and balances are handed to JS callbacks as plain objects.
//! Balances become BigInt so 18-decimal amounts survive the crossing.

use crate::tx_status::{InclusionReceipt, TransactionStatus, TxStatusKind};
use crate::types::AccountBalance;
use crate::wallet::WalletAccount;
use wasm_bindgen::prelude::*;

/// Error type for JS conversion failures
#[derive(Debug, Clone)]
pub struct JsConversionError(String);

impl JsConversionError {
    pub fn new(msg: &str) -> Self {
        JsConversionError(msg.to_string())
    }
}

impl std::fmt::Display for JsConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<JsConversionError> for JsValue {
    fn from(err: JsConversionError) -> Self {
        js_sys::Error::new(&err.0).into()
    }
}

/// Trait for converting Rust types to JavaScript values
pub trait TryIntoJsValue {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError>;
}

impl TryIntoJsValue for String {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        Ok(JsValue::from_str(self))
    }
}

impl TryIntoJsValue for &str {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        Ok(JsValue::from_str(self))
    }
}

impl TryIntoJsValue for bool {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        Ok(JsValue::from_bool(*self))
    }
}

impl TryIntoJsValue for u16 {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        Ok(JsValue::from_f64(*self as f64))
    }
}

impl TryIntoJsValue for u128 {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        // BigInt::from only covers 64 bits; go through the decimal string
        let s = self.to_string();
        js_sys::BigInt::new(&JsValue::from_str(&s))
            .map(|b| b.into())
            .map_err(|_| JsConversionError::new("Failed to create BigInt"))
    }
}

impl<T: TryIntoJsValue> TryIntoJsValue for Option<T> {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        match self {
            Some(v) => v.try_to_js_value(),
            None => Ok(JsValue::undefined()),
        }
    }
}

impl<T: TryIntoJsValue> TryIntoJsValue for Vec<T> {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        let arr = js_sys::Array::new();
        for item in self {
            arr.push(&item.try_to_js_value()?);
        }
        Ok(arr.into())
    }
}

impl TryIntoJsValue for TxStatusKind {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        let s = match self {
            TxStatusKind::Preparing => "preparing",
            TxStatusKind::Signing => "signing",
            TxStatusKind::Submitting => "submitting",
            TxStatusKind::Pending => "pending",
            TxStatusKind::Success => "success",
            TxStatusKind::Error => "error",
        };
        Ok(JsValue::from_str(s))
    }
}

impl TryIntoJsValue for TransactionStatus {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        crate::js_obj!(
            "status" => self.status,
            "message" => self.message.clone(),
            "hash" => self.hash.clone(),
            "blockHash" => self.block_hash.clone(),
            "error" => self.error.clone(),
        )
    }
}

impl TryIntoJsValue for InclusionReceipt {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        crate::js_obj!(
            "hash" => self.hash.clone(),
            "blockHash" => self.block_hash.clone(),
        )
    }
}

impl TryIntoJsValue for AccountBalance {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        crate::js_obj!(
            "free" => self.free,
            "reserved" => self.reserved,
            "total" => self.total,
        )
    }
}

impl TryIntoJsValue for WalletAccount {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        crate::js_obj!(
            "address" => self.address.clone(),
            "name" => self.name.clone(),
            "source" => self.source.clone(),
        )
    }
}

/// Macro for building JavaScript objects
#[macro_export]
macro_rules! js_obj {
    ( $( $key:expr => $value:expr ),* $(,)? ) => {{
        use $crate::wasm::try_into_js_value::{TryIntoJsValue, JsConversionError};
        let obj = js_sys::Object::new();
        $(
            js_sys::Reflect::set(
                &obj,
                &wasm_bindgen::JsValue::from_str($key),
                &TryIntoJsValue::try_to_js_value(&$value)?
            ).map_err(|_| JsConversionError::new(&format!("Failed to set property: {}", $key)))?;
        )*
        Ok::<wasm_bindgen::JsValue, JsConversionError>(obj.into())
    }};
}

// WASM tests - only run in wasm32 target
#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_status_object() {
        let status = TransactionStatus::submitting("0xabc");
        let value = status.try_to_js_value().unwrap();
        let kind = js_sys::Reflect::get(&value, &"status".into()).unwrap();
        assert_eq!(kind.as_string().as_deref(), Some("submitting"));
        let hash = js_sys::Reflect::get(&value, &"hash".into()).unwrap();
        assert_eq!(hash.as_string().as_deref(), Some("0xabc"));
        let block = js_sys::Reflect::get(&value, &"blockHash".into()).unwrap();
        assert!(block.is_undefined());
    }

    #[wasm_bindgen_test]
    fn test_balance_is_bigint() {
        let balance = AccountBalance::new(u128::MAX, 0);
        let value = balance.try_to_js_value().unwrap();
        let free = js_sys::Reflect::get(&value, &"free".into()).unwrap();
        assert!(free.is_bigint());
    }
}
