//! WASM bindings for SS58 addresses

use crate::config::DEFAULT_SS58_PREFIX;
use crate::ss58::{decode_ss58, encode_ss58, reencode_ss58, validate_ss58_address};
use crate::types::shorten_address;
use crate::wasm::try_into_js_value::TryIntoJsValue;
use wasm_bindgen::prelude::*;

/// Namespace for SS58 address operations
#[wasm_bindgen]
pub struct AddressNamespace;

#[wasm_bindgen]
impl AddressNamespace {
    /// Encode a 32-byte public key (defaults to prefix 42)
    #[wasm_bindgen(js_name = encodeSs58)]
    pub fn encode_ss58_wasm(public_key: &[u8], prefix: Option<u16>) -> Result<String, JsValue> {
        Ok(encode_ss58(
            public_key,
            prefix.unwrap_or(DEFAULT_SS58_PREFIX),
        )?)
    }

    /// Decode to `{ publicKey: Uint8Array, prefix: number }`
    #[wasm_bindgen(js_name = decodeSs58)]
    pub fn decode_ss58_wasm(address: &str) -> Result<JsValue, JsValue> {
        let (public_key, prefix) = decode_ss58(address)?;
        let obj = js_sys::Object::new();
        js_sys::Reflect::set(
            &obj,
            &"publicKey".into(),
            &js_sys::Uint8Array::from(&public_key[..]).into(),
        )?;
        js_sys::Reflect::set(&obj, &"prefix".into(), &prefix.try_to_js_value()?)?;
        Ok(obj.into())
    }

    #[wasm_bindgen(js_name = validateAddress)]
    pub fn validate_address(address: &str, prefix: Option<u16>) -> bool {
        validate_ss58_address(address, prefix)
    }

    /// Re-encode an address of any network format
    #[wasm_bindgen(js_name = reencodeAddress)]
    pub fn reencode_address(address: &str, prefix: Option<u16>) -> Result<String, JsValue> {
        reencode_ss58(address, prefix.unwrap_or(DEFAULT_SS58_PREFIX)).map_err(JsValue::from)
    }

    /// `5EGoFA…VJkr` style abbreviation (defaults to 4 trailing characters)
    #[wasm_bindgen(js_name = shortenAddress)]
    pub fn shorten_address_wasm(address: &str, length: Option<usize>) -> String {
        shorten_address(address, length.unwrap_or(4))
    }
}

