//! WASM bindings for the EVM wallet self-check
//!
//! The injected EIP-1193 provider is only asked for accounts and a
//! `personal_sign` signature. Recovery and comparison happen in Rust.

use crate::evm::to_checksum_address;
use crate::remark::now_iso;
use crate::self_check::{
    build_self_check_message, classify_provider_error, evaluate_signature,
    format_result_for_clipboard, recover_personal_signer_hex, SelfCheckError, SelfCheckSummary,
    SigningResult, WalletType,
};
use crate::wasm::{js_error_code, to_js_value};
use crate::WasmBeneficiaryError;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

/// Namespace for self-check operations
#[wasm_bindgen]
pub struct SelfCheckNamespace;

#[wasm_bindgen]
impl SelfCheckNamespace {
    /// `window.ethereum` is present
    #[wasm_bindgen(js_name = isEvmWalletAvailable)]
    pub fn is_evm_wallet_available(provider: Option<JsValue>) -> bool {
        resolve_provider(provider).is_some()
    }

    /// `Rabby`, `MetaMask`, `EVM Wallet`, or undefined without a provider
    #[wasm_bindgen(js_name = detectedWalletName)]
    pub fn detected_wallet_name(provider: Option<JsValue>) -> Option<String> {
        let provider = resolve_provider(provider)?;
        let flag = |name: &str| {
            js_sys::Reflect::get(&provider, &JsValue::from_str(name))
                .map(|v| v.is_truthy())
                .unwrap_or(false)
        };
        let name = if flag("isRabby") {
            "Rabby"
        } else if flag("isMetaMask") {
            "MetaMask"
        } else {
            "EVM Wallet"
        };
        Some(name.to_string())
    }

    /// Message to sign; `timestamp` defaults to now
    #[wasm_bindgen(js_name = buildMessage)]
    pub fn build_message(
        beneficiary_address: &str,
        wallet_type: &str,
        timestamp: Option<String>,
    ) -> Result<String, JsValue> {
        let wallet_type = parse_wallet_type(wallet_type)?;
        let timestamp = timestamp.unwrap_or_else(now_iso);
        Ok(build_self_check_message(
            beneficiary_address,
            wallet_type,
            &timestamp,
        ))
    }

    /// Checksummed address that signed `message`
    #[wasm_bindgen(js_name = recoverSigner)]
    pub fn recover_signer(message: &str, signature: &str) -> Result<String, JsValue> {
        recover_personal_signer_hex(message, signature)
            .map_err(WasmBeneficiaryError::from)
            .map_err(JsValue::from)
    }

    /// Recover the signer of an existing signature and compare with the beneficiary
    #[wasm_bindgen(js_name = evaluateSignature)]
    pub fn evaluate_signature_wasm(
        message: &str,
        signature: &str,
        beneficiary_address: &str,
        signer_address: &str,
        wallet_type: &str,
    ) -> Result<JsValue, JsValue> {
        let wallet_type = parse_wallet_type(wallet_type)?;
        let result = evaluate_signature(
            message,
            signature,
            beneficiary_address,
            signer_address,
            wallet_type,
        )
        .map_err(WasmBeneficiaryError::from)?;
        to_js_value(&result)
    }

    /// Ask the EVM wallet to sign the self-check message
    ///
    /// Always resolves to a `SigningResult`; failures carry `success: false`
    /// and a user-facing `error`.
    #[wasm_bindgen(js_name = signAndRecover)]
    pub fn sign_and_recover(
        message: String,
        beneficiary_address: String,
        wallet_type: &str,
        provider: Option<JsValue>,
    ) -> Result<js_sys::Promise, JsValue> {
        let wallet_type = parse_wallet_type(wallet_type)?;
        let provider = resolve_provider(provider);
        Ok(future_to_promise(async move {
            let result = match provider {
                Some(provider) => {
                    sign_with_provider(&provider, &message, &beneficiary_address, wallet_type)
                        .await
                        .unwrap_or_else(|e| {
                            log::warn!("self-check signing failed: {}", e);
                            SigningResult::failed(&e)
                        })
                }
                None => SigningResult::failed(&SelfCheckError::NoProvider),
            };
            to_js_value(&result)
        }))
    }

    /// Summary for the association remark; failed results count as not performed
    #[wasm_bindgen(js_name = summarize)]
    pub fn summarize(
        result: JsValue,
        wallet_type: &str,
        timestamp: Option<String>,
    ) -> Result<JsValue, JsValue> {
        let wallet_type = parse_wallet_type(wallet_type)?;
        let result = signing_result_from_js(result)?;
        let summary =
            SelfCheckSummary::from_result(&result, wallet_type, timestamp.unwrap_or_else(now_iso));
        to_js_value(&summary)
    }

    #[wasm_bindgen(js_name = formatResultForClipboard)]
    pub fn format_result_for_clipboard_wasm(
        result: JsValue,
        wallet_type: &str,
        beneficiary_address: &str,
    ) -> Result<String, JsValue> {
        let wallet_type = parse_wallet_type(wallet_type)?;
        let result = signing_result_from_js(result)?;
        Ok(format_result_for_clipboard(
            &result,
            wallet_type,
            beneficiary_address,
        ))
    }
}

fn parse_wallet_type(s: &str) -> Result<WalletType, JsValue> {
    s.parse::<WalletType>()
        .map_err(WasmBeneficiaryError::from)
        .map_err(JsValue::from)
}

fn signing_result_from_js(value: JsValue) -> Result<SigningResult, JsValue> {
    serde_wasm_bindgen::from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Invalid signing result: {}", e)))
}

/// Explicit provider, else `globalThis.ethereum`
fn resolve_provider(provider: Option<JsValue>) -> Option<JsValue> {
    let provider = match provider {
        Some(p) if !p.is_undefined() && !p.is_null() => p,
        _ => js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("ethereum")).ok()?,
    };
    if provider.is_undefined() || provider.is_null() {
        None
    } else {
        Some(provider)
    }
}

/// EIP-1193 `provider.request({ method, params })`
async fn request(
    provider: &JsValue,
    method: &str,
    params: &[JsValue],
) -> Result<JsValue, SelfCheckError> {
    let args = js_sys::Object::new();
    let params: js_sys::Array = params.iter().collect();
    let build = js_sys::Reflect::set(&args, &"method".into(), &method.into())
        .and_then(|_| js_sys::Reflect::set(&args, &"params".into(), &params));
    if build.is_err() {
        return Err(SelfCheckError::Provider(format!(
            "Failed to build {} request",
            method
        )));
    }

    let pending = crate::wasm::call_method_sync(provider, "request", &[args.into()])
        .map_err(|e| provider_error(&e))?;
    JsFuture::from(js_sys::Promise::resolve(&pending))
        .await
        .map_err(|e| provider_error(&e))
}

fn provider_error(err: &JsValue) -> SelfCheckError {
    let message = err.as_string().or_else(|| {
        js_sys::Reflect::get(err, &JsValue::from_str("message"))
            .ok()
            .and_then(|m| m.as_string())
    });
    classify_provider_error(js_error_code(err), message)
}

async fn sign_with_provider(
    provider: &JsValue,
    message: &str,
    beneficiary_address: &str,
    wallet_type: WalletType,
) -> Result<SigningResult, SelfCheckError> {
    let accounts = request(provider, "eth_requestAccounts", &[]).await?;
    let first = js_sys::Array::from(&accounts)
        .get(0)
        .as_string()
        .ok_or(SelfCheckError::NoAccounts)?;
    let signer = to_checksum_address(&first)
        .map_err(|_| SelfCheckError::Provider(format!("Invalid account returned: {}", first)))?;

    let message_hex = format!("0x{}", hex::encode(message.as_bytes()));
    let signature = request(
        provider,
        "personal_sign",
        &[JsValue::from_str(&message_hex), JsValue::from_str(&signer)],
    )
    .await?
    .as_string()
    .ok_or_else(|| SelfCheckError::InvalidSignature("signature is not a string".to_string()))?;

    evaluate_signature(message, &signature, beneficiary_address, &signer, wallet_type)
}
