//! Chain access through a JS adapter
//!
//! The adapter wraps the RPC library and exposes `connect(endpoint)`,
//! `disconnect()`, `isConnected()`, `networkInfo()`, `accountBalance(address)`
//! and `signAndSend(sender, remark, signer, onUpdate)`. `signAndSend` resolves
//! to an unsubscribe function; `onUpdate` receives `ExtrinsicUpdate` objects.
//! Balances should be passed as decimal strings.

use crate::association::{AssociationError, AssociationRequest};
use crate::chain::{AssociationService, ChainClient};
use crate::self_check::SelfCheckSummary;
use crate::tx_status::{ExtrinsicUpdate, TransactionError, TransactionStatus};
use crate::types::{AccountBalance, NetworkInfo, RawBalance};
use crate::wasm::timer::GlooTimer;
use crate::wasm::try_into_js_value::TryIntoJsValue;
use crate::wasm::wallet::WasmWalletStore;
use crate::wasm::{
    call_method, call_method_sync, config_from_js, is_user_rejection, js_error_message,
    to_js_value,
};
use crate::WasmBeneficiaryError;
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{LocalBoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;

fn network_error(err: &JsValue) -> TransactionError {
    TransactionError::Network(js_error_message(err))
}

/// Update stream of one `signAndSend`; dropping it unsubscribes
struct Subscription {
    updates: mpsc::UnboundedReceiver<ExtrinsicUpdate>,
    unsubscribe: Option<js_sys::Function>,
    _on_update: Closure<dyn FnMut(JsValue)>,
}

impl Stream for Subscription {
    type Item = ExtrinsicUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ExtrinsicUpdate>> {
        self.updates.poll_next_unpin(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            if let Err(e) = unsubscribe.call0(&JsValue::NULL) {
                log::warn!("Failed to unsubscribe: {}", js_error_message(&e));
            }
        }
    }
}

/// [`ChainClient`] over the JS chain adapter
#[derive(Debug, Clone)]
pub struct JsChainClient {
    adapter: JsValue,
}

impl JsChainClient {
    pub fn new(adapter: JsValue) -> Self {
        Self { adapter }
    }
}

#[async_trait(?Send)]
impl ChainClient for JsChainClient {
    type Signer = JsValue;

    async fn connect(&self, endpoint: &str) -> Result<(), TransactionError> {
        call_method(&self.adapter, "connect", &[JsValue::from_str(endpoint)])
            .await
            .map(|_| ())
            .map_err(|e| network_error(&e))
    }

    async fn disconnect(&self) -> Result<(), TransactionError> {
        call_method(&self.adapter, "disconnect", &[])
            .await
            .map(|_| ())
            .map_err(|e| network_error(&e))
    }

    fn is_connected(&self) -> bool {
        call_method_sync(&self.adapter, "isConnected", &[])
            .map(|v| v.is_truthy())
            .unwrap_or(false)
    }

    async fn network_info(&self) -> Result<NetworkInfo, TransactionError> {
        let info = call_method(&self.adapter, "networkInfo", &[])
            .await
            .map_err(|e| network_error(&e))?;
        serde_wasm_bindgen::from_value(info)
            .map_err(|e| TransactionError::Network(format!("Invalid network info: {}", e)))
    }

    async fn account_balance(&self, address: &str) -> Result<AccountBalance, TransactionError> {
        let raw = call_method(&self.adapter, "accountBalance", &[JsValue::from_str(address)])
            .await
            .map_err(|e| network_error(&e))?;
        serde_wasm_bindgen::from_value::<RawBalance>(raw)
            .map(AccountBalance::from)
            .map_err(|e| TransactionError::Network(format!("Invalid balance: {}", e)))
    }

    async fn sign_and_watch(
        &self,
        sender: &str,
        remark: &str,
        signer: &JsValue,
    ) -> Result<LocalBoxStream<'static, ExtrinsicUpdate>, TransactionError> {
        let (tx, updates) = mpsc::unbounded();
        let on_update = Closure::wrap(Box::new(move |value: JsValue| {
            match serde_wasm_bindgen::from_value::<ExtrinsicUpdate>(value) {
                Ok(update) => {
                    if tx.unbounded_send(update).is_err() {
                        log::debug!("update after subscription closed");
                    }
                }
                Err(e) => log::warn!("Ignoring malformed extrinsic update: {}", e),
            }
        }) as Box<dyn FnMut(JsValue)>);

        let result = call_method(
            &self.adapter,
            "signAndSend",
            &[
                JsValue::from_str(sender),
                JsValue::from_str(remark),
                signer.clone(),
                on_update.as_ref().clone(),
            ],
        )
        .await;

        let unsubscribe = match result {
            Ok(value) => value.dyn_into::<js_sys::Function>().ok(),
            Err(e) if is_user_rejection(&e) => return Err(TransactionError::UserRejected),
            Err(e) => return Err(TransactionError::Signing(js_error_message(&e))),
        };

        Ok(Subscription {
            updates,
            unsubscribe,
            _on_update: on_update,
        }
        .boxed_local())
    }
}

type JsAssociationService = AssociationService<JsChainClient, GlooTimer>;

/// WASM-exposed association submission service
#[wasm_bindgen]
pub struct WasmAssociationService {
    inner: Rc<JsAssociationService>,
}

#[wasm_bindgen]
impl WasmAssociationService {
    /// # Arguments
    /// * `adapter` - Chain adapter object
    /// * `config` - Optional partial `BeneficiaryConfig`
    #[wasm_bindgen(constructor)]
    pub fn new(adapter: JsValue, config: Option<JsValue>) -> Result<WasmAssociationService, JsValue> {
        let config = config_from_js(config)?;
        let inner = AssociationService::new(JsChainClient::new(adapter), GlooTimer, config);
        Ok(WasmAssociationService {
            inner: Rc::new(inner),
        })
    }

    /// Submit the association for the store's selected account
    ///
    /// # Arguments
    /// * `wallet` - Connected wallet store (sender and signer)
    /// * `evm_address` - Beneficiary address as typed
    /// * `attested` - User confirmed the address is correct
    /// * `self_check` - Optional `SelfCheckSummary`
    /// * `on_status` - Called with every `TransactionStatus`
    ///
    /// # Returns
    /// Promise of `{ hash, blockHash }`. Form errors reject before anything is signed.
    #[wasm_bindgen(js_name = submitAssociation)]
    pub fn submit_association(
        &self,
        wallet: &WasmWalletStore,
        evm_address: &str,
        attested: bool,
        self_check: JsValue,
        on_status: js_sys::Function,
    ) -> Result<js_sys::Promise, JsValue> {
        let self_check: Option<SelfCheckSummary> = if self_check.is_undefined()
            || self_check.is_null()
        {
            None
        } else {
            Some(
                serde_wasm_bindgen::from_value(self_check)
                    .map_err(|e| JsValue::from_str(&format!("Invalid self-check: {}", e)))?,
            )
        };

        let (sender, signer) = wallet.selected_address_and_signer();
        let request =
            AssociationRequest::prepare(sender.as_deref(), evm_address, attested, self_check)
                .map_err(WasmBeneficiaryError::from)?;
        let signer = signer
            .ok_or(AssociationError::WalletNotConnected)
            .map_err(WasmBeneficiaryError::from)?;

        let inner = Rc::clone(&self.inner);
        Ok(future_to_promise(async move {
            let observer = |status: TransactionStatus| deliver(&on_status, &status);
            let receipt = inner
                .submit_association(&request, &signer, observer)
                .await
                .map_err(WasmBeneficiaryError::from)?;
            Ok(receipt.try_to_js_value()?)
        }))
    }

    /// `{ free, reserved, total }` as BigInt
    #[wasm_bindgen(js_name = accountBalance)]
    pub fn account_balance(&self, address: String) -> js_sys::Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let balance = inner
                .account_balance(&address)
                .await
                .map_err(WasmBeneficiaryError::from)?;
            Ok(balance.try_to_js_value()?)
        })
    }

    #[wasm_bindgen(js_name = networkInfo)]
    pub fn network_info(&self) -> js_sys::Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let info = inner
                .network_info()
                .await
                .map_err(WasmBeneficiaryError::from)?;
            to_js_value(&info)
        })
    }

    #[wasm_bindgen(getter, js_name = isConnected)]
    pub fn is_connected(&self) -> bool {
        self.inner.connection().is_connected()
    }

    pub fn disconnect(&self) -> js_sys::Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            inner.disconnect().await;
            Ok(JsValue::UNDEFINED)
        })
    }
}

fn deliver(on_status: &js_sys::Function, status: &TransactionStatus) {
    let value = match status.try_to_js_value() {
        Ok(value) => value,
        Err(e) => {
            log::error!("Failed to convert status: {}", e);
            return;
        }
    };
    if let Err(e) = on_status.call1(&JsValue::NULL, &value) {
        log::warn!("Status callback threw: {}", js_error_message(&e));
    }
}
