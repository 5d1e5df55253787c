//! Chain connection and association submission
//!
//! The RPC library lives on the JS side; [`ChainClient`] is the seam. A single
//! [`SharedConnection`] is created lazily and reused, and concurrent callers
//! wait on an async mutex instead of polling.

use crate::association::AssociationRequest;
use crate::config::{BeneficiaryConfig, Network};
use crate::time::Timer;
use crate::tx_status::{
    watch_extrinsic, ExtrinsicUpdate, InclusionReceipt, TransactionError, TransactionStatus,
};
use crate::types::{AccountBalance, NetworkInfo};
use async_trait::async_trait;
use futures::future::{self, Either};
use futures::lock::Mutex;
use futures::stream::LocalBoxStream;

/// Node RPC operations the dApp needs
#[async_trait(?Send)]
pub trait ChainClient {
    /// Extension signer, opaque to this crate
    type Signer;

    async fn connect(&self, endpoint: &str) -> Result<(), TransactionError>;

    async fn disconnect(&self) -> Result<(), TransactionError>;

    fn is_connected(&self) -> bool;

    async fn network_info(&self) -> Result<NetworkInfo, TransactionError>;

    async fn account_balance(&self, address: &str) -> Result<AccountBalance, TransactionError>;

    /// Sign `System.remark(remark)` as `sender` and submit it. The stream
    /// yields lifecycle updates; dropping it unsubscribes.
    ///
    /// A refusal in the wallet must be reported as
    /// [`TransactionError::UserRejected`].
    async fn sign_and_watch(
        &self,
        sender: &str,
        remark: &str,
        signer: &Self::Signer,
    ) -> Result<LocalBoxStream<'static, ExtrinsicUpdate>, TransactionError>;
}

/// Lazily established, reused chain connection
pub struct SharedConnection<C> {
    client: C,
    network: Network,
    endpoint: String,
    gate: Mutex<()>,
}

impl<C: ChainClient> SharedConnection<C> {
    pub fn new(client: C, config: &BeneficiaryConfig) -> Self {
        Self {
            client,
            network: config.network,
            endpoint: config.endpoint().to_string(),
            gate: Mutex::new(()),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Connected client, connecting first if needed
    pub async fn ensure(&self) -> Result<&C, TransactionError> {
        if self.client.is_connected() {
            return Ok(&self.client);
        }

        let _guard = self.gate.lock().await;
        // another caller may have connected while we waited
        if self.client.is_connected() {
            return Ok(&self.client);
        }

        log::debug!("connecting to {}", self.endpoint);
        match self.client.connect(&self.endpoint).await {
            Ok(()) => {
                log::info!("Connected to Autonomys {} network", self.network);
                Ok(&self.client)
            }
            Err(e) => {
                log::error!("Failed to connect to Autonomys network: {}", e);
                Err(TransactionError::Network(format!(
                    "Failed to connect to Autonomys {}: {}",
                    self.network, e
                )))
            }
        }
    }

    pub async fn disconnect(&self) {
        let _guard = self.gate.lock().await;
        match self.client.disconnect().await {
            Ok(()) => log::info!("Disconnected from Autonomys network"),
            Err(e) => log::error!("Error disconnecting from Autonomys network: {}", e),
        }
    }
}

/// Submits association remarks and answers account queries
pub struct AssociationService<C, T> {
    connection: SharedConnection<C>,
    timer: T,
    config: BeneficiaryConfig,
}

impl<C: ChainClient, T: Timer> AssociationService<C, T> {
    pub fn new(client: C, timer: T, config: BeneficiaryConfig) -> Self {
        Self {
            connection: SharedConnection::new(client, &config),
            timer,
            config,
        }
    }

    pub fn connection(&self) -> &SharedConnection<C> {
        &self.connection
    }

    /// Submit the association remark and follow it to block inclusion
    ///
    /// Statuses reach `observer` in order: `preparing`, `signing`, then
    /// whatever the node reports. Connection failures return before any
    /// status is emitted.
    pub async fn submit_association<O>(
        &self,
        request: &AssociationRequest,
        signer: &C::Signer,
        mut observer: O,
    ) -> Result<InclusionReceipt, TransactionError>
    where
        O: FnMut(TransactionStatus),
    {
        let client = self.connection.ensure().await?;

        observer(TransactionStatus::preparing());
        let payload = request.remark().to_payload();
        log::info!(
            "submitting association {} -> {}",
            request.sender,
            request.evm_address
        );

        // one deadline covers the wallet prompt and inclusion
        let timeout_after = self.config.transaction_timeout();
        let mut deadline = self.timer.sleep(timeout_after);

        observer(TransactionStatus::signing());
        let signed = client.sign_and_watch(&request.sender, &payload, signer);
        let signed = match future::select(signed, &mut deadline).await {
            Either::Left((signed, _)) => signed,
            Either::Right(((), _)) => {
                log::warn!("wallet did not sign within {:?}", timeout_after);
                let err = TransactionError::Timeout(timeout_after);
                observer(TransactionStatus::failed(
                    "Transaction failed",
                    &err.to_string(),
                    None,
                ));
                return Err(err);
            }
        };
        let updates = match signed {
            Ok(updates) => updates,
            Err(TransactionError::UserRejected) => {
                let err = TransactionError::UserRejected;
                observer(TransactionStatus::failed(
                    "Transaction cancelled in wallet",
                    &err.to_string(),
                    None,
                ));
                return Err(err);
            }
            Err(e) => {
                let detail = e.to_string();
                log::error!("signing failed: {}", detail);
                observer(TransactionStatus::failed(
                    "Transaction signing failed",
                    &detail,
                    None,
                ));
                return Err(TransactionError::Signing(detail));
            }
        };

        watch_extrinsic(updates, deadline, timeout_after, observer).await
    }

    pub async fn account_balance(&self, address: &str) -> Result<AccountBalance, TransactionError> {
        self.connection.ensure().await?.account_balance(address).await
    }

    pub async fn network_info(&self) -> Result<NetworkInfo, TransactionError> {
        let info = self.connection.ensure().await?.network_info().await?;
        Ok(NetworkInfo {
            network: self.connection.network(),
            ..info
        })
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::testing::{InstantTimer, NeverTimer};
    use crate::tx_status::{ExtrinsicStatus, TxStatusKind};
    use futures::executor::block_on;
    use futures::{join, stream, FutureExt, StreamExt};
    use std::time::Duration;
    use std::cell::{Cell, RefCell};
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    const SENDER: &str = "5EGoFA95omzemRssELLDjVenNZ68aXyUeqtKQScXSEBvVJkr";
    const EVM: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    /// Pending on first poll, ready on the second
    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    enum Submit {
        Updates(Vec<ExtrinsicUpdate>),
        Hang,
        NeverSigned,
        Fail(TransactionError),
    }

    struct FakeClient {
        connected: Cell<bool>,
        connect_attempts: Cell<u32>,
        connect_error: Option<String>,
        submit: Submit,
        submitted: RefCell<Vec<(String, String, String)>>,
    }

    impl FakeClient {
        fn new(submit: Submit) -> Self {
            Self {
                connected: Cell::new(false),
                connect_attempts: Cell::new(0),
                connect_error: None,
                submit,
                submitted: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl ChainClient for FakeClient {
        type Signer = String;

        async fn connect(&self, _endpoint: &str) -> Result<(), TransactionError> {
            self.connect_attempts.set(self.connect_attempts.get() + 1);
            YieldOnce(false).await;
            match &self.connect_error {
                Some(e) => Err(TransactionError::Network(e.clone())),
                None => {
                    self.connected.set(true);
                    Ok(())
                }
            }
        }

        async fn disconnect(&self) -> Result<(), TransactionError> {
            self.connected.set(false);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.get()
        }

        async fn network_info(&self) -> Result<NetworkInfo, TransactionError> {
            Ok(NetworkInfo {
                chain: "Autonomys Mainnet".into(),
                node_name: "node".into(),
                node_version: "0.1.0".into(),
                network: Network::Testnet,
            })
        }

        async fn account_balance(&self, _address: &str) -> Result<AccountBalance, TransactionError> {
            Ok(AccountBalance::new(100, 5))
        }

        async fn sign_and_watch(
            &self,
            sender: &str,
            remark: &str,
            signer: &String,
        ) -> Result<LocalBoxStream<'static, ExtrinsicUpdate>, TransactionError> {
            self.submitted
                .borrow_mut()
                .push((sender.to_string(), remark.to_string(), signer.clone()));
            match &self.submit {
                Submit::Updates(updates) => Ok(stream::iter(updates.clone()).boxed_local()),
                Submit::Hang => Ok(stream::pending().boxed_local()),
                Submit::NeverSigned => future::pending().await,
                Submit::Fail(e) => Err(e.clone()),
            }
        }
    }

    fn request() -> AssociationRequest {
        AssociationRequest::prepare(Some(SENDER), EVM, true, None).unwrap()
    }

    fn included() -> Vec<ExtrinsicUpdate> {
        vec![
            ExtrinsicUpdate::new(Some("0xabc"), ExtrinsicStatus::Ready),
            ExtrinsicUpdate::new(Some("0xabc"), ExtrinsicStatus::Broadcast),
            ExtrinsicUpdate::new(
                Some("0xabc"),
                ExtrinsicStatus::InBlock {
                    block_hash: "0xb10c".into(),
                },
            ),
        ]
    }

    #[test]
    fn test_concurrent_ensure_connects_once() {
        let connection =
            SharedConnection::new(FakeClient::new(Submit::Hang), &BeneficiaryConfig::default());
        let (a, b) = block_on(async { join!(connection.ensure(), connection.ensure()) });
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(connection.client.connect_attempts.get(), 1);

        block_on(connection.disconnect());
        assert!(!connection.is_connected());
        block_on(connection.ensure()).unwrap();
        assert_eq!(connection.client.connect_attempts.get(), 2);
    }

    #[test]
    fn test_connection_failure_emits_nothing() {
        let mut client = FakeClient::new(Submit::Updates(included()));
        client.connect_error = Some("refused".into());
        let service = AssociationService::new(client, NeverTimer, BeneficiaryConfig::default());

        let mut seen = Vec::new();
        let err = block_on(service.submit_association(&request(), &"signer".into(), |s| {
            seen.push(s)
        }))
        .unwrap_err();

        assert_eq!(
            err,
            TransactionError::Network("Failed to connect to Autonomys mainnet: refused".into())
        );
        assert!(seen.is_empty());
    }

    #[test]
    fn test_submit_success() {
        let service = AssociationService::new(
            FakeClient::new(Submit::Updates(included())),
            NeverTimer,
            BeneficiaryConfig::default(),
        );

        let mut seen = Vec::new();
        let receipt = block_on(service.submit_association(&request(), &"signer".into(), |s| {
            seen.push(s.status)
        }))
        .unwrap();

        assert_eq!(receipt.hash, "0xabc");
        assert_eq!(receipt.block_hash, "0xb10c");
        assert_eq!(
            seen,
            vec![
                TxStatusKind::Preparing,
                TxStatusKind::Signing,
                TxStatusKind::Submitting,
                TxStatusKind::Pending,
                TxStatusKind::Success,
            ]
        );

        let submitted = service.connection.client.submitted.borrow();
        let (sender, remark, signer) = &submitted[0];
        assert_eq!(sender, SENDER);
        assert_eq!(signer, "signer");
        assert!(remark.starts_with("SUBSPACE_ASSOC:v1\nss58="));
        assert!(remark.contains("\nevm=0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed\n"));
    }

    #[test]
    fn test_user_rejection() {
        let service = AssociationService::new(
            FakeClient::new(Submit::Fail(TransactionError::UserRejected)),
            NeverTimer,
            BeneficiaryConfig::default(),
        );

        let mut seen = Vec::new();
        let err = block_on(service.submit_association(&request(), &"signer".into(), |s| {
            seen.push(s)
        }))
        .unwrap_err();

        assert_eq!(err, TransactionError::UserRejected);
        let last = seen.last().unwrap();
        assert_eq!(last.status, TxStatusKind::Error);
        assert_eq!(last.message, "Transaction cancelled in wallet");
    }

    #[test]
    fn test_signing_failure() {
        let service = AssociationService::new(
            FakeClient::new(Submit::Fail(TransactionError::Signing("bad nonce".into()))),
            NeverTimer,
            BeneficiaryConfig::default(),
        );

        let mut seen = Vec::new();
        let err = block_on(service.submit_association(&request(), &"signer".into(), |s| {
            seen.push(s)
        }))
        .unwrap_err();

        assert_eq!(err, TransactionError::Signing("bad nonce".into()));
        assert_eq!(seen.last().unwrap().message, "Transaction signing failed");
        assert_eq!(seen.last().unwrap().error.as_deref(), Some("bad nonce"));
    }

    #[test]
    fn test_submit_timeout() {
        let service = AssociationService::new(
            FakeClient::new(Submit::Hang),
            InstantTimer,
            BeneficiaryConfig::default(),
        );

        let err = block_on(service.submit_association(&request(), &"signer".into(), |_| {}))
            .unwrap_err();
        assert_eq!(err.to_string(), "Transaction timeout after 5 minutes");
    }

    #[test]
    fn test_timeout_covers_wallet_prompt() {
        let service = AssociationService::new(
            FakeClient::new(Submit::NeverSigned),
            InstantTimer,
            BeneficiaryConfig::default(),
        );

        let mut seen = Vec::new();
        let outcome = service
            .submit_association(&request(), &"signer".into(), |s| seen.push(s))
            .now_or_never()
            .expect("deadline already passed");

        let err = outcome.unwrap_err();
        assert_eq!(err, TransactionError::Timeout(Duration::from_secs(300)));
        let kinds: Vec<_> = seen.iter().map(|s| s.status).collect();
        assert_eq!(
            kinds,
            vec![
                TxStatusKind::Preparing,
                TxStatusKind::Signing,
                TxStatusKind::Error,
            ]
        );
        assert_eq!(
            seen[2].error.as_deref(),
            Some("Transaction timeout after 5 minutes")
        );
    }

    #[test]
    fn test_queries_connect_lazily() {
        let service = AssociationService::new(
            FakeClient::new(Submit::Hang),
            NeverTimer,
            BeneficiaryConfig::default(),
        );
        assert!(!service.connection().is_connected());

        let balance = block_on(service.account_balance(SENDER)).unwrap();
        assert_eq!(balance.total, 105);
        assert!(service.connection().is_connected());

        let info = block_on(service.network_info()).unwrap();
        assert_eq!(info.network, Network::Mainnet);
        assert_eq!(service.connection.client.connect_attempts.get(), 1);
    }
}
