//! Transaction submission status protocol
//!
//! The node reports an extrinsic's lifecycle as a stream of pool statuses.
//! [`StatusTracker`] turns that stream into the user-facing
//! [`TransactionStatus`] sequence and resolves exactly once; the
//! [`watch_extrinsic`] driver races it against a timeout.
//!
//! A transaction resolves successfully at block inclusion. Finalization is
//! reported afterwards as an extra `success` status without changing the
//! outcome.

use core::fmt;
use futures::future::{self, Either};
use futures::{pin_mut, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatusKind {
    Preparing,
    Signing,
    Submitting,
    Pending,
    Success,
    Error,
}

/// Status pushed to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub status: TxStatusKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransactionStatus {
    fn new(status: TxStatusKind, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
            hash: None,
            block_hash: None,
            error: None,
        }
    }

    pub fn preparing() -> Self {
        Self::new(TxStatusKind::Preparing, "Preparing transaction...")
    }

    pub fn signing() -> Self {
        Self::new(
            TxStatusKind::Signing,
            "Please sign the transaction in your wallet...",
        )
    }

    pub fn submitting(hash: &str) -> Self {
        Self {
            hash: Some(hash.to_string()),
            ..Self::new(TxStatusKind::Submitting, "Transaction submitted to network...")
        }
    }

    pub fn pending(hash: Option<&str>) -> Self {
        Self {
            hash: hash.map(str::to_string),
            ..Self::new(TxStatusKind::Pending, "Waiting for block inclusion...")
        }
    }

    pub fn success(message: &str, hash: Option<&str>, block_hash: &str) -> Self {
        Self {
            hash: hash.map(str::to_string),
            block_hash: Some(block_hash.to_string()),
            ..Self::new(TxStatusKind::Success, message)
        }
    }

    pub fn failed(message: &str, error: &str, hash: Option<&str>) -> Self {
        Self {
            hash: hash.map(str::to_string),
            error: Some(error.to_string()),
            ..Self::new(TxStatusKind::Error, message)
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TxStatusKind::Success | TxStatusKind::Error)
    }
}

/// Transaction pool status as reported by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExtrinsicStatus {
    Future,
    Ready,
    Broadcast,
    InBlock {
        #[serde(rename = "blockHash")]
        block_hash: String,
    },
    Retracted,
    FinalityTimeout,
    Finalized {
        #[serde(rename = "blockHash")]
        block_hash: String,
    },
    Usurped,
    Dropped,
    Invalid,
}

impl ExtrinsicStatus {
    fn pool_rejection(&self) -> Option<PoolRejection> {
        match self {
            ExtrinsicStatus::Dropped => Some(PoolRejection::Dropped),
            ExtrinsicStatus::Invalid => Some(PoolRejection::Invalid),
            ExtrinsicStatus::Usurped => Some(PoolRejection::Usurped),
            _ => None,
        }
    }
}

/// Terminal pool outcomes that never reach a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolRejection {
    Dropped,
    Invalid,
    Usurped,
}

impl PoolRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            PoolRejection::Dropped => "dropped",
            PoolRejection::Invalid => "invalid",
            PoolRejection::Usurped => "usurped",
        }
    }
}

/// Runtime dispatch failure of an included extrinsic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DispatchError {
    /// Module error resolved against metadata
    Module {
        section: String,
        name: String,
        #[serde(default)]
        docs: Vec<String>,
    },
    /// Module error the adapter could not look up
    UndecodedModule { index: u8, error: String },
    Other { message: String },
}

impl DispatchError {
    pub fn describe(&self) -> String {
        match self {
            DispatchError::Module {
                section,
                name,
                docs,
            } => format!("{}.{}: {}", section, name, docs.join(" ")),
            DispatchError::UndecodedModule { index, error } => {
                format!("{{\"module\":{{\"index\":{},\"error\":\"{}\"}}}}", index, error)
            }
            DispatchError::Other { message } => message.clone(),
        }
    }
}

/// One lifecycle event from the node subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtrinsicUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub status: ExtrinsicStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_error: Option<DispatchError>,
}

impl ExtrinsicUpdate {
    pub fn new(tx_hash: Option<&str>, status: ExtrinsicStatus) -> Self {
        Self {
            tx_hash: tx_hash.map(str::to_string),
            status,
            dispatch_error: None,
        }
    }

    pub fn with_dispatch_error(mut self, error: DispatchError) -> Self {
        self.dispatch_error = Some(error);
        self
    }
}

/// Proof of block inclusion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionReceipt {
    /// Empty when the node never reported a hash
    pub hash: String,
    pub block_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    Dispatch(String),
    Pool(PoolRejection),
    Timeout(Duration),
    UserRejected,
    Signing(String),
    Network(String),
    SubscriptionClosed,
}

impl std::error::Error for TransactionError {}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::Dispatch(s) => write!(f, "{}", s),
            TransactionError::Pool(kind) => write!(f, "Transaction {}", kind.as_str()),
            TransactionError::Timeout(after) => {
                let secs = after.as_secs();
                if secs >= 60 && secs % 60 == 0 {
                    write!(f, "Transaction timeout after {} minutes", secs / 60)
                } else {
                    write!(f, "Transaction timeout after {} seconds", secs)
                }
            }
            TransactionError::UserRejected => write!(f, "Transaction was cancelled in the wallet"),
            TransactionError::Signing(s) => write!(f, "{}", s),
            TransactionError::Network(s) => write!(f, "{}", s),
            TransactionError::SubscriptionClosed => {
                write!(f, "Transaction subscription closed before inclusion")
            }
        }
    }
}

pub type Resolution = Result<InclusionReceipt, TransactionError>;

/// Output of one tracker step
#[derive(Debug, Default)]
pub struct Advance {
    /// Statuses to deliver, in order
    pub statuses: Vec<TransactionStatus>,
    /// Set on the single step that resolves the transaction
    pub resolution: Option<Resolution>,
}

impl Advance {
    fn resolve(mut self, status: TransactionStatus, resolution: Resolution) -> Self {
        self.statuses.push(status);
        self.resolution = Some(resolution);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Watching,
    Included(InclusionReceipt),
    Failed,
}

/// Pure state machine from node updates to UI statuses
#[derive(Debug, Clone)]
pub struct StatusTracker {
    phase: Phase,
    hash: Option<String>,
    pending_sent: bool,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            phase: Phase::Watching,
            hash: None,
            pending_sent: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.phase != Phase::Watching
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn advance(&mut self, update: &ExtrinsicUpdate) -> Advance {
        match &self.phase {
            Phase::Failed => Advance::default(),
            Phase::Included(receipt) => Self::after_inclusion(receipt, update),
            Phase::Watching => self.watch(update),
        }
    }

    /// Deadline reached; resolves only if still watching
    pub fn timed_out(&mut self, after: Duration) -> Advance {
        self.fail_if_watching(TransactionError::Timeout(after))
    }

    /// Subscription ended; resolves only if still watching
    pub fn closed(&mut self) -> Advance {
        self.fail_if_watching(TransactionError::SubscriptionClosed)
    }

    fn watch(&mut self, update: &ExtrinsicUpdate) -> Advance {
        let mut step = Advance::default();

        let announced = match &update.tx_hash {
            Some(hash) if self.hash.is_none() => {
                self.hash = Some(hash.clone());
                step.statuses.push(TransactionStatus::submitting(hash));
                true
            }
            _ => false,
        };

        match &update.status {
            ExtrinsicStatus::InBlock { block_hash } | ExtrinsicStatus::Finalized { block_hash } => {
                self.include(step, block_hash, update.dispatch_error.as_ref())
            }
            status => match status.pool_rejection() {
                Some(kind) => {
                    self.phase = Phase::Failed;
                    let err = TransactionError::Pool(kind);
                    let message = err.to_string();
                    step.resolve(
                        TransactionStatus::failed(&message, &message, self.hash()),
                        Err(err),
                    )
                }
                None => {
                    if !announced && !self.pending_sent && self.hash.is_some() {
                        self.pending_sent = true;
                        step.statuses.push(TransactionStatus::pending(self.hash()));
                    }
                    step
                }
            },
        }
    }

    fn include(
        &mut self,
        step: Advance,
        block_hash: &str,
        dispatch_error: Option<&DispatchError>,
    ) -> Advance {
        if let Some(dispatch_error) = dispatch_error {
            self.phase = Phase::Failed;
            let message = dispatch_error.describe();
            return step.resolve(
                TransactionStatus::failed("Transaction failed", &message, self.hash()),
                Err(TransactionError::Dispatch(message)),
            );
        }

        let receipt = InclusionReceipt {
            hash: self.hash.clone().unwrap_or_default(),
            block_hash: block_hash.to_string(),
        };
        self.phase = Phase::Included(receipt.clone());
        step.resolve(
            TransactionStatus::success(
                "Transaction confirmed in block!",
                self.hash(),
                block_hash,
            ),
            Ok(receipt),
        )
    }

    fn after_inclusion(receipt: &InclusionReceipt, update: &ExtrinsicUpdate) -> Advance {
        let mut step = Advance::default();
        if let (ExtrinsicStatus::Finalized { block_hash }, None) =
            (&update.status, &update.dispatch_error)
        {
            let hash = Some(receipt.hash.as_str()).filter(|h| !h.is_empty());
            step.statuses.push(TransactionStatus::success(
                "Transaction finalized on blockchain!",
                hash,
                block_hash,
            ));
        }
        step
    }

    fn fail_if_watching(&mut self, err: TransactionError) -> Advance {
        if self.is_resolved() {
            return Advance::default();
        }
        self.phase = Phase::Failed;
        Advance::default().resolve(
            TransactionStatus::failed("Transaction failed", &err.to_string(), self.hash()),
            Err(err),
        )
    }
}

/// Drive a tracker over `updates` until it resolves, the stream ends, or
/// `timeout` fires. Every emitted status reaches `observer` in node order.
///
/// Returning drops `updates`, which unsubscribes from the node.
pub async fn watch_extrinsic<S, F, O>(
    updates: S,
    timeout: F,
    timeout_after: Duration,
    mut observer: O,
) -> Resolution
where
    S: Stream<Item = ExtrinsicUpdate>,
    F: Future<Output = ()>,
    O: FnMut(TransactionStatus),
{
    let mut tracker = StatusTracker::new();
    pin_mut!(updates);
    pin_mut!(timeout);

    loop {
        let step = match future::select(updates.next(), &mut timeout).await {
            Either::Left((Some(update), _)) => {
                log::debug!("extrinsic update: {:?}", update.status);
                tracker.advance(&update)
            }
            Either::Left((None, _)) => tracker.closed(),
            Either::Right(((), _)) => {
                log::warn!("transaction not included after {:?}", timeout_after);
                tracker.timed_out(timeout_after)
            }
        };

        for status in step.statuses {
            observer(status);
        }
        if let Some(resolution) = step.resolution {
            return resolution;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::stream;

    const HASH: &str = "0xabc";
    const BLOCK: &str = "0xb10c";
    const FINAL: &str = "0xf1a1";

    fn update(hash: Option<&str>, status: ExtrinsicStatus) -> ExtrinsicUpdate {
        ExtrinsicUpdate::new(hash, status)
    }

    fn in_block() -> ExtrinsicStatus {
        ExtrinsicStatus::InBlock {
            block_hash: BLOCK.to_string(),
        }
    }

    fn finalized() -> ExtrinsicStatus {
        ExtrinsicStatus::Finalized {
            block_hash: FINAL.to_string(),
        }
    }

    fn kinds(statuses: &[TransactionStatus]) -> Vec<TxStatusKind> {
        statuses.iter().map(|s| s.status).collect()
    }

    fn run(updates: Vec<ExtrinsicUpdate>) -> (Vec<TransactionStatus>, Resolution) {
        let mut seen = Vec::new();
        let resolution = block_on(watch_extrinsic(
            stream::iter(updates),
            future::pending::<()>(),
            Duration::from_secs(300),
            |s| seen.push(s),
        ));
        (seen, resolution)
    }

    #[test]
    fn test_happy_path() {
        let (seen, resolution) = run(vec![
            update(Some(HASH), ExtrinsicStatus::Ready),
            update(Some(HASH), ExtrinsicStatus::Broadcast),
            update(Some(HASH), in_block()),
        ]);

        assert_eq!(
            kinds(&seen),
            vec![
                TxStatusKind::Submitting,
                TxStatusKind::Pending,
                TxStatusKind::Success
            ]
        );
        assert_eq!(seen[0].hash.as_deref(), Some(HASH));
        assert_eq!(seen[2].message, "Transaction confirmed in block!");
        assert_eq!(seen[2].block_hash.as_deref(), Some(BLOCK));
        assert_eq!(
            resolution,
            Ok(InclusionReceipt {
                hash: HASH.to_string(),
                block_hash: BLOCK.to_string()
            })
        );
    }

    #[test]
    fn test_pending_emitted_once() {
        let mut tracker = StatusTracker::new();
        let first = tracker.advance(&update(Some(HASH), ExtrinsicStatus::Future));
        assert_eq!(kinds(&first.statuses), vec![TxStatusKind::Submitting]);

        let second = tracker.advance(&update(Some(HASH), ExtrinsicStatus::Ready));
        assert_eq!(kinds(&second.statuses), vec![TxStatusKind::Pending]);

        let third = tracker.advance(&update(Some(HASH), ExtrinsicStatus::Broadcast));
        assert!(third.statuses.is_empty());
        assert!(third.resolution.is_none());
    }

    #[test]
    fn test_no_pending_before_hash() {
        let mut tracker = StatusTracker::new();
        let step = tracker.advance(&update(None, ExtrinsicStatus::Ready));
        assert!(step.statuses.is_empty());
        assert_eq!(tracker.hash(), None);
    }

    #[test]
    fn test_dispatch_error_in_block() {
        let failing = update(Some(HASH), in_block()).with_dispatch_error(DispatchError::Module {
            section: "system".to_string(),
            name: "CallFiltered".to_string(),
            docs: vec!["The origin filter".to_string(), "prevent the call.".to_string()],
        });
        let (seen, resolution) = run(vec![failing]);

        let message = "system.CallFiltered: The origin filter prevent the call.";
        assert_eq!(kinds(&seen), vec![TxStatusKind::Submitting, TxStatusKind::Error]);
        assert_eq!(seen[1].error.as_deref(), Some(message));
        assert_eq!(seen[1].hash.as_deref(), Some(HASH));
        assert_eq!(
            resolution,
            Err(TransactionError::Dispatch(message.to_string()))
        );
    }

    #[test]
    fn test_undecoded_and_other_dispatch_errors() {
        let undecoded = DispatchError::UndecodedModule {
            index: 4,
            error: "0x02000000".to_string(),
        };
        assert_eq!(
            undecoded.describe(),
            r#"{"module":{"index":4,"error":"0x02000000"}}"#
        );
        let other = DispatchError::Other {
            message: "BadOrigin".to_string(),
        };
        assert_eq!(other.describe(), "BadOrigin");
    }

    #[test]
    fn test_pool_rejections() {
        for (status, kind) in [
            (ExtrinsicStatus::Dropped, PoolRejection::Dropped),
            (ExtrinsicStatus::Invalid, PoolRejection::Invalid),
            (ExtrinsicStatus::Usurped, PoolRejection::Usurped),
        ] {
            let (seen, resolution) = run(vec![update(Some(HASH), status)]);
            let last = seen.last().unwrap();
            assert_eq!(last.status, TxStatusKind::Error);
            assert_eq!(last.message, format!("Transaction {}", kind.as_str()));
            assert_eq!(resolution, Err(TransactionError::Pool(kind)));
        }
    }

    #[test]
    fn test_finalized_after_inclusion_reemits_success() {
        let mut tracker = StatusTracker::new();
        let included = tracker.advance(&update(Some(HASH), in_block()));
        let receipt = included.resolution.unwrap().unwrap();

        let fin = tracker.advance(&update(Some(HASH), finalized()));
        assert!(fin.resolution.is_none());
        assert_eq!(fin.statuses.len(), 1);
        assert_eq!(fin.statuses[0].status, TxStatusKind::Success);
        assert_eq!(fin.statuses[0].message, "Transaction finalized on blockchain!");
        assert_eq!(fin.statuses[0].block_hash.as_deref(), Some(FINAL));
        assert_eq!(receipt.block_hash, BLOCK);
    }

    #[test]
    fn test_events_after_resolution_ignored() {
        let mut tracker = StatusTracker::new();
        tracker.advance(&update(Some(HASH), ExtrinsicStatus::Dropped));
        assert!(tracker.is_resolved());

        for status in [ExtrinsicStatus::Ready, in_block(), finalized(), ExtrinsicStatus::Invalid] {
            let step = tracker.advance(&update(Some(HASH), status));
            assert!(step.statuses.is_empty());
            assert!(step.resolution.is_none());
        }
        assert!(tracker.timed_out(Duration::from_secs(300)).resolution.is_none());

        let mut included = StatusTracker::new();
        included.advance(&update(Some(HASH), in_block()));
        let step = included.advance(&update(Some(HASH), ExtrinsicStatus::Dropped));
        assert!(step.statuses.is_empty());
        assert!(step.resolution.is_none());
    }

    #[test]
    fn test_finalized_before_inclusion_resolves() {
        let (seen, resolution) = run(vec![update(Some(HASH), finalized())]);
        assert_eq!(seen.last().unwrap().message, "Transaction confirmed in block!");
        assert_eq!(resolution.unwrap().block_hash, FINAL);
    }

    #[test]
    fn test_driver_stops_at_inclusion() {
        // the finalized update is never pulled from the stream
        let (seen, resolution) = run(vec![
            update(Some(HASH), in_block()),
            update(Some(HASH), finalized()),
        ]);
        assert!(resolution.is_ok());
        assert_eq!(kinds(&seen), vec![TxStatusKind::Submitting, TxStatusKind::Success]);
    }

    #[test]
    fn test_stream_end_before_inclusion() {
        let (seen, resolution) = run(vec![update(Some(HASH), ExtrinsicStatus::Ready)]);
        assert_eq!(resolution, Err(TransactionError::SubscriptionClosed));
        assert_eq!(seen.last().unwrap().status, TxStatusKind::Error);
    }

    #[test]
    fn test_timeout() {
        let mut seen = Vec::new();
        let resolution = block_on(watch_extrinsic(
            stream::pending::<ExtrinsicUpdate>(),
            future::ready(()),
            Duration::from_millis(300_000),
            |s| seen.push(s),
        ));

        let err = resolution.unwrap_err();
        assert_eq!(err.to_string(), "Transaction timeout after 5 minutes");
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].error.as_deref(),
            Some("Transaction timeout after 5 minutes")
        );
    }

    #[test]
    fn test_update_json() {
        let json = r#"{
            "txHash": "0xabc",
            "status": { "type": "inBlock", "blockHash": "0xb10c" },
            "dispatchError": { "type": "module", "section": "balances", "name": "InsufficientBalance", "docs": [] }
        }"#;
        let parsed: ExtrinsicUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.tx_hash.as_deref(), Some(HASH));
        assert_eq!(parsed.status, in_block());
        assert!(matches!(
            parsed.dispatch_error,
            Some(DispatchError::Module { .. })
        ));

        let ready: ExtrinsicUpdate =
            serde_json::from_str(r#"{ "status": { "type": "finalityTimeout" } }"#).unwrap();
        assert_eq!(ready.status, ExtrinsicStatus::FinalityTimeout);
    }

    #[test]
    fn test_status_json_is_camel_case() {
        let status = TransactionStatus::success("ok", Some(HASH), BLOCK);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["blockHash"], BLOCK);
        assert!(json.get("error").is_none());
    }
}
