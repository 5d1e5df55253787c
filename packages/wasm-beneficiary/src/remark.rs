//! Association remark payload and `System.remark` call data
//!
//! The remark is a plain-text record, one `key=value` per line, under a
//! versioned header. Indexers parse it back with [`AssociationRemark::parse`].

use crate::self_check::SelfCheckStatus;
use chrono::{SecondsFormat, Utc};
use core::fmt;
use parity_scale_codec::{Compact, Encode};
use serde::Serialize;
use subxt_core::{
    ext::scale_value::{Composite, Value},
    metadata::Metadata,
    tx::payload::{dynamic, Payload},
};

/// First line of every association remark
pub const REMARK_HEADER: &str = "SUBSPACE_ASSOC:v1";

/// Only scope currently issued
pub const REMARK_SCOPE: &str = "beneficiary";

const FIELDS: [&str; 6] = ["ss58", "evm", "evm_self_check", "scope", "nonce", "ts"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemarkError {
    WrongHeader(String),
    MissingField(&'static str),
    UnknownField(String),
    DuplicateField(String),
    MalformedLine(String),
    UnknownScope(String),
    UnknownSelfCheck(String),
    Encode(String),
}

impl std::error::Error for RemarkError {}

impl fmt::Display for RemarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemarkError::WrongHeader(h) => write!(f, "unexpected header '{}'", h),
            RemarkError::MissingField(k) => write!(f, "missing field '{}'", k),
            RemarkError::UnknownField(k) => write!(f, "unknown field '{}'", k),
            RemarkError::DuplicateField(k) => write!(f, "duplicate field '{}'", k),
            RemarkError::MalformedLine(l) => write!(f, "malformed line '{}'", l),
            RemarkError::UnknownScope(s) => write!(f, "unknown scope '{}'", s),
            RemarkError::UnknownSelfCheck(s) => write!(f, "unknown self-check value '{}'", s),
            RemarkError::Encode(s) => write!(f, "failed to encode remark call: {}", s),
        }
    }
}

/// ISO-8601 UTC timestamp with millisecond precision (`...sssZ`)
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Association of an SS58 account with an EVM beneficiary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationRemark {
    pub ss58: String,
    /// Checksummed EVM address
    pub evm: String,
    pub evm_self_check: SelfCheckStatus,
    pub nonce: String,
    pub timestamp: String,
}

impl AssociationRemark {
    /// New remark with a random v4 nonce stamped now
    pub fn new(ss58: &str, evm: &str, evm_self_check: SelfCheckStatus) -> Self {
        Self::with_nonce(
            ss58,
            evm,
            evm_self_check,
            uuid::Uuid::new_v4().to_string(),
            now_iso(),
        )
    }

    pub fn with_nonce(
        ss58: &str,
        evm: &str,
        evm_self_check: SelfCheckStatus,
        nonce: String,
        timestamp: String,
    ) -> Self {
        Self {
            ss58: ss58.to_string(),
            evm: evm.to_string(),
            evm_self_check,
            nonce,
            timestamp,
        }
    }

    /// Remark text as submitted on chain
    pub fn to_payload(&self) -> String {
        format!(
            "{}\nss58={}\nevm={}\nevm_self_check={}\nscope={}\nnonce={}\nts={}",
            REMARK_HEADER,
            self.ss58,
            self.evm,
            self.evm_self_check,
            REMARK_SCOPE,
            self.nonce,
            self.timestamp
        )
    }

    /// Parse a remark produced by [`to_payload`](Self::to_payload)
    pub fn parse(payload: &str) -> Result<Self, RemarkError> {
        let mut lines = payload.lines();
        let header = lines.next().unwrap_or_default();
        if header != REMARK_HEADER {
            return Err(RemarkError::WrongHeader(header.to_string()));
        }

        let mut values: [Option<&str>; 6] = [None; 6];
        for line in lines {
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| RemarkError::MalformedLine(line.to_string()))?;
            let slot = FIELDS
                .iter()
                .position(|f| *f == key)
                .ok_or_else(|| RemarkError::UnknownField(key.to_string()))?;
            if values[slot].replace(value).is_some() {
                return Err(RemarkError::DuplicateField(key.to_string()));
            }
        }

        let field = |i: usize| values[i].ok_or(RemarkError::MissingField(FIELDS[i]));

        let scope = field(3)?;
        if scope != REMARK_SCOPE {
            return Err(RemarkError::UnknownScope(scope.to_string()));
        }
        let self_check = field(2)?;
        let evm_self_check = self_check
            .parse()
            .map_err(|_| RemarkError::UnknownSelfCheck(self_check.to_string()))?;

        Ok(Self {
            ss58: field(0)?.to_string(),
            evm: field(1)?.to_string(),
            evm_self_check,
            nonce: field(4)?.to_string(),
            timestamp: field(5)?.to_string(),
        })
    }
}

/// `System.remark` call data through the runtime metadata
pub fn encode_remark_call(payload: &str, metadata: &Metadata) -> Result<Vec<u8>, RemarkError> {
    dynamic(
        "System",
        "remark",
        named([("remark", Value::from_bytes(payload.as_bytes()))]),
    )
    .encode_call_data(metadata)
    .map_err(|e| RemarkError::Encode(e.to_string()))
}

/// `System.remark` call data for known pallet and call indices
pub fn encode_remark_call_at(pallet_index: u8, call_index: u8, payload: &str) -> Vec<u8> {
    let mut out = vec![pallet_index, call_index];
    Compact(payload.len() as u64).encode_to(&mut out);
    out.extend_from_slice(payload.as_bytes());
    out
}

fn named<const N: usize>(fields: [(&str, Value<()>); N]) -> Composite<()> {
    Composite::Named(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SS58: &str = "5EGoFA95omzemRssELLDjVenNZ68aXyUeqtKQScXSEBvVJkr";
    const EVM: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn fixed() -> AssociationRemark {
        AssociationRemark::with_nonce(
            SS58,
            EVM,
            SelfCheckStatus::NotPerformed,
            "3b241101-e2bb-4255-8caf-4136c566a962".to_string(),
            "2025-01-01T12:00:00.000Z".to_string(),
        )
    }

    #[test]
    fn test_payload_format() {
        assert_eq!(
            fixed().to_payload(),
            "SUBSPACE_ASSOC:v1\n\
             ss58=5EGoFA95omzemRssELLDjVenNZ68aXyUeqtKQScXSEBvVJkr\n\
             evm=0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed\n\
             evm_self_check=not_performed\n\
             scope=beneficiary\n\
             nonce=3b241101-e2bb-4255-8caf-4136c566a962\n\
             ts=2025-01-01T12:00:00.000Z"
        );
    }

    #[test]
    fn test_parse_inverse() {
        let remark = fixed();
        assert_eq!(AssociationRemark::parse(&remark.to_payload()).unwrap(), remark);
    }

    #[test]
    fn test_new_generates_nonce_and_timestamp() {
        let a = AssociationRemark::new(SS58, EVM, SelfCheckStatus::Matched);
        let b = AssociationRemark::new(SS58, EVM, SelfCheckStatus::Matched);
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(a.nonce.len(), 36);
        assert!(uuid::Uuid::parse_str(&a.nonce).is_ok());
        // 2025-01-01T12:00:00.000Z
        assert_eq!(a.timestamp.len(), 24);
        assert!(a.timestamp.ends_with('Z'));
        assert!(a.to_payload().contains("evm_self_check=matched\n"));
    }

    #[test]
    fn test_parse_rejections() {
        let good = fixed().to_payload();

        let wrong_header = good.replace("SUBSPACE_ASSOC:v1", "SUBSPACE_ASSOC:v2");
        assert!(matches!(
            AssociationRemark::parse(&wrong_header),
            Err(RemarkError::WrongHeader(_))
        ));

        let wrong_scope = good.replace("scope=beneficiary", "scope=validator");
        assert_eq!(
            AssociationRemark::parse(&wrong_scope),
            Err(RemarkError::UnknownScope("validator".to_string()))
        );

        let bad_check = good.replace("not_performed", "maybe");
        assert_eq!(
            AssociationRemark::parse(&bad_check),
            Err(RemarkError::UnknownSelfCheck("maybe".to_string()))
        );

        let missing_nonce: Vec<&str> = good.lines().filter(|l| !l.starts_with("nonce=")).collect();
        assert_eq!(
            AssociationRemark::parse(&missing_nonce.join("\n")),
            Err(RemarkError::MissingField("nonce"))
        );

        let duplicate = format!("{}\nevm={}", good, EVM);
        assert_eq!(
            AssociationRemark::parse(&duplicate),
            Err(RemarkError::DuplicateField("evm".to_string()))
        );

        let extra = format!("{}\nnote=hi", good);
        assert!(matches!(
            AssociationRemark::parse(&extra),
            Err(RemarkError::UnknownField(_))
        ));

        let malformed = format!("{}\nno separator", good);
        assert!(matches!(
            AssociationRemark::parse(&malformed),
            Err(RemarkError::MalformedLine(_))
        ));

        assert!(AssociationRemark::parse("").is_err());
    }

    #[test]
    fn test_encode_remark_call_at() {
        assert_eq!(encode_remark_call_at(0, 7, "hi"), vec![0, 7, 8, b'h', b'i']);

        let payload = fixed().to_payload();
        let call = encode_remark_call_at(0, 7, &payload);
        // compact length takes two bytes once the payload exceeds 63 bytes
        assert!(payload.len() > 63 && payload.len() < 16384);
        assert_eq!(call.len(), 2 + 2 + payload.len());
        assert_eq!(&call[4..], payload.as_bytes());
    }

    #[test]
    fn test_encode_remark_call_at_large_payload() {
        let payload = "a".repeat(70_000);
        let call = encode_remark_call_at(0, 7, &payload);
        assert_eq!(&call[2..6], &[0xc2, 0x45, 0x04, 0x00]);
        assert_eq!(&call[2..6], Compact(70_000u64).encode().as_slice());
        assert_eq!(call.len(), 2 + 4 + payload.len());
    }
}
