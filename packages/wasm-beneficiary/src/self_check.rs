//! Optional EVM wallet suitability self-check
//!
//! The user signs a gasless EIP-191 message with the EVM wallet they intend to
//! receive tokens on. The signature never leaves the browser; only the summary
//! (`matched`, `not_matched`, `not_performed`) is embedded into the remark.
//! A failing self-check is informational and never blocks submission.

use crate::evm::{checksum_from_bytes, to_checksum_address, EvmAddressError};
use core::fmt;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::str::FromStr;

/// EIP-191 version 0x45 prefix
const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

const SIGNATURE_LEN: usize = 65;

/// Kind of wallet the beneficiary address belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WalletType {
    #[default]
    #[serde(rename = "EOA")]
    Eoa,
    #[serde(rename = "SAFE_MULTISIG")]
    SafeMultisig,
}

impl WalletType {
    pub fn as_str(self) -> &'static str {
        match self {
            WalletType::Eoa => "EOA",
            WalletType::SafeMultisig => "SAFE_MULTISIG",
        }
    }

    fn label(self) -> &'static str {
        match self {
            WalletType::Eoa => "EOA (single wallet)",
            WalletType::SafeMultisig => "Safe multisig",
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletType {
    type Err = SelfCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EOA" => Ok(WalletType::Eoa),
            "SAFE_MULTISIG" => Ok(WalletType::SafeMultisig),
            other => Err(SelfCheckError::Provider(format!(
                "Unknown wallet type: {}",
                other
            ))),
        }
    }
}

/// Value of the `evm_self_check` remark field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfCheckStatus {
    Matched,
    NotMatched,
    NotPerformed,
}

impl SelfCheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SelfCheckStatus::Matched => "matched",
            SelfCheckStatus::NotMatched => "not_matched",
            SelfCheckStatus::NotPerformed => "not_performed",
        }
    }
}

impl fmt::Display for SelfCheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelfCheckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "matched" => Ok(SelfCheckStatus::Matched),
            "not_matched" => Ok(SelfCheckStatus::NotMatched),
            "not_performed" => Ok(SelfCheckStatus::NotPerformed),
            other => Err(format!("unknown self-check value: {}", other)),
        }
    }
}

/// Self-check outcome carried into the association remark
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfCheckSummary {
    pub performed: bool,
    #[serde(default)]
    pub wallet_type: WalletType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches_beneficiary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl SelfCheckSummary {
    pub fn not_performed(wallet_type: WalletType) -> Self {
        Self {
            performed: false,
            wallet_type,
            ..Default::default()
        }
    }

    /// Summary of a completed signing; failed signings count as not performed
    pub fn from_result(result: &SigningResult, wallet_type: WalletType, timestamp: String) -> Self {
        if !result.success {
            return Self::not_performed(wallet_type);
        }
        Self {
            performed: true,
            wallet_type,
            signer_address: result.signer_address.clone(),
            matches_beneficiary: result.matches_beneficiary,
            timestamp: Some(timestamp),
        }
    }

    /// Safe multisig owners sign with a different key than the Safe address,
    /// so only EOA signatures can mismatch.
    pub fn evm_self_check(&self) -> SelfCheckStatus {
        if !self.performed {
            return SelfCheckStatus::NotPerformed;
        }
        match self.wallet_type {
            WalletType::Eoa if self.matches_beneficiary == Some(true) => SelfCheckStatus::Matched,
            WalletType::Eoa => SelfCheckStatus::NotMatched,
            WalletType::SafeMultisig => SelfCheckStatus::Matched,
        }
    }
}

/// Self-check failures; shown to the user, never fatal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfCheckError {
    NoProvider,
    NoAccounts,
    /// EIP-1193 code 4001 or `ACTION_REJECTED`
    Declined,
    /// EIP-1193 code -32603
    Rejected,
    InvalidSignature(String),
    InvalidBeneficiary(EvmAddressError),
    Provider(String),
}

impl std::error::Error for SelfCheckError {}

impl fmt::Display for SelfCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelfCheckError::NoProvider => write!(
                f,
                "No EVM wallet detected. Please install MetaMask, Rabby, or another compatible wallet."
            ),
            SelfCheckError::NoAccounts => write!(
                f,
                "No accounts returned from wallet. Please unlock your wallet and try again."
            ),
            SelfCheckError::Declined => {
                write!(f, "You declined the request. The self-check was cancelled.")
            }
            SelfCheckError::Rejected => write!(f, "Request was rejected. Please try again."),
            SelfCheckError::InvalidSignature(s) => write!(f, "Invalid signature: {}", s),
            SelfCheckError::InvalidBeneficiary(e) => write!(f, "{}", e),
            SelfCheckError::Provider(s) => write!(f, "{}", s),
        }
    }
}

/// `code` field of an EIP-1193 provider error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCode {
    Numeric(i64),
    Named(String),
}

/// Map a provider error onto the message shown to the user
pub fn classify_provider_error(code: Option<ProviderCode>, message: Option<String>) -> SelfCheckError {
    match code {
        Some(ProviderCode::Numeric(4001)) => SelfCheckError::Declined,
        Some(ProviderCode::Named(name)) if name == "ACTION_REJECTED" => SelfCheckError::Declined,
        Some(ProviderCode::Numeric(-32603)) => SelfCheckError::Rejected,
        _ => SelfCheckError::Provider(
            message.unwrap_or_else(|| "An unexpected error occurred during signing.".to_string()),
        ),
    }
}

/// Result of a self-check signing round
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_address: Option<String>,
    /// Only set for EOA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches_beneficiary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SigningResult {
    pub fn failed(err: &SelfCheckError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            ..Default::default()
        }
    }
}

/// Message the user is asked to sign
pub fn build_self_check_message(
    beneficiary_address: &str,
    wallet_type: WalletType,
    timestamp: &str,
) -> String {
    format!(
        "Subspace Foundation — Wallet Suitability Self-Check (no gas)\n\
         \n\
         I control the wallet that is currently connected to this browser.\n\
         \n\
         Beneficiary address entered: {}\n\
         Wallet type selected: {}\n\
         Date: {}\n\
         Site: beneficiary.subspace.foundation\n\
         \n\
         This signature is optional and is not submitted to the Subspace Foundation.",
        beneficiary_address,
        wallet_type.as_str(),
        timestamp
    )
}

/// Keccak-256 of the EIP-191 prefixed message
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());

    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Recover the checksummed address that produced a `personal_sign` signature
///
/// `signature` is `r || s || v` with `v` in {0, 1, 27, 28}.
pub fn recover_personal_signer(message: &str, signature: &[u8]) -> Result<String, SelfCheckError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(SelfCheckError::InvalidSignature(format!(
            "expected {} bytes, got {}",
            SIGNATURE_LEN,
            signature.len()
        )));
    }

    let v = match signature[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        other => {
            return Err(SelfCheckError::InvalidSignature(format!(
                "invalid recovery byte {}",
                other
            )))
        }
    };

    let sig = Signature::from_slice(&signature[..64])
        .map_err(|_| SelfCheckError::InvalidSignature("malformed r/s".to_string()))?;
    let recid = RecoveryId::from_byte(v)
        .ok_or_else(|| SelfCheckError::InvalidSignature("invalid recovery id".to_string()))?;

    // High-s signatures recover after normalization with the y parity flipped
    let (sig, recid) = match sig.normalize_s() {
        Some(low) => (low, RecoveryId::new(!recid.is_y_odd(), recid.is_x_reduced())),
        None => (sig, recid),
    };

    let hash = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&hash, &sig, recid).map_err(|_| {
        SelfCheckError::InvalidSignature("failed to recover public key".to_string())
    })?;

    Ok(address_of(&key))
}

/// Recover from a `0x`-prefixed hex signature as returned by `personal_sign`
pub fn recover_personal_signer_hex(
    message: &str,
    signature_hex: &str,
) -> Result<String, SelfCheckError> {
    let raw = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let bytes =
        hex::decode(raw).map_err(|e| SelfCheckError::InvalidSignature(e.to_string()))?;
    recover_personal_signer(message, &bytes)
}

/// Recover the signer and compare it against the beneficiary (EOA only)
pub fn evaluate_signature(
    message: &str,
    signature_hex: &str,
    beneficiary_address: &str,
    signer_address: &str,
    wallet_type: WalletType,
) -> Result<SigningResult, SelfCheckError> {
    let recovered = recover_personal_signer_hex(message, signature_hex)?;
    let beneficiary =
        to_checksum_address(beneficiary_address).map_err(SelfCheckError::InvalidBeneficiary)?;
    let signer =
        to_checksum_address(signer_address).map_err(SelfCheckError::InvalidBeneficiary)?;

    let matches_beneficiary = match wallet_type {
        WalletType::Eoa => Some(recovered == beneficiary),
        WalletType::SafeMultisig => None,
    };

    Ok(SigningResult {
        success: true,
        message: Some(message.to_string()),
        signature: Some(signature_hex.to_string()),
        recovered_address: Some(recovered),
        signer_address: Some(signer),
        matches_beneficiary,
        error: None,
    })
}

/// Plain-text report the user can copy
pub fn format_result_for_clipboard(
    result: &SigningResult,
    wallet_type: WalletType,
    beneficiary_address: &str,
) -> String {
    let (message, signature, recovered) = match (
        result.success,
        &result.message,
        &result.signature,
        &result.recovered_address,
    ) {
        (true, Some(m), Some(s), Some(r)) => (m, s, r),
        _ => return "Signing was not completed successfully.".to_string(),
    };

    let mut lines = vec![
        "=== Wallet Suitability Self-Check Details ===".to_string(),
        String::new(),
        "Message:".to_string(),
        message.clone(),
        String::new(),
        "---".to_string(),
        String::new(),
        format!("Signature: {}", signature),
        String::new(),
        format!("Recovered Address: {}", recovered),
        format!(
            "Signer Address: {}",
            result.signer_address.as_deref().unwrap_or("undefined")
        ),
        format!("Beneficiary Address: {}", beneficiary_address),
        format!("Wallet Type: {}", wallet_type.label()),
    ];

    if wallet_type == WalletType::Eoa {
        lines.push(String::new());
        let matched = if result.matches_beneficiary == Some(true) {
            "YES ✓"
        } else {
            "NO ✗"
        };
        lines.push(format!("Address Match: {}", matched));
    }

    lines.extend(
        [
            "",
            "---",
            "",
            "Note: This signature was NOT submitted to the Subspace Foundation.",
            "It is for your personal verification only.",
            "",
            "Important: This check does not guarantee connectivity to Auto EVM or any specific network.",
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    lines.join("\n")
}

fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // skip the 0x04 SEC1 tag
    let hash = Keccak256::digest(&point.as_bytes()[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    checksum_from_bytes(&address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::SigningKey;

    // Well-known development key (Anvil/Hardhat account #0)
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const OTHER_ADDRESS: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn personal_sign(message: &str, v_offset: u8) -> Vec<u8> {
        let key = SigningKey::from_slice(&hex::decode(DEV_KEY).unwrap()).unwrap();
        let hash = personal_message_hash(message);
        let (signature, recovery_id): (Signature, RecoveryId) = key.sign_prehash(&hash).unwrap();

        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte() + v_offset);
        bytes
    }

    #[test]
    fn test_message_text() {
        let message = build_self_check_message(
            OTHER_ADDRESS,
            WalletType::SafeMultisig,
            "2025-01-01T00:00:00.000Z",
        );
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(
            lines[0],
            "Subspace Foundation — Wallet Suitability Self-Check (no gas)"
        );
        assert_eq!(lines[1], "");
        assert_eq!(
            lines[4],
            "Beneficiary address entered: 0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
        assert_eq!(lines[5], "Wallet type selected: SAFE_MULTISIG");
        assert_eq!(lines[6], "Date: 2025-01-01T00:00:00.000Z");
        assert_eq!(lines[7], "Site: beneficiary.subspace.foundation");
        assert_eq!(
            lines[9],
            "This signature is optional and is not submitted to the Subspace Foundation."
        );
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn test_recover_dev_key() {
        let message = "hello";
        for v_offset in [0, 27] {
            let sig = personal_sign(message, v_offset);
            assert_eq!(recover_personal_signer(message, &sig).unwrap(), DEV_ADDRESS);
        }
    }

    #[test]
    fn test_recover_from_hex() {
        let message = build_self_check_message(DEV_ADDRESS, WalletType::Eoa, "now");
        let sig = format!("0x{}", hex::encode(personal_sign(&message, 27)));
        assert_eq!(
            recover_personal_signer_hex(&message, &sig).unwrap(),
            DEV_ADDRESS
        );
    }

    #[test]
    fn test_recover_rejects_malformed_signature() {
        assert!(matches!(
            recover_personal_signer("hello", &[0u8; 64]),
            Err(SelfCheckError::InvalidSignature(_))
        ));

        let mut sig = personal_sign("hello", 27);
        sig[64] = 5;
        assert!(recover_personal_signer("hello", &sig).is_err());

        assert!(recover_personal_signer_hex("hello", "0xnothex").is_err());
    }

    #[test]
    fn test_different_message_recovers_different_signer() {
        let sig = personal_sign("hello", 27);
        let recovered = recover_personal_signer("goodbye", &sig);
        assert_ne!(recovered.ok().as_deref(), Some(DEV_ADDRESS));
    }

    #[test]
    fn test_evaluate_eoa_match_and_mismatch() {
        let message = build_self_check_message(DEV_ADDRESS, WalletType::Eoa, "now");
        let sig = format!("0x{}", hex::encode(personal_sign(&message, 27)));

        let lower = DEV_ADDRESS.to_lowercase();
        let result =
            evaluate_signature(&message, &sig, &lower, &lower, WalletType::Eoa).unwrap();
        assert!(result.success);
        assert_eq!(result.recovered_address.as_deref(), Some(DEV_ADDRESS));
        assert_eq!(result.signer_address.as_deref(), Some(DEV_ADDRESS));
        assert_eq!(result.matches_beneficiary, Some(true));

        let result =
            evaluate_signature(&message, &sig, OTHER_ADDRESS, DEV_ADDRESS, WalletType::Eoa)
                .unwrap();
        assert_eq!(result.matches_beneficiary, Some(false));
    }

    #[test]
    fn test_evaluate_safe_skips_match() {
        let message = build_self_check_message(OTHER_ADDRESS, WalletType::SafeMultisig, "now");
        let sig = format!("0x{}", hex::encode(personal_sign(&message, 27)));
        let result = evaluate_signature(
            &message,
            &sig,
            OTHER_ADDRESS,
            DEV_ADDRESS,
            WalletType::SafeMultisig,
        )
        .unwrap();
        assert_eq!(result.matches_beneficiary, None);

        let summary = SelfCheckSummary::from_result(&result, WalletType::SafeMultisig, "t".into());
        assert_eq!(summary.evm_self_check(), SelfCheckStatus::Matched);
    }

    #[test]
    fn test_summary_status_rule() {
        assert_eq!(
            SelfCheckSummary::not_performed(WalletType::Eoa).evm_self_check(),
            SelfCheckStatus::NotPerformed
        );
        assert_eq!(
            SelfCheckSummary::not_performed(WalletType::SafeMultisig).evm_self_check(),
            SelfCheckStatus::NotPerformed
        );

        let eoa = |matches| SelfCheckSummary {
            performed: true,
            wallet_type: WalletType::Eoa,
            matches_beneficiary: matches,
            ..Default::default()
        };
        assert_eq!(eoa(Some(true)).evm_self_check(), SelfCheckStatus::Matched);
        assert_eq!(eoa(Some(false)).evm_self_check(), SelfCheckStatus::NotMatched);
        assert_eq!(eoa(None).evm_self_check(), SelfCheckStatus::NotMatched);
    }

    #[test]
    fn test_failed_result_is_not_performed() {
        let result = SigningResult::failed(&SelfCheckError::Declined);
        let summary = SelfCheckSummary::from_result(&result, WalletType::Eoa, "t".into());
        assert!(!summary.performed);
        assert_eq!(summary.evm_self_check(), SelfCheckStatus::NotPerformed);
    }

    #[test]
    fn test_classify_provider_error() {
        assert_eq!(
            classify_provider_error(Some(ProviderCode::Numeric(4001)), None).to_string(),
            "You declined the request. The self-check was cancelled."
        );
        assert_eq!(
            classify_provider_error(Some(ProviderCode::Named("ACTION_REJECTED".into())), None),
            SelfCheckError::Declined
        );
        assert_eq!(
            classify_provider_error(Some(ProviderCode::Numeric(-32603)), None).to_string(),
            "Request was rejected. Please try again."
        );
        assert_eq!(
            classify_provider_error(Some(ProviderCode::Numeric(-32000)), Some("boom".into()))
                .to_string(),
            "boom"
        );
        assert_eq!(
            classify_provider_error(None, None).to_string(),
            "An unexpected error occurred during signing."
        );
    }

    #[test]
    fn test_clipboard_report() {
        let result = SigningResult {
            success: true,
            message: Some("msg".into()),
            signature: Some("0xsig".into()),
            recovered_address: Some(DEV_ADDRESS.into()),
            signer_address: Some(DEV_ADDRESS.into()),
            matches_beneficiary: Some(true),
            error: None,
        };

        let eoa = format_result_for_clipboard(&result, WalletType::Eoa, DEV_ADDRESS);
        assert!(eoa.starts_with("=== Wallet Suitability Self-Check Details ===\n\nMessage:\nmsg\n"));
        assert!(eoa.contains("Wallet Type: EOA (single wallet)"));
        assert!(eoa.contains("Address Match: YES ✓"));
        assert!(eoa.ends_with("does not guarantee connectivity to Auto EVM or any specific network."));

        let safe = format_result_for_clipboard(&result, WalletType::SafeMultisig, DEV_ADDRESS);
        assert!(safe.contains("Wallet Type: Safe multisig"));
        assert!(!safe.contains("Address Match"));

        let failed = SigningResult::failed(&SelfCheckError::NoProvider);
        assert_eq!(
            format_result_for_clipboard(&failed, WalletType::Eoa, DEV_ADDRESS),
            "Signing was not completed successfully."
        );
    }

    #[test]
    fn test_wallet_type_round_trip() {
        assert_eq!("EOA".parse::<WalletType>().unwrap(), WalletType::Eoa);
        assert_eq!(
            serde_json::to_string(&WalletType::SafeMultisig).unwrap(),
            "\"SAFE_MULTISIG\""
        );
        assert!("eoa".parse::<WalletType>().is_err());
    }
}
