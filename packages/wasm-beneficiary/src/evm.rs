//! EVM address validation (EIP-55)
//!
//! The beneficiary address is typed by hand, and an association remark cannot
//! be revoked once it is on chain. Validation therefore reports exactly one
//! reason per failure, checked in a fixed priority order, and only computes the
//! checksum once the format is otherwise valid.
//!
//! See: https://eips.ethereum.org/EIPS/eip-55

use core::fmt;
use serde::Serialize;
use sha3::{Digest, Keccak256};

const PREFIX: &str = "0x";
const ADDRESS_LEN: usize = 42;

/// Why an input is not an acceptable EVM address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvmAddressError {
    Empty,
    MissingPrefix,
    /// Character count of the (trimmed) input
    WrongLength(usize),
    InvalidCharacters,
    ChecksumMismatch,
}

impl std::error::Error for EvmAddressError {}

impl fmt::Display for EvmAddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvmAddressError::Empty => write!(f, "EVM address is required"),
            EvmAddressError::MissingPrefix => write!(f, "EVM address must start with 0x"),
            EvmAddressError::WrongLength(len) => write!(
                f,
                "EVM address must be exactly {} characters (got {})",
                ADDRESS_LEN, len
            ),
            EvmAddressError::InvalidCharacters => write!(
                f,
                "EVM address contains invalid characters. Only hexadecimal characters (0-9, a-f, A-F) are allowed after 0x"
            ),
            EvmAddressError::ChecksumMismatch => write!(
                f,
                "Invalid EVM address checksum. Please verify the address is correct."
            ),
        }
    }
}

/// Outcome of [`validate_evm_address`], recomputed on every input change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmAddressValidation {
    pub is_valid: bool,
    pub has_valid_format: bool,
    pub has_valid_checksum: bool,
    pub normalized_address: Option<String>,
    pub error: Option<String>,
    #[serde(skip)]
    pub reason: Option<EvmAddressError>,
}

impl EvmAddressValidation {
    fn accepted(normalized: String) -> Self {
        Self {
            is_valid: true,
            has_valid_format: true,
            has_valid_checksum: true,
            normalized_address: Some(normalized),
            error: None,
            reason: None,
        }
    }

    fn rejected(reason: EvmAddressError) -> Self {
        Self {
            is_valid: false,
            has_valid_format: reason == EvmAddressError::ChecksumMismatch,
            has_valid_checksum: false,
            normalized_address: None,
            error: Some(reason.to_string()),
            reason: Some(reason),
        }
    }

    /// Normalized address, or the rejection reason
    pub fn into_result(self) -> Result<String, EvmAddressError> {
        match (self.normalized_address, self.reason) {
            (Some(address), None) => Ok(address),
            (_, Some(reason)) => Err(reason),
            (None, None) => Err(EvmAddressError::Empty),
        }
    }
}

/// Validate user input as an EVM address
///
/// Surrounding whitespace is ignored. Failure reasons are checked in priority
/// order: empty, missing `0x`, wrong length, non-hex characters, checksum.
pub fn validate_evm_address(input: &str) -> EvmAddressValidation {
    let trimmed = input.trim();
    let body = match address_body(trimmed) {
        Ok(body) => body,
        Err(reason) => return EvmAddressValidation::rejected(reason),
    };

    let normalized = checksummed(body);
    if checksum_holds(body, &normalized) {
        EvmAddressValidation::accepted(normalized)
    } else {
        EvmAddressValidation::rejected(EvmAddressError::ChecksumMismatch)
    }
}

/// `0x` followed by exactly 40 hexadecimal characters
pub fn is_valid_evm_address_format(address: &str) -> bool {
    address_body(address).is_ok()
}

/// EIP-55 checksum check; single-case addresses assert no checksum and pass
pub fn is_valid_evm_address_checksum(address: &str) -> bool {
    match address_body(address) {
        Ok(body) => checksum_holds(body, &checksummed(body)),
        Err(_) => false,
    }
}

/// EIP-55 checksummed form of a well-formatted address
pub fn to_checksum_address(address: &str) -> Result<String, EvmAddressError> {
    address_body(address).map(checksummed)
}

/// EIP-55 checksummed form of raw 20-byte address
pub fn checksum_from_bytes(bytes: &[u8; 20]) -> String {
    checksummed(&hex::encode(bytes))
}

/// Case-insensitive comparison of two well-formatted addresses
pub fn evm_addresses_equal(a: &str, b: &str) -> bool {
    match (address_body(a), address_body(b)) {
        (Ok(a), Ok(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Format checks in priority order; returns the 40-character body
fn address_body(address: &str) -> Result<&str, EvmAddressError> {
    if address.is_empty() {
        return Err(EvmAddressError::Empty);
    }
    let body = address
        .strip_prefix(PREFIX)
        .ok_or(EvmAddressError::MissingPrefix)?;

    let len = address.chars().count();
    if len != ADDRESS_LEN {
        return Err(EvmAddressError::WrongLength(len));
    }
    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EvmAddressError::InvalidCharacters);
    }
    Ok(body)
}

fn checksum_holds(body: &str, normalized: &str) -> bool {
    let single_case = body == body.to_ascii_lowercase() || body == body.to_ascii_uppercase();
    single_case || normalized[PREFIX.len()..] == *body
}

/// Uppercase each hex letter whose Keccak-256 nibble (same index) is >= 8
fn checksummed(body: &str) -> String {
    let lower = body.to_ascii_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(ADDRESS_LEN);
    out.push_str(PREFIX);
    for (i, c) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        out.push(if nibble >= 8 { c.to_ascii_uppercase() } else { c });
    }
    out
}
