//! SS58 account addresses
//!
//! Wallet extensions hand out addresses in whatever network format the user
//! configured. Everything downstream compares addresses after re-encoding them
//! to one canonical prefix, so `reencode_ss58` is the entry point most callers
//! want. See: https://docs.substrate.io/reference/address-formats/

use crate::error::WasmBeneficiaryError;
use blake2::{Blake2b512, Digest};

/// Domain separator hashed in front of the checksum payload
const SS58_CHECKSUM_CONTEXT: &[u8] = b"SS58PRE";

const ACCOUNT_ID_LEN: usize = 32;
const CHECKSUM_LEN: usize = 2;

/// Encode a 32-byte account id under the given network prefix
pub fn encode_ss58(account_id: &[u8], prefix: u16) -> Result<String, WasmBeneficiaryError> {
    if account_id.len() != ACCOUNT_ID_LEN {
        return Err(WasmBeneficiaryError::InvalidAddress(format!(
            "Account id must be {} bytes, got {}",
            ACCOUNT_ID_LEN,
            account_id.len()
        )));
    }

    let mut payload = prefix_bytes(prefix)?;
    payload.extend_from_slice(account_id);
    let sum = checksum(&payload);
    payload.extend_from_slice(&sum[..CHECKSUM_LEN]);

    Ok(bs58::encode(payload).into_string())
}

/// Decode an SS58 address into its account id and network prefix
pub fn decode_ss58(address: &str) -> Result<([u8; 32], u16), WasmBeneficiaryError> {
    let raw = bs58::decode(address)
        .into_vec()
        .map_err(|e| WasmBeneficiaryError::InvalidAddress(format!("Invalid base58: {}", e)))?;

    if raw.len() < 1 + ACCOUNT_ID_LEN + CHECKSUM_LEN {
        return Err(WasmBeneficiaryError::InvalidAddress(
            "Address too short".to_string(),
        ));
    }

    let (prefix, prefix_len) = read_prefix(&raw)?;
    let body_end = raw.len() - CHECKSUM_LEN;
    let account: [u8; 32] = raw[prefix_len..body_end].try_into().map_err(|_| {
        WasmBeneficiaryError::InvalidAddress(format!(
            "Invalid account id length: {}",
            body_end - prefix_len
        ))
    })?;

    if raw[body_end..] != checksum(&raw[..body_end])[..CHECKSUM_LEN] {
        return Err(WasmBeneficiaryError::InvalidAddress(
            "Invalid checksum".to_string(),
        ));
    }

    Ok((account, prefix))
}

/// Check that `address` decodes, optionally under a specific prefix
pub fn validate_ss58_address(address: &str, expected_prefix: Option<u16>) -> bool {
    match decode_ss58(address) {
        Ok((_, prefix)) => expected_prefix.map_or(true, |expected| prefix == expected),
        Err(_) => false,
    }
}

/// Re-encode an address of any network format under `prefix`
pub fn reencode_ss58(address: &str, prefix: u16) -> Result<String, WasmBeneficiaryError> {
    let (account, _) = decode_ss58(address)?;
    encode_ss58(&account, prefix)
}

/// Single-byte prefixes below 64, two-byte encoding up to 16383
fn prefix_bytes(prefix: u16) -> Result<Vec<u8>, WasmBeneficiaryError> {
    match prefix {
        0..=63 => Ok(vec![prefix as u8]),
        64..=16383 => {
            let first = ((prefix & 0b0000_0000_1111_1100) as u8) >> 2 | 0b0100_0000;
            let second = ((prefix >> 8) as u8) | ((prefix & 0b0000_0000_0000_0011) as u8) << 6;
            Ok(vec![first, second])
        }
        _ => Err(WasmBeneficiaryError::InvalidAddress(format!(
            "Invalid prefix: {}",
            prefix
        ))),
    }
}

fn read_prefix(raw: &[u8]) -> Result<(u16, usize), WasmBeneficiaryError> {
    match raw[0] {
        0..=63 => Ok((raw[0] as u16, 1)),
        64..=127 => {
            let lower = (raw[0] & 0b0011_1111) << 2 | (raw[1] >> 6);
            let upper = raw[1] & 0b0011_1111;
            Ok((((upper as u16) << 8) | (lower as u16), 2))
        }
        other => Err(WasmBeneficiaryError::InvalidAddress(format!(
            "Invalid prefix byte: {}",
            other
        ))),
    }
}

fn checksum(payload: &[u8]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CHECKSUM_CONTEXT);
    hasher.update(payload);
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}
