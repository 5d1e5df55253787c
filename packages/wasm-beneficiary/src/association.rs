//! Verification-form submission gate

use crate::evm::{validate_evm_address, EvmAddressError};
use crate::remark::AssociationRemark;
use crate::self_check::{SelfCheckStatus, SelfCheckSummary};
use crate::ss58::validate_ss58_address;
use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationError {
    WalletNotConnected,
    InvalidEvmAddress(EvmAddressError),
    NotAttested,
}

impl std::error::Error for AssociationError {}

impl fmt::Display for AssociationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssociationError::WalletNotConnected => write!(f, "Please connect your wallet first"),
            AssociationError::InvalidEvmAddress(_) => write!(f, "Please enter a valid EVM address"),
            AssociationError::NotAttested => write!(
                f,
                "Please confirm that the EVM address is correct. The association cannot be revoked."
            ),
        }
    }
}

/// Validated input for one association transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationRequest {
    pub sender: String,
    /// Checksummed
    pub evm_address: String,
    pub self_check: Option<SelfCheckSummary>,
}

impl AssociationRequest {
    /// Check the form before anything is signed. The remark is permanent, so
    /// the user must explicitly attest the EVM address.
    pub fn prepare(
        sender: Option<&str>,
        evm_input: &str,
        attested: bool,
        self_check: Option<SelfCheckSummary>,
    ) -> Result<Self, AssociationError> {
        let sender = sender
            .filter(|s| validate_ss58_address(s, None))
            .ok_or(AssociationError::WalletNotConnected)?;

        let evm_address = validate_evm_address(evm_input)
            .into_result()
            .map_err(AssociationError::InvalidEvmAddress)?;

        if !attested {
            return Err(AssociationError::NotAttested);
        }

        Ok(Self {
            sender: sender.to_string(),
            evm_address,
            self_check,
        })
    }

    pub fn evm_self_check(&self) -> SelfCheckStatus {
        self.self_check
            .as_ref()
            .map_or(SelfCheckStatus::NotPerformed, SelfCheckSummary::evm_self_check)
    }

    /// Fresh remark for this request; each call draws a new nonce
    pub fn remark(&self) -> AssociationRemark {
        AssociationRemark::new(&self.sender, &self.evm_address, self.evm_self_check())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::self_check::WalletType;

    const SENDER: &str = "5EGoFA95omzemRssELLDjVenNZ68aXyUeqtKQScXSEBvVJkr";
    const EVM_LOWER: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
    const EVM: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    #[test]
    fn test_prepare_normalizes_address() {
        let request = AssociationRequest::prepare(Some(SENDER), EVM_LOWER, true, None).unwrap();
        assert_eq!(request.sender, SENDER);
        assert_eq!(request.evm_address, EVM);
        assert_eq!(request.evm_self_check(), SelfCheckStatus::NotPerformed);
    }

    #[test]
    fn test_prepare_rejections_in_order() {
        assert_eq!(
            AssociationRequest::prepare(None, EVM, true, None),
            Err(AssociationError::WalletNotConnected)
        );
        assert_eq!(
            AssociationRequest::prepare(Some("not-an-address"), EVM, true, None),
            Err(AssociationError::WalletNotConnected)
        );
        assert_eq!(
            AssociationRequest::prepare(Some(SENDER), "0x1234", true, None),
            Err(AssociationError::InvalidEvmAddress(
                EvmAddressError::WrongLength(6)
            ))
        );
        assert_eq!(
            AssociationRequest::prepare(Some(SENDER), EVM, false, None),
            Err(AssociationError::NotAttested)
        );
        assert_eq!(
            AssociationError::WalletNotConnected.to_string(),
            "Please connect your wallet first"
        );
    }

    #[test]
    fn test_remark_carries_self_check() {
        let summary = SelfCheckSummary {
            performed: true,
            wallet_type: WalletType::Eoa,
            matches_beneficiary: Some(false),
            ..Default::default()
        };
        let request =
            AssociationRequest::prepare(Some(SENDER), EVM, true, Some(summary)).unwrap();
        let remark = request.remark();

        assert_eq!(remark.ss58, SENDER);
        assert_eq!(remark.evm, EVM);
        assert_eq!(remark.evm_self_check, SelfCheckStatus::NotMatched);
        assert_ne!(remark.nonce, request.remark().nonce);
    }
}
