//! # Safe Transaction Hash
//!
//! The EIP-712 digest that Safe owners sign:
//!
//! ```text
//!   domainSeparator = hashStruct(EIP712Domain { chainId, verifyingContract: safe })
//!   structHash      = hashStruct(SafeTx { to, value, data, operation, safeTxGas,
//!                                         baseGas, gasPrice, gasToken,
//!                                         refundReceiver, nonce })
//!   safeTxHash      = keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ structHash)
//! ```
//!
//! The engine never estimates gas or pays refunds, so `safeTxGas`, `baseGas`,
//! `gasPrice`, `gasToken` and `refundReceiver` are always zero.

use alloy_primitives::{Address as PrimitiveAddress, Bytes, B256, U256};
use alloy_sol_types::{Eip712Domain, SolStruct};

use crate::codec::address::{Address, TxHash};
use crate::codec::WeiAmount;

use super::types::Operation;

mod eip712 {
    alloy_sol_types::sol! {
        struct SafeTx {
            address to;
            uint256 value;
            bytes data;
            uint8 operation;
            uint256 safeTxGas;
            uint256 baseGas;
            uint256 gasPrice;
            address gasToken;
            address refundReceiver;
            uint256 nonce;
        }
    }
}

/// The fields of a `SafeTx` that vary between transactions.
#[derive(Debug, Clone, Copy)]
pub struct SafeTx<'a> {
    /// Destination.
    pub to: &'a Address,
    /// Amount in wei.
    pub value: &'a WeiAmount,
    /// Raw call data.
    pub data: &'a [u8],
    /// Call or delegatecall.
    pub operation: Operation,
    /// Safe nonce.
    pub nonce: u64,
}

impl SafeTx<'_> {
    fn to_sol(self) -> eip712::SafeTx {
        eip712::SafeTx {
            to: self.to.to_primitive(),
            value: self.value.to_u256(),
            data: Bytes::copy_from_slice(self.data),
            operation: self.operation.as_u8(),
            safeTxGas: U256::ZERO,
            baseGas: U256::ZERO,
            gasPrice: U256::ZERO,
            gasToken: PrimitiveAddress::ZERO,
            refundReceiver: PrimitiveAddress::ZERO,
            nonce: U256::from(self.nonce),
        }
    }
}

/// EIP-712 domain of a Safe on `chain_id`: chain id and verifying contract,
/// no name, version or salt.
pub fn domain(chain_id: u64, safe: &Address) -> Eip712Domain {
    Eip712Domain::new(
        None,
        None,
        Some(U256::from(chain_id)),
        Some(safe.to_primitive()),
        None,
    )
}

/// EIP-712 domain separator for a Safe on `chain_id`.
pub fn domain_separator(chain_id: u64, safe: &Address) -> B256 {
    domain(chain_id, safe).separator()
}

/// EIP-712 struct hash of `tx`.
pub fn struct_hash(tx: &SafeTx<'_>) -> B256 {
    tx.to_sol().eip712_hash_struct()
}

/// The hash owners sign to approve `tx` on the Safe at `safe`.
pub fn safe_tx_hash(chain_id: u64, safe: &Address, tx: &SafeTx<'_>) -> TxHash {
    TxHash::from(tx.to_sol().eip712_signing_hash(&domain(chain_id, safe)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CHAIN_ID_MAINNET, CHAIN_ID_SEPOLIA, DOMAIN_SEPARATOR_TYPE, SAFE_TX_TYPE};
    use crate::safe::decoder::ConfigChange;
    use alloy_primitives::keccak256;

    fn fixed(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn word(bytes: &[u8]) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(bytes);
        out
    }

    #[test]
    fn ether_transfer_hash() {
        let value = WeiAmount::parse("value", "1000000000000000000").unwrap();
        let tx = SafeTx {
            to: &fixed(0x22),
            value: &value,
            data: &[],
            operation: Operation::Call,
            nonce: 0,
        };
        assert_eq!(
            safe_tx_hash(CHAIN_ID_MAINNET, &fixed(0x11), &tx).to_string(),
            "0x8cd8fe6e0e307b5a96de2dedfdb14614a9e62c0cca1377a6ee2de554d15ba4ec"
        );
    }

    #[test]
    fn change_threshold_hash() {
        let data = ConfigChange::ChangeThreshold { threshold: 2 }.encode();
        let value = WeiAmount::zero();
        let tx = SafeTx {
            to: &fixed(0x22),
            value: &value,
            data: &data,
            operation: Operation::Call,
            nonce: 5,
        };
        assert_eq!(
            safe_tx_hash(CHAIN_ID_SEPOLIA, &fixed(0x11), &tx).to_string(),
            "0xc6e8b7b8976c680da6e78c98ff72998529bd8b9b7f87019177c571ae95f0b5ab"
        );
    }

    #[test]
    fn type_strings_match_the_safe_contract() {
        assert_eq!(eip712::SafeTx::eip712_encode_type(), SAFE_TX_TYPE);

        let mut preimage = keccak256(DOMAIN_SEPARATOR_TYPE.as_bytes()).to_vec();
        preimage.extend_from_slice(&word(&CHAIN_ID_SEPOLIA.to_be_bytes()));
        preimage.extend_from_slice(&word(&fixed(0x11).to_bytes()));
        assert_eq!(
            domain_separator(CHAIN_ID_SEPOLIA, &fixed(0x11)),
            keccak256(&preimage)
        );
    }

    #[test]
    fn hash_is_bound_to_chain_and_safe() {
        let value = WeiAmount::zero();
        let tx = SafeTx {
            to: &fixed(0x22),
            value: &value,
            data: &[],
            operation: Operation::Call,
            nonce: 0,
        };
        let base = safe_tx_hash(CHAIN_ID_MAINNET, &fixed(0x11), &tx);
        assert_ne!(base, safe_tx_hash(CHAIN_ID_SEPOLIA, &fixed(0x11), &tx));
        assert_ne!(base, safe_tx_hash(CHAIN_ID_MAINNET, &fixed(0x33), &tx));
        assert_ne!(struct_hash(&tx), B256::ZERO);
    }
}
