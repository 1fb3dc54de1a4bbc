//! # Configuration Change Decoder
//!
//! Recognizes Safe self-calls that mutate owners, threshold, modules or the
//! fallback handler, and turns their ABI-encoded arguments into a
//! [`ConfigChange`]. The Safe functions are declared once with `sol!`;
//! selectors, encoding and decoding all come from those declarations.
//!
//! Most transactions are plain transfers, so "unknown selector" is the
//! common case and yields `Ok(None)`. A *known* selector with a payload that
//! cannot be decoded is a [`EngineError::MalformedCallData`]. Call data comes
//! from user proposals, so it gets rejected, never panicked on.
//!
//! | Selector     | Function                                |
//! |--------------|-----------------------------------------|
//! | `0x0d582f13` | `addOwnerWithThreshold(address,uint256)` |
//! | `0xf8dc5dd9` | `removeOwner(address,address,uint256)`  |
//! | `0xe318b52b` | `swapOwner(address,address,address)`    |
//! | `0x694e80c3` | `changeThreshold(uint256)`              |
//! | `0x610b5925` | `enableModule(address)`                 |
//! | `0xe009cfde` | `disableModule(address,address)`        |
//! | `0xf08a0323` | `setFallbackHandler(address)`           |

use std::fmt;

use alloy_primitives::U256;
use alloy_sol_types::{sol, SolCall};
use serde::{Deserialize, Serialize};

use crate::codec::abi::call_data_bytes;
use crate::codec::address::Address;
use crate::config::{ABI_WORD_LENGTH, SELECTOR_LENGTH};
use crate::error::{EngineError, EngineResult};

sol! {
    /// Owner, module and fallback management of the Safe singleton.
    #[derive(Debug, PartialEq, Eq)]
    interface ISafe {
        function addOwnerWithThreshold(address owner, uint256 threshold) external;
        function removeOwner(address prev_owner, address owner, uint256 threshold) external;
        function swapOwner(address prev_owner, address old_owner, address new_owner) external;
        function changeThreshold(uint256 threshold) external;
        function enableModule(address module) external;
        function disableModule(address prev_module, address module) external;
        function setFallbackHandler(address handler) external;
    }
}

use ISafe::{
    addOwnerWithThresholdCall, changeThresholdCall, disableModuleCall, enableModuleCall,
    removeOwnerCall, setFallbackHandlerCall, swapOwnerCall,
};

// ---------------------------------------------------------------------------
// ConfigChange
// ---------------------------------------------------------------------------

/// A decoded configuration-mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigChange {
    /// Link `owner` at the head and set the threshold.
    AddOwner {
        /// New owner.
        owner: Address,
        /// Threshold after the change.
        threshold: u32,
    },
    /// Unlink `owner` (whose predecessor is `prev_owner`) and set the threshold.
    RemoveOwner {
        /// Predecessor in the owner list, or the sentinel.
        prev_owner: Address,
        /// Owner being removed.
        owner: Address,
        /// Threshold after the change.
        threshold: u32,
    },
    /// Replace `old_owner` with `new_owner` in place.
    SwapOwner {
        /// Predecessor of `old_owner`, or the sentinel.
        prev_owner: Address,
        /// Owner being replaced.
        old_owner: Address,
        /// Replacement.
        new_owner: Address,
    },
    /// Set the threshold.
    ChangeThreshold {
        /// New threshold.
        threshold: u32,
    },
    /// Link `module` at the head of the module list.
    EnableModule {
        /// Module being enabled.
        module: Address,
    },
    /// Unlink `module`.
    DisableModule {
        /// Predecessor in the module list, or the sentinel.
        prev_module: Address,
        /// Module being disabled.
        module: Address,
    },
    /// Replace the fallback handler. The zero address clears it.
    SetFallbackHandler {
        /// New handler.
        handler: Address,
    },
}

impl ConfigChange {
    /// The function selector this change is encoded with.
    pub fn selector(&self) -> [u8; 4] {
        match self {
            Self::AddOwner { .. } => addOwnerWithThresholdCall::SELECTOR,
            Self::RemoveOwner { .. } => removeOwnerCall::SELECTOR,
            Self::SwapOwner { .. } => swapOwnerCall::SELECTOR,
            Self::ChangeThreshold { .. } => changeThresholdCall::SELECTOR,
            Self::EnableModule { .. } => enableModuleCall::SELECTOR,
            Self::DisableModule { .. } => disableModuleCall::SELECTOR,
            Self::SetFallbackHandler { .. } => setFallbackHandlerCall::SELECTOR,
        }
    }

    /// Canonical Solidity signature of the call.
    pub fn function_signature(&self) -> &'static str {
        match self {
            Self::AddOwner { .. } => addOwnerWithThresholdCall::SIGNATURE,
            Self::RemoveOwner { .. } => removeOwnerCall::SIGNATURE,
            Self::SwapOwner { .. } => swapOwnerCall::SIGNATURE,
            Self::ChangeThreshold { .. } => changeThresholdCall::SIGNATURE,
            Self::EnableModule { .. } => enableModuleCall::SIGNATURE,
            Self::DisableModule { .. } => disableModuleCall::SIGNATURE,
            Self::SetFallbackHandler { .. } => setFallbackHandlerCall::SIGNATURE,
        }
    }

    /// `true` for changes that touch the owner list.
    pub fn affects_signers(&self) -> bool {
        matches!(
            self,
            Self::AddOwner { .. } | Self::RemoveOwner { .. } | Self::SwapOwner { .. }
        )
    }

    /// ABI-encodes the call, selector included.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::AddOwner { owner, threshold } => addOwnerWithThresholdCall {
                owner: owner.to_primitive(),
                threshold: U256::from(*threshold),
            }
            .abi_encode(),
            Self::RemoveOwner {
                prev_owner,
                owner,
                threshold,
            } => removeOwnerCall {
                prev_owner: prev_owner.to_primitive(),
                owner: owner.to_primitive(),
                threshold: U256::from(*threshold),
            }
            .abi_encode(),
            Self::SwapOwner {
                prev_owner,
                old_owner,
                new_owner,
            } => swapOwnerCall {
                prev_owner: prev_owner.to_primitive(),
                old_owner: old_owner.to_primitive(),
                new_owner: new_owner.to_primitive(),
            }
            .abi_encode(),
            Self::ChangeThreshold { threshold } => changeThresholdCall {
                threshold: U256::from(*threshold),
            }
            .abi_encode(),
            Self::EnableModule { module } => enableModuleCall {
                module: module.to_primitive(),
            }
            .abi_encode(),
            Self::DisableModule {
                prev_module,
                module,
            } => disableModuleCall {
                prev_module: prev_module.to_primitive(),
                module: module.to_primitive(),
            }
            .abi_encode(),
            Self::SetFallbackHandler { handler } => setFallbackHandlerCall {
                handler: handler.to_primitive(),
            }
            .abi_encode(),
        }
    }

    /// [`encode`](Self::encode) as `0x`-prefixed hex.
    pub fn encode_hex(&self) -> String {
        format!("0x{}", hex::encode(self.encode()))
    }
}

impl fmt::Display for ConfigChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddOwner { owner, threshold } => {
                write!(f, "add owner {} (threshold {})", owner, threshold)
            }
            Self::RemoveOwner {
                owner, threshold, ..
            } => write!(f, "remove owner {} (threshold {})", owner, threshold),
            Self::SwapOwner {
                old_owner,
                new_owner,
                ..
            } => write!(f, "swap owner {} for {}", old_owner, new_owner),
            Self::ChangeThreshold { threshold } => write!(f, "change threshold to {}", threshold),
            Self::EnableModule { module } => write!(f, "enable module {}", module),
            Self::DisableModule { module, .. } => write!(f, "disable module {}", module),
            Self::SetFallbackHandler { handler } => write!(f, "set fallback handler {}", handler),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes raw call data.
///
/// Returns `Ok(None)` for payloads shorter than a selector or with a selector
/// we don't recognize. Trailing bytes after the expected arguments are
/// ignored, as the EVM ignores them.
pub fn decode_config_change(data: &[u8]) -> EngineResult<Option<ConfigChange>> {
    let Some(selector) = data
        .get(..SELECTOR_LENGTH)
        .and_then(|head| <[u8; SELECTOR_LENGTH]>::try_from(head).ok())
    else {
        return Ok(None);
    };

    let change = if selector == addOwnerWithThresholdCall::SELECTOR {
        let call: addOwnerWithThresholdCall = decode_call(data, 2)?;
        ConfigChange::AddOwner {
            owner: call.owner.into(),
            threshold: threshold_arg(call.threshold)?,
        }
    } else if selector == removeOwnerCall::SELECTOR {
        let call: removeOwnerCall = decode_call(data, 3)?;
        ConfigChange::RemoveOwner {
            prev_owner: call.prev_owner.into(),
            owner: call.owner.into(),
            threshold: threshold_arg(call.threshold)?,
        }
    } else if selector == swapOwnerCall::SELECTOR {
        let call: swapOwnerCall = decode_call(data, 3)?;
        ConfigChange::SwapOwner {
            prev_owner: call.prev_owner.into(),
            old_owner: call.old_owner.into(),
            new_owner: call.new_owner.into(),
        }
    } else if selector == changeThresholdCall::SELECTOR {
        let call: changeThresholdCall = decode_call(data, 1)?;
        ConfigChange::ChangeThreshold {
            threshold: threshold_arg(call.threshold)?,
        }
    } else if selector == enableModuleCall::SELECTOR {
        let call: enableModuleCall = decode_call(data, 1)?;
        ConfigChange::EnableModule {
            module: call.module.into(),
        }
    } else if selector == disableModuleCall::SELECTOR {
        let call: disableModuleCall = decode_call(data, 2)?;
        ConfigChange::DisableModule {
            prev_module: call.prev_module.into(),
            module: call.module.into(),
        }
    } else if selector == setFallbackHandlerCall::SELECTOR {
        let call: setFallbackHandlerCall = decode_call(data, 1)?;
        ConfigChange::SetFallbackHandler {
            handler: call.handler.into(),
        }
    } else {
        return Ok(None);
    };

    Ok(Some(change))
}

/// Decodes `0x`-prefixed hex call data.
pub fn decode_config_change_hex(data: &str) -> EngineResult<Option<ConfigChange>> {
    let bytes = call_data_bytes(data)?;
    decode_config_change(&bytes)
}

/// Strict decode of a call with `words` static arguments. Dirty address
/// padding is rejected; bytes past the last argument are dropped first.
fn decode_call<C: SolCall>(data: &[u8], words: usize) -> EngineResult<C> {
    let end = SELECTOR_LENGTH + words * ABI_WORD_LENGTH;
    let body = data.get(..end).unwrap_or(data);
    C::abi_decode(body, true)
        .map_err(|e| EngineError::malformed(format!("{}: {}", C::SIGNATURE, e)))
}

/// Thresholds are `uint256` on the wire but always fit in 32 bits.
fn threshold_arg(value: U256) -> EngineResult<u32> {
    u32::try_from(value).map_err(|_| {
        EngineError::malformed(format!("threshold {} does not fit in 32 bits", value))
    })
}
