//! Safe contract model: treasury lifecycle, configuration, the owner list
//! and the configuration-change calls that mutate it on-chain.

pub mod configuration;
pub mod decoder;
pub mod signers;
pub mod treasury;

pub use configuration::{
    ApplyOutcome, ConfigChangeMismatch, ConfigViolation, ConfigurationDraft, ThresholdAdjustment,
    ThresholdPolicy, TreasuryConfiguration,
};
pub use decoder::{decode_config_change, decode_config_change_hex, ConfigChange};
pub use signers::SignerSet;
pub use treasury::{Deployment, Treasury, TreasuryStatus};
