//! Node configuration parameters
//!
//! Tunables for the OnOff node.  Persisted as postcard in NVS on the
//! device; the host simulator may also read a JSON file.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::model::TTL_DEFAULT;
use crate::model::message::Layout;

/// Network key shared by every self-provisioned node in the deployment.
pub const DEFAULT_NET_KEY: [u8; 16] = [
    0xd2, 0xa0, 0xe7, 0x8a, 0x12, 0xd0, 0xf6, 0xc9, 0xa2, 0xb8, 0xe9, 0x38, 0xdb, 0xe4, 0xf5, 0x7c,
];

/// Application key shared by every self-provisioned node in the deployment.
pub const DEFAULT_APP_KEY: [u8; 16] = [
    0x3c, 0xde, 0x18, 0xe7, 0xe3, 0xa2, 0xc5, 0x6e, 0x8d, 0x6a, 0x1b, 0x0a, 0x7b, 0x20, 0xd2, 0xa5,
];

/// How the node joins the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProvisioningMode {
    /// Self-provision on the first button press.
    #[default]
    SelfOnButton,
    /// Self-provision as soon as the stack reports ready.
    SelfOnReady,
    /// Wait for an external provisioner; bind in the completion callback.
    Assisted,
}

impl ProvisioningMode {
    pub fn self_provisioning(self) -> bool {
        !matches!(self, Self::Assisted)
    }
}

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub provisioning: ProvisioningMode,
    /// Append our unicast address to Set / Status payloads.
    pub include_source_address: bool,
    pub net_key: [u8; 16],
    pub app_key: [u8; 16],
    /// TTL for client messages (0xFF = stack default)
    pub default_ttl: u8,
    /// Button debounce window (milliseconds)
    pub button_debounce_ms: u32,
    /// Upper bound on the event loop sleep (milliseconds)
    pub idle_poll_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            provisioning: ProvisioningMode::SelfOnButton,
            include_source_address: false,
            net_key: DEFAULT_NET_KEY,
            app_key: DEFAULT_APP_KEY,
            default_ttl: TTL_DEFAULT,
            button_debounce_ms: 50,
            idle_poll_ms: 20,
        }
    }
}

impl NodeConfig {
    /// Payload layout implied by `include_source_address`.
    pub fn layout(&self) -> Layout {
        Layout {
            with_source: self.include_source_address,
        }
    }

    /// Reject out-of-range values instead of clamping them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.net_key == [0; 16] {
            return Err(ConfigError::ValidationFailed("net_key must not be all zero"));
        }
        if self.app_key == [0; 16] {
            return Err(ConfigError::ValidationFailed("app_key must not be all zero"));
        }
        // TTL 1 is prohibited for sends; 0x80..=0xFE are reserved.
        if self.default_ttl == 1 || (0x80..0xFF).contains(&self.default_ttl) {
            return Err(ConfigError::ValidationFailed(
                "default_ttl must be 0, 2–127 or 255",
            ));
        }
        if !(5..=500).contains(&self.button_debounce_ms) {
            return Err(ConfigError::ValidationFailed(
                "button_debounce_ms must be 5–500",
            ));
        }
        if !(1..=1000).contains(&self.idle_poll_ms) {
            return Err(ConfigError::ValidationFailed("idle_poll_ms must be 1–1000"));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }
}
