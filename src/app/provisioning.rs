//! Self-provisioning and key binding.
//!
//! ```text
//!   Unprovisioned ──provision(addr)──▶ NetKeyInstalled ──add_app_key──▶ AppKeyInstalled
//!        ▲   ▲                              │                               │ bind
//!        │   └──────── reset on failure ────┘                               ▼
//!        └──────────────────── ProvisionReset ───────────────────────── Bound
//! ```
//!
//! The three steps always run in that order and stop at the first error.
//! A failed application-key add rolls the stack back so no half-provisioned
//! network key survives.  Binding is local bookkeeping and cannot fail.

use log::{info, warn};

use super::ports::{MeshTransport, UniqueIdPort};
use crate::config::NodeConfig;
use crate::error::ProvisionError;
use crate::model::{ADDR_UNASSIGNED, APP_KEY_INDEX, KeyBinding, NET_KEY_INDEX, UNICAST_MASK};

/// Identity bytes used when the hardware cannot supply a unique id.
pub const PLACEHOLDER_ID: [u8; 2] = [0xDD, 0xDD];

/// Length of the device UUID advertised while unprovisioned.
pub const UUID_LEN: usize = 16;

// ───────────────────────────────────────────────────────────────
// Device identity
// ───────────────────────────────────────────────────────────────

/// Device UUID, seeded from the hardware unique id where available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub uuid: [u8; UUID_LEN],
    /// `false` when the placeholder bytes stand in for a hardware id.
    pub hardware_backed: bool,
}

impl DeviceIdentity {
    /// Read the hardware unique id; falls back to [`PLACEHOLDER_ID`].
    pub fn read(source: &mut impl UniqueIdPort) -> Self {
        let mut uuid = [0u8; UUID_LEN];
        match source.read_unique_id(&mut uuid) {
            Ok(n) if n >= 2 => {
                info!("device id: {:02x}{:02x}.. ({} bytes)", uuid[0], uuid[1], n);
                Self { uuid, hardware_backed: true }
            }
            Ok(n) => {
                warn!("device id: only {} byte(s) available, using placeholder", n);
                Self::placeholder()
            }
            Err(e) => {
                warn!("device id: {}, using placeholder", e);
                Self::placeholder()
            }
        }
    }

    pub fn placeholder() -> Self {
        let mut uuid = [0u8; UUID_LEN];
        uuid[..2].copy_from_slice(&PLACEHOLDER_ID);
        Self { uuid, hardware_backed: false }
    }

    /// Unicast address for self-provisioning.
    ///
    /// Low 15 bits of the first two id bytes read little-endian.  Without a
    /// hardware id the uptime counter is used instead so nodes booted at
    /// different moments still differ.  `0x0000` is bumped to `0x0001`.
    pub fn unicast_address(&self, uptime_ms: u64) -> u16 {
        let raw = if self.hardware_backed {
            u16::from_le_bytes([self.uuid[0], self.uuid[1]])
        } else {
            uptime_ms as u16
        };
        match raw & UNICAST_MASK {
            ADDR_UNASSIGNED => 0x0001,
            addr => addr,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

/// Everything installed by a successful self-provisioning run.
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisioningCredentials {
    pub network_key: [u8; 16],
    pub application_key: [u8; 16],
    pub device_key: [u8; 16],
    pub unicast_address: u16,
    pub application_key_index: u16,
}

// Keys stay out of log output.
impl core::fmt::Debug for ProvisioningCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProvisioningCredentials")
            .field("unicast_address", &format_args!("0x{:04x}", self.unicast_address))
            .field("application_key_index", &self.application_key_index)
            .finish_non_exhaustive()
    }
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct ProvisioningController {
    net_key: [u8; 16],
    app_key: [u8; 16],
    identity: DeviceIdentity,
    credentials: Option<ProvisioningCredentials>,
}

impl ProvisioningController {
    pub fn new(config: &NodeConfig, identity: DeviceIdentity) -> Self {
        Self {
            net_key: config.net_key,
            app_key: config.app_key,
            identity,
            credentials: None,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Credentials from the last successful [`provision`](Self::provision).
    pub fn credentials(&self) -> Option<&ProvisioningCredentials> {
        self.credentials.as_ref()
    }

    /// Provision the local node at `address`, add the application key and
    /// bind every model in `models` to it.
    pub fn provision(
        &mut self,
        transport: &mut impl MeshTransport,
        address: u16,
        models: &mut [&mut dyn KeyBinding],
    ) -> Result<&ProvisioningCredentials, ProvisionError> {
        info!("self-provisioning address 0x{:04x}", address);

        let device_key = transport
            .provision(&self.net_key, NET_KEY_INDEX, 0, 0, address)
            .map_err(|e| {
                warn!("Provisioning failed ({})", e);
                ProvisionError::Provision(e)
            })?;

        if let Err(e) = transport.add_app_key(NET_KEY_INDEX, APP_KEY_INDEX, &self.app_key) {
            warn!("App key add failed ({}), rolling back", e);
            transport.reset();
            return Err(ProvisionError::AppKeyAdd(e));
        }

        bind_all(models, APP_KEY_INDEX);
        info!("Provisioned and configured!");

        Ok(&*self.credentials.insert(ProvisioningCredentials {
            network_key: self.net_key,
            application_key: self.app_key,
            device_key,
            unicast_address: address,
            application_key_index: APP_KEY_INDEX,
        }))
    }

    /// Bind models after an external provisioner finished (or after the
    /// stack restored a stored record).  The stack already holds the keys.
    pub fn bind_existing(&self, address: u16, models: &mut [&mut dyn KeyBinding]) {
        bind_all(models, APP_KEY_INDEX);
        info!("bound to app key {} at 0x{:04x}", APP_KEY_INDEX, address);
    }

    /// Forget everything after a provisioning reset.
    pub fn on_reset(&mut self, models: &mut [&mut dyn KeyBinding]) {
        for m in models.iter_mut() {
            m.unbind_app_key();
        }
        self.credentials = None;
        info!("provisioning reset, models unbound");
    }
}

fn bind_all(models: &mut [&mut dyn KeyBinding], app_idx: u16) {
    for m in models.iter_mut() {
        m.bind_app_key(app_idx);
    }
}
