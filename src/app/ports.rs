//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (mesh stack, LED, unique-ID source, clock, storage)
//! implement these traits.  The [`NodeService`](super::service::NodeService)
//! consumes them via generics, so the domain core never touches the radio
//! or GPIO directly.

use crate::config::NodeConfig;
use crate::error::{HwError, TransportError};
use crate::model::opcode::Opcode;
use crate::model::{MessageContext, ModelKind};

// ───────────────────────────────────────────────────────────────
// Mesh transport port (driven adapter: domain ↔ mesh stack)
// ───────────────────────────────────────────────────────────────

/// The mesh stack below the access layer.
///
/// Inbound traffic does not go through this trait: the adapter posts
/// already-decrypted messages into the node's
/// [`Mailbox`](crate::events::Mailbox).
pub trait MeshTransport {
    /// Provision the local node with a network key and unicast address.
    /// Returns the device key the stack generated.
    fn provision(
        &mut self,
        net_key: &[u8; 16],
        net_idx: u16,
        flags: u8,
        iv_index: u32,
        address: u16,
    ) -> Result<[u8; 16], TransportError>;

    /// Add an application key bound to the network key `net_idx`.
    fn add_app_key(&mut self, net_idx: u16, app_idx: u16, key: &[u8; 16])
        -> Result<(), TransportError>;

    /// Queue an access message from `model`.  Success means the stack
    /// accepted it, not that anyone received it.
    fn send(
        &mut self,
        model: ModelKind,
        ctx: &MessageContext,
        opcode: Opcode,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Whether the stack holds provisioning data (fresh or restored).
    fn is_provisioned(&self) -> bool;

    /// The node's primary element address, once provisioned.
    fn primary_address(&self) -> Option<u16>;

    /// Drop all provisioning data and return to the unprovisioned state.
    fn reset(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain → actuator)
// ───────────────────────────────────────────────────────────────

/// The physical on/off actuator (LED, relay, ...).
pub trait OutputPort {
    fn set_output(&mut self, on: bool);

    /// Health attention indication.  Defaults to driving the output itself.
    fn set_attention(&mut self, on: bool) {
        self.set_output(on);
    }
}

// ───────────────────────────────────────────────────────────────
// Unique-ID port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Factory-unique identifier (eFuse MAC, chip serial, ...).
pub trait UniqueIdPort {
    /// Fill `buf` with identifier bytes and return how many were written.
    fn read_unique_id(&mut self, buf: &mut [u8]) -> Result<usize, HwError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since boot.
pub trait Clock {
    fn uptime_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST validate before persisting and reject invalid
/// values with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Returns [`NodeConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    fn save(&mut self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (settings layer)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.  Write operations MUST be atomic.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed validation; the message names the field.
    ValidationFailed(&'static str),
    /// Storage backend failure.
    Storage(StorageError),
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}
impl core::error::Error for StorageError {}
