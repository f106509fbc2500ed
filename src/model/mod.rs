//! Mesh access-layer vocabulary shared by the OnOff models.
//!
//! ```text
//!   access PDU:  ┌──────────────┬──────────────────────┐
//!                │ opcode (1-3) │ model payload (0-N)  │
//!                └──────────────┴──────────────────────┘
//! ```
//!
//! - [`opcode`]: opcode values and access-PDU framing
//! - [`transition`]: the one-byte Transition Time codec
//! - [`message`]: Generic OnOff Set / Status payload codecs

pub mod message;
pub mod opcode;
pub mod transition;

/// Unassigned address (never a valid source or destination).
pub const ADDR_UNASSIGNED: u16 = 0x0000;

/// Fixed group address reaching every node in the network.
pub const ADDR_ALL_NODES: u16 = 0xFFFF;

/// Unicast addresses live in `0x0001..=0x7FFF`.
pub const UNICAST_MASK: u16 = 0x7FFF;

/// Key-index sentinel for a model slot with no application key bound.
pub const KEY_UNUSED: u16 = 0xFFFF;

/// Network key index used by this single-subnet deployment.
pub const NET_KEY_INDEX: u16 = 0;

/// Application key index used by this single-key deployment.
pub const APP_KEY_INDEX: u16 = 0;

/// TTL value meaning "use the stack's configured default".
pub const TTL_DEFAULT: u8 = 0xFF;

/// Largest access payload (after the opcode) that an unsegmented message carries.
pub const MAX_ACCESS_PAYLOAD: usize = 11;

/// Returns `true` if `addr` is a unicast element address.
pub fn is_unicast(addr: u16) -> bool {
    addr != ADDR_UNASSIGNED && addr & !UNICAST_MASK == 0
}

/// Application-key slot 0 of a model instance.
///
/// Holds [`KEY_UNUSED`] until provisioning binds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySlot(u16);

impl KeySlot {
    pub const UNBOUND: Self = Self(KEY_UNUSED);

    pub const fn bound(app_idx: u16) -> Self {
        Self(app_idx)
    }

    /// Bound application key index, `None` while unbound.
    pub fn get(self) -> Option<u16> {
        (self.0 != KEY_UNUSED).then_some(self.0)
    }

    /// Raw slot value including the [`KEY_UNUSED`] sentinel.
    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn is_bound(self) -> bool {
        self.0 != KEY_UNUSED
    }
}

impl Default for KeySlot {
    fn default() -> Self {
        Self::UNBOUND
    }
}

/// A model instance whose key slot the provisioning controller can bind.
pub trait KeyBinding {
    fn bind_app_key(&mut self, app_idx: u16);
    fn unbind_app_key(&mut self);
    fn key_slot(&self) -> KeySlot;
}

/// The two OnOff model instances hosted on the node's primary element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Generic OnOff Server (SIG model 0x1000).
    OnOffServer,
    /// Generic OnOff Client (SIG model 0x1001).
    OnOffClient,
}

impl ModelKind {
    /// SIG model identifier.
    pub const fn model_id(self) -> u16 {
        match self {
            Self::OnOffServer => 0x1000,
            Self::OnOffClient => 0x1001,
        }
    }
}

/// Addressing metadata that travels next to every access payload.
///
/// Inbound, `src`/`dst` are the sender and the address the message was
/// sent to; outbound, `dst` is the destination and `src` is ignored
/// (the stack fills in the element address).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageContext {
    pub src: u16,
    pub dst: u16,
    pub app_idx: u16,
    pub ttl: u8,
}

impl MessageContext {
    /// Context for a reply to `self`: same key, addressed back to the sender.
    pub fn reply(&self) -> Self {
        Self {
            src: ADDR_UNASSIGNED,
            dst: self.src,
            app_idx: self.app_idx,
            ttl: TTL_DEFAULT,
        }
    }
}
