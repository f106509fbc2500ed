//! Unified error types for the meshswitch firmware.
//!
//! Each subsystem has a small `Copy` error enum; all of them convert into
//! the top-level [`Error`] so the event loop can log failures uniformly.
//! None of these are retried automatically.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An inbound payload could not be decoded.
    Decode(DecodeError),
    /// An outbound model message could not be sent.
    Send(SendError),
    /// The provisioning sequence aborted.
    Provision(ProvisionError),
    /// A mesh stack primitive failed.
    Transport(TransportError),
    /// A hardware collaborator failed.
    Hardware(HwError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Send(e) => write!(f, "send: {e}"),
            Self::Provision(e) => write!(f, "provision: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Hardware(e) => write!(f, "hardware: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Decode errors (malformed inbound messages)
// ---------------------------------------------------------------------------

/// Why an inbound payload was rejected.  Malformed messages are dropped
/// silently: no reply, no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload shorter than the opcode's mandatory fields.
    TooShort { expected: usize, actual: usize },
    /// Payload length matches no valid layout for the opcode.
    BadLength(usize),
    /// OnOff value other than 0 or 1.
    InvalidValue(u8),
    /// Transition Time with the "unknown" step count in a Set.
    ProhibitedTransition,
    /// Opcode octets missing or reserved.
    InvalidOpcode,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { expected, actual } => {
                write!(f, "payload too short ({actual} < {expected} bytes)")
            }
            Self::BadLength(len) => write!(f, "unexpected payload length {len}"),
            Self::InvalidValue(v) => write!(f, "invalid OnOff value 0x{v:02x}"),
            Self::ProhibitedTransition => write!(f, "unknown transition time in Set"),
            Self::InvalidOpcode => write!(f, "invalid opcode"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failure reported by a mesh stack primitive.  The `i32` is the stack's
/// native error code (negative errno on Zephyr, `esp_err_t` on ESP-IDF).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The stack is not initialised yet.
    NotReady,
    /// The node is already provisioned.
    AlreadyProvisioned,
    /// Outbound buffers exhausted.
    NoBuffers,
    /// Any other stack-specific failure.
    Stack(i32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "mesh stack not ready"),
            Self::AlreadyProvisioned => write!(f, "already provisioned"),
            Self::NoBuffers => write!(f, "no buffers available"),
            Self::Stack(rc) => write!(f, "stack error (rc={rc})"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Send errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The sending model has no application key bound; nothing was sent.
    Unbound,
    /// The transport refused the message.
    Transport(TransportError),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => write!(f, "model must be bound to an application key before sending"),
            Self::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl From<TransportError> for SendError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<SendError> for Error {
    fn from(e: SendError) -> Self {
        Self::Send(e)
    }
}

// ---------------------------------------------------------------------------
// Provisioning errors
// ---------------------------------------------------------------------------

/// A failed provisioning step.  Fatal for the boot cycle: the node stays
/// unprovisioned and no model is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionError {
    /// Step 1: the stack rejected the network key / address.
    Provision(TransportError),
    /// Step 2: the stack rejected the application key.
    AppKeyAdd(TransportError),
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provision(e) => write!(f, "provisioning failed: {e}"),
            Self::AppKeyAdd(e) => write!(f, "app key add failed: {e}"),
        }
    }
}

impl From<ProvisionError> for Error {
    fn from(e: ProvisionError) -> Self {
        Self::Provision(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwError {
    /// No unique-ID source on this board (or it failed to read).
    UniqueIdUnavailable,
    /// GPIO configuration or access failed.
    Gpio(i32),
}

impl fmt::Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UniqueIdUnavailable => write!(f, "unique ID unavailable"),
            Self::Gpio(rc) => write!(f, "GPIO error (rc={rc})"),
        }
    }
}

impl From<HwError> for Error {
    fn from(e: HwError) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
