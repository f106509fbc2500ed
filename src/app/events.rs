//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, mirror to a console,
//! count them in a test.

use crate::error::{ProvisionError, SendError};
use crate::model::message::StatusMessage;
use crate::model::transition::TransitionTime;

use super::onoff::SetOutcome;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started; carries the initial output level.
    Started { value: bool },

    /// The physical output was driven to a new level.
    OutputChanged(bool),

    /// A Set was accepted and scheduled.
    SetAccepted {
        value: bool,
        tid: u8,
        src: u16,
        transition: TransitionTime,
        delay_ms: u32,
    },

    /// A well-formed Set was dropped (retransmission, no-op or own echo).
    SetIgnored { src: u16, tid: u8, outcome: SetOutcome },

    /// The client heard a Status from another node.
    StatusReceived { src: u16, status: StatusMessage },

    /// The client broadcast a Set Unacknowledged.
    SetSent { value: bool, tid: u8 },

    /// The node is provisioned and both models are bound.
    Provisioned { address: u16 },

    /// Bindings re-established from a stored provisioning record.
    Restored { address: u16 },

    /// Self-provisioning failed; the node stays unprovisioned.
    ProvisioningFailed(ProvisionError),

    /// A client send was refused.
    SendFailed(SendError),

    /// Provisioning data was wiped; the node is unprovisioned again.
    Unprovisioned,

    /// Attention state changed.
    Attention(bool),

    /// Output OOB number to show the person operating the provisioner.
    OobNumber(u32),
}
