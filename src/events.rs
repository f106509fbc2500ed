//! Node mailbox.
//!
//! Events are produced by:
//! - the mesh stack (ready, inbound access messages, provisioning callbacks)
//! - the button ISR (debounced press)
//! - the event loop itself (timer deadline reached)
//!
//! and consumed one at a time, in FIFO order, by the event loop that owns
//! the [`NodeService`](crate::app::service::NodeService).  All state
//! mutation happens on that single consumer, so the service needs no locks.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Mesh stack  │────▶│              │     │              │
//! │ Button ISR  │────▶│   Mailbox    │────▶│  Event loop  │
//! │ Timer       │────▶│  (bounded)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::model::MessageContext;
use crate::model::message::Payload;

/// Mailbox depth.  A burst larger than this drops the newest event.
pub const MAILBOX_DEPTH: usize = 16;

/// A decrypted access message as handed up by the mesh stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub ctx: MessageContext,
    /// Raw opcode; unknown values are dropped by the dispatcher.
    pub opcode: u32,
    pub payload: Payload,
}

impl InboundMessage {
    /// Copy `payload` into a message.  Returns `None` if it does not fit
    /// an unsegmented access payload.
    pub fn new(ctx: MessageContext, opcode: u32, payload: &[u8]) -> Option<Self> {
        Some(Self {
            ctx,
            opcode,
            payload: Payload::from_slice(payload).ok()?,
        })
    }
}

/// Everything the event loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// The mesh stack finished initialising (provisioning record loaded).
    TransportReady,
    Inbound(InboundMessage),
    /// The one-shot deadline was reached.
    TimerFired,
    /// Debounced button press.
    ButtonPressed,
    /// An external provisioner (or the stack itself) completed provisioning.
    ProvisionComplete { net_idx: u16, address: u16 },
    /// Provisioning data was wiped.
    ProvisionReset,
    /// Health Server attention timer started (`true`) or expired (`false`).
    Attention(bool),
    /// The provisioner asked us to display an output OOB number.
    OutputOob { number: u32 },
}

/// Bounded multi-producer queue feeding the single consumer.
pub struct Mailbox {
    channel: Channel<CriticalSectionRawMutex, NodeEvent, MAILBOX_DEPTH>,
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue an event.  Safe from any context that may take a critical
    /// section.  Returns `false` if the mailbox is full (event dropped).
    pub fn post(&self, event: NodeEvent) -> bool {
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                warn!("mailbox full, event dropped");
                false
            }
        }
    }

    /// Dequeue the oldest event.
    pub fn next(&self) -> Option<NodeEvent> {
        self.channel.try_receive().ok()
    }

    /// Drain all pending events into a callback, in FIFO order.
    /// Returns how many were handled.
    pub fn drain(&self, mut handler: impl FnMut(NodeEvent)) -> usize {
        let mut n = 0;
        while let Some(event) = self.next() {
            handler(event);
            n += 1;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// The node's mailbox, reachable from stack callbacks and ISRs.
pub static NODE_MAILBOX: Mailbox = Mailbox::new();
