//! Generic OnOff Server and Client.
//!
//! The server owns the node's single [`OnOffState`] and its one-shot
//! timer.  Transitions run as a two-phase schedule, since a binary output
//! has no intermediate levels:
//!
//! ```text
//!            accepted Set (delay > 0)          timer             timer
//!   Idle(v) ─────────────────────────▶ PendingStart ──▶ Transitioning ──▶ Idle(target)
//!      │                                 output = v     output = target   output = target
//!      │  accepted Set (delay = 0)            ▲
//!      └──────────────────────────────────────┼──▶ Transitioning / Idle(target)
//!                                             │
//!               accepted Set while pending: schedule replaced
//! ```
//!
//! Dedupe order matters: a retransmission is recognised by `(tid, src)`
//! before the value comparison, and a no-op Set does not update the
//! recorded transaction.

use log::{debug, info, warn};

use super::ports::{MeshTransport, OutputPort};
use crate::error::{DecodeError, Error, SendError, TransportError};
use crate::model::message::{Layout, SetMessage, StatusMessage, onoff_str};
use crate::model::opcode::Opcode;
use crate::model::transition::TransitionTime;
use crate::model::{
    ADDR_ALL_NODES, ADDR_UNASSIGNED, KeyBinding, KeySlot, MessageContext, ModelKind, TTL_DEFAULT,
};
use crate::scheduler::OneShotTimer;

// ───────────────────────────────────────────────────────────────
// State
// ───────────────────────────────────────────────────────────────

/// Where the server is in its transition schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    /// Output equals `value`, nothing armed.
    Idle,
    /// Waiting out the start delay; output still shows the old value.
    PendingStart,
    /// Output already shows the target; timer marks the end of the transition.
    Transitioning,
}

/// Result of feeding a decoded Set to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// New value recorded and scheduled.
    Accepted,
    /// Same `(tid, src)` as the last accepted Set.
    Retransmission,
    /// Requested value already current.
    NoChange,
    /// Set carries our own address in the source-address extension.
    OwnEcho,
}

/// The node-local OnOff state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnOffState {
    /// Current, or target while a transition is outstanding.
    pub value: bool,
    pub last_transaction_id: u8,
    pub last_source_address: u16,
    /// Transition time not yet started, in ms.
    pub transition_ms: u32,
    /// Level last driven onto the physical output.
    present: bool,
    phase: TransitionPhase,
    pending: OneShotTimer,
}

impl OnOffState {
    pub fn new(value: bool) -> Self {
        Self {
            value,
            last_transaction_id: 0,
            last_source_address: ADDR_UNASSIGNED,
            transition_ms: 0,
            present: value,
            phase: TransitionPhase::Idle,
            pending: OneShotTimer::new(),
        }
    }

    pub fn present(&self) -> bool {
        self.present
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    /// Deadline of the armed timer, `None` when no transition is outstanding.
    pub fn pending_deadline(&self) -> Option<u64> {
        self.pending.deadline()
    }

    pub fn is_outstanding(&self) -> bool {
        self.pending.is_armed()
    }
}

impl Default for OnOffState {
    fn default() -> Self {
        Self::new(false)
    }
}

// ───────────────────────────────────────────────────────────────
// Server
// ───────────────────────────────────────────────────────────────

pub struct OnOffServer {
    state: OnOffState,
    layout: Layout,
    keys: KeySlot,
    /// Our unicast address, used for the anti-echo check and Status source.
    own_address: Option<u16>,
}

impl OnOffServer {
    pub fn new(layout: Layout) -> Self {
        Self::with_state(OnOffState::default(), layout)
    }

    pub fn with_state(state: OnOffState, layout: Layout) -> Self {
        Self {
            state,
            layout,
            keys: KeySlot::UNBOUND,
            own_address: None,
        }
    }

    pub fn state(&self) -> &OnOffState {
        &self.state
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn set_own_address(&mut self, address: Option<u16>) {
        self.own_address = address;
    }

    /// Drive the output to the current value (boot / restore).
    pub fn sync_output(&mut self, out: &mut impl OutputPort) {
        self.drive(out, self.state.value);
    }

    /// Decode a Set / Set Unack payload and apply it.
    ///
    /// Malformed payloads return `Err` and leave the state untouched.
    pub fn handle_set(
        &mut self,
        ctx: &MessageContext,
        payload: &[u8],
        now_ms: u64,
        out: &mut impl OutputPort,
    ) -> Result<SetOutcome, DecodeError> {
        let msg = SetMessage::decode(payload, self.layout)?;
        Ok(self.apply_set(ctx.src, &msg, now_ms, out))
    }

    /// Apply an already-decoded Set from `sender`.
    pub fn apply_set(
        &mut self,
        sender: u16,
        msg: &SetMessage,
        now_ms: u64,
        out: &mut impl OutputPort,
    ) -> SetOutcome {
        if msg.source.is_some() && msg.source == self.own_address {
            return SetOutcome::OwnEcho;
        }
        if msg.tid == self.state.last_transaction_id && sender == self.state.last_source_address {
            return SetOutcome::Retransmission;
        }
        if msg.value == self.state.value {
            return SetOutcome::NoChange;
        }

        let delay_ms = msg.delay_ms();
        // Indefinite never gets here: the decoder rejects it for Sets.
        let transition_ms = msg.transition().as_millis().unwrap_or(0);
        info!(
            "set: {} delay: {} ms time: {} ms",
            onoff_str(msg.value),
            delay_ms,
            transition_ms
        );

        self.state.last_transaction_id = msg.tid;
        self.state.last_source_address = sender;
        self.state.value = msg.value;
        self.state.transition_ms = transition_ms;

        if delay_ms == 0 {
            self.advance(now_ms, out);
        } else {
            self.state.pending.arm(now_ms, delay_ms);
            self.state.phase = TransitionPhase::PendingStart;
        }
        SetOutcome::Accepted
    }

    /// Timer callback.  Returns `false` for a stale wake-up (deadline
    /// replaced or not yet due), in which case nothing changes.
    pub fn on_timeout(&mut self, now_ms: u64, out: &mut impl OutputPort) -> bool {
        if !self.state.pending.expire(now_ms) {
            return false;
        }
        self.advance(now_ms, out);
        true
    }

    /// Move one step along the schedule.
    fn advance(&mut self, now_ms: u64, out: &mut impl OutputPort) {
        self.drive(out, self.state.value);
        if self.state.transition_ms > 0 {
            self.state.pending.arm(now_ms, self.state.transition_ms);
            self.state.transition_ms = 0;
            self.state.phase = TransitionPhase::Transitioning;
        } else {
            self.state.pending.clear();
            self.state.phase = TransitionPhase::Idle;
        }
    }

    fn drive(&mut self, out: &mut impl OutputPort, on: bool) {
        out.set_output(on);
        self.state.present = on;
    }

    /// Status as it would be reported at `now_ms`.
    pub fn status(&self, now_ms: u64) -> StatusMessage {
        let remaining = self.remaining_ms(now_ms);
        // A deadline that has passed but not yet fired reports as settled.
        let target = (remaining > 0).then(|| (self.state.value, TransitionTime::Millis(remaining)));
        StatusMessage {
            present: self.state.present,
            source: self.layout.with_source.then(|| self.own_address.unwrap_or(ADDR_UNASSIGNED)),
            target,
        }
    }

    /// Time left until the output settles on `value`, in ms.
    pub fn remaining_ms(&self, now_ms: u64) -> u32 {
        if !self.state.is_outstanding() {
            return 0;
        }
        let remaining =
            self.state.pending.remaining_ms(now_ms) as u64 + self.state.transition_ms as u64;
        remaining.min(u32::MAX as u64) as u32
    }

    /// Send a Status reply for the message received with `ctx`.
    pub fn status_send(
        &self,
        ctx: &MessageContext,
        now_ms: u64,
        transport: &mut impl MeshTransport,
    ) -> Result<(), TransportError> {
        let payload = self.status(now_ms).encode(self.layout);
        transport.send(ModelKind::OnOffServer, &ctx.reply(), Opcode::Status, &payload)
    }

    /// Generic OnOff Get: empty payload, answered with Status.
    pub fn handle_get(
        &self,
        ctx: &MessageContext,
        payload: &[u8],
        now_ms: u64,
        transport: &mut impl MeshTransport,
    ) -> Result<(), Error> {
        if !payload.is_empty() {
            return Err(DecodeError::BadLength(payload.len()).into());
        }
        self.status_send(ctx, now_ms, transport)?;
        Ok(())
    }
}

impl KeyBinding for OnOffServer {
    fn bind_app_key(&mut self, app_idx: u16) {
        self.keys = KeySlot::bound(app_idx);
    }

    fn unbind_app_key(&mut self) {
        self.keys = KeySlot::UNBOUND;
    }

    fn key_slot(&self) -> KeySlot {
        self.keys
    }
}

// ───────────────────────────────────────────────────────────────
// Client
// ───────────────────────────────────────────────────────────────

pub struct OnOffClient {
    next_tid: u8,
    layout: Layout,
    ttl: u8,
    keys: KeySlot,
}

impl OnOffClient {
    pub fn new(layout: Layout, ttl: u8) -> Self {
        Self {
            next_tid: 0,
            layout,
            ttl,
            keys: KeySlot::UNBOUND,
        }
    }

    /// Broadcast a Set Unacknowledged to all nodes.
    ///
    /// Fails with [`SendError::Unbound`] without touching the transport if
    /// no application key is bound.  Returns the transaction id used.
    pub fn send_set_unacknowledged(
        &mut self,
        transport: &mut impl MeshTransport,
        value: bool,
        own_address: Option<u16>,
    ) -> Result<u8, SendError> {
        let ctx = self.broadcast_ctx()?;
        let tid = self.next_tid;
        self.next_tid = self.next_tid.wrapping_add(1);

        let msg = SetMessage {
            value,
            tid,
            source: own_address,
            params: None,
        };
        let payload = msg.encode(self.layout);
        info!(
            "Sending OnOff Set: {} from 0x{:04x}",
            onoff_str(value),
            own_address.unwrap_or(ADDR_UNASSIGNED)
        );
        transport.send(ModelKind::OnOffClient, &ctx, Opcode::SetUnacknowledged, &payload)?;
        Ok(tid)
    }

    /// Ask `dst` for its state; the answer arrives later as a Status.
    pub fn send_get(
        &mut self,
        transport: &mut impl MeshTransport,
        dst: u16,
    ) -> Result<(), SendError> {
        let mut ctx = self.broadcast_ctx()?;
        ctx.dst = dst;
        transport.send(ModelKind::OnOffClient, &ctx, Opcode::Get, &[])?;
        Ok(())
    }

    /// Decode and log a Status.  Purely informational.
    pub fn handle_status(
        &self,
        ctx: &MessageContext,
        payload: &[u8],
    ) -> Result<StatusMessage, DecodeError> {
        let status = StatusMessage::decode(payload, self.layout)?;
        let from = status.source.unwrap_or(ctx.src);
        match status.target {
            Some((target, remaining)) => info!(
                "OnOff status: {} -> {}: ({}) from 0x{:04x}",
                onoff_str(status.present),
                onoff_str(target),
                remaining,
                from
            ),
            None => info!("OnOff status: {} from 0x{:04x}", onoff_str(status.present), from),
        }
        Ok(status)
    }

    fn broadcast_ctx(&self) -> Result<MessageContext, SendError> {
        let Some(app_idx) = self.keys.get() else {
            warn!("The Generic OnOff Client must be bound to a key before sending");
            return Err(SendError::Unbound);
        };
        debug!("client: using app key 0x{:03x}", app_idx);
        Ok(MessageContext {
            src: ADDR_UNASSIGNED,
            dst: ADDR_ALL_NODES,
            app_idx,
            ttl: self.ttl,
        })
    }
}

impl Default for OnOffClient {
    fn default() -> Self {
        Self::new(Layout::STANDARD, TTL_DEFAULT)
    }
}

impl KeyBinding for OnOffClient {
    fn bind_app_key(&mut self, app_idx: u16) {
        self.keys = KeySlot::bound(app_idx);
    }

    fn unbind_app_key(&mut self) {
        self.keys = KeySlot::UNBOUND;
    }

    fn key_slot(&self) -> KeySlot {
        self.keys
    }
}
