//! Mock adapters for integration tests.
//!
//! Records every transport and output call so tests can assert on the full
//! history without a radio or real GPIO.

use meshswitch::app::events::AppEvent;
use meshswitch::app::ports::{EventSink, MeshTransport, OutputPort, UniqueIdPort};
use meshswitch::error::{HwError, TransportError};
use meshswitch::events::{InboundMessage, NodeEvent};
use meshswitch::model::opcode::Opcode;
use meshswitch::model::{MessageContext, ModelKind};

// ── Transport call record ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Provision { net_idx: u16, address: u16 },
    AddAppKey { net_idx: u16, app_idx: u16 },
    Send {
        model: ModelKind,
        dst: u16,
        app_idx: u16,
        opcode: Opcode,
        payload: Vec<u8>,
    },
    Reset,
}

// ── MockMesh ──────────────────────────────────────────────────

pub struct MockMesh {
    pub calls: Vec<TransportCall>,
    address: Option<u16>,
    pub fail_provision: Option<TransportError>,
    pub fail_app_key: Option<TransportError>,
    pub fail_send: Option<TransportError>,
}

#[allow(dead_code)]
impl MockMesh {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            address: None,
            fail_provision: None,
            fail_app_key: None,
            fail_send: None,
        }
    }

    /// A stack that restored a provisioning record from flash.
    pub fn restored(address: u16) -> Self {
        Self {
            address: Some(address),
            ..Self::new()
        }
    }

    /// Every `Send` call as `(opcode, dst, payload)`.
    pub fn sent(&self) -> Vec<(Opcode, u16, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Send {
                    opcode,
                    dst,
                    payload,
                    ..
                } => Some((*opcode, *dst, payload.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn last_sent(&self) -> Option<(Opcode, u16, Vec<u8>)> {
        self.sent().pop()
    }
}

impl Default for MockMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshTransport for MockMesh {
    fn provision(
        &mut self,
        _net_key: &[u8; 16],
        net_idx: u16,
        _flags: u8,
        _iv_index: u32,
        address: u16,
    ) -> Result<[u8; 16], TransportError> {
        self.calls.push(TransportCall::Provision { net_idx, address });
        if let Some(e) = self.fail_provision {
            return Err(e);
        }
        if self.address.is_some() {
            return Err(TransportError::AlreadyProvisioned);
        }
        self.address = Some(address);
        Ok([0xAB; 16])
    }

    fn add_app_key(
        &mut self,
        net_idx: u16,
        app_idx: u16,
        _key: &[u8; 16],
    ) -> Result<(), TransportError> {
        self.calls.push(TransportCall::AddAppKey { net_idx, app_idx });
        match self.fail_app_key {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn send(
        &mut self,
        model: ModelKind,
        ctx: &MessageContext,
        opcode: Opcode,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.calls.push(TransportCall::Send {
            model,
            dst: ctx.dst,
            app_idx: ctx.app_idx,
            opcode,
            payload: payload.to_vec(),
        });
        match self.fail_send {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn is_provisioned(&self) -> bool {
        self.address.is_some()
    }

    fn primary_address(&self) -> Option<u16> {
        self.address
    }

    fn reset(&mut self) {
        self.calls.push(TransportCall::Reset);
        self.address = None;
    }
}

// ── MockOutput ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockOutput {
    pub writes: Vec<bool>,
}

#[allow(dead_code)]
impl MockOutput {
    pub fn level(&self) -> Option<bool> {
        self.writes.last().copied()
    }
}

impl OutputPort for MockOutput {
    fn set_output(&mut self, on: bool) {
        self.writes.push(on);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Unique ids ────────────────────────────────────────────────

pub struct FixedId(pub Vec<u8>);

impl UniqueIdPort for FixedId {
    fn read_unique_id(&mut self, buf: &mut [u8]) -> Result<usize, HwError> {
        let n = self.0.len().min(buf.len());
        buf[..n].copy_from_slice(&self.0[..n]);
        Ok(n)
    }
}

pub struct NoId;

impl UniqueIdPort for NoId {
    fn read_unique_id(&mut self, _buf: &mut [u8]) -> Result<usize, HwError> {
        Err(HwError::UniqueIdUnavailable)
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// An inbound access message from `src` to `dst` under app key 0.
#[allow(dead_code)]
pub fn inbound(src: u16, dst: u16, opcode: Opcode, payload: &[u8]) -> NodeEvent {
    inbound_with_key(src, dst, 0, opcode, payload)
}

#[allow(dead_code)]
pub fn inbound_with_key(src: u16, dst: u16, app_idx: u16, opcode: Opcode, payload: &[u8]) -> NodeEvent {
    let ctx = MessageContext {
        src,
        dst,
        app_idx,
        ttl: 5,
    };
    let msg = InboundMessage::new(ctx, opcode.value(), payload).expect("payload fits");
    NodeEvent::Inbound(msg)
}
