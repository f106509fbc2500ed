//! Loopback mesh stack.
//!
//! Implements [`MeshTransport`] without a radio.  It keeps the same
//! bookkeeping a real stack would (provisioning record, application keys)
//! and persists it through [`StoragePort`], so warm starts behave as on
//! hardware.  Outbound access messages are framed into an outbox; on
//! [`deliver`](LoopbackMesh::deliver) frames addressed to us or to all
//! nodes are handed back to the local models, the rest are logged as
//! transmitted.  A remote node can be imitated with
//! [`inject`](LoopbackMesh::inject).
//!
//! ```text
//!   NodeService ──send──▶ outbox ──deliver──▶ Mailbox ──▶ NodeService
//!                                   │
//!                                   └─▶ "TX" log (unicast to others)
//! ```

use heapless::{Deque, Vec};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{MeshTransport, StorageError, StoragePort};
use crate::error::TransportError;
use crate::events::{InboundMessage, Mailbox, NodeEvent};
use crate::model::opcode::{Opcode, encode_access, parse_access};
use crate::model::{ADDR_ALL_NODES, MAX_ACCESS_PAYLOAD, MessageContext, ModelKind, is_unicast};

const STORE_NAMESPACE: &str = "mesh";
const STORE_KEY: &str = "prov";

/// Application keys the stack can hold.
pub const MAX_APP_KEYS: usize = 2;

/// Outbound frames buffered between deliveries.
pub const OUTBOX_DEPTH: usize = 8;

/// Longest access PDU: 3-octet opcode plus payload.
pub const MAX_PDU: usize = 3 + MAX_ACCESS_PAYLOAD;

/// Decimal digits of the displayed output OOB number.
pub const OOB_OUTPUT_DIGITS: u32 = 4;

/// `-EINVAL`, as the stack reports a rejected argument.
const EINVAL: i32 = -22;
/// `-EEXIST`, for a conflicting key at an occupied index.
const EEXIST: i32 = -17;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AppKeyEntry {
    net_idx: u16,
    app_idx: u16,
    key: [u8; 16],
}

/// What the stack persists once provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ProvisioningRecord {
    address: u16,
    net_idx: u16,
    flags: u8,
    iv_index: u32,
    net_key: [u8; 16],
    dev_key: [u8; 16],
    app_keys: Vec<AppKeyEntry, MAX_APP_KEYS>,
}

impl ProvisioningRecord {
    fn has_app_key(&self, app_idx: u16) -> bool {
        self.app_keys.iter().any(|k| k.app_idx == app_idx)
    }
}

/// One framed outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub model: ModelKind,
    /// `src` is filled with our address.
    pub ctx: MessageContext,
    pub pdu: Vec<u8, MAX_PDU>,
}

/// Failures the next call to a primitive should report (tests, simulator).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultInjection {
    pub provision: Option<TransportError>,
    pub add_app_key: Option<TransportError>,
    pub send: Option<TransportError>,
}

#[derive(Default)]
pub struct LoopbackMesh {
    record: Option<ProvisioningRecord>,
    outbox: Deque<Frame, OUTBOX_DEPTH>,
    dirty: bool,
    /// Advertised in the unprovisioned beacon.
    uuid: [u8; 16],
    pub faults: FaultInjection,
}

impl LoopbackMesh {
    /// Unprovisioned stack with nothing stored.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the stack from `storage`.  A missing or unreadable record
    /// gives an unprovisioned stack.
    pub fn load(storage: &impl StoragePort) -> Self {
        let mut buf = [0u8; 128];
        let record = match storage.read(STORE_NAMESPACE, STORE_KEY, &mut buf) {
            Ok(n) => match postcard::from_bytes::<ProvisioningRecord>(&buf[..n]) {
                Ok(rec) => {
                    info!("mesh: restored provisioning record, addr 0x{:04x}", rec.address);
                    Some(rec)
                }
                Err(_) => {
                    warn!("mesh: stored provisioning record corrupted, ignoring");
                    None
                }
            },
            Err(StorageError::NotFound) => None,
            Err(e) => {
                warn!("mesh: reading provisioning record failed: {}", e);
                None
            }
        };
        Self {
            record,
            ..Self::default()
        }
    }

    /// Write the record (or its absence) back if anything changed.
    pub fn persist(&mut self, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        if !self.dirty {
            return Ok(());
        }
        match &self.record {
            Some(rec) => {
                let mut buf = [0u8; 128];
                let bytes = postcard::to_slice(rec, &mut buf).map_err(|_| StorageError::Full)?;
                storage.write(STORE_NAMESPACE, STORE_KEY, bytes)?;
                debug!("mesh: provisioning record stored ({} bytes)", bytes.len());
            }
            None => storage.delete(STORE_NAMESPACE, STORE_KEY)?,
        }
        self.dirty = false;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_device_uuid(&mut self, uuid: [u8; 16]) {
        self.uuid = uuid;
    }

    /// UUID carried by the unprovisioned device beacon, `None` once
    /// provisioned (no beacon is sent then).
    pub fn beacon_uuid(&self) -> Option<&[u8; 16]> {
        self.record.is_none().then_some(&self.uuid)
    }

    fn log_beacon(&self) {
        if let Some(uuid) = self.beacon_uuid() {
            info!("mesh: unprovisioned beacon, uuid {:02x?}", uuid);
        }
    }

    /// Tell the node the stack is up.
    pub fn announce_ready(&self, mailbox: &Mailbox) {
        self.log_beacon();
        mailbox.post(NodeEvent::TransportReady);
    }

    /// Number shown for output OOB authentication with `address`.
    pub fn oob_number(&self, address: u16) -> u32 {
        let seed = u32::from_le_bytes([self.uuid[0], self.uuid[1], self.uuid[2], self.uuid[3]]);
        (seed ^ u32::from(address)) % 10u32.pow(OOB_OUTPUT_DIGITS)
    }

    /// Imitate an external provisioner: attention on, display the OOB
    /// number, install keys and `address`, attention off, then raise the
    /// completion callback.
    pub fn provision_external(
        &mut self,
        mailbox: &Mailbox,
        net_key: &[u8; 16],
        app_key: &[u8; 16],
        address: u16,
    ) -> Result<(), TransportError> {
        let net_idx = 0;
        mailbox.post(NodeEvent::Attention(true));
        mailbox.post(NodeEvent::OutputOob { number: self.oob_number(address) });
        let result = self
            .provision(net_key, net_idx, 0, 0, address)
            .and_then(|_| self.add_app_key(net_idx, 0, app_key));
        mailbox.post(NodeEvent::Attention(false));
        result?;
        mailbox.post(NodeEvent::ProvisionComplete { net_idx, address });
        Ok(())
    }

    /// Forget the provisioning record and raise the reset callback.
    pub fn factory_reset(&mut self, mailbox: &Mailbox) {
        self.reset();
        self.log_beacon();
        mailbox.post(NodeEvent::ProvisionReset);
    }

    /// Frames not yet delivered.
    pub fn outbox(&self) -> impl Iterator<Item = &Frame> {
        self.outbox.iter()
    }

    /// Hand queued frames to the local node where addressed.  Returns how
    /// many were looped back.
    pub fn deliver(&mut self, mailbox: &Mailbox) -> usize {
        let mut looped = 0;
        while let Some(frame) = self.outbox.pop_front() {
            let Some(own) = self.primary_address() else {
                continue;
            };
            if frame.ctx.dst != ADDR_ALL_NODES && frame.ctx.dst != own {
                info!(
                    "mesh: TX 0x{:04x} -> 0x{:04x} ({} bytes)",
                    frame.ctx.src,
                    frame.ctx.dst,
                    frame.pdu.len()
                );
                continue;
            }
            let Ok((opcode, payload)) = parse_access(&frame.pdu) else {
                continue;
            };
            if let Some(msg) = InboundMessage::new(frame.ctx, opcode, payload) {
                if mailbox.post(NodeEvent::Inbound(msg)) {
                    looped += 1;
                }
            }
        }
        looped
    }

    /// Imitate a PDU arriving over the air from `src`.  Dropped (as the
    /// network layer would) unless we hold `app_idx` and are addressed.
    pub fn inject(
        &self,
        mailbox: &Mailbox,
        src: u16,
        dst: u16,
        app_idx: u16,
        pdu: &[u8],
    ) -> bool {
        let Some(rec) = &self.record else {
            debug!("mesh: unprovisioned, dropping PDU from 0x{:04x}", src);
            return false;
        };
        if !rec.has_app_key(app_idx) {
            debug!("mesh: no app key 0x{:03x}, dropping PDU from 0x{:04x}", app_idx, src);
            return false;
        }
        if dst != ADDR_ALL_NODES && dst != rec.address {
            return false;
        }
        let Ok((opcode, payload)) = parse_access(pdu) else {
            return false;
        };
        let ctx = MessageContext { src, dst, app_idx, ttl: 5 };
        InboundMessage::new(ctx, opcode, payload)
            .is_some_and(|msg| mailbox.post(NodeEvent::Inbound(msg)))
    }

    /// Deterministic stand-in for the device key a real stack derives.
    fn derive_dev_key(net_key: &[u8; 16], address: u16) -> [u8; 16] {
        let mut key = *net_key;
        let addr = address.to_le_bytes();
        for (i, b) in key.iter_mut().enumerate() {
            *b = b.rotate_left(3) ^ addr[i % 2] ^ (i as u8);
        }
        key
    }
}

impl MeshTransport for LoopbackMesh {
    fn provision(
        &mut self,
        net_key: &[u8; 16],
        net_idx: u16,
        flags: u8,
        iv_index: u32,
        address: u16,
    ) -> Result<[u8; 16], TransportError> {
        if let Some(e) = self.faults.provision.take() {
            return Err(e);
        }
        if self.record.is_some() {
            return Err(TransportError::AlreadyProvisioned);
        }
        if !is_unicast(address) {
            return Err(TransportError::Stack(EINVAL));
        }
        let dev_key = Self::derive_dev_key(net_key, address);
        self.record = Some(ProvisioningRecord {
            address,
            net_idx,
            flags,
            iv_index,
            net_key: *net_key,
            dev_key,
            app_keys: Vec::new(),
        });
        self.dirty = true;
        info!("mesh: provisioned addr 0x{:04x}", address);
        Ok(dev_key)
    }

    fn add_app_key(&mut self, net_idx: u16, app_idx: u16, key: &[u8; 16])
        -> Result<(), TransportError> {
        if let Some(e) = self.faults.add_app_key.take() {
            return Err(e);
        }
        let rec = self.record.as_mut().ok_or(TransportError::NotReady)?;
        if rec.net_idx != net_idx {
            return Err(TransportError::Stack(EINVAL));
        }
        if let Some(existing) = rec.app_keys.iter().find(|k| k.app_idx == app_idx) {
            // Re-adding the same key is accepted, as the stack does.
            return if existing.key == *key {
                Ok(())
            } else {
                Err(TransportError::Stack(EEXIST))
            };
        }
        rec.app_keys
            .push(AppKeyEntry { net_idx, app_idx, key: *key })
            .map_err(|_| TransportError::NoBuffers)?;
        self.dirty = true;
        Ok(())
    }

    fn send(
        &mut self,
        model: ModelKind,
        ctx: &MessageContext,
        opcode: Opcode,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if let Some(e) = self.faults.send.take() {
            return Err(e);
        }
        let rec = self.record.as_ref().ok_or(TransportError::NotReady)?;
        if !rec.has_app_key(ctx.app_idx) {
            return Err(TransportError::Stack(EINVAL));
        }

        let mut raw = [0u8; MAX_PDU];
        let len = encode_access(opcode.value(), payload, &mut raw)
            .ok_or(TransportError::Stack(EINVAL))?;
        let frame = Frame {
            model,
            ctx: MessageContext { src: rec.address, ..*ctx },
            pdu: Vec::from_slice(&raw[..len]).map_err(|_| TransportError::Stack(EINVAL))?,
        };
        debug!(
            "mesh: queue {} 0x{:04x} -> 0x{:04x}",
            opcode.name(),
            frame.ctx.src,
            frame.ctx.dst
        );
        self.outbox.push_back(frame).map_err(|_| TransportError::NoBuffers)
    }

    fn is_provisioned(&self) -> bool {
        self.record.is_some()
    }

    fn primary_address(&self) -> Option<u16> {
        self.record.as_ref().map(|r| r.address)
    }

    fn reset(&mut self) {
        if self.record.take().is_some() {
            self.dirty = true;
            info!("mesh: provisioning data cleared");
        }
        self.outbox.clear();
    }
}
