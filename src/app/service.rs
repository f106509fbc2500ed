//! Node service, the hexagonal core.
//!
//! [`NodeService`] owns the OnOff Server and Client and the provisioning
//! controller.  It exposes a clean, hardware-agnostic API.  All I/O flows
//! through port traits injected at call sites, making the entire service
//! testable with mock adapters.
//!
//! ```text
//!   Mailbox ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!               │        NodeService        │
//! MeshTransport◀│ Server · Client · Provis. │──▶ OutputPort
//!               └──────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::config::{NodeConfig, ProvisioningMode};
use crate::events::{InboundMessage, Mailbox, NodeEvent};
use crate::model::message::SetMessage;
use crate::model::opcode::Opcode;
use crate::model::{KeyBinding, ModelKind};

use super::commands::NodeCommand;
use super::events::AppEvent;
use super::onoff::{OnOffClient, OnOffServer, SetOutcome};
use super::ports::{EventSink, MeshTransport, OutputPort};
use super::provisioning::{DeviceIdentity, ProvisioningController};

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

/// The node service orchestrates all domain logic.
pub struct NodeService {
    mode: ProvisioningMode,
    server: OnOffServer,
    client: OnOffClient,
    provisioning: ProvisioningController,
    /// Primary element address once provisioned.
    address: Option<u16>,
}

impl NodeService {
    /// Construct the service from configuration.
    ///
    /// Does **not** touch the output; call [`start`](Self::start) next.
    pub fn new(config: &NodeConfig, identity: DeviceIdentity) -> Self {
        let layout = config.layout();
        Self {
            mode: config.provisioning,
            server: OnOffServer::new(layout),
            client: OnOffClient::new(layout, config.default_ttl),
            provisioning: ProvisioningController::new(config, identity),
            address: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive the output to the initial value.
    pub fn start(&mut self, output: &mut impl OutputPort, sink: &mut impl EventSink) {
        self.server.sync_output(output);
        let value = self.server.state().value;
        sink.emit(&AppEvent::Started { value });
        info!("NodeService started, output {}", if value { "on" } else { "off" });
    }

    /// Run one pass of the event loop: fire the timer if the deadline has
    /// passed, then handle everything in the mailbox.  A due timer runs
    /// ahead of queued messages so they see the settled state.
    /// Returns the number of events handled, the timer included.
    pub fn step(
        &mut self,
        mailbox: &Mailbox,
        now_ms: u64,
        transport: &mut impl MeshTransport,
        output: &mut impl OutputPort,
        sink: &mut impl EventSink,
    ) -> usize {
        let mut handled = 0;
        if self.next_deadline().is_some_and(|d| now_ms >= d) {
            self.handle_event(NodeEvent::TimerFired, now_ms, transport, output, sink);
            handled += 1;
        }
        handled + mailbox.drain(|event| self.handle_event(event, now_ms, transport, output, sink))
    }

    // ── Event handling ────────────────────────────────────────

    pub fn handle_event(
        &mut self,
        event: NodeEvent,
        now_ms: u64,
        transport: &mut impl MeshTransport,
        output: &mut impl OutputPort,
        sink: &mut impl EventSink,
    ) {
        match event {
            NodeEvent::TransportReady => self.on_transport_ready(now_ms, transport, sink),
            NodeEvent::Inbound(msg) => self.dispatch(&msg, now_ms, transport, output, sink),
            NodeEvent::TimerFired => self.on_timer(now_ms, output, sink),
            NodeEvent::ButtonPressed => self.on_button(now_ms, transport, sink),
            NodeEvent::ProvisionComplete { net_idx, address } => {
                self.on_provision_complete(net_idx, address, sink)
            }
            NodeEvent::ProvisionReset => self.on_provision_reset(sink),
            NodeEvent::Attention(on) => self.on_attention(on, output, sink),
            NodeEvent::OutputOob { number } => sink.emit(&AppEvent::OobNumber(number)),
        }
    }

    /// Process a local operator command.
    pub fn handle_command(
        &mut self,
        cmd: NodeCommand,
        now_ms: u64,
        transport: &mut impl MeshTransport,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            NodeCommand::Toggle => self.on_button(now_ms, transport, sink),
            NodeCommand::QueryStatus { dst } => {
                if let Err(e) = self.client.send_get(transport, dst) {
                    warn!("status query to 0x{:04x} failed: {}", dst, e);
                    sink.emit(&AppEvent::SendFailed(e));
                }
            }
            NodeCommand::FactoryReset => {
                transport.reset();
                self.on_provision_reset(sink);
            }
        }
    }

    fn on_transport_ready(
        &mut self,
        now_ms: u64,
        transport: &mut impl MeshTransport,
        sink: &mut impl EventSink,
    ) {
        if transport.is_provisioned() {
            let Some(address) = transport.primary_address() else {
                warn!("stack reports provisioned but has no address");
                return;
            };
            info!("Mesh network restored from flash");
            let mut models: [&mut dyn KeyBinding; 2] = [&mut self.server, &mut self.client];
            self.provisioning.bind_existing(address, &mut models);
            self.set_address(Some(address));
            sink.emit(&AppEvent::Restored { address });
            return;
        }

        match self.mode {
            ProvisioningMode::SelfOnReady => self.self_provision(now_ms, transport, sink),
            ProvisioningMode::SelfOnButton => info!("Press button to self-provision"),
            ProvisioningMode::Assisted => info!("Waiting for provisioner"),
        }
    }

    fn on_button(&mut self, now_ms: u64, transport: &mut impl MeshTransport, sink: &mut impl EventSink) {
        if transport.is_provisioned() {
            let value = !self.server.state().value;
            match self.client.send_set_unacknowledged(transport, value, self.address) {
                Ok(tid) => sink.emit(&AppEvent::SetSent { value, tid }),
                Err(e) => {
                    warn!("OnOff Set failed: {}", e);
                    sink.emit(&AppEvent::SendFailed(e));
                }
            }
            return;
        }

        if self.mode.self_provisioning() {
            self.self_provision(now_ms, transport, sink);
        } else {
            info!("button ignored: unprovisioned, waiting for provisioner");
        }
    }

    fn self_provision(
        &mut self,
        now_ms: u64,
        transport: &mut impl MeshTransport,
        sink: &mut impl EventSink,
    ) {
        let address = self.provisioning.identity().unicast_address(now_ms);
        let mut models: [&mut dyn KeyBinding; 2] = [&mut self.server, &mut self.client];
        match self.provisioning.provision(transport, address, &mut models) {
            Ok(creds) => {
                let address = creds.unicast_address;
                self.set_address(Some(address));
                sink.emit(&AppEvent::Provisioned { address });
            }
            Err(e) => {
                warn!("{}", e);
                sink.emit(&AppEvent::ProvisioningFailed(e));
            }
        }
    }

    fn on_provision_complete(&mut self, net_idx: u16, address: u16, sink: &mut impl EventSink) {
        info!("provisioning complete: net_idx 0x{:03x} addr 0x{:04x}", net_idx, address);
        if self.is_bound() && self.address == Some(address) {
            // Our own self-provisioning run already bound everything.
            return;
        }
        let mut models: [&mut dyn KeyBinding; 2] = [&mut self.server, &mut self.client];
        self.provisioning.bind_existing(address, &mut models);
        self.set_address(Some(address));
        sink.emit(&AppEvent::Provisioned { address });
    }

    fn on_provision_reset(&mut self, sink: &mut impl EventSink) {
        let mut models: [&mut dyn KeyBinding; 2] = [&mut self.server, &mut self.client];
        self.provisioning.on_reset(&mut models);
        self.set_address(None);
        sink.emit(&AppEvent::Unprovisioned);
    }

    /// Attention overrides the output while on; switching it off hands the
    /// output back to the OnOff state.
    fn on_attention(&mut self, on: bool, output: &mut impl OutputPort, sink: &mut impl EventSink) {
        info!("attention {}", if on { "on" } else { "off" });
        output.set_attention(on);
        if !on {
            output.set_output(self.server.state().present());
        }
        sink.emit(&AppEvent::Attention(on));
    }

    fn on_timer(&mut self, now_ms: u64, output: &mut impl OutputPort, sink: &mut impl EventSink) {
        let before = self.server.state().present();
        if self.server.on_timeout(now_ms, output) {
            self.report_output(before, sink);
        } else {
            debug!("stale timer wake-up at {} ms", now_ms);
        }
    }

    // ── Access-layer dispatch ─────────────────────────────────

    fn dispatch(
        &mut self,
        msg: &InboundMessage,
        now_ms: u64,
        transport: &mut impl MeshTransport,
        output: &mut impl OutputPort,
        sink: &mut impl EventSink,
    ) {
        let Some(opcode) = Opcode::from_value(msg.opcode) else {
            debug!("unhandled opcode 0x{:x} from 0x{:04x}", msg.opcode, msg.ctx.src);
            return;
        };
        let ctx = &msg.ctx;
        let model = match opcode {
            Opcode::Status => ModelKind::OnOffClient,
            _ => ModelKind::OnOffServer,
        };
        let slot = match model {
            ModelKind::OnOffServer => self.server.key_slot(),
            ModelKind::OnOffClient => self.client.key_slot(),
        };
        if slot.get() != Some(ctx.app_idx) {
            debug!(
                "{} for model 0x{:04x} under app key 0x{:03x} dropped: not bound",
                opcode.name(),
                model.model_id(),
                ctx.app_idx
            );
            return;
        }

        match opcode {
            Opcode::Get => {
                if let Err(e) = self.server.handle_get(ctx, &msg.payload, now_ms, transport) {
                    warn!("Get from 0x{:04x}: {}", ctx.src, e);
                }
            }
            Opcode::Set | Opcode::SetUnacknowledged => {
                let set = match SetMessage::decode(&msg.payload, self.server.layout()) {
                    Ok(set) => set,
                    Err(e) => {
                        debug!("malformed {} from 0x{:04x}: {}", opcode.name(), ctx.src, e);
                        return;
                    }
                };
                let before = self.server.state().present();
                let outcome = self.server.apply_set(ctx.src, &set, now_ms, output);
                self.report_set(ctx.src, &set, outcome, sink);
                self.report_output(before, sink);

                if opcode == Opcode::Set {
                    if let Err(e) = self.server.status_send(ctx, now_ms, transport) {
                        warn!("Status to 0x{:04x} failed: {}", ctx.src, e);
                    }
                }
            }
            Opcode::Status => match self.client.handle_status(ctx, &msg.payload) {
                Ok(status) => sink.emit(&AppEvent::StatusReceived {
                    src: status.source.unwrap_or(ctx.src),
                    status,
                }),
                Err(e) => debug!("malformed Status from 0x{:04x}: {}", ctx.src, e),
            },
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn server(&self) -> &OnOffServer {
        &self.server
    }

    pub fn client(&self) -> &OnOffClient {
        &self.client
    }

    pub fn provisioning(&self) -> &ProvisioningController {
        &self.provisioning
    }

    /// Our unicast address, once provisioned.
    pub fn address(&self) -> Option<u16> {
        self.address
    }

    /// Both models have an application key bound.
    pub fn is_bound(&self) -> bool {
        self.server.key_slot().is_bound() && self.client.key_slot().is_bound()
    }

    /// When the event loop must wake next, if a transition is outstanding.
    pub fn next_deadline(&self) -> Option<u64> {
        self.server.state().pending_deadline()
    }

    // ── Internal ──────────────────────────────────────────────

    fn set_address(&mut self, address: Option<u16>) {
        self.address = address;
        self.server.set_own_address(address);
    }

    fn report_set(&self, src: u16, set: &SetMessage, outcome: SetOutcome, sink: &mut impl EventSink) {
        match outcome {
            SetOutcome::Accepted => sink.emit(&AppEvent::SetAccepted {
                value: set.value,
                tid: set.tid,
                src,
                transition: set.transition(),
                delay_ms: set.delay_ms(),
            }),
            other => {
                debug!("Set tid {} from 0x{:04x} ignored: {:?}", set.tid, src, other);
                sink.emit(&AppEvent::SetIgnored {
                    src,
                    tid: set.tid,
                    outcome: other,
                });
            }
        }
    }

    fn report_output(&self, before: bool, sink: &mut impl EventSink) {
        let now = self.server.state().present();
        if now != before {
            sink.emit(&AppEvent::OutputChanged(now));
        }
    }
}
