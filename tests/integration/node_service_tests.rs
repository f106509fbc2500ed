//! Integration tests for the mailbox → NodeService → ports pipeline.
//!
//! These run on the host and cover dispatch, key gating, the button
//! behaviour in each provisioning mode, warm start and factory reset.

use meshswitch::app::commands::NodeCommand;
use meshswitch::app::events::AppEvent;
use meshswitch::app::onoff::{SetOutcome, TransitionPhase};
use meshswitch::app::provisioning::DeviceIdentity;
use meshswitch::app::service::NodeService;
use meshswitch::config::{NodeConfig, ProvisioningMode};
use meshswitch::error::{ProvisionError, SendError, TransportError};
use meshswitch::events::{InboundMessage, Mailbox, NodeEvent};
use meshswitch::model::message::StatusMessage;
use meshswitch::model::opcode::Opcode;
use meshswitch::model::transition::TransitionTime;
use meshswitch::model::{ADDR_ALL_NODES, MessageContext};

use crate::mock_hw::{FixedId, MockMesh, MockOutput, RecordingSink, TransportCall, inbound, inbound_with_key};

const OWN: u16 = 0x1234;
const PEER: u16 = 0x0100;

struct Rig {
    node: NodeService,
    mesh: MockMesh,
    out: MockOutput,
    sink: RecordingSink,
}

impl Rig {
    fn new(config: &NodeConfig, mesh: MockMesh) -> Self {
        let identity = DeviceIdentity::read(&mut FixedId(vec![0x34, 0x12, 0x00, 0x00, 0x00, 0x01]));
        let mut rig = Self {
            node: NodeService::new(config, identity),
            mesh,
            out: MockOutput::default(),
            sink: RecordingSink::default(),
        };
        rig.node.start(&mut rig.out, &mut rig.sink);
        rig.event(NodeEvent::TransportReady, 0);
        rig
    }

    /// Default config, provisioned by a button press, history cleared.
    fn provisioned() -> Self {
        Self::provisioned_with(&NodeConfig::default())
    }

    fn provisioned_with(config: &NodeConfig) -> Self {
        let mut rig = Self::new(config, MockMesh::new());
        rig.event(NodeEvent::ButtonPressed, 10);
        assert!(rig.node.is_bound());
        rig.mesh.calls.clear();
        rig.sink.clear();
        rig
    }

    fn event(&mut self, event: NodeEvent, now_ms: u64) {
        self.node
            .handle_event(event, now_ms, &mut self.mesh, &mut self.out, &mut self.sink);
    }

    fn command(&mut self, cmd: NodeCommand, now_ms: u64) {
        self.node.handle_command(cmd, now_ms, &mut self.mesh, &mut self.sink);
    }

    fn step(&mut self, mailbox: &Mailbox, now_ms: u64) -> usize {
        self.node
            .step(mailbox, now_ms, &mut self.mesh, &mut self.out, &mut self.sink)
    }
}

// ── Provisioning ──────────────────────────────────────────────

#[test]
fn start_drives_initial_output() {
    let rig = Rig::new(&NodeConfig::default(), MockMesh::new());
    assert_eq!(rig.out.writes, vec![false]);
    assert_eq!(rig.sink.events.first(), Some(&AppEvent::Started { value: false }));
}

#[test]
fn button_self_provisions_from_unique_id() {
    let mut rig = Rig::new(&NodeConfig::default(), MockMesh::new());
    assert!(rig.mesh.calls.is_empty(), "must wait for the button");

    rig.event(NodeEvent::ButtonPressed, 10);

    assert_eq!(
        rig.mesh.calls[0],
        TransportCall::Provision {
            net_idx: 0,
            address: OWN
        }
    );
    assert!(matches!(rig.mesh.calls[1], TransportCall::AddAppKey { .. }));
    assert!(rig.node.is_bound());
    assert_eq!(rig.node.address(), Some(OWN));
    assert!(rig.sink.contains(&AppEvent::Provisioned { address: OWN }));
}

#[test]
fn self_on_ready_provisions_at_startup() {
    let config = NodeConfig {
        provisioning: ProvisioningMode::SelfOnReady,
        ..NodeConfig::default()
    };
    let rig = Rig::new(&config, MockMesh::new());

    assert!(rig.node.is_bound());
    assert!(rig.sink.contains(&AppEvent::Provisioned { address: OWN }));
}

#[test]
fn assisted_mode_binds_on_provision_complete() {
    let config = NodeConfig {
        provisioning: ProvisioningMode::Assisted,
        ..NodeConfig::default()
    };
    let mut rig = Rig::new(&config, MockMesh::new());

    rig.event(NodeEvent::ButtonPressed, 10);
    assert!(rig.mesh.calls.is_empty());
    assert!(!rig.node.is_bound());

    rig.event(
        NodeEvent::ProvisionComplete {
            net_idx: 0,
            address: 0x0077,
        },
        20,
    );
    assert!(rig.node.is_bound());
    assert_eq!(rig.node.address(), Some(0x0077));
    assert!(rig.sink.contains(&AppEvent::Provisioned { address: 0x0077 }));
}

#[test]
fn warm_start_restores_bindings_without_provisioning() {
    let rig = Rig::new(&NodeConfig::default(), MockMesh::restored(0x0042));

    assert!(rig.mesh.calls.is_empty());
    assert!(rig.node.is_bound());
    assert_eq!(rig.node.address(), Some(0x0042));
    assert!(rig.sink.contains(&AppEvent::Restored { address: 0x0042 }));
}

#[test]
fn failed_provisioning_is_reported() {
    let mut mesh = MockMesh::new();
    mesh.fail_app_key = Some(TransportError::NoBuffers);
    let mut rig = Rig::new(&NodeConfig::default(), mesh);

    rig.event(NodeEvent::ButtonPressed, 10);

    assert!(!rig.node.is_bound());
    assert_eq!(rig.node.address(), None);
    assert!(rig.sink.contains(&AppEvent::ProvisioningFailed(ProvisionError::AppKeyAdd(
        TransportError::NoBuffers
    ))));
    assert_eq!(rig.mesh.calls.last(), Some(&TransportCall::Reset));
}

#[test]
fn factory_reset_unbinds_and_allows_reprovisioning() {
    let mut rig = Rig::provisioned();

    rig.command(NodeCommand::FactoryReset, 100);
    assert_eq!(rig.mesh.calls, vec![TransportCall::Reset]);
    assert!(!rig.node.is_bound());
    assert_eq!(rig.node.address(), None);
    assert!(rig.sink.contains(&AppEvent::Unprovisioned));

    rig.event(NodeEvent::ButtonPressed, 200);
    assert!(rig.node.is_bound());
}

// ── Client ────────────────────────────────────────────────────

#[test]
fn button_broadcasts_toggled_value_with_fresh_tids() {
    let mut rig = Rig::provisioned();

    rig.event(NodeEvent::ButtonPressed, 100);
    rig.event(NodeEvent::ButtonPressed, 200);

    let sent = rig.mesh.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], (Opcode::SetUnacknowledged, ADDR_ALL_NODES, vec![1, 0]));
    // Server value has not changed yet, so the second press asks for "on" again.
    assert_eq!(sent[1], (Opcode::SetUnacknowledged, ADDR_ALL_NODES, vec![1, 1]));
    assert!(rig.sink.contains(&AppEvent::SetSent { value: true, tid: 0 }));
    assert!(rig.sink.contains(&AppEvent::SetSent { value: true, tid: 1 }));
}

#[test]
fn own_broadcast_looped_back_drives_output() {
    let mut rig = Rig::provisioned();

    rig.event(NodeEvent::ButtonPressed, 100);
    let (_, _, payload) = rig.mesh.last_sent().unwrap();
    rig.event(inbound(OWN, ADDR_ALL_NODES, Opcode::SetUnacknowledged, &payload), 110);

    assert_eq!(rig.out.level(), Some(true));
    assert!(rig.sink.contains(&AppEvent::OutputChanged(true)));
}

#[test]
fn query_status_sends_get() {
    let mut rig = Rig::provisioned();

    rig.command(NodeCommand::QueryStatus { dst: 0x0200 }, 100);
    assert_eq!(rig.mesh.last_sent(), Some((Opcode::Get, 0x0200, vec![])));
}

#[test]
fn send_before_binding_is_refused() {
    let config = NodeConfig {
        provisioning: ProvisioningMode::Assisted,
        ..NodeConfig::default()
    };
    let mut rig = Rig::new(&config, MockMesh::new());

    rig.command(NodeCommand::QueryStatus { dst: 0x0200 }, 100);
    assert!(rig.mesh.calls.is_empty());
    assert!(rig.sink.contains(&AppEvent::SendFailed(SendError::Unbound)));
}

#[test]
fn peer_status_is_reported() {
    let mut rig = Rig::provisioned();

    rig.event(inbound(0x0200, OWN, Opcode::Status, &[1, 0, 0x05]), 100);
    assert!(rig.sink.contains(&AppEvent::StatusReceived {
        src: 0x0200,
        status: StatusMessage {
            present: true,
            source: None,
            target: Some((false, TransitionTime::Millis(500))),
        },
    }));
}

// ── Server dispatch ───────────────────────────────────────────

#[test]
fn acknowledged_set_always_replies() {
    let mut rig = Rig::provisioned();

    rig.event(inbound(PEER, OWN, Opcode::Set, &[1, 7]), 100);
    assert_eq!(rig.out.level(), Some(true));
    assert_eq!(rig.mesh.last_sent(), Some((Opcode::Status, PEER, vec![1])));
    assert!(rig.sink.contains(&AppEvent::SetAccepted {
        value: true,
        tid: 7,
        src: PEER,
        transition: TransitionTime::IMMEDIATE,
        delay_ms: 0,
    }));

    // Retransmission: ignored, but still answered.
    rig.event(inbound(PEER, OWN, Opcode::Set, &[1, 7]), 150);
    assert_eq!(rig.mesh.sent().len(), 2);
    assert!(rig.sink.contains(&AppEvent::SetIgnored {
        src: PEER,
        tid: 7,
        outcome: SetOutcome::Retransmission,
    }));
}

#[test]
fn unacknowledged_set_sends_nothing() {
    let mut rig = Rig::provisioned();

    rig.event(inbound(PEER, OWN, Opcode::SetUnacknowledged, &[1, 3]), 100);
    assert_eq!(rig.out.level(), Some(true));
    assert!(rig.mesh.calls.is_empty());
}

#[test]
fn get_is_answered_with_status() {
    let mut rig = Rig::provisioned();

    rig.event(inbound(PEER, OWN, Opcode::Get, &[]), 100);
    assert_eq!(rig.mesh.last_sent(), Some((Opcode::Status, PEER, vec![0])));
}

#[test]
fn malformed_set_is_dropped_without_reply() {
    let mut rig = Rig::provisioned();
    let writes = rig.out.writes.len();

    rig.event(inbound(PEER, OWN, Opcode::Set, &[2, 1]), 100);
    rig.event(inbound(PEER, OWN, Opcode::Set, &[1]), 110);

    assert!(rig.mesh.calls.is_empty());
    assert_eq!(rig.out.writes.len(), writes);
    assert!(rig.sink.events.is_empty());
}

#[test]
fn messages_under_unbound_key_are_dropped() {
    let mut rig = Rig::provisioned();

    rig.event(inbound_with_key(PEER, OWN, 1, Opcode::Get, &[]), 100);
    rig.event(inbound_with_key(PEER, OWN, 1, Opcode::Set, &[1, 1]), 110);

    assert!(rig.mesh.calls.is_empty());
    assert!(!rig.node.server().state().value);
}

#[test]
fn messages_before_binding_are_dropped() {
    let mut rig = Rig::new(&NodeConfig::default(), MockMesh::new());

    rig.event(inbound(PEER, OWN, Opcode::Get, &[]), 100);
    assert!(rig.mesh.calls.is_empty());
}

#[test]
fn unknown_opcode_is_ignored() {
    let mut rig = Rig::provisioned();
    let ctx = MessageContext {
        src: PEER,
        dst: OWN,
        app_idx: 0,
        ttl: 5,
    };
    // Generic Level Get.
    let msg = InboundMessage::new(ctx, 0x8205, &[]).unwrap();

    rig.event(NodeEvent::Inbound(msg), 100);
    assert!(rig.mesh.calls.is_empty());
    assert!(rig.sink.events.is_empty());
}

#[test]
fn own_echo_is_ignored_with_source_extension() {
    let config = NodeConfig {
        include_source_address: true,
        ..NodeConfig::default()
    };
    let mut rig = Rig::provisioned_with(&config);

    rig.event(inbound(PEER, ADDR_ALL_NODES, Opcode::SetUnacknowledged, &[1, 5, 0x34, 0x12]), 100);
    assert!(rig.sink.contains(&AppEvent::SetIgnored {
        src: PEER,
        tid: 5,
        outcome: SetOutcome::OwnEcho,
    }));
    assert!(!rig.node.server().state().value);

    rig.event(inbound(PEER, OWN, Opcode::Get, &[]), 110);
    assert_eq!(rig.mesh.last_sent(), Some((Opcode::Status, PEER, vec![0, 0x34, 0x12])));
}

// ── Event loop ────────────────────────────────────────────────

#[test]
fn step_drives_delayed_transition_to_completion() {
    let mut rig = Rig::provisioned();
    let mailbox = Mailbox::new();

    // On after 100 ms, then a 1 s transition.
    assert!(mailbox.post(inbound(PEER, OWN, Opcode::SetUnacknowledged, &[1, 3, 0x0A, 20])));

    assert_eq!(rig.step(&mailbox, 0), 1);
    assert_eq!(rig.node.next_deadline(), Some(100));
    assert_eq!(rig.out.level(), Some(false));

    assert_eq!(rig.step(&mailbox, 50), 0);

    assert_eq!(rig.step(&mailbox, 100), 1);
    assert_eq!(rig.out.level(), Some(true));
    assert!(rig.sink.contains(&AppEvent::OutputChanged(true)));
    assert_eq!(rig.node.server().state().phase(), TransitionPhase::Transitioning);
    assert_eq!(rig.node.next_deadline(), Some(1100));

    assert_eq!(rig.step(&mailbox, 1100), 1);
    assert_eq!(rig.node.server().state().phase(), TransitionPhase::Idle);
    assert_eq!(rig.node.next_deadline(), None);
    assert!(mailbox.is_empty());
}

#[test]
fn due_timer_runs_before_queued_get() {
    let mut rig = Rig::provisioned();
    let mailbox = Mailbox::new();

    // On now, 1 s transition.
    assert!(mailbox.post(inbound(PEER, OWN, Opcode::SetUnacknowledged, &[1, 4, 0x0A, 0])));
    assert_eq!(rig.step(&mailbox, 0), 1);
    assert_eq!(rig.node.next_deadline(), Some(1000));

    assert!(mailbox.post(inbound(PEER, OWN, Opcode::Get, &[])));
    assert_eq!(rig.step(&mailbox, 1000), 2);
    assert_eq!(rig.node.server().state().phase(), TransitionPhase::Idle);
    assert_eq!(rig.mesh.last_sent(), Some((Opcode::Status, PEER, vec![1])));
}

// ── Health attention and OOB ──────────────────────────────────

#[test]
fn attention_overrides_output_until_cleared() {
    let mut rig = Rig::provisioned();
    rig.event(inbound(PEER, OWN, Opcode::SetUnacknowledged, &[1, 6]), 20);
    assert_eq!(rig.out.level(), Some(true));

    rig.event(NodeEvent::Attention(true), 30);
    assert!(rig.sink.contains(&AppEvent::Attention(true)));

    rig.event(NodeEvent::Attention(false), 40);
    assert!(rig.sink.contains(&AppEvent::Attention(false)));
    // Attention-off blinks the LED off, then the OnOff level comes back.
    assert_eq!(rig.out.writes[rig.out.writes.len() - 2..], [false, true]);
    assert!(rig.node.server().state().value);
}

#[test]
fn attention_on_drives_output_while_off() {
    let mut rig = Rig::provisioned();
    rig.event(NodeEvent::Attention(true), 30);
    assert_eq!(rig.out.level(), Some(true));
    assert!(!rig.node.server().state().value);

    rig.event(NodeEvent::Attention(false), 40);
    assert_eq!(rig.out.level(), Some(false));
}

#[test]
fn oob_number_is_reported() {
    let mut rig = Rig::new(
        &NodeConfig {
            provisioning: ProvisioningMode::Assisted,
            ..NodeConfig::default()
        },
        MockMesh::new(),
    );
    rig.event(NodeEvent::OutputOob { number: 4711 }, 5);
    assert!(rig.sink.contains(&AppEvent::OobNumber(4711)));
    assert!(rig.mesh.calls.is_empty());
}
