//! Fuzz target: inbound access PDU → `NodeService`
//!
//! Provisions a node on the loopback mesh, injects the fuzz input as an
//! access PDU from a peer and runs the event loop until the schedule is
//! drained.  The service must never panic and must end with the output
//! matching its target.
//!
//! cargo fuzz run fuzz_access_dispatch

#![no_main]

use libfuzzer_sys::fuzz_target;
use meshswitch::adapters::log_sink::LogEventSink;
use meshswitch::adapters::loopback_mesh::LoopbackMesh;
use meshswitch::adapters::output::PinOutput;
use meshswitch::app::provisioning::DeviceIdentity;
use meshswitch::app::service::NodeService;
use meshswitch::config::{DEFAULT_APP_KEY, DEFAULT_NET_KEY, NodeConfig};
use meshswitch::drivers::led::MemoryPin;
use meshswitch::events::Mailbox;
use meshswitch::model::APP_KEY_INDEX;

const OWN: u16 = 0x0010;
const PEER: u16 = 0x0020;

fuzz_target!(|data: &[u8]| {
    let mailbox = Mailbox::new();
    let mut mesh = LoopbackMesh::new();
    let mut led = PinOutput::new(MemoryPin::default());
    let mut sink = LogEventSink::new();
    let mut node = NodeService::new(&NodeConfig::default(), DeviceIdentity::placeholder());

    node.start(&mut led, &mut sink);
    if mesh
        .provision_external(&mailbox, &DEFAULT_NET_KEY, &DEFAULT_APP_KEY, OWN)
        .is_err()
    {
        return;
    }
    node.step(&mailbox, 0, &mut mesh, &mut led, &mut sink);

    mesh.inject(&mailbox, PEER, OWN, APP_KEY_INDEX, data);
    let mut now = 1;
    node.step(&mailbox, now, &mut mesh, &mut led, &mut sink);
    while let Some(deadline) = node.next_deadline() {
        now = deadline;
        node.step(&mailbox, now, &mut mesh, &mut led, &mut sink);
    }

    let state = node.server().state();
    assert_eq!(state.present(), state.value);
    assert_eq!(led.pin().level, state.value);
});
