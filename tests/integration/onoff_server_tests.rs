//! Integration tests for the Generic OnOff Server state machine.
//!
//! Exercises delayed and timed transitions, deadline replacement and the
//! Status replies produced along the way.

use meshswitch::app::onoff::{OnOffServer, SetOutcome, TransitionPhase};
use meshswitch::model::message::{Layout, SetMessage, TransitionParams};
use meshswitch::model::opcode::Opcode;
use meshswitch::model::transition::TransitionTime;
use meshswitch::model::{KeyBinding, MessageContext};

use crate::mock_hw::{MockMesh, MockOutput};

const PEER: u16 = 0x0100;

fn set(value: bool, tid: u8, transition_ms: u32, delay_units: u8) -> SetMessage {
    SetMessage {
        value,
        tid,
        source: None,
        params: Some(TransitionParams {
            transition: TransitionTime::Millis(transition_ms),
            delay: delay_units,
        }),
    }
}

fn ctx_from(src: u16) -> MessageContext {
    MessageContext {
        src,
        dst: 0x0001,
        app_idx: 0,
        ttl: 5,
    }
}

#[test]
fn delayed_transition_runs_both_phases() {
    let mut server = OnOffServer::new(Layout::STANDARD);
    let mut out = MockOutput::default();

    // 100 ms delay, then a 1 s transition.
    let outcome = server.apply_set(PEER, &set(true, 1, 1000, 20), 0, &mut out);
    assert_eq!(outcome, SetOutcome::Accepted);
    assert_eq!(server.state().phase(), TransitionPhase::PendingStart);
    assert_eq!(server.state().pending_deadline(), Some(100));
    assert!(out.writes.is_empty(), "output must wait for the delay");
    assert!(server.state().value);
    assert!(!server.state().present());

    assert!(!server.on_timeout(99, &mut out));
    assert!(server.on_timeout(100, &mut out));
    assert_eq!(out.level(), Some(true));
    assert_eq!(server.state().phase(), TransitionPhase::Transitioning);
    assert_eq!(server.state().pending_deadline(), Some(1100));

    assert!(server.on_timeout(1100, &mut out));
    assert_eq!(server.state().phase(), TransitionPhase::Idle);
    assert_eq!(server.state().pending_deadline(), None);
    assert_eq!(server.state().transition_ms, 0);
}

#[test]
fn transition_without_delay_starts_immediately() {
    let mut server = OnOffServer::new(Layout::STANDARD);
    let mut out = MockOutput::default();

    server.apply_set(PEER, &set(true, 1, 500, 0), 1_000, &mut out);
    assert_eq!(out.writes, vec![true]);
    assert_eq!(server.state().phase(), TransitionPhase::Transitioning);
    assert_eq!(server.state().pending_deadline(), Some(1_500));
}

#[test]
fn new_set_replaces_pending_deadline() {
    let mut server = OnOffServer::new(Layout::STANDARD);
    let mut out = MockOutput::default();

    server.apply_set(PEER, &set(true, 1, 0, 20), 0, &mut out);
    // Back to off before the first delay elapsed; 200 ms delay from t=50.
    server.apply_set(PEER, &set(false, 2, 0, 40), 50, &mut out);
    assert_eq!(server.state().pending_deadline(), Some(250));

    // The wake-up scheduled for the first Set is stale now.
    assert!(!server.on_timeout(100, &mut out));
    assert!(out.writes.is_empty());

    assert!(server.on_timeout(250, &mut out));
    assert_eq!(out.writes, vec![false]);
    assert_eq!(server.state().phase(), TransitionPhase::Idle);
}

#[test]
fn status_tracks_remaining_time() {
    let mut server = OnOffServer::new(Layout::STANDARD);
    server.bind_app_key(0);
    let mut out = MockOutput::default();
    let mut mesh = MockMesh::new();

    server.apply_set(PEER, &set(true, 1, 1000, 20), 0, &mut out);

    // 1100 ms to go: 11 steps of 100 ms.
    server.handle_get(&ctx_from(PEER), &[], 0, &mut mesh).unwrap();
    assert_eq!(mesh.last_sent(), Some((Opcode::Status, PEER, vec![0, 1, 0x0B])));

    server.on_timeout(100, &mut out);
    server.handle_get(&ctx_from(PEER), &[], 600, &mut mesh).unwrap();
    assert_eq!(mesh.last_sent(), Some((Opcode::Status, PEER, vec![1, 1, 0x05])));

    server.on_timeout(1100, &mut out);
    server.handle_get(&ctx_from(PEER), &[], 1200, &mut mesh).unwrap();
    assert_eq!(mesh.last_sent(), Some((Opcode::Status, PEER, vec![1])));
}

#[test]
fn elapsed_deadline_reports_short_status() {
    let mut server = OnOffServer::new(Layout::STANDARD);
    server.bind_app_key(0);
    let mut out = MockOutput::default();
    let mut mesh = MockMesh::new();

    server.apply_set(PEER, &set(true, 1, 1000, 0), 0, &mut out);
    assert_eq!(server.remaining_ms(400), 600);

    // Deadline reached, timer not yet handled.
    assert_eq!(server.remaining_ms(1000), 0);
    server.handle_get(&ctx_from(PEER), &[], 1000, &mut mesh).unwrap();
    assert_eq!(mesh.last_sent(), Some((Opcode::Status, PEER, vec![1])));
    assert_eq!(server.status(1500).target, None);
}

#[test]
fn get_with_payload_is_rejected() {
    let server = OnOffServer::new(Layout::STANDARD);
    let mut mesh = MockMesh::new();

    assert!(server.handle_get(&ctx_from(PEER), &[0], 0, &mut mesh).is_err());
    assert!(mesh.calls.is_empty());
}

#[test]
fn handle_set_rejects_malformed_payloads() {
    let mut server = OnOffServer::new(Layout::STANDARD);
    let mut out = MockOutput::default();
    let ctx = ctx_from(PEER);

    // Value out of range.
    assert!(server.handle_set(&ctx, &[2, 1], 0, &mut out).is_err());
    // Transition without delay byte.
    assert!(server.handle_set(&ctx, &[1, 1, 0x01], 0, &mut out).is_err());
    // Unknown transition time.
    assert!(server.handle_set(&ctx, &[1, 1, 0x3F, 0], 0, &mut out).is_err());

    assert!(out.writes.is_empty());
    assert!(!server.state().value);
    assert_eq!(server.state().last_source_address, 0);
}

#[test]
fn same_tid_from_another_source_is_accepted() {
    let mut server = OnOffServer::new(Layout::STANDARD);
    let mut out = MockOutput::default();

    assert_eq!(
        server.handle_set(&ctx_from(PEER), &[1, 9], 0, &mut out),
        Ok(SetOutcome::Accepted)
    );
    assert_eq!(
        server.handle_set(&ctx_from(PEER), &[0, 9], 10, &mut out),
        Ok(SetOutcome::Retransmission)
    );
    assert_eq!(
        server.handle_set(&ctx_from(0x0200), &[0, 9], 20, &mut out),
        Ok(SetOutcome::Accepted)
    );
    assert_eq!(out.writes, vec![true, false]);
}

#[test]
fn source_extension_status_carries_own_address() {
    let mut server = OnOffServer::new(Layout::WITH_SOURCE);
    server.bind_app_key(0);
    server.set_own_address(Some(0x1234));
    let mut mesh = MockMesh::new();

    server.handle_get(&ctx_from(PEER), &[], 0, &mut mesh).unwrap();
    assert_eq!(mesh.last_sent(), Some((Opcode::Status, PEER, vec![0, 0x34, 0x12])));
}
