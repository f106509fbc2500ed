//! Integration tests for the self-provisioning and key-binding flow.
//!
//! Drives [`ProvisioningController`] against the recording mesh and
//! checks the exact order of stack calls, the rollback on a failed app-key
//! add, and that nothing can be sent before the client is bound.

use meshswitch::app::onoff::{OnOffClient, OnOffServer};
use meshswitch::app::ports::MeshTransport;
use meshswitch::app::provisioning::{DeviceIdentity, ProvisioningController};
use meshswitch::config::NodeConfig;
use meshswitch::error::{ProvisionError, SendError, TransportError};
use meshswitch::model::message::Layout;
use meshswitch::model::{APP_KEY_INDEX, KeyBinding, KeySlot, NET_KEY_INDEX, TTL_DEFAULT};

use crate::mock_hw::{FixedId, MockMesh, NoId, TransportCall};

fn models() -> (OnOffServer, OnOffClient) {
    (
        OnOffServer::new(Layout::STANDARD),
        OnOffClient::new(Layout::STANDARD, TTL_DEFAULT),
    )
}

#[test]
fn provision_then_add_key_then_bind() {
    let identity = DeviceIdentity::read(&mut FixedId(vec![0x34, 0x12, 0x56, 0x78, 0x9a, 0xbc]));
    let mut ctrl = ProvisioningController::new(&NodeConfig::default(), identity);
    let mut mesh = MockMesh::new();
    let (mut server, mut client) = models();

    let address = ctrl.identity().unicast_address(0);
    assert_eq!(address, 0x1234);

    let creds = ctrl
        .provision(&mut mesh, address, &mut [&mut server as &mut dyn KeyBinding, &mut client])
        .expect("provisioning should succeed")
        .clone();

    assert_eq!(
        mesh.calls,
        vec![
            TransportCall::Provision {
                net_idx: NET_KEY_INDEX,
                address: 0x1234
            },
            TransportCall::AddAppKey {
                net_idx: NET_KEY_INDEX,
                app_idx: APP_KEY_INDEX
            },
        ]
    );
    assert_eq!(creds.unicast_address, 0x1234);
    assert_eq!(creds.application_key_index, APP_KEY_INDEX);
    assert_eq!(creds.device_key, [0xAB; 16]);
    assert_eq!(server.key_slot(), KeySlot::bound(APP_KEY_INDEX));
    assert_eq!(client.key_slot(), KeySlot::bound(APP_KEY_INDEX));
    assert!(ctrl.credentials().is_some());
}

#[test]
fn provision_failure_leaves_models_unbound() {
    let mut ctrl = ProvisioningController::new(&NodeConfig::default(), DeviceIdentity::placeholder());
    let mut mesh = MockMesh::new();
    mesh.fail_provision = Some(TransportError::Stack(-22));
    let (mut server, mut client) = models();

    let err = ctrl
        .provision(&mut mesh, 0x0042, &mut [&mut server as &mut dyn KeyBinding, &mut client])
        .unwrap_err();

    assert_eq!(err, ProvisionError::Provision(TransportError::Stack(-22)));
    // No key add was attempted.
    assert_eq!(mesh.calls.len(), 1);
    assert!(!server.key_slot().is_bound());
    assert!(!client.key_slot().is_bound());
    assert!(ctrl.credentials().is_none());
}

#[test]
fn app_key_failure_rolls_back_the_stack() {
    let mut ctrl = ProvisioningController::new(&NodeConfig::default(), DeviceIdentity::placeholder());
    let mut mesh = MockMesh::new();
    mesh.fail_app_key = Some(TransportError::NoBuffers);
    let (mut server, mut client) = models();

    let err = ctrl
        .provision(&mut mesh, 0x0042, &mut [&mut server as &mut dyn KeyBinding, &mut client])
        .unwrap_err();

    assert_eq!(err, ProvisionError::AppKeyAdd(TransportError::NoBuffers));
    assert_eq!(mesh.calls.last(), Some(&TransportCall::Reset));
    assert!(!mesh.is_provisioned());
    assert!(!server.key_slot().is_bound());
    assert!(!client.key_slot().is_bound());

    // A second attempt starts from a clean stack.
    mesh.fail_app_key = None;
    ctrl.provision(&mut mesh, 0x0042, &mut [&mut server as &mut dyn KeyBinding, &mut client])
        .expect("retry should succeed");
    assert!(server.key_slot().is_bound());
}

#[test]
fn unbound_client_refuses_to_send() {
    let mut mesh = MockMesh::new();
    let (_, mut client) = models();

    assert_eq!(
        client.send_set_unacknowledged(&mut mesh, true, Some(0x0001)),
        Err(SendError::Unbound)
    );
    assert_eq!(client.send_get(&mut mesh, 0x0002), Err(SendError::Unbound));
    assert!(mesh.calls.is_empty(), "transport must not be touched");
}

#[test]
fn reset_unbinds_and_forgets_credentials() {
    let mut ctrl = ProvisioningController::new(&NodeConfig::default(), DeviceIdentity::placeholder());
    let mut mesh = MockMesh::new();
    let (mut server, mut client) = models();

    ctrl.provision(&mut mesh, 0x0042, &mut [&mut server as &mut dyn KeyBinding, &mut client])
        .expect("provisioning should succeed");
    ctrl.on_reset(&mut [&mut server as &mut dyn KeyBinding, &mut client]);

    assert!(!server.key_slot().is_bound());
    assert!(!client.key_slot().is_bound());
    assert!(ctrl.credentials().is_none());
}

#[test]
fn missing_unique_id_uses_uptime_for_address() {
    let identity = DeviceIdentity::read(&mut NoId);
    assert!(!identity.hardware_backed);
    assert_eq!(identity.unicast_address(0x8005), 0x0005);
    assert_eq!(identity.unicast_address(0x8000), 0x0001);
}
