mod common;

use common::*;
use tcbbs::mesh::{DecodedPayload, DeviceMetrics, MeshPacket, PortNum, Telemetry, BROADCAST_ADDR};

#[tokio::test]
async fn group_traffic_is_ignored() {
    let (_dir, mut server, mut rx) = test_server().await;
    for to in [0, BROADCAST_ADDR] {
        server.handle_packet(text(ALICE, to, "x")).await;
        server
            .handle_packet(text(PEER, to, "hello from the peer"))
            .await;
    }
    assert!(drain(&mut rx).is_empty());
    assert!(server.conversation_state(ALICE).is_none());
}

#[tokio::test]
async fn peer_chatter_gets_no_menu() {
    let (_dir, mut server, mut rx) = test_server().await;
    server.handle_packet(dm(PEER, "b")).await;
    assert!(drain(&mut rx).is_empty());
    assert!(server.conversation_state(PEER).is_none());
}

#[tokio::test]
async fn direct_message_for_another_node_is_ignored() {
    let (_dir, mut server, mut rx) = test_server().await;
    server.handle_packet(text(ALICE, BOB, "x")).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn command_gets_reply_from_own_node() {
    let (_dir, mut server, mut rx) = test_server().await;
    server.handle_packet(dm(ALICE, "x")).await;
    let out = drain(&mut rx);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].to_node, Some(ALICE));
    assert!(out[0].content.starts_with("💾Test BBS💾"));
}

#[tokio::test]
async fn allowed_nodes_gate_refuses_silently() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(&dir);
    cfg.mesh.allowed_nodes = vec![format!("!{:08x}", BOB)];
    let (_dir, mut server, mut rx) = server_with(dir, cfg).await;

    server.handle_packet(dm(ALICE, "x")).await;
    assert!(drain(&mut rx).is_empty());

    server.handle_packet(dm(BOB, "x")).await;
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn malformed_packets_are_swallowed() {
    let (_dir, mut server, mut rx) = test_server().await;
    let mut no_sender = dm(ALICE, "x");
    no_sender.from = None;
    server.handle_packet(no_sender).await;

    let mut no_payload = dm(ALICE, "x");
    no_payload.decoded = None;
    server.handle_packet(no_payload).await;

    // Server keeps working after both
    server.handle_packet(dm(ALICE, "x")).await;
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn node_info_and_telemetry_update_directory() {
    let (_dir, mut server, _rx) = test_server().await;
    assert_eq!(server.directory().short_name_for(ALICE), "ALC");
    assert_eq!(server.directory().short_name_for(0x4242), "Unknown");

    let telemetry = MeshPacket {
        from: Some(ALICE),
        from_id: None,
        to: Some(BROADCAST_ADDR),
        channel: 0,
        decoded: Some(DecodedPayload {
            portnum: PortNum::TelemetryApp,
            text: None,
            user: None,
            telemetry: Some(Telemetry {
                device_metrics: Some(DeviceMetrics {
                    battery_level: Some(7),
                }),
            }),
        }),
    };
    server.handle_packet(telemetry).await;
    assert_eq!(server.directory().get(ALICE).and_then(|n| n.battery_level), Some(7));
}

#[tokio::test]
async fn unknown_sender_still_gets_served() {
    let (_dir, mut server, mut rx) = test_server().await;
    server.handle_packet(dm(0x4242, "u")).await;
    let out = drain(&mut rx);
    assert_eq!(out.len(), 1);
    assert!(out[0].content.contains("[F]ortune"));
}
