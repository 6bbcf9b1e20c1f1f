//! Shared fixtures for integration tests.
#![allow(dead_code)]

use tcbbs::bbs::BbsServer;
use tcbbs::config::Config;
use tcbbs::mesh::{DecodedPayload, MeshPacket, OutgoingMessage, PortNum, UserInfo};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// This server's node number.
pub const OWN: u32 = 0x0000_0001;
/// A peer BBS.
pub const PEER: u32 = 0x0000_00aa;
pub const ALICE: u32 = 0x0000_0010;
pub const BOB: u32 = 0x0000_0020;

pub fn test_config(dir: &TempDir) -> Config {
    let mut cfg = Config::default();
    cfg.bbs.name = "Test BBS".to_string();
    cfg.mesh.node_id = format!("!{:08x}", OWN);
    cfg.mesh.peers = vec![format!("!{:08x}", PEER)];
    cfg.storage.data_dir = dir.path().join("data").to_string_lossy().to_string();
    cfg.logging.file = None;
    cfg.logging.security_file = None;
    cfg
}

/// Server wired to an in-memory outgoing channel, with Alice and Bob in the directory.
pub async fn test_server() -> (TempDir, BbsServer, mpsc::UnboundedReceiver<OutgoingMessage>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = test_config(&dir);
    server_with(dir, cfg).await
}

pub async fn server_with(
    dir: TempDir,
    cfg: Config,
) -> (TempDir, BbsServer, mpsc::UnboundedReceiver<OutgoingMessage>) {
    let mut server = BbsServer::new(cfg).await.expect("server");
    let (tx, rx) = mpsc::unbounded_channel();
    server.test_set_outgoing(tx);
    server.handle_packet(node_info(ALICE, "ALC", "Alice Base")).await;
    server.handle_packet(node_info(BOB, "BOB", "Bob Portable")).await;
    (dir, server, rx)
}

pub fn text(from: u32, to: u32, body: &str) -> MeshPacket {
    MeshPacket::text(from, Some(to), body)
}

/// Direct message from `from` to this server.
pub fn dm(from: u32, body: &str) -> MeshPacket {
    text(from, OWN, body)
}

pub fn node_info(node: u32, short: &str, long: &str) -> MeshPacket {
    MeshPacket {
        from: Some(node),
        from_id: Some(format!("!{:08x}", node)),
        to: Some(0xFFFF_FFFF),
        channel: 0,
        decoded: Some(DecodedPayload {
            portnum: PortNum::NodeinfoApp,
            text: None,
            user: Some(UserInfo {
                long_name: long.to_string(),
                short_name: short.to_string(),
                hw_model: Some("TBEAM".to_string()),
                role: Some("CLIENT".to_string()),
            }),
            telemetry: None,
        }),
    }
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<OutgoingMessage>) -> Vec<OutgoingMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// Replies addressed to `node`, joined.
pub fn replies_to(out: &[OutgoingMessage], node: u32) -> String {
    out.iter()
        .filter(|m| m.to_node == Some(node))
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn send_all(server: &mut BbsServer, from: u32, inputs: &[&str]) {
    for input in inputs {
        server.handle_packet(dm(from, input)).await;
    }
}
