mod common;

use common::*;
use tcbbs::bbs::BbsServer;
use tcbbs::mesh::NodeDirectory;
use tokio::sync::mpsc;

#[tokio::test]
async fn run_drains_inbound_and_persists_on_close() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(&dir);
    let directory_path = cfg.node_directory_path();
    let mut server = BbsServer::new(cfg).await.unwrap();

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();
    server.attach_transport(event_rx, outgoing_tx);

    event_tx.send(node_info(ALICE, "ALC", "Alice Base").into()).unwrap();
    event_tx.send(dm(ALICE, "x").into()).unwrap();
    event_tx
        .send(text(PEER, OWN, "BULLETIN|General|ALC|Hello|World|run-1").into())
        .unwrap();
    drop(event_tx);

    server.run().await.unwrap();

    let mut replies = Vec::new();
    while let Some(msg) = outgoing_rx.recv().await {
        replies.push(msg);
    }
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].to_node, Some(ALICE));
    assert_eq!(server.store().list_bulletins("General").unwrap().len(), 1);

    let saved = NodeDirectory::load_from_file(&directory_path).unwrap();
    assert_eq!(saved.short_name_for(ALICE), "ALC");
}

#[tokio::test]
async fn run_without_transport_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = BbsServer::new(test_config(&dir)).await.unwrap();
    assert!(server.run().await.is_err());
}
