mod common;

use common::*;

#[tokio::test]
async fn duplicate_bulletin_frame_stores_once() {
    let (_dir, mut server, mut rx) = test_server().await;
    let frame = "BULLETIN|General|ALC|Swap meet|Saturday 9am|uid-1";
    server.handle_packet(text(PEER, OWN, frame)).await;
    server.handle_packet(text(PEER, OWN, frame)).await;
    let posts = server.store().list_bulletins("General").unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].unique_id, "uid-1");
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn duplicate_mail_frame_stores_once() {
    let (_dir, mut server, mut rx) = test_server().await;
    let frame = format!("MAIL|{}|ALC|{}|Lunch|Noon at the cafe|m-dup", ALICE, BOB);
    server.handle_packet(text(PEER, OWN, &frame)).await;
    let first = server.store().list_mail_for(BOB).unwrap();
    server.handle_packet(text(PEER, OWN, &frame)).await;
    let second = server.store().list_mail_for(BOB).unwrap();

    assert_eq!(second.len(), 1);
    assert_eq!(first, second);
    assert_eq!(second[0].unique_id, "m-dup");
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn delete_mail_is_a_noop_when_missing_or_repeated() {
    let (_dir, mut server, _rx) = test_server().await;
    server.handle_packet(text(PEER, OWN, "DELETE_MAIL|m-1")).await;
    assert!(server.store().get_mail("m-1").unwrap().is_none());

    let mail = format!("MAIL|{}|ALC|{}|Hi|Hello Bob|m-1", ALICE, BOB);
    server.handle_packet(text(PEER, OWN, &mail)).await;
    assert_eq!(server.store().find_mail_recipient("m-1").unwrap(), Some(BOB));

    server.handle_packet(text(PEER, OWN, "DELETE_MAIL|m-1")).await;
    server.handle_packet(text(PEER, OWN, "DELETE_MAIL|m-1")).await;
    assert!(server.store().get_mail("m-1").unwrap().is_none());
}

#[tokio::test]
async fn malformed_frame_does_not_block_the_next_one() {
    let (_dir, mut server, _rx) = test_server().await;
    server.handle_packet(text(PEER, OWN, "MAIL|onlyonefield")).await;
    let mail = format!("MAIL|!{:08x}|ALC|!{:08x}|Subject|Body|m-2", ALICE, BOB);
    server.handle_packet(text(PEER, OWN, &mail)).await;
    let inbox = server.store().list_mail_for(BOB).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].sender_id, ALICE);
    assert_eq!(inbox[0].sender_short_name, "ALC");
}

#[tokio::test]
async fn urgent_bulletin_broadcasts_exactly_once() {
    let (_dir, mut server, mut rx) = test_server().await;
    let frame = "BULLETIN|Urgent|Alice|Storm Warning|Winds 60mph|uid-9";
    server.handle_packet(text(PEER, OWN, frame)).await;
    server.handle_packet(text(PEER, OWN, frame)).await;
    let out = drain(&mut rx);
    assert_eq!(out.len(), 1);
    assert!(out[0].is_broadcast());
    assert!(out[0].content.contains("Alice"));
    assert!(out[0].content.contains("Storm Warning"));
}

#[tokio::test]
async fn general_bulletin_broadcasts_nothing() {
    let (_dir, mut server, mut rx) = test_server().await;
    server
        .handle_packet(text(PEER, OWN, "BULLETIN|General|Alice|Storm Warning|x|uid-10"))
        .await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn channel_and_bulletin_deletes_apply() {
    let (_dir, mut server, _rx) = test_server().await;
    server
        .handle_packet(text(PEER, OWN, "CHANNEL|Ops|https://meshtastic.org/e/#ops"))
        .await;
    server
        .handle_packet(text(PEER, OWN, "BULLETIN|News|ALC|Net|Tonight|b-1"))
        .await;
    server.handle_packet(text(PEER, OWN, "DELETE_BULLETIN|b-1")).await;
    server.handle_packet(text(PEER, OWN, "DELETE_BULLETIN|b-1")).await;

    let channels = server.store().list_channels().unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].url, "https://meshtastic.org/e/#ops");
    assert!(server.store().list_bulletins("News").unwrap().is_empty());
}

#[tokio::test]
async fn frames_from_non_peers_are_not_applied() {
    let (_dir, mut server, _rx) = test_server().await;
    // A user typing frame text gets the menu, not replication
    server
        .handle_packet(dm(ALICE, "BULLETIN|General|ALC|Fake|x|uid-fake"))
        .await;
    assert!(server.store().list_bulletins("General").unwrap().is_empty());
}
