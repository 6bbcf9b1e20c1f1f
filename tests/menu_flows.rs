mod common;

use common::*;
use tcbbs::bbs::state::Step;
use tcbbs::mesh::Js8Report;

#[tokio::test]
async fn unknown_key_behaves_like_exit() {
    let (_dir, mut server, mut rx) = test_server().await;
    server.handle_packet(dm(ALICE, "x")).await;
    let exit_reply = drain(&mut rx);
    server.handle_packet(dm(ALICE, "z")).await;
    let unknown_reply = drain(&mut rx);
    assert_eq!(exit_reply.len(), 1);
    assert_eq!(unknown_reply.len(), 1);
    assert_eq!(exit_reply[0].content, unknown_reply[0].content);
    assert!(server.conversation_state(ALICE).is_none());
}

#[tokio::test]
async fn urgent_post_flow_stores_replicates_and_broadcasts() {
    let (_dir, mut server, mut rx) = test_server().await;
    send_all(&mut server, ALICE, &["b", "b", "u", "p", "Road closed", "Bridge out on 5th"]).await;

    let posts = server.store().list_bulletins("Urgent").unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].subject, "Road closed");
    assert_eq!(posts[0].sender_short_name, "ALC");
    assert!(server.conversation_state(ALICE).is_none());

    let out = drain(&mut rx);
    let to_peer: Vec<_> = out.iter().filter(|m| m.to_node == Some(PEER)).collect();
    assert_eq!(to_peer.len(), 1);
    assert!(to_peer[0].content.starts_with("BULLETIN|Urgent|ALC|Road closed|Bridge out on 5th|"));

    let broadcasts: Vec<_> = out.iter().filter(|m| m.is_broadcast()).collect();
    assert_eq!(broadcasts.len(), 1);
    assert!(broadcasts[0].content.contains("Road closed"));
    assert!(replies_to(&out, ALICE).contains("posted to Urgent"));
}

#[tokio::test]
async fn pipe_in_subject_never_reaches_the_wire_unescaped() {
    let (_dir, mut server, mut rx) = test_server().await;
    send_all(&mut server, ALICE, &["b", "b", "g", "p", "A|B", "body"]).await;
    let out = drain(&mut rx);
    let frame = out
        .iter()
        .find(|m| m.to_node == Some(PEER))
        .map(|m| m.content.clone())
        .unwrap();
    assert_eq!(frame.split('|').count(), 6);
    assert_eq!(server.store().list_bulletins("General").unwrap()[0].subject, "A/B");
}

#[tokio::test]
async fn mail_flow_notifies_recipient_and_reads_back() {
    let (_dir, mut server, mut rx) = test_server().await;
    send_all(&mut server, ALICE, &["b", "m", "s", "BOB", "Lunch", "Noon at the cafe"]).await;

    let out = drain(&mut rx);
    assert!(replies_to(&out, BOB).contains("new mail message from ALC"));
    assert!(replies_to(&out, ALICE).contains("Mail has been posted to the mailbox of BOB"));
    assert!(out
        .iter()
        .any(|m| m.to_node == Some(PEER) && m.content.starts_with("MAIL|")));

    let inbox = server.store().list_mail_for(BOB).unwrap();
    assert_eq!(inbox.len(), 1);
    let seq = inbox[0].seq.to_string();

    send_all(&mut server, BOB, &["CM", &seq]).await;
    let out = drain(&mut rx);
    assert!(replies_to(&out, BOB).contains("Noon at the cafe"));
    assert_eq!(
        server.conversation_state(BOB).map(|s| s.step),
        Some(Step::MailAction)
    );

    server.handle_packet(dm(BOB, "d")).await;
    let out = drain(&mut rx);
    assert!(replies_to(&out, BOB).contains("deleted"));
    assert!(out
        .iter()
        .any(|m| m.to_node == Some(PEER) && m.content.starts_with("DELETE_MAIL|")));
    assert!(server.store().list_mail_for(BOB).unwrap().is_empty());
}

#[tokio::test]
async fn unknown_recipient_reprompts() {
    let (_dir, mut server, mut rx) = test_server().await;
    send_all(&mut server, ALICE, &["b", "m", "s", "NOBODY"]).await;
    let out = drain(&mut rx);
    assert!(replies_to(&out, ALICE).contains("No node found matching 'NOBODY'"));
    assert_eq!(
        server.conversation_state(ALICE).map(|s| s.step),
        Some(Step::MailRecipient)
    );
}

#[tokio::test]
async fn quick_send_mail_and_post_bulletin() {
    let (_dir, mut server, mut rx) = test_server().await;
    server
        .handle_packet(dm(ALICE, "SM,,BOB,Hi,commas, are, kept"))
        .await;
    let inbox = server.store().list_mail_for(BOB).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].body, "commas, are, kept");

    server.handle_packet(dm(ALICE, "PB,,news,Net,Tonight 8pm")).await;
    assert_eq!(server.store().list_bulletins("News").unwrap().len(), 1);

    server.handle_packet(dm(ALICE, "SM,,BOB")).await;
    let out = drain(&mut rx);
    assert!(replies_to(&out, ALICE).contains("SM,,{short_name},{subject},{message}"));
}

#[tokio::test]
async fn quick_check_bulletins_opens_the_list() {
    let (_dir, mut server, mut rx) = test_server().await;
    server
        .handle_packet(dm(ALICE, "PB,,General,Swap,Saturday"))
        .await;
    drain(&mut rx);
    server.handle_packet(dm(ALICE, "CB,,General")).await;
    let out = drain(&mut rx);
    assert!(replies_to(&out, ALICE).contains("Swap - ALC"));
    assert_eq!(
        server.conversation_state(ALICE).map(|s| s.step),
        Some(Step::BulletinList)
    );
}

#[tokio::test]
async fn channel_directory_post_and_view() {
    let (_dir, mut server, mut rx) = test_server().await;
    send_all(&mut server, ALICE, &["b", "c", "p", "Ops", "https://meshtastic.org/e/#ops"]).await;
    let out = drain(&mut rx);
    let frame = "CHANNEL|Ops|https://meshtastic.org/e/#ops";
    assert!(out
        .iter()
        .any(|m| m.to_node == Some(PEER) && m.content == frame));

    send_all(&mut server, BOB, &["b", "c", "v", "1"]).await;
    let out = drain(&mut rx);
    assert!(replies_to(&out, BOB).contains("Ops: https://meshtastic.org/e/#ops"));

    server.handle_packet(dm(BOB, "CHL")).await;
    let out = drain(&mut rx);
    assert!(replies_to(&out, BOB).contains("Ops: https://meshtastic.org/e/#ops"));
}

#[tokio::test]
async fn js8_menu_reports_unconfigured() {
    let (_dir, mut server, mut rx) = test_server().await;
    send_all(&mut server, ALICE, &["b", "j", "s"]).await;
    let out = drain(&mut rx);
    assert!(replies_to(&out, ALICE).to_lowercase().contains("js8"));
    assert_eq!(
        server.conversation_state(ALICE).map(|s| s.step),
        Some(Step::Js8Menu)
    );
}

fn js8(receiver: &str, body: &str) -> Js8Report {
    Js8Report {
        sender: "K1ABC".to_string(),
        receiver: receiver.to_string(),
        text: body.to_string(),
    }
}

#[tokio::test]
async fn relayed_js8_traffic_shows_in_menu() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(&dir);
    cfg.js8call.enabled = true;
    cfg.js8call.groups = vec!["@HB".to_string()];
    cfg.js8call.urgent = vec!["@HBURG".to_string()];
    let (_dir, mut server, mut rx) = server_with(dir, cfg).await;

    server.handle_event(js8("@HBURG", "Flooding on route 9").into()).await;
    server.handle_event(js8("@HB", "Net at 2000").into()).await;
    server.handle_event(js8("W1AW", "QSL thanks").into()).await;
    assert_eq!(server.store().stats().js8, 3);

    send_all(&mut server, ALICE, &["b", "j", "u"]).await;
    let urgent = replies_to(&drain(&mut rx), ALICE);
    assert!(urgent.contains("Flooding on route 9"));
    assert!(!urgent.contains("Net at 2000"));

    server.handle_packet(dm(ALICE, "s")).await;
    let station = replies_to(&drain(&mut rx), ALICE);
    assert!(station.contains("QSL thanks"));

    send_all(&mut server, ALICE, &["g", "1"]).await;
    let group = replies_to(&drain(&mut rx), ALICE);
    assert!(group.contains("Net at 2000"));
}

#[tokio::test]
async fn js8_reports_are_dropped_when_disabled() {
    let (_dir, mut server, _rx) = test_server().await;
    server.handle_event(js8("@HB", "Net at 2000").into()).await;
    assert_eq!(server.store().stats().js8, 0);
}
