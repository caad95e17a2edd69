//! Snapshot tests of the frames a client session puts on the wire.
//!
//! Single-frame shapes are covered in `plaza-proto`. These pin down the
//! sequence: what follows an open, what a reconnect replays, and how ack ids
//! advance. Client refs are random and redacted.

use std::{sync::Arc, time::Duration};

use plaza_client::{ClientConfig, Lifecycle, Messenger, RealtimeClient};
use plaza_core::PageContext;
use plaza_harness::{MockApi, SimEnv, SimServer};
use plaza_proto::MessageType;
use tokio::{sync::broadcast, time::timeout};

async fn authenticated(lifecycle: &mut broadcast::Receiver<Lifecycle>) {
    loop {
        let notice = timeout(Duration::from_secs(600), lifecycle.recv()).await.unwrap().unwrap();
        if matches!(notice, Lifecycle::Authenticated { .. }) {
            return;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn session_open_and_send() {
    let server = SimServer::new(1, "ada");
    let realtime = RealtimeClient::spawn(
        SimEnv::with_seed(3),
        server.connector(),
        "ws://sim/ws",
        "csrf-abc",
        PageContext::Chat(42),
        &ClientConfig::default(),
    );
    let mut lifecycle = realtime.lifecycle();
    realtime.connect().await;
    authenticated(&mut lifecycle).await;

    let messenger = Messenger::new(SimEnv::with_seed(3), realtime, Arc::new(MockApi::new()));
    messenger.send_message(42, "hi", MessageType::Text).await.unwrap();

    insta::assert_json_snapshot!(server.received_json(), {
        "[].data.client_ref" => "[client_ref]"
    }, @r#"
    [
      {
        "data": {
          "token": "csrf-abc"
        },
        "type": "auth"
      },
      {
        "data": {
          "chat_id": 42
        },
        "type": "join_chat"
      },
      {
        "data": {},
        "id": 1,
        "type": "get_notifications"
      },
      {
        "data": {
          "chat_id": 42,
          "client_ref": "[client_ref]",
          "content": "hi",
          "message_type": "text"
        },
        "id": 2,
        "type": "send_message"
      }
    ]
    "#);
}

#[tokio::test(start_paused = true)]
async fn reconnect_replays_auth_and_rooms() {
    let server = SimServer::new(1, "ada");
    let realtime = RealtimeClient::spawn(
        SimEnv::with_seed(3),
        server.connector(),
        "ws://sim/ws",
        "csrf-abc",
        PageContext::ChatList,
        &ClientConfig::default(),
    );
    let mut lifecycle = realtime.lifecycle();
    realtime.connect().await;
    authenticated(&mut lifecycle).await;
    realtime.join_chat(9).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    server.drop_connections();
    authenticated(&mut lifecycle).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let per_connection: Vec<(u64, String)> = server
        .received()
        .into_iter()
        .filter_map(|r| r.frame.map(|f| (r.connection, f.request.op_name().to_string())))
        .collect();
    insta::assert_debug_snapshot!(per_connection, @r#"
    [
        (
            1,
            "auth",
        ),
        (
            1,
            "get_notifications",
        ),
        (
            1,
            "join_chat",
        ),
        (
            2,
            "auth",
        ),
        (
            2,
            "join_chat",
        ),
        (
            2,
            "get_notifications",
        ),
    ]
    "#);
}
