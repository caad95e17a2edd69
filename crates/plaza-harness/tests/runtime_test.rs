//! End-to-end runtime tests.
//!
//! The production [`Runtime`] runs against the simulated server, the mock
//! REST API and a scripted [`SimDriver`] that checks the standard invariants
//! on every render. Each test is a script racing the runtime on one paused
//! tokio clock.

use std::{future::Future, sync::Arc, time::Duration};

use plaza_app::{Intent, Runtime};
use plaza_client::ClientConfig;
use plaza_core::PageContext;
use plaza_harness::{
    ChatBadge, InvariantRegistry, MockApi, SessionSnapshot, SimDriver, SimEnv, SimHandle,
    SimServer,
    mock_api::{stamp, user},
};
use plaza_app::action::StoryOp;
use plaza_proto::{
    ChatId, ChatMessage, ChatSummary, Endpoint, InboundEvent, MessageId, MessageType,
    Notification, NotificationType, Post, PostId, Story, StoryId, StoryType, StoryUser, UserId,
};

const ME: UserId = 1;
const BOB: UserId = 2;
const PATIENCE: Duration = Duration::from_secs(120);

fn chat(id: ChatId) -> ChatSummary {
    ChatSummary {
        id,
        name: None,
        is_group: false,
        profile_pic: None,
        last_message: None,
        unread_count: 0,
        other_user: Some(user(BOB, "bob")),
    }
}

fn post(id: PostId) -> Post {
    Post {
        id,
        user_id: BOB,
        author: "bob".into(),
        profile_pic: None,
        content: Some(format!("post {id}")),
        created_at: stamp(id),
        like_count: 0,
        comment_count: 0,
        liked_by_user: false,
    }
}

fn message(chat_id: ChatId, id: MessageId, user_id: UserId) -> ChatMessage {
    ChatMessage {
        id,
        chat_id,
        user_id,
        sender: "bob".into(),
        profile_pic: None,
        message_type: MessageType::Text,
        content: Some(format!("message {id}")),
        media_url: None,
        created_at: stamp(id),
        updated_at: None,
        is_deleted: false,
        read_by: Vec::new(),
    }
}

fn friend_request(id: u64) -> Notification {
    Notification {
        id,
        user_id: Some(ME),
        notification_type: NotificationType::FriendRequest,
        sender_id: Some(BOB),
        sender_name: Some("bob".into()),
        sender_profile_pic: None,
        reference_id: None,
        content: None,
        is_read: false,
        created_at: stamp(id),
    }
}

fn stories(user_id: UserId, ids: &[StoryId]) -> StoryUser {
    StoryUser {
        user: user(user_id, "bob"),
        stories: ids
            .iter()
            .map(|&id| Story {
                id,
                user_id,
                story_type: StoryType::Text,
                content: Some(format!("story {id}")),
                media_url: None,
                created_at: stamp(id),
                expires_at: stamp(id + 86_400),
                viewed: false,
            })
            .collect(),
    }
}

/// Run the app at `path` until `script` finishes, then quit.
///
/// Panics if the runtime fails, which includes any invariant violation.
async fn run<F, Fut>(server: &SimServer, api: &MockApi, path: &str, script: F)
where
    F: FnOnce(SimHandle) -> Fut,
    Fut: Future<Output = ()>,
{
    let env = SimEnv::with_seed(11);
    let config = ClientConfig::default();
    let realtime = plaza_client::RealtimeClient::spawn(
        env.clone(),
        server.connector(),
        "ws://sim/ws",
        "tok",
        PageContext::from_path(path),
        &config,
    );
    let (driver, handle) = SimDriver::new();
    let driver = driver.with_invariants(InvariantRegistry::standard());
    let runtime = Runtime::new(driver, env, realtime, Arc::new(api.clone()), &config, Some(ME));

    let quit = handle.clone();
    let body = async move {
        script(handle).await;
        quit.send(Intent::Quit);
    };
    let (result, ()) = tokio::join!(runtime.run(path), body);
    result.unwrap();
}

async fn until<F>(handle: &mut SimHandle, predicate: F) -> SessionSnapshot
where
    F: FnMut(&SessionSnapshot) -> bool,
{
    handle.wait_for(PATIENCE, predicate).await.expect("expected render never happened")
}

async fn authenticated(handle: &mut SimHandle) -> SessionSnapshot {
    let frame = until(handle, |f| f.connection == "authenticated").await;
    // Room joins and the notification snapshot are still in flight
    tokio::time::sleep(Duration::from_secs(1)).await;
    frame
}

#[tokio::test(start_paused = true)]
async fn feed_loads_and_double_like_sends_once() {
    let server = SimServer::new(ME, "ada");
    let api = MockApi::signed_in(ME, "ada");
    api.add_post(post(5));

    run(&server, &api, "/", |mut handle| {
        let api = api.clone();
        async move {
            until(&mut handle, |f| f.posts == vec![5]).await;
            api.set_latency(Duration::from_secs(1));

            handle.send(Intent::ToggleLike(5));
            handle.send(Intent::ToggleLike(5));
            tokio::time::sleep(Duration::from_secs(3)).await;

            assert_eq!(api.calls_to(&Endpoint::LikePost(5)).len(), 1);
        }
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn feed_poll_dies_with_the_page() {
    let server = SimServer::new(ME, "ada");
    let api = MockApi::signed_in(ME, "ada");
    api.add_post(post(1));
    let polls = Endpoint::Feed { page: 1, check_new: true };

    run(&server, &api, "/", |mut handle| {
        let api = api.clone();
        async move {
            until(&mut handle, |f| f.posts == vec![1]).await;
            tokio::time::sleep(Duration::from_secs(31)).await;
            assert_eq!(api.calls_to(&polls).len(), 1);

            handle.navigate("/chat");
            until(&mut handle, |f| f.context == "ChatList").await;
            tokio::time::sleep(Duration::from_secs(120)).await;
            assert_eq!(api.calls_to(&polls).len(), 1);
        }
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn new_post_banner_from_poll() {
    let server = SimServer::new(ME, "ada");
    let api = MockApi::signed_in(ME, "ada");
    api.add_post(post(1));

    run(&server, &api, "/", |mut handle| {
        let api = api.clone();
        async move {
            until(&mut handle, |f| f.posts == vec![1]).await;
            api.add_post(post(2));
            tokio::time::sleep(Duration::from_secs(31)).await;

            // Newer posts are announced, not spliced into the loaded page
            assert_eq!(handle.last_frame().unwrap().posts, vec![1]);
            handle.send(Intent::Refresh);
            until(&mut handle, |f| f.posts == vec![2, 1]).await;
        }
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn confirmed_send_renders_once() {
    let server = SimServer::new(ME, "ada");
    let api = MockApi::signed_in(ME, "ada");
    api.add_chat(chat(42));
    api.add_messages(42, [message(42, 1, BOB)]);

    run(&server, &api, "/chat/42", |mut handle| {
        let api = api.clone();
        let server = server.clone();
        async move {
            until(&mut handle, |f| f.messages == vec![1]).await;
            authenticated(&mut handle).await;

            handle.send(Intent::SendMessage { content: "hi".into(), message_type: MessageType::Text });
            until(&mut handle, |f| f.messages == vec![1, 1_000]).await;
            tokio::time::sleep(Duration::from_secs(2)).await;

            assert_eq!(handle.last_frame().unwrap().messages, vec![1, 1_000]);
            assert_eq!(server.requests_named("send_message").len(), 1);
            assert!(api.calls_to(&Endpoint::SendMessage(42)).is_empty());
        }
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn visibility_regain_resends_lost_read_mark() {
    let server = SimServer::new(ME, "ada");
    let api = MockApi::signed_in(ME, "ada");
    api.add_chat(chat(42));
    api.add_messages(42, [message(42, 1, BOB)]);

    run(&server, &api, "/chat/42", |mut handle| {
        let api = api.clone();
        let server = server.clone();
        async move {
            until(&mut handle, |f| f.messages == vec![1]).await;
            authenticated(&mut handle).await;
            let delivered = || {
                server.requests_named("read_messages").len()
                    + api.calls_to(&Endpoint::MarkChatRead(42)).len()
            };

            server.set_lose_reads(true);
            server.push_to_room(42, &InboundEvent::NewMessage(message(42, 2, BOB)));
            until(&mut handle, |f| f.messages == vec![1, 2]).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
            server.set_lose_reads(false);
            let before = delivered();

            handle.send(Intent::Visibility(false));
            handle.send(Intent::Visibility(true));
            tokio::time::sleep(Duration::from_secs(2)).await;

            assert!(delivered() > before, "read mark was not sent again");
        }
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn pushed_message_elsewhere_bumps_badge() {
    let server = SimServer::new(ME, "ada");
    let api = MockApi::signed_in(ME, "ada");
    api.add_chat(chat(42));
    api.add_chat(chat(43));

    run(&server, &api, "/chat/42", |mut handle| {
        let server = server.clone();
        async move {
            until(&mut handle, |f| f.chats.len() == 2).await;
            authenticated(&mut handle).await;

            server.push(&InboundEvent::NewMessage(message(43, 7, BOB)));
            server.push(&InboundEvent::NewMessage(message(42, 8, BOB)));
            let frame = until(&mut handle, |f| f.total_unread == 1 && f.messages == vec![8]).await;

            assert!(frame.chats.contains(&ChatBadge { id: 43, unread: 1 }));
            assert!(frame.chats.contains(&ChatBadge { id: 42, unread: 0 }));
        }
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn notification_push_toasts_and_counts() {
    let server = SimServer::new(ME, "ada");
    let api = MockApi::signed_in(ME, "ada");

    run(&server, &api, "/chat", |mut handle| {
        let server = server.clone();
        async move {
            authenticated(&mut handle).await;

            server.push(&InboundEvent::NewNotification(friend_request(3)));
            let frame = until(&mut handle, |f| f.notification_unread == 1).await;

            assert_eq!(frame.toasts, vec!["Friend Request: bob".to_string()]);
        }
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn navigation_discards_slow_page_loads() {
    let server = SimServer::new(ME, "ada");
    let api = MockApi::signed_in(ME, "ada");
    api.add_chat(chat(42));
    api.add_messages(42, [message(42, 1, BOB)]);
    api.set_latency(Duration::from_secs(5));

    run(&server, &api, "/chat/42", |mut handle| async move {
        handle.navigate("/notifications");
        until(&mut handle, |f| f.context == "Notifications").await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let frame = handle.last_frame().unwrap();
        assert_eq!(frame.pane_chat, None);
        assert!(frame.messages.is_empty());
        assert!(frame.chats.is_empty());
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn refused_realtime_shows_banner_and_rest_still_works() {
    let server = SimServer::new(ME, "ada");
    server.set_refuse(true);
    let api = MockApi::signed_in(ME, "ada");
    api.add_chat(chat(42));

    run(&server, &api, "/chat/42", |mut handle| {
        let api = api.clone();
        async move {
            until(&mut handle, |f| f.banner.is_some()).await;

            handle.send(Intent::SendMessage { content: "hi".into(), message_type: MessageType::Text });
            let frame = until(&mut handle, |f| f.messages.len() == 1).await;

            assert_eq!(api.calls_to(&Endpoint::SendMessage(42)).len(), 1);
            assert_eq!(api.history(42)[0].id, frame.messages[0]);
        }
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn stories_reported_once_and_advance() {
    let server = SimServer::new(ME, "ada");
    let api = MockApi::signed_in(ME, "ada");
    api.add_story_user(stories(BOB, &[30, 31]));

    run(&server, &api, "/stories", |mut handle| {
        let api = api.clone();
        async move {
            authenticated(&mut handle).await;
            handle.send(Intent::Story(StoryOp::Open(BOB)));
            until(&mut handle, |f| f.story == Some(30)).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(api.story_viewed(30));

            until(&mut handle, |f| f.story == Some(31)).await;
            until(&mut handle, |f| f.story.is_none()).await;
            assert!(api.story_viewed(31));

            // Everything seen: reopening reports nothing
            handle.send(Intent::Story(StoryOp::Open(BOB)));
            until(&mut handle, |f| f.story == Some(30)).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(api.calls_to(&Endpoint::ViewStory(30)).len(), 1);
            assert_eq!(api.calls_to(&Endpoint::ViewStory(31)).len(), 1);
        }
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn created_chat_opens() {
    let server = SimServer::new(ME, "ada");
    let api = MockApi::signed_in(ME, "ada");
    api.add_friend(user(BOB, "bob"));

    run(&server, &api, "/chat", |mut handle| {
        let api = api.clone();
        async move {
            authenticated(&mut handle).await;
            handle.send(Intent::SearchFriends(Some("bo".into())));
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(api.calls_to(&Endpoint::Friends { search: Some("bo".into()) }).len(), 1);

            handle.send(Intent::CreateChat { name: None, member_ids: vec![BOB] });
            let frame = until(&mut handle, |f| f.context_chat.is_some()).await;
            let chat_id = frame.context_chat.unwrap();
            assert!(api.chat(chat_id).is_some());
            until(&mut handle, |f| f.list_open_chat == Some(chat_id)).await;
        }
    })
    .await;
}
