//! Property-based tests for the view synchronizers.
//!
//! Invariants checked under arbitrary event sequences:
//!
//! - the chat pane holds every message id exactly once, ordered by id, no
//!   matter how often or in what order pushes and confirmations arrive
//! - a paged view never has two page requests in flight and never requests
//!   past the last page
//! - a page requested before a refresh never lands in the refreshed list
//! - chat list badges never count our own messages or the open chat

use std::collections::BTreeSet;

use chrono::{TimeZone, Utc};
use plaza_app::{
    AppAction, Viewport,
    action::Fetch,
    views::{ChatList, ChatPane, Feed},
};
use plaza_client::ApiError;
use plaza_proto::{
    ChatId, ChatMessage, ChatSummary, MessageId, MessageType, Pagination, Post, UserId,
    rest::{FeedPage, MessagePage},
};
use proptest::prelude::*;

const ME: UserId = 1;
const CHAT: ChatId = 42;

fn message(chat_id: ChatId, id: MessageId, user_id: UserId) -> ChatMessage {
    ChatMessage {
        id,
        chat_id,
        user_id,
        sender: format!("user{user_id}"),
        profile_pic: None,
        message_type: MessageType::Text,
        content: Some(format!("message {id}")),
        media_url: None,
        created_at: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
        updated_at: None,
        is_deleted: false,
        read_by: Vec::new(),
    }
}

fn post(id: u64) -> Post {
    Post {
        id,
        user_id: 2,
        author: "ada".into(),
        profile_pic: None,
        content: Some("post".into()),
        created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        like_count: 0,
        comment_count: 0,
        liked_by_user: false,
    }
}

/// How a message reaches the pane.
#[derive(Debug, Clone)]
enum Arrival {
    Push { id: MessageId, user_id: UserId },
    Confirmed { id: MessageId },
}

fn arrival_strategy() -> impl Strategy<Value = Arrival> {
    prop_oneof![
        3 => (1u64..60, 1u64..4).prop_map(|(id, user_id)| Arrival::Push { id, user_id }),
        1 => (1u64..60).prop_map(|id| Arrival::Confirmed { id }),
    ]
}

/// Input to a paged view.
#[derive(Debug, Clone)]
enum PageInput {
    ScrollNearEnd,
    ScrollElsewhere,
    Reply { ok: bool },
    Refresh,
}

fn page_input_strategy() -> impl Strategy<Value = PageInput> {
    prop_oneof![
        3 => Just(PageInput::ScrollNearEnd),
        1 => Just(PageInput::ScrollElsewhere),
        2 => any::<bool>().prop_map(|ok| PageInput::Reply { ok }),
        1 => Just(PageInput::Refresh),
    ]
}

fn feed_fetch(actions: &[AppAction]) -> Option<(u32, u64)> {
    actions.iter().find_map(|action| match action {
        AppAction::Fetch(Fetch::Feed { page, generation, check_new: false }) => {
            Some((*page, *generation))
        },
        _ => None,
    })
}

proptest! {
    #[test]
    fn prop_chat_pane_exactly_once_in_order(
        history in prop::collection::btree_set(1u64..60, 0..20),
        arrivals in prop::collection::vec(arrival_strategy(), 0..80),
    ) {
        let mut pane = ChatPane::new(CHAT, Some(ME));
        pane.refresh();
        pane.on_page(1, 0, Ok(MessagePage {
            messages: history.iter().rev().map(|&id| message(CHAT, id, 2)).collect(),
            pagination: Pagination { current_page: 1, total_pages: 1 },
        }));

        let mut expected: BTreeSet<MessageId> = history;
        for arrival in arrivals {
            match arrival {
                Arrival::Push { id, user_id } => {
                    pane.on_new_message(message(CHAT, id, user_id));
                },
                Arrival::Confirmed { id } => pane.insert_confirmed(message(CHAT, id, ME)),
            }
            let id = match arrival {
                Arrival::Push { id, .. } | Arrival::Confirmed { id } => id,
            };
            expected.insert(id);

            let ids: Vec<MessageId> = pane.messages().iter().map(|m| m.id).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]), "not strictly ordered: {:?}", ids);
            prop_assert_eq!(ids, expected.iter().copied().collect::<Vec<_>>());
        }

        // Another chat's message never lands here.
        pane.on_new_message(message(CHAT + 1, 999, 2));
        prop_assert!(!pane.messages().contains(999));
    }

    #[test]
    fn prop_feed_pages_one_at_a_time(
        total_pages in 1u32..5,
        inputs in prop::collection::vec(page_input_strategy(), 0..60),
    ) {
        let mut feed = Feed::new(Some(ME));
        let mut in_flight = feed_fetch(&feed.refresh().actions);
        prop_assert_eq!(in_flight, Some((1, 0)));

        let mut next_post = 0u64;
        let mut applied = 0usize;
        for input in inputs {
            match input {
                PageInput::ScrollNearEnd | PageInput::ScrollElsewhere => {
                    let viewport = if matches!(input, PageInput::ScrollNearEnd) {
                        Viewport::new(1_500, 600, 2_000)
                    } else {
                        Viewport::new(0, 600, 5_000)
                    };
                    let requested = feed_fetch(&feed.on_scroll(viewport).actions);
                    if let Some((page, _)) = requested {
                        prop_assert!(in_flight.is_none(), "page {} requested while {:?} in flight", page, in_flight);
                        prop_assert!(page <= total_pages, "page {} past the end", page);
                        prop_assert!(matches!(input, PageInput::ScrollNearEnd));
                        in_flight = requested;
                    }
                },
                PageInput::Reply { ok } => {
                    let Some((page, generation)) = in_flight.take() else { continue };
                    let result = if ok {
                        next_post += 1;
                        applied += 1;
                        Ok(FeedPage {
                            posts: vec![post(next_post)],
                            pagination: Pagination { current_page: page, total_pages },
                            has_new_posts: false,
                            new_posts_count: 0,
                        })
                    } else {
                        Err(ApiError::Network("reset".into()))
                    };
                    feed.on_page(page, generation, false, result);
                    prop_assert!(!feed.cursor().is_loading());
                    prop_assert_eq!(feed.posts().len(), applied);
                },
                PageInput::Refresh => {
                    let stale = in_flight.take();
                    in_flight = feed_fetch(&feed.refresh().actions);
                    applied = 0;
                    let Some((fresh_page, fresh_generation)) = in_flight else {
                        return Err(TestCaseError::fail("refresh did not request page 1"));
                    };
                    prop_assert_eq!(fresh_page, 1);

                    // The reply to the request the refresh superseded arrives now.
                    if let Some((page, generation)) = stale {
                        prop_assert!(generation < fresh_generation);
                        feed.on_page(page, generation, false, Ok(FeedPage {
                            posts: vec![post(u64::MAX)],
                            pagination: Pagination { current_page: page, total_pages },
                            has_new_posts: false,
                            new_posts_count: 0,
                        }));
                        prop_assert!(feed.posts().is_empty());
                        prop_assert!(feed.cursor().is_loading());
                        prop_assert_eq!(feed.cursor().current_page(), 0);
                    }
                },
            }
        }
    }

    #[test]
    fn prop_badges_skip_own_and_open(
        open in prop::option::of(1u64..4),
        messages in prop::collection::vec((1u64..4, 1u64..4), 0..40),
    ) {
        let mut list = ChatList::new(Some(ME));
        list.refresh();
        list.on_loaded(Ok((1..4).map(|id| ChatSummary {
            id,
            name: None,
            is_group: false,
            profile_pic: None,
            last_message: None,
            unread_count: 0,
            other_user: None,
        }).collect()));
        list.open(open);

        let mut expected = 0u32;
        for (index, (chat_id, user_id)) in messages.into_iter().enumerate() {
            let id = index as u64 + 1;
            list.on_new_message(&message(chat_id, id, user_id));
            if Some(chat_id) != open && user_id != ME {
                expected += 1;
            }
            prop_assert_eq!(list.total_unread(), expected);
            if let Some(open) = open {
                prop_assert_eq!(list.chats().get(open).map(|c| c.unread_count), Some(0));
            }
        }
    }
}
