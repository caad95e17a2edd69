//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture what a session would show at a point in time.
//! Invariants operate on snapshots rather than live state so that checks are
//! consistent, and so tests can snapshot-assert the rendered state.

use std::{ops::Add, time::Duration};

use plaza_app::Session;
use plaza_core::PageContext;
use plaza_proto::{ChatId, MessageId, NotificationId, PostId, StoryId, UserId};
use serde::Serialize;

/// Snapshot of one session's observable state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Current page, as its context
    pub context: String,
    /// Chat the page context names, if any
    pub context_chat: Option<ChatId>,
    /// Signed-in user
    pub me: Option<UserId>,
    /// Connection state
    pub connection: String,
    /// Chat the message pane shows
    pub pane_chat: Option<ChatId>,
    /// Pane message ids in display order
    pub messages: Vec<MessageId>,
    /// Chat the list highlights as open
    pub list_open_chat: Option<ChatId>,
    /// Chat list badges in display order
    pub chats: Vec<ChatBadge>,
    /// Sum of chat list badges as the list reports it
    pub total_unread: u32,
    /// Feed post ids in display order
    pub posts: Vec<PostId>,
    /// Story on screen in the viewer
    pub story: Option<StoryId>,
    /// Notification ids in display order
    pub notifications: Vec<NotificationId>,
    /// Notification counter
    pub notification_unread: u32,
    /// Toasts as `title: body`
    pub toasts: Vec<String>,
    /// Persistent banner text
    pub banner: Option<String>,
}

/// A chat list entry as the list renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatBadge {
    /// Chat
    pub id: ChatId,
    /// Unread badge
    pub unread: u32,
}

impl SessionSnapshot {
    /// Capture a session.
    pub fn capture<I>(session: &Session<I>) -> Self
    where
        I: Copy + Ord + Add<Duration, Output = I>,
    {
        let context_chat = match session.context() {
            PageContext::Chat(id) => Some(*id),
            _ => None,
        };
        let (list_open_chat, chats, total_unread) = session.chat_list().map_or_else(
            || (None, Vec::new(), 0),
            |list| {
                let badges = list
                    .chats()
                    .iter()
                    .map(|chat| ChatBadge { id: chat.id, unread: chat.unread_count })
                    .collect();
                (list.open_chat(), badges, list.total_unread())
            },
        );

        Self {
            context: format!("{:?}", session.context()),
            context_chat,
            me: session.me(),
            connection: session.connection().to_string(),
            pane_chat: session.chat().map(plaza_app::views::ChatPane::chat_id),
            messages: session
                .chat()
                .map(|pane| pane.messages().iter().map(|m| m.id).collect())
                .unwrap_or_default(),
            list_open_chat,
            chats,
            total_unread,
            posts: session
                .feed()
                .map(|feed| feed.posts().iter().map(|p| p.id).collect())
                .unwrap_or_default(),
            story: session
                .stories()
                .and_then(|stories| stories.current())
                .map(|(_, story)| story.id),
            notifications: session.notifications().items().iter().map(|n| n.id).collect(),
            notification_unread: session.notifications().unread(),
            toasts: session
                .toasts()
                .iter()
                .map(|toast| format!("{}: {}", toast.title, toast.body))
                .collect(),
            banner: session.banner().map(|banner| banner.text().to_string()),
        }
    }

    /// Empty snapshot with the given messages in the pane.
    pub fn with_messages(mut self, chat_id: ChatId, ids: impl IntoIterator<Item = MessageId>) -> Self {
        self.pane_chat = Some(chat_id);
        self.messages = ids.into_iter().collect();
        self
    }

    /// Add chat list badges.
    pub fn with_chats(mut self, badges: impl IntoIterator<Item = (ChatId, u32)>) -> Self {
        self.chats.extend(badges.into_iter().map(|(id, unread)| ChatBadge { id, unread }));
        self.total_unread = self.chats.iter().map(|c| c.unread).sum();
        self
    }

    /// Set the page context's chat and the list highlight.
    pub fn with_open_chat(mut self, chat_id: Option<ChatId>) -> Self {
        self.context_chat = chat_id;
        self.list_open_chat = chat_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use plaza_app::Intent;

    use super::*;

    #[test]
    fn builder_sums_badges() {
        let snapshot = SessionSnapshot::default().with_chats([(1, 2), (2, 3)]).with_open_chat(Some(3));
        assert_eq!(snapshot.total_unread, 5);
        assert_eq!(snapshot.list_open_chat, Some(3));
    }

    #[test]
    fn capture_chat_page() {
        let mut session: Session<Duration> = Session::new(Some(1));
        session.navigate("/chat/42");
        let _ = session.intent(Intent::Refresh, Duration::ZERO);

        let snapshot = SessionSnapshot::capture(&session);
        assert_eq!(snapshot.context_chat, Some(42));
        assert_eq!(snapshot.pane_chat, Some(42));
        assert_eq!(snapshot.list_open_chat, Some(42));
        assert!(snapshot.messages.is_empty());
        assert_eq!(snapshot.connection, "disconnected");
    }
}
