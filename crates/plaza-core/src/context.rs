//! Page context.
//!
//! The page the user is looking at decides which chat room the connection
//! should be in and which views are live. It is derived from the location
//! path, the same way a browser client reads `window.location`.

use std::collections::BTreeSet;

use plaza_proto::{ChatId, UserId};

/// A realtime room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Room {
    /// Per-user notification room. Joined by the server on authentication.
    User(UserId),
    /// Chat room. Joined explicitly with `join_chat`.
    Chat(ChatId),
}

/// Which page is active.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PageContext {
    /// News feed (`/` or `/feed`)
    #[default]
    Feed,
    /// Chat list without an open chat (`/chat`, `/chats`)
    ChatList,
    /// A single chat (`/chat/:id`)
    Chat(ChatId),
    /// A profile (`/profile/:username`)
    Profile(String),
    /// Notification listing (`/notifications`)
    Notifications,
    /// Stories bar and viewer (`/stories`)
    Stories,
    /// Any other page
    Other(String),
}

impl PageContext {
    /// Derive the context from a location path. Query and fragment are
    /// ignored.
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] | ["feed"] => Self::Feed,
            ["chat" | "chats"] => Self::ChatList,
            ["chat" | "chats", id, ..] => match id.parse() {
                Ok(id) => Self::Chat(id),
                Err(_) => Self::Other(path.to_string()),
            },
            ["profile", username, ..] => Self::Profile((*username).to_string()),
            ["notifications"] => Self::Notifications,
            ["stories"] => Self::Stories,
            _ => Self::Other(path.to_string()),
        }
    }

    /// Open chat, if the page is a chat.
    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::Chat(id) => Some(*id),
            _ => None,
        }
    }

    /// Rooms this page implies for an authenticated user.
    pub fn rooms(&self, user_id: Option<UserId>) -> BTreeSet<Room> {
        let mut rooms = BTreeSet::new();
        if let Some(user_id) = user_id {
            rooms.insert(Room::User(user_id));
        }
        if let Some(chat_id) = self.chat_id() {
            rooms.insert(Room::Chat(chat_id));
        }
        rooms
    }
}
