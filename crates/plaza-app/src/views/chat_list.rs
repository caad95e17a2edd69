//! Chat list with live ordering and unread badges.

use std::collections::{HashMap, HashSet};

use plaza_client::ApiError;
use plaza_proto::{ChatId, ChatMessage, ChatSummary, MessageId, UserId, UserSummary};

use crate::{
    action::{AppAction, Fetch},
    toast::Notice,
    view::{EntityList, Update, ViewPhase},
};

/// Chats, most recently active first.
#[derive(Debug, Clone, Default)]
pub struct ChatList {
    me: Option<UserId>,
    open_chat: Option<ChatId>,
    phase: ViewPhase,
    chats: EntityList<ChatSummary>,
    /// Messages already behind each badge
    counted: HashMap<ChatId, Counted>,
    /// Friends offered for a new chat
    friends: EntityList<UserSummary>,
    /// Filter of the latest friend search
    friend_search: Option<String>,
}

/// Messages reflected in one chat's badge. The server's summary covers every
/// id up to `through`; pushes past it are tracked individually, so a message
/// arriving out of order is still counted once.
#[derive(Debug, Clone, Default)]
struct Counted {
    through: MessageId,
    ids: HashSet<MessageId>,
}

impl Counted {
    fn summarized(&mut self, last: MessageId) {
        let through = self.through.max(last);
        self.through = through;
        self.ids.retain(|&id| id > through);
    }

    /// Record `id`. `false` if it was already reflected.
    fn insert(&mut self, id: MessageId) -> bool {
        id > self.through && self.ids.insert(id)
    }
}

impl ChatList {
    /// Empty list for `me`.
    pub fn new(me: Option<UserId>) -> Self {
        Self { me, ..Self::default() }
    }

    /// Load phase.
    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    /// Chats in display order.
    pub fn chats(&self) -> &EntityList<ChatSummary> {
        &self.chats
    }

    /// Chat currently open, if any.
    pub fn open_chat(&self) -> Option<ChatId> {
        self.open_chat
    }

    /// Sum of unread badges.
    pub fn total_unread(&self) -> u32 {
        self.chats.iter().map(|c| c.unread_count).sum()
    }

    /// Friends matching the latest search.
    pub fn friends(&self) -> &EntityList<UserSummary> {
        &self.friends
    }

    /// Look up friends to start a chat with. A blank filter lists everyone.
    pub fn search_friends(&mut self, search: Option<String>) -> Update {
        let search = search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.friend_search.clone_from(&search);
        Update::action(AppAction::Fetch(Fetch::Friends { search }))
    }

    /// Friend search results. Replies to an older search are dropped.
    pub fn on_friends(
        &mut self,
        search: Option<String>,
        result: Result<Vec<UserSummary>, ApiError>,
    ) -> Update {
        if search != self.friend_search {
            tracing::debug!(?search, "stale friend search dropped");
            return Update::none();
        }
        match result {
            Ok(friends) => {
                self.friends.clear();
                self.friends.extend(friends);
                Update::none()
            },
            Err(error) => Update::notice(Notice::error(error.user_message())),
        }
    }

    /// Set the viewing user once known.
    pub fn set_me(&mut self, me: Option<UserId>) {
        self.me = me;
    }

    /// Drop content and reload.
    pub fn refresh(&mut self) -> Update {
        self.chats.clear();
        self.counted.clear();
        self.phase.begin_refresh();
        Update::action(AppAction::Fetch(Fetch::Chats))
    }

    /// The chat list arrived.
    pub fn on_loaded(&mut self, result: Result<Vec<ChatSummary>, ApiError>) -> Update {
        match result {
            Ok(chats) => {
                self.chats.clear();
                self.counted.clear();
                for mut chat in chats {
                    if Some(chat.id) == self.open_chat {
                        chat.unread_count = 0;
                    }
                    if let Some(last) = &chat.last_message {
                        self.counted.entry(chat.id).or_default().summarized(last.id);
                    }
                    self.chats.upsert(chat);
                }
                self.phase.succeed();
            },
            Err(error) => {
                tracing::debug!(%error, "chat list failed");
                self.phase.fail(error.user_message());
            },
        }
        Update::none()
    }

    /// Open a chat: its badge goes to zero.
    pub fn open(&mut self, chat_id: Option<ChatId>) {
        self.open_chat = chat_id;
        if let Some(chat) = chat_id.and_then(|id| self.chats.get_mut(id)) {
            chat.unread_count = 0;
        }
    }

    /// `new_message` broadcast, or our own confirmed send.
    ///
    /// An unknown chat triggers a reload, since the list has no record to
    /// place the message in.
    pub fn on_new_message(&mut self, message: &ChatMessage) -> Update {
        if !self.phase.accepts_events() {
            return Update::none();
        }
        let chat_id = message.chat_id;
        let Some(chat) = self.chats.get_mut(chat_id) else {
            tracing::debug!(chat_id, "message for unknown chat; reloading list");
            return self.refresh();
        };

        let newer = chat.last_message.as_ref().is_none_or(|last| last.id <= message.id);
        if newer {
            chat.last_message = Some(message.clone());
        }

        let first_sighting = self.counted.entry(chat_id).or_default().insert(message.id);
        let counts = Some(chat_id) != self.open_chat && Some(message.user_id) != self.me;
        if counts && first_sighting {
            chat.unread_count += 1;
        }
        self.chats.move_to_front(chat_id);
        Update::none()
    }

    /// `chat_updated` broadcast: replace the entry and move it to the top.
    pub fn on_chat_updated(&mut self, mut chat: ChatSummary) {
        if !self.phase.accepts_events() {
            return;
        }
        if Some(chat.id) == self.open_chat {
            chat.unread_count = 0;
        }
        if let Some(last) = &chat.last_message {
            self.counted.entry(chat.id).or_default().summarized(last.id);
        }
        let chat_id = chat.id;
        self.chats.upsert_front(chat);
        self.chats.move_to_front(chat_id);
    }
}
