//! Room Membership Tracker.
//!
//! Decides which `join_chat`/`leave_chat` requests go on the wire. Membership
//! is a function of the connection generation and the page: it is cleared
//! whenever the connection drops and rebuilt from the page context after
//! every authentication. The server is never trusted to remember rooms across
//! a dropped connection.
//!
//! Before the first authentication of a connection, joins and leaves are
//! queued and replayed in order once it completes.

use std::collections::{BTreeSet, VecDeque};

use plaza_proto::{ChatId, OutboundRequest, UserId};

use crate::context::{PageContext, Room};

/// A queued membership operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomOp {
    /// Join a chat room
    Join(ChatId),
    /// Leave a chat room
    Leave(ChatId),
}

/// Tracks joined rooms for the current connection.
#[derive(Debug, Clone, Default)]
pub struct RoomTracker {
    /// Authenticated on the current connection
    ready: bool,
    /// Rooms joined on the current connection
    joined: BTreeSet<Room>,
    /// Operations issued before authentication, in call order
    queue: VecDeque<RoomOp>,
    /// Page context
    context: PageContext,
    /// Rooms joined explicitly on this page, beyond the context room
    explicit: BTreeSet<ChatId>,
}

impl RoomTracker {
    /// Create a tracker for the given page.
    pub fn new(context: PageContext) -> Self {
        Self { context, ..Self::default() }
    }

    /// Whether joins go straight to the wire.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Rooms joined on the current connection.
    pub fn membership(&self) -> &BTreeSet<Room> {
        &self.joined
    }

    /// Whether `chat_id` is joined on the current connection.
    pub fn is_joined(&self, chat_id: ChatId) -> bool {
        self.joined.contains(&Room::Chat(chat_id))
    }

    /// Operations waiting for authentication.
    pub fn pending(&self) -> impl Iterator<Item = &RoomOp> {
        self.queue.iter()
    }

    /// Current page context.
    pub fn context(&self) -> &PageContext {
        &self.context
    }

    /// Join a chat room. Idempotent.
    pub fn join_chat(&mut self, chat_id: ChatId) -> Vec<OutboundRequest> {
        self.explicit.insert(chat_id);
        if !self.ready {
            self.queue.push_back(RoomOp::Join(chat_id));
            return Vec::new();
        }
        self.join_now(chat_id).into_iter().collect()
    }

    /// Leave a chat room. No-op if not joined.
    pub fn leave_chat(&mut self, chat_id: ChatId) -> Vec<OutboundRequest> {
        self.explicit.remove(&chat_id);
        if !self.ready {
            self.queue.push_back(RoomOp::Leave(chat_id));
            return Vec::new();
        }
        self.leave_now(chat_id).into_iter().collect()
    }

    /// Switch page. Leaves rooms the new page does not imply and joins the
    /// ones it does. Explicit joins are page-scoped and dropped.
    pub fn set_context(&mut self, context: PageContext) -> Vec<OutboundRequest> {
        if context == self.context {
            return Vec::new();
        }
        let target = context.chat_id();
        self.context = context;
        self.explicit.clear();
        self.queue.retain(|op| matches!(op, RoomOp::Join(id) if Some(*id) == target));

        if !self.ready {
            return Vec::new();
        }

        let stale: Vec<ChatId> = self
            .joined
            .iter()
            .filter_map(|room| match room {
                Room::Chat(id) if Some(*id) != target => Some(*id),
                _ => None,
            })
            .collect();

        let mut requests: Vec<OutboundRequest> =
            stale.into_iter().filter_map(|id| self.leave_now(id)).collect();
        if let Some(id) = target {
            requests.extend(self.join_now(id));
        }
        requests
    }

    /// The connection authenticated. Rebuild membership from scratch.
    ///
    /// Returns, in order: the join for the context room, replayed queued
    /// operations, joins for explicit rooms not yet covered, and a request
    /// for unread notifications.
    pub fn on_authenticated(&mut self, user_id: Option<UserId>) -> Vec<OutboundRequest> {
        self.ready = true;
        self.joined.clear();
        // The server subscribes the user room itself on authentication
        if let Some(user_id) = user_id {
            self.joined.insert(Room::User(user_id));
        }

        let mut requests = Vec::new();
        if let Some(id) = self.context.chat_id() {
            requests.extend(self.join_now(id));
        }
        while let Some(op) = self.queue.pop_front() {
            let request = match op {
                RoomOp::Join(id) => self.join_now(id),
                RoomOp::Leave(id) => self.leave_now(id),
            };
            requests.extend(request);
        }
        let explicit: Vec<ChatId> = self.explicit.iter().copied().collect();
        for id in explicit {
            requests.extend(self.join_now(id));
        }

        requests.push(OutboundRequest::GetNotifications {});
        requests
    }

    /// The connection dropped. Nothing is joined any more.
    pub fn on_connection_lost(&mut self) {
        self.ready = false;
        self.joined.clear();
    }

    fn join_now(&mut self, chat_id: ChatId) -> Option<OutboundRequest> {
        self.joined.insert(Room::Chat(chat_id)).then_some(OutboundRequest::JoinChat { chat_id })
    }

    fn leave_now(&mut self, chat_id: ChatId) -> Option<OutboundRequest> {
        self.joined.remove(&Room::Chat(chat_id)).then_some(OutboundRequest::LeaveChat { chat_id })
    }
}
