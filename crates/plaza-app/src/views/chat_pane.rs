//! History of the open chat.
//!
//! Messages are kept sorted by id, so a record reaching us twice (from the
//! send confirmation and again from the room broadcast, or from a history page
//! and a push) is rendered once and in order. Older history is requested when
//! the pane is scrolled to the very top.

use plaza_client::ApiError;
use plaza_proto::{
    ChatId, ChatMessage, MessageDeleted, MessageId, MessagesRead, UserId, rest::MessagePage,
};

use crate::{
    action::{AppAction, Fetch},
    pagination::{Cursor, Viewport},
    toast::Notice,
    view::{EntityList, Update, Upsert, ViewPhase},
};

/// Synchronized history of one chat.
#[derive(Debug, Clone)]
pub struct ChatPane {
    chat_id: ChatId,
    me: Option<UserId>,
    phase: ViewPhase,
    messages: EntityList<ChatMessage>,
    history: Cursor,
    visible: bool,
    /// Content height when the pending older page was requested
    prepend_anchor: Option<u32>,
}

impl ChatPane {
    /// Pane for `chat_id`, viewed by `me`.
    pub fn new(chat_id: ChatId, me: Option<UserId>) -> Self {
        Self {
            chat_id,
            me,
            phase: ViewPhase::Empty,
            messages: EntityList::new(),
            history: Cursor::new(),
            visible: true,
            prepend_anchor: None,
        }
    }

    /// Chat shown.
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Load phase.
    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    /// Messages, oldest first.
    pub fn messages(&self) -> &EntityList<ChatMessage> {
        &self.messages
    }

    /// History pagination.
    pub fn history(&self) -> &Cursor {
        &self.history
    }

    /// Newest message id.
    pub fn latest_id(&self) -> Option<MessageId> {
        self.messages.last().map(|m| m.id)
    }

    /// Set the viewing user once known.
    pub fn set_me(&mut self, me: Option<UserId>) {
        self.me = me;
    }

    /// Drop content and load the newest page.
    pub fn refresh(&mut self) -> Update {
        self.messages.clear();
        self.history.reset();
        self.prepend_anchor = None;
        self.phase.begin_refresh();
        self.fetch_older().unwrap_or_default()
    }

    /// The pane scrolled.
    pub fn on_scroll(&mut self, viewport: Viewport) -> Update {
        let mut update = Update::none();
        if viewport.at_top() {
            update.merge(self.load_older(viewport.scroll_height));
        }
        if viewport.near_bottom() && self.visible && self.phase.accepts_events() {
            update.actions.push(self.mark_read(true));
        }
        update
    }

    fn load_older(&mut self, scroll_height: u32) -> Update {
        if !self.phase.begin_more() {
            return Update::none();
        }
        let Some(update) = self.fetch_older() else {
            self.phase.succeed();
            return Update::none();
        };
        self.prepend_anchor = Some(scroll_height);
        update
    }

    fn fetch_older(&mut self) -> Option<Update> {
        let page = self.history.begin_next()?;
        let generation = self.history.generation();
        let fetch = Fetch::Messages { chat_id: self.chat_id, page, generation };
        Some(Update::action(AppAction::Fetch(fetch)))
    }

    /// A history page arrived. Pages requested before the last refresh are
    /// dropped.
    pub fn on_page(
        &mut self,
        page: u32,
        generation: u64,
        result: Result<MessagePage, ApiError>,
    ) -> Update {
        if !self.history.accepts(page, generation) {
            tracing::debug!(chat_id = self.chat_id, page, generation, "stale page dropped");
            return Update::none();
        }
        match result {
            Ok(body) => {
                for message in body.messages {
                    if message.chat_id == self.chat_id {
                        self.messages.upsert_sorted(message);
                    }
                }
                self.history.complete(page, body.pagination.total_pages);
                self.phase.succeed();

                let anchor = self.prepend_anchor.take();
                if page == 1 {
                    if self.visible {
                        return Update::action(self.mark_read(false));
                    }
                    return Update::none();
                }
                match anchor {
                    Some(previous_height) => {
                        Update::action(AppAction::RestoreScroll { previous_height })
                    },
                    None => Update::none(),
                }
            },
            Err(error) => {
                tracing::debug!(chat_id = self.chat_id, page, %error, "history page failed");
                self.history.fail();
                self.prepend_anchor = None;
                match self.phase.fail(error.user_message()) {
                    Some(message) => Update::notice(Notice::error(message)),
                    None => Update::none(),
                }
            },
        }
    }

    /// `new_message` broadcast.
    pub fn on_new_message(&mut self, message: ChatMessage) -> Update {
        if !self.phase.accepts_events() || message.chat_id != self.chat_id {
            return Update::none();
        }
        let from_other = Some(message.user_id) != self.me;
        let inserted = self.messages.upsert_sorted(message) == Upsert::Inserted;
        if inserted && from_other && self.visible {
            return Update::action(self.mark_read(false));
        }
        Update::none()
    }

    /// Our own send was confirmed.
    pub fn insert_confirmed(&mut self, message: ChatMessage) {
        if message.chat_id == self.chat_id {
            self.messages.upsert_sorted(message);
        }
    }

    /// `message_deleted` broadcast.
    pub fn on_deleted(&mut self, deleted: &MessageDeleted) {
        if !self.phase.accepts_events() || deleted.chat_id != self.chat_id {
            return;
        }
        if let Some(message) = self.messages.get_mut(deleted.id) {
            message.soft_delete();
        }
    }

    /// Our own delete was confirmed.
    pub fn apply_delete(&mut self, message_id: MessageId, record: Option<ChatMessage>) {
        match record {
            Some(record) if record.chat_id == self.chat_id => {
                self.messages.upsert_sorted(record);
            },
            _ => {
                if let Some(message) = self.messages.get_mut(message_id) {
                    message.soft_delete();
                }
            },
        }
    }

    /// `messages_read` broadcast: someone else read our messages.
    pub fn on_read(&mut self, read: &MessagesRead) {
        if !self.phase.accepts_events() || read.chat_id != self.chat_id {
            return;
        }
        let Some(me) = self.me else {
            return;
        };
        if read.user_id == me {
            return;
        }

        let own = self.messages.iter().filter(|m| m.user_id == me).map(|m| m.id);
        let ids: Vec<MessageId> = own.collect();
        for id in ids {
            if let Some(message) = self.messages.get_mut(id) {
                let covered = read.read_at.is_none_or(|at| message.created_at <= at);
                if covered {
                    message.mark_read_by(read.user_id, read.read_at);
                }
            }
        }
    }

    /// Page visibility changed.
    pub fn set_visible(&mut self, visible: bool) -> Update {
        let regained = visible && !self.visible;
        self.visible = visible;
        if regained && self.phase.accepts_events() {
            return Update::action(self.mark_read(true));
        }
        Update::none()
    }

    /// Read mark for everything shown. Explicit triggers `resend` past the
    /// watermark.
    fn mark_read(&self, resend: bool) -> AppAction {
        AppAction::MarkChatRead { chat_id: self.chat_id, up_to: self.latest_id(), resend }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use plaza_proto::{MessageType, Pagination};

    use super::*;

    fn message(id: MessageId, user_id: UserId) -> ChatMessage {
        ChatMessage {
            id,
            chat_id: 42,
            user_id,
            sender: format!("user{user_id}"),
            profile_pic: None,
            message_type: MessageType::Text,
            content: Some(format!("m{id}")),
            media_url: None,
            created_at: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
            updated_at: None,
            is_deleted: false,
            read_by: Vec::new(),
        }
    }

    fn page(ids: &[MessageId], current: u32, total: u32) -> MessagePage {
        MessagePage {
            messages: ids.iter().map(|&id| message(id, 2)).collect(),
            pagination: Pagination { current_page: current, total_pages: total },
        }
    }

    fn loaded(ids: &[MessageId], total: u32) -> ChatPane {
        let mut pane = ChatPane::new(42, Some(1));
        pane.refresh();
        pane.on_page(1, 0, Ok(page(ids, 1, total)));
        pane
    }

    fn ids(pane: &ChatPane) -> Vec<MessageId> {
        pane.messages().iter().map(|m| m.id).collect()
    }

    #[test]
    fn first_page_marks_read() {
        let mut pane = ChatPane::new(42, Some(1));
        let update = pane.refresh();
        assert_eq!(
            update.actions,
            vec![AppAction::Fetch(Fetch::Messages { chat_id: 42, page: 1, generation: 0 })]
        );

        let update = pane.on_page(1, 0, Ok(page(&[11, 10, 12], 1, 1)));
        assert_eq!(ids(&pane), vec![10, 11, 12]);
        assert_eq!(
            update.actions,
            vec![AppAction::MarkChatRead { chat_id: 42, up_to: Some(12), resend: false }]
        );
    }

    #[test]
    fn broadcast_of_confirmed_message_is_noop() {
        let mut pane = loaded(&[10], 1);
        pane.insert_confirmed(message(11, 1));
        let update = pane.on_new_message(message(11, 1));
        assert_eq!(ids(&pane), vec![10, 11]);
        assert!(update.is_empty());
    }

    #[test]
    fn events_ignored_while_loading() {
        let mut pane = ChatPane::new(42, Some(1));
        pane.refresh();
        pane.on_new_message(message(5, 2));
        assert!(pane.messages().is_empty());
    }

    #[test]
    fn other_chat_ignored() {
        let mut pane = loaded(&[10], 1);
        let mut stray = message(11, 2);
        stray.chat_id = 7;
        pane.on_new_message(stray);
        assert_eq!(ids(&pane), vec![10]);
    }

    #[test]
    fn scroll_to_top_loads_older_and_restores_position() {
        let mut pane = loaded(&[20, 21], 2);
        let update = pane.on_scroll(Viewport::new(0, 600, 2000));
        assert_eq!(
            update.actions,
            vec![AppAction::Fetch(Fetch::Messages { chat_id: 42, page: 2, generation: 0 })]
        );
        assert_eq!(pane.phase(), &ViewPhase::LoadingMore);

        // Second trigger while loading does nothing
        assert!(pane.on_scroll(Viewport::new(0, 600, 2000)).is_empty());

        let update = pane.on_page(2, 0, Ok(page(&[18, 19], 2, 2)));
        assert_eq!(ids(&pane), vec![18, 19, 20, 21]);
        assert_eq!(update.actions, vec![AppAction::RestoreScroll { previous_height: 2000 }]);
        assert!(pane.history().is_exhausted());

        // Exhausted: no further request
        assert!(pane.on_scroll(Viewport::new(0, 600, 2600)).is_empty());
    }

    #[test]
    fn older_page_from_before_refresh_dropped() {
        let mut pane = loaded(&[20, 21], 3);
        pane.on_scroll(Viewport::new(0, 600, 2000));
        pane.refresh();

        let update = pane.on_page(2, 0, Ok(page(&[18, 19], 2, 3)));
        assert!(update.is_empty());
        assert!(pane.messages().is_empty());
        assert_eq!(pane.phase(), &ViewPhase::Loading);

        pane.on_page(1, 1, Ok(page(&[30, 31], 1, 3)));
        assert_eq!(ids(&pane), vec![30, 31]);
        assert_eq!(pane.history().current_page(), 1);
        let update = pane.on_scroll(Viewport::new(0, 600, 900));
        assert_eq!(
            update.actions,
            vec![AppAction::Fetch(Fetch::Messages { chat_id: 42, page: 2, generation: 1 })]
        );
    }

    #[test]
    fn near_bottom_marks_read() {
        let mut pane = loaded(&[10], 1);
        let update = pane.on_scroll(Viewport::new(1350, 600, 2000));
        assert_eq!(
            update.actions,
            vec![AppAction::MarkChatRead { chat_id: 42, up_to: Some(10), resend: true }]
        );
        assert!(pane.on_scroll(Viewport::new(500, 600, 2000)).is_empty());
    }

    #[test]
    fn failed_older_page_keeps_content() {
        let mut pane = loaded(&[20], 2);
        pane.on_scroll(Viewport::new(0, 600, 2000));
        let update = pane.on_page(2, 0, Err(ApiError::Network("offline".into())));
        assert_eq!(pane.phase(), &ViewPhase::Loaded);
        assert_eq!(ids(&pane), vec![20]);
        assert_eq!(update.notices.len(), 1);
    }

    #[test]
    fn read_receipts_apply_to_own_messages() {
        let mut pane = loaded(&[10], 1);
        pane.insert_confirmed(message(11, 1));
        pane.on_read(&MessagesRead { chat_id: 42, user_id: 2, read_at: None });
        assert!(pane.messages().get(11).is_some_and(|m| m.is_read_by(2)));
        assert!(pane.messages().get(10).is_some_and(|m| !m.is_read_by(2)));
    }

    #[test]
    fn delete_soft_deletes() {
        let mut pane = loaded(&[10], 1);
        pane.on_deleted(&MessageDeleted { id: 10, chat_id: 42 });
        let message = pane.messages().get(10).unwrap();
        assert!(message.is_deleted);
        assert_eq!(message.content, None);
    }

    #[test]
    fn visibility_regain_marks_read() {
        let mut pane = loaded(&[10], 1);
        assert!(pane.set_visible(false).is_empty());
        // Hidden: new messages do not mark read
        assert!(pane.on_new_message(message(11, 2)).is_empty());
        let update = pane.set_visible(true);
        assert_eq!(
            update.actions,
            vec![AppAction::MarkChatRead { chat_id: 42, up_to: Some(11), resend: true }]
        );
    }
}
