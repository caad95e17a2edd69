//! Notification list, unread counter and notification toasts.
//!
//! The counter is global: it is seeded from the `get_notifications` reply
//! after authentication and kept current by pushes on every page. The list
//! itself is only paged in on the notifications page.

use std::collections::HashSet;

use plaza_client::ApiError;
use plaza_proto::{
    ChatId, Notification, NotificationId, NotificationType,
    rest::{NotificationPage, UnreadCount},
};

use crate::{
    action::{AppAction, Fetch},
    guard::MutationGuard,
    pagination::{Cursor, Viewport},
    toast::Notice,
    view::{EntityList, Update, Upsert, ViewPhase},
};

/// Notifications and the unread badge.
#[derive(Debug, Clone, Default)]
pub struct NotificationCenter {
    phase: ViewPhase,
    items: EntityList<Notification>,
    /// Every id seen by this page load, listed or not
    seen: HashSet<NotificationId>,
    unread: u32,
    cursor: Cursor,
    marking: MutationGuard<Vec<NotificationId>>,
}

impl NotificationCenter {
    /// Empty center.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load phase of the list.
    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    /// Notifications, newest first.
    pub fn items(&self) -> &EntityList<Notification> {
        &self.items
    }

    /// Unread badge.
    pub fn unread(&self) -> u32 {
        self.unread
    }

    /// Seed from the post-authentication snapshot.
    pub fn seed(&mut self, page: NotificationPage) {
        self.unread = page.unread_count;
        for notification in page.notifications {
            self.seen.insert(notification.id);
            self.items.upsert(notification);
        }
        if self.phase == ViewPhase::Empty {
            self.phase.succeed();
        }
    }

    /// Drop the listing and load the first page.
    pub fn refresh(&mut self) -> Update {
        self.items.clear();
        self.cursor.reset();
        self.phase.begin_refresh();
        self.fetch_next().unwrap_or_default()
    }

    /// The listing scrolled.
    pub fn on_scroll(&mut self, viewport: Viewport) -> Update {
        if !viewport.near_end() || !self.phase.begin_more() {
            return Update::none();
        }
        self.fetch_next().unwrap_or_else(|| {
            self.phase.succeed();
            Update::none()
        })
    }

    fn fetch_next(&mut self) -> Option<Update> {
        let page = self.cursor.begin_next()?;
        let generation = self.cursor.generation();
        Some(Update::action(AppAction::Fetch(Fetch::Notifications { page, generation })))
    }

    /// A listing page arrived.
    pub fn on_page(
        &mut self,
        page: u32,
        generation: u64,
        result: Result<NotificationPage, ApiError>,
    ) -> Update {
        if !self.cursor.accepts(page, generation) {
            tracing::debug!(page, generation, "stale notification page dropped");
            return Update::none();
        }
        match result {
            Ok(body) => {
                for notification in body.notifications {
                    self.seen.insert(notification.id);
                    self.items.upsert(notification);
                }
                self.unread = body.unread_count;
                let total = body.pagination.map_or(page, |p| p.total_pages);
                self.cursor.complete(page, total);
                self.phase.succeed();
                Update::none()
            },
            Err(error) => {
                self.cursor.fail();
                match self.phase.fail(error.user_message()) {
                    Some(message) => Update::notice(Notice::error(message)),
                    None => Update::none(),
                }
            },
        }
    }

    /// `new_notification` push.
    ///
    /// Counted and toasted once per id. Message notifications about the chat
    /// already open are counted but not toasted.
    pub fn on_new(&mut self, notification: Notification, open_chat: Option<ChatId>) -> Update {
        if !self.seen.insert(notification.id) {
            return Update::none();
        }
        if !notification.is_read {
            self.unread += 1;
        }

        let about_open_chat = notification.notification_type == NotificationType::Message
            && notification.reference_id.is_some()
            && notification.reference_id == open_chat;
        let notice = (!about_open_chat).then(|| {
            let body = notification
                .content
                .clone()
                .or_else(|| notification.sender_name.clone())
                .unwrap_or_default();
            Notice::info(notification.notification_type.title(), body)
        });

        if self.phase.accepts_events() && self.items.upsert_front(notification) == Upsert::Updated {
            tracing::debug!("notification already listed");
        }
        notice.map_or_else(Update::none, Update::notice)
    }

    /// Mark notifications read. An empty list marks every listed unread one.
    pub fn mark_read(&mut self, ids: Vec<NotificationId>) -> Update {
        let mut ids = if ids.is_empty() {
            self.items.iter().filter(|n| !n.is_read).map(|n| n.id).collect()
        } else {
            ids
        };
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() || !self.marking.try_begin(ids.clone()) {
            return Update::none();
        }
        Update::action(AppAction::MarkNotificationsRead { ids })
    }

    /// A mark-read finished.
    pub fn on_marked(
        &mut self,
        ids: &[NotificationId],
        result: Result<UnreadCount, ApiError>,
    ) -> Update {
        self.marking.finish(&ids.to_vec());
        match result {
            Ok(count) => {
                for &id in ids {
                    if let Some(notification) = self.items.get_mut(id) {
                        notification.is_read = true;
                    }
                }
                self.unread = count.unread_count;
                Update::none()
            },
            Err(error) => Update::notice(Notice::error(error.user_message())),
        }
    }

    /// The badge was re-read from the server.
    pub fn on_unread_counted(&mut self, result: Result<UnreadCount, ApiError>) {
        match result {
            Ok(count) => self.unread = count.unread_count,
            Err(error) => tracing::debug!(%error, "unread count not refreshed"),
        }
    }
}
