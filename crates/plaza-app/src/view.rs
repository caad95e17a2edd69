//! Shared view machinery.
//!
//! Every synchronized view moves through the same [`ViewPhase`] lifecycle and
//! keeps its content in an [`EntityList`], which is keyed by server id so a
//! record that arrives twice (once from a REST page, once from a push) is
//! stored once and updated in place.

use std::{fmt::Debug, hash::Hash};

use plaza_proto::{
    ChatId, ChatMessage, ChatSummary, Comment, CommentId, Member, MessageId, Notification,
    NotificationId, Post, PostId, UserId, UserSummary,
};

use crate::{action::AppAction, toast::Notice};

/// What a view wants done after handling an input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    /// Side effects for the runtime
    pub actions: Vec<AppAction>,
    /// Toasts to show
    pub notices: Vec<Notice>,
}

impl Update {
    /// Nothing to do.
    pub fn none() -> Self {
        Self::default()
    }

    /// A single action.
    pub fn action(action: AppAction) -> Self {
        Self { actions: vec![action], notices: Vec::new() }
    }

    /// A single toast.
    pub fn notice(notice: Notice) -> Self {
        Self { actions: Vec::new(), notices: vec![notice] }
    }

    /// Add an action.
    #[must_use]
    pub fn with(mut self, action: AppAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Fold another update into this one.
    pub fn merge(&mut self, other: Update) {
        self.actions.extend(other.actions);
        self.notices.extend(other.notices);
    }

    /// Whether nothing was requested.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.notices.is_empty()
    }
}

/// Load state of a view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewPhase {
    /// Nothing requested yet
    #[default]
    Empty,
    /// First page in flight; content cleared
    Loading,
    /// Content shown
    Loaded,
    /// Next page in flight; content kept
    LoadingMore,
    /// First page failed. Recoverable through refresh.
    Error(String),
}

impl ViewPhase {
    /// Whether realtime events should be applied.
    pub fn accepts_events(&self) -> bool {
        matches!(self, Self::Loaded | Self::LoadingMore)
    }

    /// Whether a request is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Loading | Self::LoadingMore)
    }

    /// Start a refresh. The caller clears content.
    pub fn begin_refresh(&mut self) {
        *self = Self::Loading;
    }

    /// Start loading the next page. `false` unless content is shown and idle.
    pub fn begin_more(&mut self) -> bool {
        if *self != Self::Loaded {
            return false;
        }
        *self = Self::LoadingMore;
        true
    }

    /// A request succeeded.
    pub fn succeed(&mut self) {
        *self = Self::Loaded;
    }

    /// A request failed.
    ///
    /// A failed first page becomes [`ViewPhase::Error`]. A failed later page
    /// keeps the content and hands the message back for a toast.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<String> {
        let message = message.into();
        match self {
            Self::LoadingMore => {
                *self = Self::Loaded;
                Some(message)
            },
            _ => {
                *self = Self::Error(message);
                None
            },
        }
    }
}

/// A record with a stable server id.
pub trait Entity {
    /// Id type
    type Id: Copy + Ord + Hash + Debug;

    /// Server id.
    fn id(&self) -> Self::Id;
}

impl Entity for ChatMessage {
    type Id = MessageId;

    fn id(&self) -> MessageId {
        self.id
    }
}

impl Entity for ChatSummary {
    type Id = ChatId;

    fn id(&self) -> ChatId {
        self.id
    }
}

impl Entity for Notification {
    type Id = NotificationId;

    fn id(&self) -> NotificationId {
        self.id
    }
}

impl Entity for Post {
    type Id = PostId;

    fn id(&self) -> PostId {
        self.id
    }
}

impl Entity for Comment {
    type Id = CommentId;

    fn id(&self) -> CommentId {
        self.id
    }
}

/// Members are keyed by user.
impl Entity for Member {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.user_id
    }
}

impl Entity for UserSummary {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

/// Outcome of [`EntityList::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// New id
    Inserted,
    /// Existing id replaced in place
    Updated,
}

/// Ordered list of records, unique by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityList<T> {
    items: Vec<T>,
}

impl<T> Default for EntityList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Entity> EntityList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records in display order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Records as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Record by id.
    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.position(id).map(|i| &self.items[i])
    }

    /// Mutable record by id.
    pub fn get_mut(&mut self, id: T::Id) -> Option<&mut T> {
        self.position(id).map(|i| &mut self.items[i])
    }

    /// Whether a record with `id` is present.
    pub fn contains(&self, id: T::Id) -> bool {
        self.position(id).is_some()
    }

    /// First record.
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// Last record.
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// Replace the record with the same id, or append.
    pub fn upsert(&mut self, item: T) -> Upsert {
        match self.position(item.id()) {
            Some(i) => {
                self.items[i] = item;
                Upsert::Updated
            },
            None => {
                self.items.push(item);
                Upsert::Inserted
            },
        }
    }

    /// Replace the record with the same id, or insert at the front.
    pub fn upsert_front(&mut self, item: T) -> Upsert {
        match self.position(item.id()) {
            Some(i) => {
                self.items[i] = item;
                Upsert::Updated
            },
            None => {
                self.items.insert(0, item);
                Upsert::Inserted
            },
        }
    }

    /// Insert keeping the list sorted by ascending id.
    pub fn upsert_sorted(&mut self, item: T) -> Upsert {
        match self.items.binary_search_by_key(&item.id(), T::id) {
            Ok(i) => {
                self.items[i] = item;
                Upsert::Updated
            },
            Err(i) => {
                self.items.insert(i, item);
                Upsert::Inserted
            },
        }
    }

    /// Append a page. Records already present are updated in place.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.upsert(item);
        }
    }

    /// Move a record to the front. `false` if absent.
    pub fn move_to_front(&mut self, id: T::Id) -> bool {
        match self.position(id) {
            Some(i) => {
                let item = self.items.remove(i);
                self.items.insert(0, item);
                true
            },
            None => false,
        }
    }

    /// Remove a record.
    pub fn remove(&mut self, id: T::Id) -> Option<T> {
        self.position(id).map(|i| self.items.remove(i))
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn position(&self, id: T::Id) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }
}

impl<'a, T> IntoIterator for &'a EntityList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item(u64, &'static str);

    impl Entity for Item {
        type Id = u64;

        fn id(&self) -> u64 {
            self.0
        }
    }

    fn ids(list: &EntityList<Item>) -> Vec<u64> {
        list.iter().map(|i| i.0).collect()
    }

    #[test]
    fn upsert_updates_in_place() {
        let mut list = EntityList::new();
        list.extend([Item(1, "a"), Item(2, "b")]);
        assert_eq!(list.upsert(Item(1, "a2")), Upsert::Updated);
        assert_eq!(ids(&list), vec![1, 2]);
        assert_eq!(list.get(1), Some(&Item(1, "a2")));
    }

    #[test]
    fn sorted_insert_orders_by_id() {
        let mut list = EntityList::new();
        for id in [5, 1, 3, 3, 9, 1] {
            list.upsert_sorted(Item(id, ""));
        }
        assert_eq!(ids(&list), vec![1, 3, 5, 9]);
    }

    #[test]
    fn move_to_front() {
        let mut list = EntityList::new();
        list.extend([Item(1, ""), Item(2, ""), Item(3, "")]);
        assert!(list.move_to_front(3));
        assert!(!list.move_to_front(4));
        assert_eq!(ids(&list), vec![3, 1, 2]);
    }

    #[test]
    fn failed_first_page_is_error() {
        let mut phase = ViewPhase::Empty;
        phase.begin_refresh();
        assert_eq!(phase.fail("boom"), None);
        assert_eq!(phase, ViewPhase::Error("boom".into()));
        assert!(!phase.accepts_events());
    }

    #[test]
    fn failed_later_page_keeps_content() {
        let mut phase = ViewPhase::Loaded;
        assert!(phase.begin_more());
        assert!(!phase.begin_more());
        assert_eq!(phase.fail("boom"), Some("boom".into()));
        assert_eq!(phase, ViewPhase::Loaded);
    }
}
