//! Page session state machine.
//!
//! The [`Session`] owns the views the current page shows and routes every
//! input to them: user [`Intent`]s, pushed realtime events, connection
//! lifecycle and the results of actions the runtime executed. It is pure and
//! produces [`AppAction`]s for the [`crate::Runtime`] to execute.
//!
//! # Page Layout
//!
//! | page            | views                                  |
//! |-----------------|----------------------------------------|
//! | feed            | feed, stories bar                      |
//! | chat list       | chat list                              |
//! | chat            | chat list, chat pane, members          |
//! | profile         | profile                                |
//! | notifications   | notification listing                   |
//! | stories         | stories bar                            |
//!
//! The notification counter and toasts live on every page.
//!
//! Results and events that name a chat or profile other than the one shown
//! are stale and dropped.

use std::{ops::Add, time::Duration};

use plaza_client::{ApiError, Lifecycle};
use plaza_core::{ConnectionState, DeliveryError, ErrorCategory, PageContext, delivery};
use plaza_proto::{
    ChatId, ChatMessage, ChatSummary, InboundEvent, MessageId, MessageType, UserId,
    rest::CreateChat,
};

use crate::{
    action::AppAction,
    event::{AppEvent, Fetched, Intent},
    guard::MutationGuard,
    pagination::Viewport,
    toast::{Banner, Notice, Toasts},
    view::Update,
    views::{
        ChatList, ChatPane, Feed, MembersPanel, NotificationCenter, ProfileView, StoriesView,
    },
};

/// Client state for one page load.
#[derive(Debug, Clone)]
pub struct Session<I> {
    context: PageContext,
    me: Option<UserId>,
    connection: ConnectionState,
    visible: bool,
    chat_list: Option<ChatList>,
    chat: Option<ChatPane>,
    members: Option<MembersPanel>,
    feed: Option<Feed>,
    profile: Option<ProfileView>,
    stories: Option<StoriesView<I>>,
    notifications: NotificationCenter,
    deleting: MutationGuard<MessageId>,
    creating_chat: bool,
    toasts: Toasts<I>,
    banner: Option<Banner>,
}

impl<I> Session<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Session for `me` (when already known) with nothing loaded.
    pub fn new(me: Option<UserId>) -> Self {
        Self {
            context: PageContext::Other(String::new()),
            me,
            connection: ConnectionState::Disconnected,
            visible: true,
            chat_list: None,
            chat: None,
            members: None,
            feed: None,
            profile: None,
            stories: None,
            notifications: NotificationCenter::new(),
            deleting: MutationGuard::new(),
            creating_chat: false,
            toasts: Toasts::new(),
            banner: None,
        }
    }

    /// Current page.
    pub fn context(&self) -> &PageContext {
        &self.context
    }

    /// Authenticated user, once known.
    pub fn me(&self) -> Option<UserId> {
        self.me
    }

    /// Realtime connection state.
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Whether the page is visible.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Chat list, on chat pages.
    pub fn chat_list(&self) -> Option<&ChatList> {
        self.chat_list.as_ref()
    }

    /// Open chat.
    pub fn chat(&self) -> Option<&ChatPane> {
        self.chat.as_ref()
    }

    /// Members of the open chat.
    pub fn members(&self) -> Option<&MembersPanel> {
        self.members.as_ref()
    }

    /// Feed, on the feed page.
    pub fn feed(&self) -> Option<&Feed> {
        self.feed.as_ref()
    }

    /// Profile, on a profile page.
    pub fn profile(&self) -> Option<&ProfileView> {
        self.profile.as_ref()
    }

    /// Stories bar, on the feed and stories pages.
    pub fn stories(&self) -> Option<&StoriesView<I>> {
        self.stories.as_ref()
    }

    /// Notification counter and listing.
    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Toasts currently shown.
    pub fn toasts(&self) -> &Toasts<I> {
        &self.toasts
    }

    /// Persistent banner, if any.
    pub fn banner(&self) -> Option<Banner> {
        self.banner
    }

    /// Go to a location path.
    ///
    /// Views of the previous page are dropped along with any result still in
    /// flight for them; the runtime aborts page-scoped tasks on
    /// [`AppAction::Navigate`].
    pub fn navigate(&mut self, path: &str) -> Vec<AppAction> {
        let context = PageContext::from_path(path);
        tracing::debug!(?context, "navigate");

        self.chat_list = None;
        self.chat = None;
        self.members = None;
        self.feed = None;
        self.profile = None;
        self.stories = None;
        self.context = context.clone();

        let mut actions = vec![AppAction::Navigate(context)];
        actions.extend(self.load_page().actions);
        if self.feed.is_some() {
            actions.push(AppAction::StartFeedPoll);
        }
        actions.push(AppAction::Render);
        actions
    }

    /// Build and refresh the views the current page shows.
    fn load_page(&mut self) -> Update {
        let mut update = Update::none();
        match self.context.clone() {
            PageContext::Feed => {
                let feed = self.feed.get_or_insert_with(|| Feed::new(self.me));
                update.merge(feed.refresh());
                update.merge(self.stories.get_or_insert_with(StoriesView::new).refresh());
            },
            PageContext::ChatList => {
                let list = self.chat_list.get_or_insert_with(|| ChatList::new(self.me));
                list.open(None);
                update.merge(list.refresh());
            },
            PageContext::Chat(chat_id) => {
                let list = self.chat_list.get_or_insert_with(|| ChatList::new(self.me));
                list.open(Some(chat_id));
                update.merge(list.refresh());

                let pane = self.chat.get_or_insert_with(|| ChatPane::new(chat_id, self.me));
                pane.set_visible(self.visible);
                update.merge(pane.refresh());

                let members = self.members.get_or_insert_with(|| MembersPanel::new(chat_id));
                update.merge(members.refresh());
            },
            PageContext::Profile(username) => {
                let profile = self.profile.get_or_insert_with(|| ProfileView::new(username));
                update.merge(profile.refresh());
            },
            PageContext::Notifications => {
                update.merge(self.notifications.refresh());
            },
            PageContext::Stories => {
                update.merge(self.stories.get_or_insert_with(StoriesView::new).refresh());
            },
            PageContext::Other(_) => {},
        }
        update
    }

    /// Handle user input.
    pub fn intent(&mut self, intent: Intent, now: I) -> Vec<AppAction> {
        let update = match intent {
            Intent::Quit => return vec![AppAction::Quit],
            Intent::Navigate(path) => return self.navigate(&path),
            Intent::Refresh => self.load_page(),
            Intent::Scroll(viewport) => self.scroll(viewport),
            Intent::Visibility(visible) => {
                self.visible = visible;
                let mut update = Update::action(AppAction::Visibility(visible));
                if let Some(pane) = &mut self.chat {
                    update.merge(pane.set_visible(visible));
                }
                if visible {
                    update.merge(self.refresh_unread());
                }
                update
            },
            Intent::NetworkOnline => {
                let mut update = Update::action(AppAction::NetworkOnline);
                update.merge(self.refresh_unread());
                update
            },
            Intent::SendMessage { content, message_type } => self.send_message(&content, message_type),
            Intent::DeleteMessage(message_id) => self.delete_message(message_id),
            Intent::ToggleLike(post_id) => {
                self.feed.as_mut().map(|f| f.toggle_like(post_id)).unwrap_or_default()
            },
            Intent::LoadComments(post_id) => {
                self.feed.as_mut().map(|f| f.load_comments(post_id)).unwrap_or_default()
            },
            Intent::AddComment { post_id, content } => {
                self.feed.as_mut().map(|f| f.add_comment(post_id, &content)).unwrap_or_default()
            },
            Intent::DeletePost(post_id) => {
                self.feed.as_mut().map(|f| f.delete_post(post_id)).unwrap_or_default()
            },
            Intent::Member { user_id, op } => {
                self.members.as_mut().map(|m| m.update(user_id, op)).unwrap_or_default()
            },
            Intent::Relationship(op) => {
                self.profile.as_mut().map(|p| p.relate(op)).unwrap_or_default()
            },
            Intent::MarkNotificationsRead(ids) => self.notifications.mark_read(ids),
            Intent::SearchFriends(search) => {
                self.chat_list.as_mut().map(|l| l.search_friends(search)).unwrap_or_default()
            },
            Intent::CreateChat { name, member_ids } => self.create_chat(name, member_ids),
            Intent::Story(op) => {
                self.stories.as_mut().map(|s| s.apply(op, now)).unwrap_or_default()
            },
        };
        self.finish(update, now)
    }

    /// Route a scroll to the page's primary list.
    fn scroll(&mut self, viewport: Viewport) -> Update {
        let update = match &self.context {
            PageContext::Chat(_) => self.chat.as_mut().map(|p| p.on_scroll(viewport)),
            PageContext::Feed => self.feed.as_mut().map(|f| f.on_scroll(viewport)),
            PageContext::Profile(_) => self.profile.as_mut().map(|p| p.on_scroll(viewport)),
            PageContext::Notifications => Some(self.notifications.on_scroll(viewport)),
            PageContext::ChatList | PageContext::Stories | PageContext::Other(_) => None,
        };
        update.unwrap_or_default()
    }

    fn send_message(&mut self, content: &str, message_type: MessageType) -> Update {
        let Some(chat_id) = self.context.chat_id() else {
            return Update::none();
        };
        match delivery::validate_content(content) {
            Ok(content) => Update::action(AppAction::SendMessage { chat_id, content, message_type }),
            Err(error) => Update::notice(Notice::error(error.to_string())),
        }
    }

    /// Re-read the badge; pushes may have been missed while hidden or
    /// offline.
    fn refresh_unread(&self) -> Update {
        if self.me.is_none() {
            return Update::none();
        }
        Update::action(AppAction::RefreshUnreadCount)
    }

    /// Start a chat. A named chat or one with several members is a group.
    fn create_chat(&mut self, name: Option<String>, mut member_ids: Vec<UserId>) -> Update {
        member_ids.sort_unstable();
        member_ids.dedup();
        if member_ids.is_empty() {
            return Update::notice(Notice::error("Select at least one member"));
        }
        if self.creating_chat {
            return Update::none();
        }
        self.creating_chat = true;
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let is_group = name.is_some() || member_ids.len() > 1;
        Update::action(AppAction::CreateChat(CreateChat { is_group, name, member_ids }))
    }

    /// Chat creation finished: open the new chat.
    fn on_chat_created(&mut self, result: Result<ChatSummary, ApiError>, now: I) -> Vec<AppAction> {
        self.creating_chat = false;
        match result {
            Ok(chat) => {
                tracing::info!(chat_id = chat.id, "chat created");
                self.navigate(&format!("/chat/{}", chat.id))
            },
            Err(error) => self.finish(Update::notice(Notice::error(error.user_message())), now),
        }
    }

    fn delete_message(&mut self, message_id: MessageId) -> Update {
        let own = self.chat.as_ref().and_then(|p| p.messages().get(message_id)).is_some_and(|m| {
            Some(m.user_id) == self.me && !m.is_deleted
        });
        if !own || !self.deleting.try_begin(message_id) {
            return Update::none();
        }
        Update::action(AppAction::DeleteMessage { message_id })
    }

    /// Handle an event from the outside world.
    pub fn handle(&mut self, event: AppEvent, now: I) -> Vec<AppAction> {
        let update = match event {
            AppEvent::Realtime(event) => self.on_realtime(event),
            AppEvent::Lifecycle(lifecycle) => self.on_lifecycle(lifecycle),
            AppEvent::Fetched(fetched) => self.on_fetched(fetched),
            AppEvent::FeedPollDue => {
                self.feed.as_mut().map(Feed::on_poll_due).unwrap_or_default()
            },
            AppEvent::MessageSent { chat_id, result } => self.on_message_sent(chat_id, result),
            AppEvent::MessageDeleted { message_id, result } => {
                self.deleting.finish(&message_id);
                match result {
                    Ok(record) => {
                        if let Some(pane) = &mut self.chat {
                            pane.apply_delete(message_id, record);
                        }
                        Update::none()
                    },
                    Err(error) => Update::notice(delivery_notice(&error, "Could not delete message")),
                }
            },
            AppEvent::LikeToggled { post_id, result } => {
                self.feed.as_mut().map(|f| f.on_like_toggled(post_id, result)).unwrap_or_default()
            },
            AppEvent::CommentAdded { post_id, result } => {
                self.feed.as_mut().map(|f| f.on_comment_added(post_id, result)).unwrap_or_default()
            },
            AppEvent::PostDeleted { post_id, result } => {
                self.feed.as_mut().map(|f| f.on_post_deleted(post_id, result)).unwrap_or_default()
            },
            AppEvent::MemberUpdated { chat_id, user_id, op, result } => match &mut self.members {
                Some(members) if members.chat_id() == chat_id => members.on_updated(user_id, op, result),
                _ => Update::none(),
            },
            AppEvent::RelationshipUpdated { username, op, result } => match &mut self.profile {
                Some(profile) if profile.username() == username => profile.on_related(op, result),
                _ => Update::none(),
            },
            AppEvent::NotificationsMarked { ids, result } => {
                self.notifications.on_marked(&ids, result)
            },
            AppEvent::ChatCreated(result) => return self.on_chat_created(result, now),
            AppEvent::StoryViewed { story_id, result } => {
                self.stories.as_mut().map(|s| s.on_viewed(story_id, result)).unwrap_or_default()
            },
            AppEvent::UnreadCounted(result) => {
                self.notifications.on_unread_counted(result);
                Update::none()
            },
        };
        self.finish(update, now)
    }

    fn on_realtime(&mut self, event: InboundEvent) -> Update {
        match event {
            InboundEvent::NewMessage(message) => self.on_new_message(message),
            InboundEvent::MessageDeleted(deleted) => {
                if let Some(pane) = &mut self.chat {
                    pane.on_deleted(&deleted);
                }
                Update::none()
            },
            InboundEvent::MessagesRead(read) => {
                if let Some(pane) = &mut self.chat {
                    pane.on_read(&read);
                }
                Update::none()
            },
            InboundEvent::NewNotification(notification) => {
                let open_chat = self.context.chat_id();
                self.notifications.on_new(notification, open_chat)
            },
            InboundEvent::ChatUpdated(chat) => {
                if let Some(list) = &mut self.chat_list {
                    list.on_chat_updated(chat);
                }
                Update::none()
            },
            InboundEvent::MemberAdded(added) => {
                if let Some(members) = &mut self.members {
                    members.on_added(added);
                }
                Update::none()
            },
            InboundEvent::MemberRemoved(removed) => {
                if let Some(members) = &mut self.members {
                    members.on_removed(&removed);
                }
                Update::none()
            },
            InboundEvent::NewPost(post) => {
                if let Some(feed) = &mut self.feed {
                    feed.on_new_post(post);
                }
                Update::none()
            },
            InboundEvent::NewComment(comment) => {
                if let Some(feed) = &mut self.feed {
                    feed.on_comment(&comment);
                }
                Update::none()
            },
            InboundEvent::NewLike(like) => {
                if let Some(feed) = &mut self.feed {
                    feed.on_like(&like);
                }
                Update::none()
            },
            // Consumed by the connection manager
            InboundEvent::Connected(_) | InboundEvent::AuthResponse(_) | InboundEvent::Pong => {
                Update::none()
            },
            InboundEvent::UserStatus(status) => {
                tracing::trace!(?status, "presence");
                Update::none()
            },
            InboundEvent::Unknown { event_type, .. } => {
                tracing::debug!(%event_type, "unhandled event type");
                Update::none()
            },
        }
    }

    fn on_new_message(&mut self, message: ChatMessage) -> Update {
        let mut update = Update::none();
        if let Some(list) = &mut self.chat_list {
            update.merge(list.on_new_message(&message));
        }
        if let Some(pane) = &mut self.chat {
            update.merge(pane.on_new_message(message));
        }
        update
    }

    fn on_message_sent(
        &mut self,
        chat_id: ChatId,
        result: Result<ChatMessage, DeliveryError>,
    ) -> Update {
        match result {
            Ok(message) => {
                let mut update = Update::none();
                if let Some(list) = &mut self.chat_list {
                    update.merge(list.on_new_message(&message));
                }
                if let Some(pane) = &mut self.chat {
                    pane.insert_confirmed(message);
                }
                update
            },
            Err(error) => {
                tracing::debug!(chat_id, %error, "send failed");
                Update::notice(delivery_notice(&error, "Failed to send message"))
            },
        }
    }

    fn on_lifecycle(&mut self, lifecycle: Lifecycle) -> Update {
        match lifecycle {
            Lifecycle::StateChanged { to, .. } => {
                self.connection = to;
            },
            Lifecycle::Authenticated { user_id } => {
                if user_id.is_some() && user_id != self.me {
                    self.set_me(user_id);
                }
            },
            Lifecycle::ConnectionLost => {},
            Lifecycle::NotificationsLoaded(page) => self.notifications.seed(page),
            Lifecycle::RealtimeUnavailable => self.banner = Some(Banner::RealtimeUnavailable),
        }
        Update::none()
    }

    fn set_me(&mut self, me: Option<UserId>) {
        self.me = me;
        if let Some(list) = &mut self.chat_list {
            list.set_me(me);
        }
        if let Some(pane) = &mut self.chat {
            pane.set_me(me);
        }
        if let Some(feed) = &mut self.feed {
            feed.set_me(me);
        }
    }

    fn on_fetched(&mut self, fetched: Fetched) -> Update {
        match fetched {
            Fetched::Chats(result) => {
                self.chat_list.as_mut().map(|l| l.on_loaded(result)).unwrap_or_default()
            },
            Fetched::Messages { chat_id, page, generation, result } => match &mut self.chat {
                Some(pane) if pane.chat_id() == chat_id => pane.on_page(page, generation, result),
                _ => Update::none(),
            },
            Fetched::Feed { page, generation, check_new, result } => self
                .feed
                .as_mut()
                .map(|f| f.on_page(page, generation, check_new, result))
                .unwrap_or_default(),
            Fetched::Notifications { page, generation, result } => {
                self.notifications.on_page(page, generation, result)
            },
            Fetched::Members { chat_id, result } => match &mut self.members {
                Some(members) if members.chat_id() == chat_id => members.on_loaded(result),
                _ => Update::none(),
            },
            Fetched::Profile { username, page, generation, result } => match &mut self.profile {
                Some(profile) if profile.username() == username => {
                    profile.on_page(page, generation, result)
                },
                _ => Update::none(),
            },
            Fetched::Comments { post_id, result } => {
                self.feed.as_mut().map(|f| f.on_comments(post_id, result)).unwrap_or_default()
            },
            Fetched::Friends { search, result } => {
                self.chat_list.as_mut().map(|l| l.on_friends(search, result)).unwrap_or_default()
            },
            Fetched::Stories(result) => {
                self.stories.as_mut().map(|s| s.on_loaded(result)).unwrap_or_default()
            },
        }
    }

    /// Expire toasts and move the story viewer on.
    pub fn tick(&mut self, now: I) -> Vec<AppAction> {
        let advanced = self.stories.as_mut().and_then(|s| s.on_tick(now));
        let expired = self.toasts.expire(now);
        match advanced {
            Some(update) => self.finish(update, now),
            None if expired => vec![AppAction::Render],
            None => Vec::new(),
        }
    }

    fn finish(&mut self, update: Update, now: I) -> Vec<AppAction> {
        for notice in update.notices {
            self.toasts.show(now, notice);
        }
        let mut actions = update.actions;
        actions.push(AppAction::Render);
        actions
    }
}

/// Toast for a failed send or delete. Connectivity failures are reported
/// generically; the server's reason is shown otherwise.
fn delivery_notice(error: &DeliveryError, fallback: &str) -> Notice {
    match error.category() {
        ErrorCategory::Validation | ErrorCategory::Business => Notice::error(error.to_string()),
        ErrorCategory::Connectivity | ErrorCategory::Malformed => Notice::error(fallback),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use plaza_proto::{
        Notification, NotificationType, Pagination,
        rest::{FeedPage, MessagePage},
    };

    use super::*;
    use crate::{action::Fetch, toast::ToastLevel};

    /// Virtual time in milliseconds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct Ms(u64);

    impl Add<Duration> for Ms {
        type Output = Ms;

        fn add(self, rhs: Duration) -> Ms {
            Ms(self.0 + u64::try_from(rhs.as_millis()).unwrap())
        }
    }

    fn message(chat_id: u64, id: u64, user_id: u64) -> ChatMessage {
        ChatMessage {
            id,
            chat_id,
            user_id,
            sender: String::new(),
            profile_pic: None,
            message_type: MessageType::Text,
            content: Some("hi".into()),
            media_url: None,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            updated_at: None,
            is_deleted: false,
            read_by: Vec::new(),
        }
    }

    fn open_chat(session: &mut Session<Ms>, chat_id: u64) {
        session.navigate(&format!("/chat/{chat_id}"));
        session.handle(AppEvent::Fetched(Fetched::Chats(Ok(Vec::new()))), Ms(0));
        session.handle(
            AppEvent::Fetched(Fetched::Messages {
                chat_id,
                page: 1,
                generation: 0,
                result: Ok(MessagePage {
                    messages: vec![message(chat_id, 1, 2)],
                    pagination: Pagination { current_page: 1, total_pages: 1 },
                }),
            }),
            Ms(0),
        );
    }

    #[test]
    fn chat_page_loads_three_views() {
        let mut session = Session::<Ms>::new(Some(1));
        let actions = session.navigate("/chat/42");
        assert_eq!(
            actions,
            vec![
                AppAction::Navigate(PageContext::Chat(42)),
                AppAction::Fetch(Fetch::Chats),
                AppAction::Fetch(Fetch::Messages { chat_id: 42, page: 1, generation: 0 }),
                AppAction::Fetch(Fetch::Members { chat_id: 42 }),
                AppAction::Render,
            ]
        );
    }

    #[test]
    fn feed_page_starts_poll() {
        let mut session = Session::<Ms>::new(Some(1));
        let actions = session.navigate("/");
        assert!(actions.contains(&AppAction::StartFeedPoll));
        assert!(actions.contains(&AppAction::Fetch(Fetch::Feed { page: 1, generation: 0, check_new: false })));
    }

    #[test]
    fn stale_history_dropped_after_navigation() {
        let mut session = Session::<Ms>::new(Some(1));
        open_chat(&mut session, 42);
        session.navigate("/chat/7");

        session.handle(
            AppEvent::Fetched(Fetched::Messages {
                chat_id: 42,
                page: 1,
                generation: 0,
                result: Ok(MessagePage {
                    messages: vec![message(42, 5, 2)],
                    pagination: Pagination { current_page: 1, total_pages: 1 },
                }),
            }),
            Ms(0),
        );
        let pane = session.chat().unwrap();
        assert_eq!(pane.chat_id(), 7);
        assert!(pane.messages().is_empty());
    }

    #[test]
    fn blank_send_toasts_without_request() {
        let mut session = Session::<Ms>::new(Some(1));
        open_chat(&mut session, 42);
        let actions = session.intent(
            Intent::SendMessage { content: "   ".into(), message_type: MessageType::Text },
            Ms(0),
        );
        assert_eq!(actions, vec![AppAction::Render]);
        assert_eq!(session.toasts().len(), 1);
    }

    #[test]
    fn confirmed_send_and_broadcast_render_once() {
        let mut session = Session::<Ms>::new(Some(1));
        open_chat(&mut session, 42);
        let actions = session.intent(
            Intent::SendMessage { content: " hi ".into(), message_type: MessageType::Text },
            Ms(0),
        );
        assert!(actions.contains(&AppAction::SendMessage {
            chat_id: 42,
            content: "hi".into(),
            message_type: MessageType::Text,
        }));

        let confirmed = message(42, 9, 1);
        session.handle(AppEvent::Realtime(InboundEvent::NewMessage(confirmed.clone())), Ms(1));
        session.handle(AppEvent::MessageSent { chat_id: 42, result: Ok(confirmed) }, Ms(2));
        let ids: Vec<u64> = session.chat().unwrap().messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 9]);
    }

    #[test]
    fn friend_request_on_unrelated_page_toasts() {
        let mut session = Session::<Ms>::new(Some(1));
        session.navigate("/profile/ada");
        let notification = Notification {
            id: 3,
            user_id: Some(1),
            notification_type: NotificationType::FriendRequest,
            sender_id: Some(2),
            sender_name: Some("ada".into()),
            sender_profile_pic: None,
            reference_id: None,
            content: None,
            is_read: false,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        session.handle(AppEvent::Realtime(InboundEvent::NewNotification(notification)), Ms(0));

        assert_eq!(session.notifications().unread(), 1);
        let toast = session.toasts().iter().next().unwrap();
        assert_eq!(toast.level, ToastLevel::Info);
        assert_eq!(toast.title, "Friend Request");
    }

    #[test]
    fn rejected_send_shows_server_reason() {
        let mut session = Session::<Ms>::new(Some(1));
        open_chat(&mut session, 42);
        session.handle(
            AppEvent::MessageSent {
                chat_id: 42,
                result: Err(DeliveryError::Rejected("You are not a member".into())),
            },
            Ms(0),
        );
        let toast = session.toasts().iter().next().unwrap();
        assert_eq!(toast.body, "You are not a member");

        session.handle(
            AppEvent::MessageSent { chat_id: 42, result: Err(DeliveryError::NotConnected) },
            Ms(0),
        );
        assert_eq!(session.toasts().iter().last().unwrap().body, "Failed to send message");
    }

    #[test]
    fn realtime_unavailable_sets_banner() {
        let mut session = Session::<Ms>::new(Some(1));
        session.handle(AppEvent::Lifecycle(Lifecycle::RealtimeUnavailable), Ms(0));
        assert_eq!(session.banner(), Some(Banner::RealtimeUnavailable));
    }

    #[test]
    fn toasts_expire_on_tick() {
        let mut session = Session::<Ms>::new(Some(1));
        open_chat(&mut session, 42);
        session.handle(
            AppEvent::MessageSent { chat_id: 42, result: Err(DeliveryError::NotConnected) },
            Ms(0),
        );
        assert!(session.tick(Ms(1_000)).is_empty());
        assert_eq!(session.tick(Ms(6_000)), vec![AppAction::Render]);
        assert!(session.toasts().is_empty());
    }

    #[test]
    fn own_delete_guarded() {
        let mut session = Session::<Ms>::new(Some(2));
        open_chat(&mut session, 42);
        let first = session.intent(Intent::DeleteMessage(1), Ms(0));
        assert!(first.contains(&AppAction::DeleteMessage { message_id: 1 }));
        let second = session.intent(Intent::DeleteMessage(1), Ms(0));
        assert_eq!(second, vec![AppAction::Render]);

        let mut deleted = message(42, 1, 2);
        deleted.soft_delete();
        session.handle(
            AppEvent::MessageDeleted { message_id: 1, result: Ok(Some(deleted)) },
            Ms(0),
        );
        assert!(session.chat().unwrap().messages().get(1).unwrap().is_deleted);
    }

    #[test]
    fn feed_poll_ignored_off_feed() {
        let mut session = Session::<Ms>::new(Some(1));
        session.navigate("/notifications");
        assert_eq!(session.handle(AppEvent::FeedPollDue, Ms(0)), vec![AppAction::Render]);

        session.navigate("/feed");
        session.handle(
            AppEvent::Fetched(Fetched::Feed {
                page: 1,
                generation: 0,
                check_new: false,
                result: Ok(FeedPage {
                    posts: Vec::new(),
                    pagination: Pagination { current_page: 1, total_pages: 1 },
                    has_new_posts: false,
                    new_posts_count: 0,
                }),
            }),
            Ms(0),
        );
        let actions = session.handle(AppEvent::FeedPollDue, Ms(0));
        assert!(actions.contains(&AppAction::Fetch(Fetch::Feed { page: 1, generation: 0, check_new: true })));
    }

    fn story_group(user_id: UserId, ids: &[u64]) -> plaza_proto::StoryUser {
        plaza_proto::StoryUser {
            user: plaza_proto::UserSummary {
                id: user_id,
                username: format!("user{user_id}"),
                profile_pic: None,
                bio: None,
            },
            stories: ids
                .iter()
                .map(|&id| plaza_proto::Story {
                    id,
                    user_id,
                    story_type: plaza_proto::StoryType::Text,
                    content: None,
                    media_url: None,
                    created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                    expires_at: Utc.timestamp_opt(1_700_086_400, 0).unwrap(),
                    viewed: false,
                })
                .collect(),
        }
    }

    #[test]
    fn feed_page_stories_advance_on_tick() {
        let mut session = Session::<Ms>::new(Some(1));
        let actions = session.navigate("/");
        assert!(actions.contains(&AppAction::Fetch(Fetch::Stories)));
        session.handle(
            AppEvent::Fetched(Fetched::Stories(Ok(vec![story_group(2, &[20, 21])]))),
            Ms(0),
        );

        let actions = session.intent(Intent::Story(crate::action::StoryOp::Open(2)), Ms(0));
        assert!(actions.contains(&AppAction::ViewStory { story_id: 20 }));
        session.handle(AppEvent::StoryViewed { story_id: 20, result: Ok(()) }, Ms(100));

        assert!(session.tick(Ms(4_000)).is_empty());
        let actions = session.tick(Ms(5_000));
        assert_eq!(actions, vec![AppAction::ViewStory { story_id: 21 }, AppAction::Render]);
        let stories = session.stories().unwrap();
        assert_eq!(stories.current().map(|(_, story)| story.id), Some(21));

        session.tick(Ms(10_000));
        assert!(!session.stories().unwrap().is_open());

        session.navigate("/notifications");
        assert!(session.stories().is_none());
    }

    #[test]
    fn created_chat_opens() {
        let mut session = Session::<Ms>::new(Some(1));
        session.navigate("/chat");

        let actions = session.intent(Intent::CreateChat { name: None, member_ids: Vec::new() }, Ms(0));
        assert_eq!(actions, vec![AppAction::Render]);
        assert_eq!(session.toasts().len(), 1);

        let create = Intent::CreateChat { name: Some("  ".into()), member_ids: vec![3, 3] };
        let actions = session.intent(create.clone(), Ms(0));
        assert!(actions.contains(&AppAction::CreateChat(CreateChat {
            is_group: false,
            name: None,
            member_ids: vec![3],
        })));
        assert_eq!(session.intent(create, Ms(0)), vec![AppAction::Render]);

        let chat = ChatSummary {
            id: 77,
            name: None,
            is_group: false,
            profile_pic: None,
            last_message: None,
            unread_count: 0,
            other_user: None,
        };
        let actions = session.handle(AppEvent::ChatCreated(Ok(chat)), Ms(1));
        assert_eq!(actions.first(), Some(&AppAction::Navigate(PageContext::Chat(77))));
        assert_eq!(session.context(), &PageContext::Chat(77));
    }

    #[test]
    fn regaining_visibility_rereads_badge() {
        let mut session = Session::<Ms>::new(Some(1));
        session.navigate("/");
        assert!(!session.intent(Intent::Visibility(false), Ms(0)).contains(&AppAction::RefreshUnreadCount));
        assert!(session.intent(Intent::Visibility(true), Ms(0)).contains(&AppAction::RefreshUnreadCount));
        assert!(session.intent(Intent::NetworkOnline, Ms(0)).contains(&AppAction::RefreshUnreadCount));

        session.handle(
            AppEvent::UnreadCounted(Ok(plaza_proto::rest::UnreadCount { unread_count: 4 })),
            Ms(0),
        );
        assert_eq!(session.notifications().unread(), 4);

        let mut anonymous = Session::<Ms>::new(None);
        anonymous.navigate("/");
        assert!(!anonymous.intent(Intent::NetworkOnline, Ms(0)).contains(&AppAction::RefreshUnreadCount));
    }
}
