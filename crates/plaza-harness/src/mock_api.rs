//! In-memory REST backend.
//!
//! [`MockApi`] implements [`Api`] over plain collections so integration tests
//! run the real messenger and runtime without HTTP. Every call is recorded as
//! the [`Endpoint`] the production client would hit, together with its JSON
//! body, so tests assert on exactly what would have gone over the wire.
//!
//! Failures are scripted per endpoint with [`MockApi::fail_next`] and served
//! in FIFO order. [`MockApi::set_latency`] delays every response on tokio's
//! clock, which under a paused runtime lets tests interleave user input with
//! in-flight requests.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use plaza_client::{Api, ApiError};
use plaza_proto::{
    AckPayload, ChatId, ChatMessage, ChatSummary, Comment, Endpoint, FriendshipStatus, Member,
    MemberRole, MessageId, Notification, NotificationId, Pagination, Post, PostId, StoryId,
    StoryUser, UserId, UserSummary,
    rest::{
        CreateChat, FeedPage, FriendRequestAction, LikeAction, LikeResponse,
        MarkNotificationsRead, MemberTarget, MessagePage, MessageResponse, NewComment,
        NotificationPage, ProfilePage, SendMessageBody, SessionInfo, UnreadCount,
    },
};
use serde::Serialize;
use serde_json::Value;

/// Items per page on every paged route.
pub const PAGE_SIZE: usize = 20;

/// A recorded request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    /// Route that was hit
    pub endpoint: Endpoint,
    /// JSON body, for routes that send one
    pub body: Option<Value>,
}

impl ApiCall {
    /// `"POST /api/chat/42/send"` form of the route.
    pub fn route(&self) -> String {
        self.endpoint.to_string()
    }
}

#[derive(Debug, Default)]
struct MockState {
    me: Option<UserSummary>,
    chats: Vec<ChatSummary>,
    /// Per chat, oldest first
    messages: BTreeMap<ChatId, Vec<ChatMessage>>,
    /// Idempotency keys already applied
    client_refs: HashMap<String, MessageId>,
    /// Newest first
    posts: Vec<Post>,
    liked: BTreeSet<PostId>,
    comments: BTreeMap<PostId, Vec<Comment>>,
    unseen_posts: u32,
    members: BTreeMap<ChatId, Vec<Member>>,
    profiles: BTreeMap<String, ProfilePage>,
    friends: Vec<UserSummary>,
    /// Newest first
    notifications: Vec<Notification>,
    story_users: Vec<StoryUser>,
    next_id: u64,
    latency: Duration,
    failures: HashMap<Endpoint, VecDeque<ApiError>>,
    calls: Vec<ApiCall>,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn me(&self) -> Result<&UserSummary, ApiError> {
        self.me.as_ref().ok_or_else(|| status(401, "Not logged in"))
    }

    fn profile_mut(&mut self, username: &str) -> Result<&mut ProfilePage, ApiError> {
        self.profiles.get_mut(username).ok_or_else(|| status(404, "User not found"))
    }
}

/// Shared in-memory backend. Clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    /// Empty backend with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with `id`/`username` signed in.
    pub fn signed_in(id: UserId, username: &str) -> Self {
        let api = Self::new();
        api.lock().me = Some(user(id, username));
        api
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a chat to the chat list.
    pub fn add_chat(&self, chat: ChatSummary) {
        let mut state = self.lock();
        state.messages.entry(chat.id).or_default();
        state.next_id = state.next_id.max(chat.id);
        state.chats.push(chat);
    }

    /// Append history to a chat.
    pub fn add_messages(&self, chat_id: ChatId, messages: impl IntoIterator<Item = ChatMessage>) {
        let mut state = self.lock();
        let history = state.messages.entry(chat_id).or_default();
        history.extend(messages);
        history.sort_by_key(|m| m.id);
        let newest = history.last().map_or(0, |m| m.id);
        state.next_id = state.next_id.max(newest);
    }

    /// Publish a post at the top of the feed. Counts towards `check_new`.
    pub fn add_post(&self, post: Post) {
        let mut state = self.lock();
        state.next_id = state.next_id.max(post.id);
        state.posts.insert(0, post);
        state.unseen_posts += 1;
    }

    /// Add a member to a chat.
    pub fn add_member(&self, chat_id: ChatId, member: Member) {
        self.lock().members.entry(chat_id).or_default().push(member);
    }

    /// Add a profile, keyed by its owner's username.
    pub fn add_profile(&self, profile: ProfilePage) {
        self.lock().profiles.insert(profile.user.username.clone(), profile);
    }

    /// Add a friend of the signed-in user.
    pub fn add_friend(&self, friend: UserSummary) {
        self.lock().friends.push(friend);
    }

    /// Deliver a notification at the top of the listing.
    pub fn add_notification(&self, notification: Notification) {
        self.lock().notifications.insert(0, notification);
    }

    /// Add an author with active stories to the stories bar.
    pub fn add_story_user(&self, group: StoryUser) {
        let mut state = self.lock();
        let newest = group.stories.iter().map(|s| s.id).max().unwrap_or_default();
        state.next_id = state.next_id.max(newest);
        state.story_users.push(group);
    }

    /// Whether `story_id` has been marked viewed.
    pub fn story_viewed(&self, story_id: StoryId) -> bool {
        self.lock()
            .story_users
            .iter()
            .flat_map(|group| &group.stories)
            .any(|story| story.id == story_id && story.viewed)
    }

    /// Fail the next call to `endpoint` with `error`. Queued failures are
    /// served in order.
    pub fn fail_next(&self, endpoint: Endpoint, error: ApiError) {
        self.lock().failures.entry(endpoint).or_default().push_back(error);
    }

    /// Delay every response by `latency` of tokio time.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Every request so far, in arrival order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Requests that hit `endpoint`.
    pub fn calls_to(&self, endpoint: &Endpoint) -> Vec<ApiCall> {
        self.lock().calls.iter().filter(|c| &c.endpoint == endpoint).cloned().collect()
    }

    /// Stored history of a chat, oldest first.
    pub fn history(&self, chat_id: ChatId) -> Vec<ChatMessage> {
        self.lock().messages.get(&chat_id).cloned().unwrap_or_default()
    }

    /// Stored chat list entry.
    pub fn chat(&self, chat_id: ChatId) -> Option<ChatSummary> {
        self.lock().chats.iter().find(|c| c.id == chat_id).cloned()
    }

    /// Record the call, wait out the latency and serve any scripted failure.
    async fn enter(&self, endpoint: Endpoint, body: Option<Value>) -> Result<(), ApiError> {
        let latency = {
            let mut state = self.lock();
            state.calls.push(ApiCall { endpoint: endpoint.clone(), body });
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.lock();
        match state.failures.get_mut(&endpoint).and_then(VecDeque::pop_front) {
            Some(error) => {
                tracing::debug!(%endpoint, %error, "scripted failure");
                Err(error)
            },
            None => Ok(()),
        }
    }

    async fn enter_with<B>(&self, endpoint: Endpoint, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.enter(endpoint, Some(body)).await
    }
}

#[async_trait]
impl Api for MockApi {
    async fn feed(&self, page: u32, check_new: bool) -> Result<FeedPage, ApiError> {
        self.enter(Endpoint::Feed { page, check_new }, None).await?;
        let mut state = self.lock();
        let total_pages = pages(state.posts.len());
        if check_new {
            return Ok(FeedPage {
                posts: Vec::new(),
                pagination: Pagination { current_page: page, total_pages },
                has_new_posts: state.unseen_posts > 0,
                new_posts_count: state.unseen_posts,
            });
        }
        if page == 1 {
            state.unseen_posts = 0;
        }
        let liked = state.liked.clone();
        let posts = slice(&state.posts, page)
            .iter()
            .cloned()
            .map(|mut post| {
                post.liked_by_user = liked.contains(&post.id);
                post
            })
            .collect();
        Ok(FeedPage {
            posts,
            pagination: Pagination { current_page: page, total_pages },
            has_new_posts: false,
            new_posts_count: 0,
        })
    }

    async fn toggle_like(&self, post_id: PostId) -> Result<LikeResponse, ApiError> {
        self.enter(Endpoint::LikePost(post_id), None).await?;
        let mut state = self.lock();
        if !state.posts.iter().any(|p| p.id == post_id) {
            return Err(status(404, "Post not found"));
        }
        let now_liked = !state.liked.remove(&post_id);
        if now_liked {
            state.liked.insert(post_id);
        }
        let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) else {
            return Err(status(404, "Post not found"));
        };
        post.like_count = if now_liked { post.like_count + 1 } else { post.like_count.saturating_sub(1) };
        post.liked_by_user = now_liked;
        let action = if now_liked { LikeAction::Liked } else { LikeAction::Unliked };
        Ok(LikeResponse { success: true, action, likes: post.like_count })
    }

    async fn comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        self.enter(Endpoint::PostComments(post_id), None).await?;
        Ok(self.lock().comments.get(&post_id).cloned().unwrap_or_default())
    }

    async fn add_comment(&self, post_id: PostId, content: &str) -> Result<Comment, ApiError> {
        let body = NewComment { content: content.to_string() };
        self.enter_with(Endpoint::CommentOnPost(post_id), &body).await?;
        let mut state = self.lock();
        let author = state.me()?.clone();
        let id = state.next_id();
        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| status(404, "Post not found"))?;
        post.comment_count += 1;
        let comment = Comment {
            id,
            post_id,
            user_id: author.id,
            author: author.username,
            profile_pic: author.profile_pic,
            content: body.content,
            created_at: stamp(id),
        };
        state.comments.entry(post_id).or_default().push(comment.clone());
        Ok(comment)
    }

    async fn delete_post(&self, post_id: PostId) -> Result<(), ApiError> {
        self.enter(Endpoint::DeletePost(post_id), None).await?;
        let mut state = self.lock();
        let me = state.me()?.id;
        let index = state
            .posts
            .iter()
            .position(|p| p.id == post_id)
            .ok_or_else(|| status(404, "Post not found"))?;
        if state.posts[index].user_id != me {
            return Err(ApiError::Rejected("You can only delete your own posts".into()));
        }
        state.posts.remove(index);
        Ok(())
    }

    async fn chats(&self) -> Result<Vec<ChatSummary>, ApiError> {
        self.enter(Endpoint::Chats, None).await?;
        Ok(self.lock().chats.clone())
    }

    async fn messages(&self, chat_id: ChatId, page: u32) -> Result<MessagePage, ApiError> {
        self.enter(Endpoint::ChatMessages { chat_id, page }, None).await?;
        let state = self.lock();
        let history = state.messages.get(&chat_id).ok_or_else(|| status(404, "Chat not found"))?;
        // Page 1 is the newest slice
        let newest_first: Vec<ChatMessage> = history.iter().rev().cloned().collect();
        let mut messages = slice(&newest_first, page).to_vec();
        messages.reverse();
        Ok(MessagePage {
            messages,
            pagination: Pagination { current_page: page, total_pages: pages(history.len()) },
        })
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        body: &SendMessageBody,
    ) -> Result<MessageResponse, ApiError> {
        self.enter_with(Endpoint::SendMessage(chat_id), body).await?;
        let mut state = self.lock();
        let sender = state.me()?.clone();
        if let Some(&existing) = state.client_refs.get(&body.client_ref) {
            let message = state
                .messages
                .get(&chat_id)
                .and_then(|history| history.iter().find(|m| m.id == existing))
                .cloned();
            return Ok(AckPayload { success: true, message, error: None });
        }
        if !state.messages.contains_key(&chat_id) {
            return Err(status(404, "Chat not found"));
        }
        let id = state.next_id();
        let message = ChatMessage {
            id,
            chat_id,
            user_id: sender.id,
            sender: sender.username,
            profile_pic: sender.profile_pic,
            message_type: body.message_type,
            content: Some(body.content.clone()),
            media_url: None,
            created_at: stamp(id),
            updated_at: None,
            is_deleted: false,
            read_by: Vec::new(),
        };
        state.client_refs.insert(body.client_ref.clone(), id);
        state.messages.entry(chat_id).or_default().push(message.clone());
        if let Some(chat) = state.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.last_message = Some(message.clone());
        }
        Ok(AckPayload { success: true, message: Some(message), error: None })
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<MessageResponse, ApiError> {
        self.enter(Endpoint::DeleteMessage(message_id), None).await?;
        let mut state = self.lock();
        let me = state.me()?.id;
        let Some(message) =
            state.messages.values_mut().flatten().find(|m| m.id == message_id)
        else {
            return Err(status(404, "Message not found"));
        };
        if message.user_id != me {
            return Ok(AckPayload {
                success: false,
                message: None,
                error: Some("You can only delete your own messages".into()),
            });
        }
        message.soft_delete();
        Ok(AckPayload { success: true, message: Some(message.clone()), error: None })
    }

    async fn mark_chat_read(&self, chat_id: ChatId) -> Result<(), ApiError> {
        self.enter(Endpoint::MarkChatRead(chat_id), None).await?;
        let mut state = self.lock();
        let chat = state
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| status(404, "Chat not found"))?;
        chat.unread_count = 0;
        Ok(())
    }

    async fn members(&self, chat_id: ChatId) -> Result<Vec<Member>, ApiError> {
        self.enter(Endpoint::ChatMembers(chat_id), None).await?;
        Ok(self.lock().members.get(&chat_id).cloned().unwrap_or_default())
    }

    async fn make_admin(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError> {
        self.enter_with(Endpoint::MakeAdmin(chat_id), &MemberTarget { user_id }).await?;
        let mut state = self.lock();
        let member = state
            .members
            .get_mut(&chat_id)
            .and_then(|members| members.iter_mut().find(|m| m.user_id == user_id))
            .ok_or_else(|| ApiError::Rejected("User is not a member".into()))?;
        member.role = MemberRole::Admin;
        Ok(())
    }

    async fn remove_member(&self, chat_id: ChatId, user_id: UserId) -> Result<(), ApiError> {
        self.enter_with(Endpoint::RemoveMember(chat_id), &MemberTarget { user_id }).await?;
        let mut state = self.lock();
        let members = state.members.entry(chat_id).or_default();
        let before = members.len();
        members.retain(|m| m.user_id != user_id);
        if members.len() == before {
            return Err(ApiError::Rejected("User is not a member".into()));
        }
        Ok(())
    }

    async fn create_chat(&self, request: &CreateChat) -> Result<ChatSummary, ApiError> {
        self.enter_with(Endpoint::CreateChat, request).await?;
        let mut state = self.lock();
        if request.member_ids.is_empty() {
            return Err(ApiError::Rejected("Select at least one member".into()));
        }
        let id = state.next_id();
        let chat = ChatSummary {
            id,
            name: request.name.clone(),
            is_group: request.is_group,
            profile_pic: None,
            last_message: None,
            unread_count: 0,
            other_user: None,
        };
        state.chats.push(chat.clone());
        state.messages.insert(id, Vec::new());
        Ok(chat)
    }

    async fn friends(&self, search: Option<&str>) -> Result<Vec<UserSummary>, ApiError> {
        self.enter(Endpoint::Friends { search: search.map(str::to_string) }, None).await?;
        let state = self.lock();
        let needle = search.unwrap_or_default().to_lowercase();
        Ok(state
            .friends
            .iter()
            .filter(|f| f.username.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn profile(&self, username: &str, page: u32) -> Result<ProfilePage, ApiError> {
        self.enter(Endpoint::Profile { username: username.to_string(), page }, None).await?;
        let mut state = self.lock();
        let profile = state.profile_mut(username)?;
        let mut page_of = profile.clone();
        page_of.posts = slice(&profile.posts, page).to_vec();
        page_of.pagination = Pagination { current_page: page, total_pages: pages(profile.posts.len()) };
        Ok(page_of)
    }

    async fn friend_request(
        &self,
        username: &str,
        action: FriendRequestAction,
    ) -> Result<(), ApiError> {
        let endpoint = Endpoint::FriendRequest { username: username.to_string(), action };
        self.enter(endpoint, None).await?;
        let mut state = self.lock();
        let profile = state.profile_mut(username)?;
        let (from, to) = match action {
            FriendRequestAction::Send => (FriendshipStatus::None, FriendshipStatus::Pending),
            FriendRequestAction::Accept => (FriendshipStatus::Received, FriendshipStatus::Accepted),
            FriendRequestAction::Decline => (FriendshipStatus::Received, FriendshipStatus::None),
            FriendRequestAction::Cancel => (FriendshipStatus::Pending, FriendshipStatus::None),
        };
        if profile.friendship_status != from {
            return Err(ApiError::Rejected("Friend request not found".into()));
        }
        profile.friendship_status = to;
        if to == FriendshipStatus::Accepted {
            profile.friend_count += 1;
        }
        Ok(())
    }

    async fn remove_friend(&self, username: &str) -> Result<(), ApiError> {
        self.enter(Endpoint::RemoveFriend(username.to_string()), None).await?;
        let mut state = self.lock();
        let profile = state.profile_mut(username)?;
        if profile.friendship_status != FriendshipStatus::Accepted {
            return Err(ApiError::Rejected("Not friends".into()));
        }
        profile.friendship_status = FriendshipStatus::None;
        profile.friend_count = profile.friend_count.saturating_sub(1);
        Ok(())
    }

    async fn follow(&self, username: &str) -> Result<(), ApiError> {
        self.enter(Endpoint::Follow(username.to_string()), None).await?;
        let mut state = self.lock();
        let profile = state.profile_mut(username)?;
        if profile.is_following {
            return Err(ApiError::Rejected("Already following".into()));
        }
        profile.is_following = true;
        profile.follower_count += 1;
        Ok(())
    }

    async fn unfollow(&self, username: &str) -> Result<(), ApiError> {
        self.enter(Endpoint::Unfollow(username.to_string()), None).await?;
        let mut state = self.lock();
        let profile = state.profile_mut(username)?;
        if !profile.is_following {
            return Err(ApiError::Rejected("Not following".into()));
        }
        profile.is_following = false;
        profile.follower_count = profile.follower_count.saturating_sub(1);
        Ok(())
    }

    async fn notifications(&self, page: u32) -> Result<NotificationPage, ApiError> {
        self.enter(Endpoint::Notifications { page }, None).await?;
        let state = self.lock();
        Ok(NotificationPage {
            notifications: slice(&state.notifications, page).to_vec(),
            unread_count: unread(&state.notifications),
            pagination: Some(Pagination {
                current_page: page,
                total_pages: pages(state.notifications.len()),
            }),
        })
    }

    async fn mark_notifications_read(
        &self,
        ids: &[NotificationId],
    ) -> Result<UnreadCount, ApiError> {
        let body = MarkNotificationsRead { notification_ids: ids.to_vec() };
        self.enter_with(Endpoint::MarkNotificationsRead, &body).await?;
        let mut state = self.lock();
        for notification in &mut state.notifications {
            if ids.contains(&notification.id) {
                notification.is_read = true;
            }
        }
        Ok(UnreadCount { unread_count: unread(&state.notifications) })
    }

    async fn unread_count(&self) -> Result<UnreadCount, ApiError> {
        self.enter(Endpoint::UnreadCount, None).await?;
        Ok(UnreadCount { unread_count: unread(&self.lock().notifications) })
    }

    async fn stories(&self) -> Result<Vec<StoryUser>, ApiError> {
        self.enter(Endpoint::Stories, None).await?;
        let mut groups = self.lock().story_users.clone();
        // Authors with something unseen come first
        groups.sort_by_key(|group| !group.has_unviewed());
        Ok(groups)
    }

    async fn view_story(&self, story_id: StoryId) -> Result<(), ApiError> {
        self.enter(Endpoint::ViewStory(story_id), None).await?;
        let mut state = self.lock();
        let story = state
            .story_users
            .iter_mut()
            .flat_map(|group| group.stories.iter_mut())
            .find(|story| story.id == story_id)
            .ok_or_else(|| status(404, "Story not found"))?;
        story.viewed = true;
        Ok(())
    }

    async fn me(&self) -> Result<SessionInfo, ApiError> {
        self.enter(Endpoint::Me, None).await?;
        let state = self.lock();
        Ok(match &state.me {
            Some(me) => SessionInfo {
                authenticated: true,
                id: Some(me.id),
                username: Some(me.username.clone()),
            },
            None => SessionInfo { authenticated: false, id: None, username: None },
        })
    }
}

/// Public record for `id`/`username`.
pub fn user(id: UserId, username: &str) -> UserSummary {
    UserSummary { id, username: username.to_string(), profile_pic: None, bio: None }
}

/// Deterministic server timestamp for entity `id`.
pub fn stamp(id: u64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + id as i64, 0).single().unwrap_or_default()
}

fn status(code: u16, message: &str) -> ApiError {
    ApiError::Status { status: code, message: message.to_string() }
}

fn pages(len: usize) -> u32 {
    len.div_ceil(PAGE_SIZE) as u32
}

fn slice<T>(items: &[T], page: u32) -> &[T] {
    let start = (page.max(1) as usize - 1) * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(items.len());
    items.get(start..end).unwrap_or_default()
}

fn unread(notifications: &[Notification]) -> u32 {
    notifications.iter().filter(|n| !n.is_read).count() as u32
}
