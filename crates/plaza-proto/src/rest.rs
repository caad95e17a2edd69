//! REST endpoint catalogue and bodies.
//!
//! [`Endpoint`] names every route the client consumes. Paths are exposed as
//! segments so the HTTP layer can percent-encode user-supplied parts such as
//! usernames. Query parameters are exposed separately.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    event::AckPayload,
    ids::{ChatId, MessageId, NotificationId, PostId, StoryId, UserId},
    model::{
        ChatMessage, ChatSummary, Comment, FriendshipStatus, Member, MessageType, Notification,
        Pagination, Post, StoryUser, UserSummary,
    },
};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read
    Get,
    /// Mutate
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

/// Friend-request sub-action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FriendRequestAction {
    /// Send a new request
    Send,
    /// Accept an incoming request
    Accept,
    /// Decline an incoming request
    Decline,
    /// Withdraw our outgoing request
    Cancel,
}

/// A REST route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /api/feed?page=N[&check_new=true]`
    Feed {
        /// 1-based page
        page: u32,
        /// Ask only whether newer posts exist
        check_new: bool,
    },
    /// `POST /api/post/:id/like` (toggles)
    LikePost(PostId),
    /// `GET /api/post/:id/comments`
    PostComments(PostId),
    /// `POST /api/post/:id/comment`
    CommentOnPost(PostId),
    /// `POST /api/post/:id/delete`
    DeletePost(PostId),
    /// `GET /api/chats`
    Chats,
    /// `GET /api/chat/:id/messages?page=N`
    ChatMessages {
        /// Chat
        chat_id: ChatId,
        /// 1-based page, newest first
        page: u32,
    },
    /// `POST /api/chat/:id/send` (fallback send path)
    SendMessage(ChatId),
    /// `POST /api/chat/message/:id/delete`
    DeleteMessage(MessageId),
    /// `POST /api/chat/:id/read`
    MarkChatRead(ChatId),
    /// `GET /api/chat/:id/members`
    ChatMembers(ChatId),
    /// `POST /api/chat/:id/make_admin`
    MakeAdmin(ChatId),
    /// `POST /api/chat/:id/remove_member`
    RemoveMember(ChatId),
    /// `POST /api/chat/create`
    CreateChat,
    /// `GET /api/friends?search=Q`
    Friends {
        /// Optional name filter
        search: Option<String>,
    },
    /// `GET /api/profile/:username?page=N`
    Profile {
        /// Profile owner
        username: String,
        /// 1-based page of posts
        page: u32,
    },
    /// `POST /api/friend_request/:username[/accept|/decline|/cancel]`
    FriendRequest {
        /// Counterpart
        username: String,
        /// Sub-action
        action: FriendRequestAction,
    },
    /// `POST /api/friend/:username/remove`
    RemoveFriend(String),
    /// `POST /api/follow/:username`
    Follow(String),
    /// `POST /api/unfollow/:username`
    Unfollow(String),
    /// `GET /api/stories`
    Stories,
    /// `POST /api/story/:id/view`
    ViewStory(StoryId),
    /// `POST /story/create` (multipart)
    CreateStory,
    /// `GET /api/uploads/services`
    UploadServices,
    /// `POST /api/uploads/image` (multipart)
    UploadImage,
    /// `GET /auth/api/me`
    Me,
    /// `POST /auth/api/login`
    Login,
    /// `POST /auth/api/register`
    Register,
    /// `POST /auth/api/logout`
    Logout,
    /// `GET /api/notifications?page=N`
    Notifications {
        /// 1-based page
        page: u32,
    },
    /// `POST /api/notifications/mark_read`
    MarkNotificationsRead,
    /// `GET /api/notifications/unread_count`
    UnreadCount,
}

impl Endpoint {
    /// HTTP method of the route.
    pub fn method(&self) -> Method {
        match self {
            Self::Feed { .. }
            | Self::PostComments(_)
            | Self::Chats
            | Self::ChatMessages { .. }
            | Self::ChatMembers(_)
            | Self::Friends { .. }
            | Self::Profile { .. }
            | Self::Stories
            | Self::UploadServices
            | Self::Me
            | Self::Notifications { .. }
            | Self::UnreadCount => Method::Get,
            Self::LikePost(_)
            | Self::CommentOnPost(_)
            | Self::DeletePost(_)
            | Self::SendMessage(_)
            | Self::DeleteMessage(_)
            | Self::MarkChatRead(_)
            | Self::MakeAdmin(_)
            | Self::RemoveMember(_)
            | Self::CreateChat
            | Self::FriendRequest { .. }
            | Self::RemoveFriend(_)
            | Self::Follow(_)
            | Self::Unfollow(_)
            | Self::ViewStory(_)
            | Self::CreateStory
            | Self::UploadImage
            | Self::MarkNotificationsRead
            | Self::Login
            | Self::Register
            | Self::Logout => Method::Post,
        }
    }

    /// Unencoded path segments.
    pub fn segments(&self) -> Vec<String> {
        fn segs(parts: &[&str]) -> Vec<String> {
            parts.iter().map(|p| (*p).to_string()).collect()
        }

        match self {
            Self::Feed { .. } => segs(&["api", "feed"]),
            Self::LikePost(id) => segs(&["api", "post", &id.to_string(), "like"]),
            Self::PostComments(id) => segs(&["api", "post", &id.to_string(), "comments"]),
            Self::CommentOnPost(id) => segs(&["api", "post", &id.to_string(), "comment"]),
            Self::DeletePost(id) => segs(&["api", "post", &id.to_string(), "delete"]),
            Self::Chats => segs(&["api", "chats"]),
            Self::ChatMessages { chat_id, .. } => {
                segs(&["api", "chat", &chat_id.to_string(), "messages"])
            },
            Self::SendMessage(id) => segs(&["api", "chat", &id.to_string(), "send"]),
            Self::DeleteMessage(id) => segs(&["api", "chat", "message", &id.to_string(), "delete"]),
            Self::MarkChatRead(id) => segs(&["api", "chat", &id.to_string(), "read"]),
            Self::ChatMembers(id) => segs(&["api", "chat", &id.to_string(), "members"]),
            Self::MakeAdmin(id) => segs(&["api", "chat", &id.to_string(), "make_admin"]),
            Self::RemoveMember(id) => segs(&["api", "chat", &id.to_string(), "remove_member"]),
            Self::CreateChat => segs(&["api", "chat", "create"]),
            Self::Friends { .. } => segs(&["api", "friends"]),
            Self::Profile { username, .. } => segs(&["api", "profile", username]),
            Self::FriendRequest { username, action } => {
                let mut parts = segs(&["api", "friend_request", username]);
                match action {
                    FriendRequestAction::Send => {},
                    FriendRequestAction::Accept => parts.push("accept".into()),
                    FriendRequestAction::Decline => parts.push("decline".into()),
                    FriendRequestAction::Cancel => parts.push("cancel".into()),
                }
                parts
            },
            Self::RemoveFriend(username) => segs(&["api", "friend", username, "remove"]),
            Self::Follow(username) => segs(&["api", "follow", username]),
            Self::Unfollow(username) => segs(&["api", "unfollow", username]),
            Self::Stories => segs(&["api", "stories"]),
            Self::ViewStory(id) => segs(&["api", "story", &id.to_string(), "view"]),
            Self::CreateStory => segs(&["story", "create"]),
            Self::UploadServices => segs(&["api", "uploads", "services"]),
            Self::UploadImage => segs(&["api", "uploads", "image"]),
            Self::Me => segs(&["auth", "api", "me"]),
            Self::Login => segs(&["auth", "api", "login"]),
            Self::Register => segs(&["auth", "api", "register"]),
            Self::Logout => segs(&["auth", "api", "logout"]),
            Self::Notifications { .. } => segs(&["api", "notifications"]),
            Self::MarkNotificationsRead => segs(&["api", "notifications", "mark_read"]),
            Self::UnreadCount => segs(&["api", "notifications", "unread_count"]),
        }
    }

    /// Path as a display string (segments joined, not encoded).
    pub fn path(&self) -> String {
        format!("/{}", self.segments().join("/"))
    }

    /// Query parameters.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Feed { page, check_new } => {
                let mut query = vec![("page", page.to_string())];
                if *check_new {
                    query.push(("check_new", "true".to_string()));
                }
                query
            },
            Self::ChatMessages { page, .. }
            | Self::Profile { page, .. }
            | Self::Notifications { page } => vec![("page", page.to_string())],
            Self::Friends { search: Some(q) } => vec![("search", q.clone())],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())?;
        let query = self.query();
        for (i, (key, value)) in query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// `GET /api/feed` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPage {
    /// Posts on this page, newest first
    #[serde(default)]
    pub posts: Vec<Post>,
    /// Page position
    pub pagination: Pagination,
    /// Set on `check_new` requests
    #[serde(default)]
    pub has_new_posts: bool,
    /// Set on `check_new` requests
    #[serde(default)]
    pub new_posts_count: u32,
}

/// Direction of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeAction {
    /// Post is now liked
    Liked,
    /// Post is no longer liked
    Unliked,
}

/// `POST /api/post/:id/like` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeResponse {
    /// Whether the toggle applied
    pub success: bool,
    /// Resulting state
    pub action: LikeAction,
    /// Authoritative like count
    pub likes: u32,
}

/// `GET /api/post/:id/comments` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentList {
    /// Comments, oldest first
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// `POST /api/post/:id/comment` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    /// Body
    pub content: String,
}

/// `POST /api/post/:id/comment` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentResponse {
    /// Whether the comment was created
    #[serde(default = "default_true")]
    pub success: bool,
    /// The created comment
    pub comment: Comment,
}

fn default_true() -> bool {
    true
}

/// `GET /api/chats` response.
///
/// Accepts both `{"chats": [...]}` and a bare array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatListBody {
    /// Wrapped form
    Wrapped {
        /// Chats
        chats: Vec<ChatSummary>,
    },
    /// Bare array form
    Bare(Vec<ChatSummary>),
}

impl ChatListBody {
    /// The chats, whichever form was received.
    pub fn into_chats(self) -> Vec<ChatSummary> {
        match self {
            Self::Wrapped { chats } | Self::Bare(chats) => chats,
        }
    }
}

/// `GET /api/chat/:id/messages` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePage {
    /// Messages on the page
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Page position
    pub pagination: Pagination,
}

/// `POST /api/chat/:id/send` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageBody {
    /// Body
    pub content: String,
    /// Content kind
    pub message_type: MessageType,
    /// Idempotency key shared with the duplex path
    pub client_ref: String,
}

/// Response of the HTTP send/delete fallbacks. Same shape as the duplex ack.
pub type MessageResponse = AckPayload;

/// Generic `{success, error?, message?}` mutation response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Whether the mutation applied
    #[serde(default)]
    pub success: bool,
    /// Rejection reason
    #[serde(default)]
    pub error: Option<String>,
    /// Informational message
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Rejection reason
    #[serde(default)]
    pub error: Option<String>,
    /// Alternative field some routes use
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Best human-readable explanation.
    pub fn reason(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

/// `GET /api/chat/:id/members` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberList {
    /// Members
    #[serde(default)]
    pub members: Vec<Member>,
}

/// Body of make-admin / remove-member requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberTarget {
    /// Affected member
    pub user_id: UserId,
}

/// `POST /api/chat/create` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChat {
    /// Group or direct
    pub is_group: bool,
    /// Group name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Initial members (excluding self)
    pub member_ids: Vec<UserId>,
}

/// `POST /api/chat/create` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChatResponse {
    /// Whether the chat was created
    pub success: bool,
    /// Created (or existing direct) chat
    #[serde(default)]
    pub chat: Option<ChatSummary>,
    /// Rejection reason
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/friends` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendList {
    /// Matching friends
    #[serde(default)]
    pub friends: Vec<UserSummary>,
}

/// `GET /api/stories` response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoryFeed {
    /// Authors with active stories, those with unseen ones first
    #[serde(default)]
    pub story_users: Vec<StoryUser>,
}

/// `GET /api/profile/:username` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePage {
    /// Profile owner
    pub user: UserSummary,
    /// Owner's posts on this page
    #[serde(default)]
    pub posts: Vec<Post>,
    /// Owner's friends
    #[serde(default)]
    pub friends: Vec<UserSummary>,
    /// Relationship to the current user
    #[serde(default)]
    pub friendship_status: FriendshipStatus,
    /// Whether the current user follows the owner
    #[serde(default)]
    pub is_following: bool,
    /// Owner's friend count
    #[serde(default)]
    pub friend_count: u32,
    /// Owner's follower count
    #[serde(default)]
    pub follower_count: u32,
    /// Accounts the owner follows
    #[serde(default)]
    pub following_count: u32,
    /// Page position of `posts`
    pub pagination: Pagination,
}

/// Notification listing, used by `GET /api/notifications` and the
/// `get_notifications` ack.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationPage {
    /// Notifications, newest first
    #[serde(default)]
    pub notifications: Vec<Notification>,
    /// Authoritative unread count
    #[serde(default)]
    pub unread_count: u32,
    /// Page position. Absent on the ack.
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// `POST /api/notifications/mark_read` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkNotificationsRead {
    /// Notifications to mark. Empty marks none.
    pub notification_ids: Vec<NotificationId>,
}

/// Unread counter response of mark-read and unread-count routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    /// Authoritative unread count
    pub unread_count: u32,
}

/// `GET /auth/api/me` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Whether the session is logged in
    pub authenticated: bool,
    /// User id
    #[serde(default)]
    pub id: Option<UserId>,
    /// Username
    #[serde(default)]
    pub username: Option<String>,
}
