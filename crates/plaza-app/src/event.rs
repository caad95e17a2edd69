//! Inputs to the session.
//!
//! [`Intent`]s are what the user did. [`AppEvent`]s are what the outside
//! world reported: pushed realtime events, connection lifecycle, and the
//! results of actions the runtime executed.

use plaza_client::{ApiError, Lifecycle};
use plaza_core::DeliveryError;
use plaza_proto::{
    ChatId, ChatMessage, ChatSummary, Comment, InboundEvent, Member, MessageId, MessageType,
    NotificationId, PostId, StoryId, StoryUser, UserId, UserSummary,
    rest::{FeedPage, LikeResponse, MessagePage, NotificationPage, ProfilePage, UnreadCount},
};

use crate::{
    action::{MemberOp, RelationOp, StoryOp},
    pagination::Viewport,
};

/// User input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Go to a location path
    Navigate(String),
    /// The active list scrolled
    Scroll(Viewport),
    /// Page became visible or hidden
    Visibility(bool),
    /// Network came back
    NetworkOnline,
    /// Reload the current page's views
    Refresh,
    /// Send a message in the open chat
    SendMessage {
        /// Body as typed
        content: String,
        /// Content kind
        message_type: MessageType,
    },
    /// Delete a message in the open chat
    DeleteMessage(MessageId),
    /// Like or unlike a post
    ToggleLike(PostId),
    /// Load the comments under a post
    LoadComments(PostId),
    /// Comment on a post
    AddComment {
        /// Post
        post_id: PostId,
        /// Body as typed
        content: String,
    },
    /// Delete a post
    DeletePost(PostId),
    /// Manage a member of the open chat
    Member {
        /// Member
        user_id: UserId,
        /// Operation
        op: MemberOp,
    },
    /// Change our relationship with the open profile
    Relationship(RelationOp),
    /// Mark notifications read. Empty marks every loaded unread one.
    MarkNotificationsRead(Vec<NotificationId>),
    /// Search our friends by username, for starting a chat
    SearchFriends(Option<String>),
    /// Start a chat with friends
    CreateChat {
        /// Group name; a named chat is always a group
        name: Option<String>,
        /// Other members
        member_ids: Vec<UserId>,
    },
    /// Control the story viewer
    Story(StoryOp),
    /// Leave the application
    Quit,
}

/// Result of a [`crate::action::Fetch`].
#[derive(Debug, Clone)]
pub enum Fetched {
    /// Chat list
    Chats(Result<Vec<ChatSummary>, ApiError>),
    /// Chat history page
    Messages {
        /// Chat
        chat_id: ChatId,
        /// Page requested
        page: u32,
        /// Generation the request was issued in
        generation: u64,
        /// Outcome
        result: Result<MessagePage, ApiError>,
    },
    /// Feed page or new-post check
    Feed {
        /// Page requested
        page: u32,
        /// Generation the request was issued in
        generation: u64,
        /// Whether this was a new-post check
        check_new: bool,
        /// Outcome
        result: Result<FeedPage, ApiError>,
    },
    /// Notification page
    Notifications {
        /// Page requested
        page: u32,
        /// Generation the request was issued in
        generation: u64,
        /// Outcome
        result: Result<NotificationPage, ApiError>,
    },
    /// Member list
    Members {
        /// Chat
        chat_id: ChatId,
        /// Outcome
        result: Result<Vec<Member>, ApiError>,
    },
    /// Profile page
    Profile {
        /// Profile owner
        username: String,
        /// Page requested
        page: u32,
        /// Generation the request was issued in
        generation: u64,
        /// Outcome
        result: Result<ProfilePage, ApiError>,
    },
    /// Comments under a post
    Comments {
        /// Post
        post_id: PostId,
        /// Outcome
        result: Result<Vec<Comment>, ApiError>,
    },
    /// Friend search
    Friends {
        /// Username filter the request was issued with
        search: Option<String>,
        /// Outcome
        result: Result<Vec<UserSummary>, ApiError>,
    },
    /// Stories bar
    Stories(Result<Vec<StoryUser>, ApiError>),
}

/// Events delivered to the session.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Pushed realtime event
    Realtime(InboundEvent),
    /// Connection lifecycle
    Lifecycle(Lifecycle),
    /// A page-scoped read finished
    Fetched(Fetched),
    /// Time to check the feed for newer posts
    FeedPollDue,
    /// A send finished
    MessageSent {
        /// Chat
        chat_id: ChatId,
        /// Confirmed record or failure
        result: Result<ChatMessage, DeliveryError>,
    },
    /// A delete finished
    MessageDeleted {
        /// Message
        message_id: MessageId,
        /// Updated record, if any, or failure
        result: Result<Option<ChatMessage>, DeliveryError>,
    },
    /// A like toggle finished
    LikeToggled {
        /// Post
        post_id: PostId,
        /// Outcome
        result: Result<LikeResponse, ApiError>,
    },
    /// A comment finished
    CommentAdded {
        /// Post
        post_id: PostId,
        /// Outcome
        result: Result<Comment, ApiError>,
    },
    /// A post delete finished
    PostDeleted {
        /// Post
        post_id: PostId,
        /// Outcome
        result: Result<(), ApiError>,
    },
    /// A member operation finished
    MemberUpdated {
        /// Chat
        chat_id: ChatId,
        /// Member
        user_id: UserId,
        /// Operation
        op: MemberOp,
        /// Outcome
        result: Result<(), ApiError>,
    },
    /// A relationship operation finished
    RelationshipUpdated {
        /// Other user
        username: String,
        /// Operation
        op: RelationOp,
        /// Outcome
        result: Result<(), ApiError>,
    },
    /// A chat creation finished
    ChatCreated(Result<ChatSummary, ApiError>),
    /// A story view report finished
    StoryViewed {
        /// Story
        story_id: StoryId,
        /// Outcome
        result: Result<(), ApiError>,
    },
    /// The notification badge was re-read
    UnreadCounted(Result<UnreadCount, ApiError>),
    /// A notification mark-read finished
    NotificationsMarked {
        /// Notifications
        ids: Vec<NotificationId>,
        /// Authoritative unread count or failure
        result: Result<UnreadCount, ApiError>,
    },
}
