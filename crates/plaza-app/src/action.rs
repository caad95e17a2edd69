//! Application side-effects.
//!
//! [`AppAction`]s are produced by the [`crate::Session`] state machine and
//! executed by the [`crate::Runtime`]. Results come back as
//! [`crate::AppEvent`]s.

use plaza_core::PageContext;
use plaza_proto::{
    ChatId, MessageId, MessageType, NotificationId, PostId, StoryId, UserId,
    rest::{CreateChat, FriendRequestAction},
};

/// REST reads owned by the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fetch {
    /// Chat list
    Chats,
    /// A page of chat history. Page 1 is the newest.
    Messages {
        /// Chat
        chat_id: ChatId,
        /// 1-based page
        page: u32,
        /// Cursor generation the request was issued in
        generation: u64,
    },
    /// A page of the feed, or a check for newer posts
    Feed {
        /// 1-based page
        page: u32,
        /// Cursor generation the request was issued in
        generation: u64,
        /// Only ask whether newer posts exist
        check_new: bool,
    },
    /// A page of notifications
    Notifications {
        /// 1-based page
        page: u32,
        /// Cursor generation the request was issued in
        generation: u64,
    },
    /// Chat members
    Members {
        /// Chat
        chat_id: ChatId,
    },
    /// A page of a profile
    Profile {
        /// Profile owner
        username: String,
        /// 1-based page of posts
        page: u32,
        /// Cursor generation the request was issued in
        generation: u64,
    },
    /// Comments under a post
    Comments {
        /// Post
        post_id: PostId,
    },
    /// Friends of the signed-in user, optionally filtered by username
    Friends {
        /// Username filter
        search: Option<String>,
    },
    /// Authors with active stories
    Stories,
}

/// Member management operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberOp {
    /// Promote to admin
    MakeAdmin,
    /// Remove from the chat
    Remove,
}

/// Relationship operation on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationOp {
    /// Send, accept, decline or cancel a friend request
    FriendRequest(FriendRequestAction),
    /// Unfriend
    RemoveFriend,
    /// Follow
    Follow,
    /// Unfollow
    Unfollow,
}

/// Story viewer control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryOp {
    /// Open an author's stories at the first unseen one
    Open(UserId),
    /// Next story, crossing to the next author after the last one
    Next,
    /// Previous story, crossing back to the previous author
    Prev,
    /// Close the viewer
    Close,
}

/// Actions produced by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Page changed: drop page-scoped tasks and move rooms.
    Navigate(PageContext),

    /// Issue a page-scoped REST read.
    Fetch(Fetch),

    /// Start the feed's periodic new-post check.
    StartFeedPoll,

    /// Send a chat message.
    SendMessage {
        /// Target chat
        chat_id: ChatId,
        /// Validated body
        content: String,
        /// Content kind
        message_type: MessageType,
    },

    /// Delete a chat message.
    DeleteMessage {
        /// Message to delete
        message_id: MessageId,
    },

    /// Report a chat as read.
    MarkChatRead {
        /// Chat
        chat_id: ChatId,
        /// Newest message seen
        up_to: Option<MessageId>,
        /// Send even if the watermark already covers `up_to`
        resend: bool,
    },

    /// Toggle our like on a post.
    ToggleLike {
        /// Post
        post_id: PostId,
    },

    /// Comment on a post.
    AddComment {
        /// Post
        post_id: PostId,
        /// Validated body
        content: String,
    },

    /// Delete one of our posts.
    DeletePost {
        /// Post
        post_id: PostId,
    },

    /// Manage a chat member.
    UpdateMember {
        /// Chat
        chat_id: ChatId,
        /// Member
        user_id: UserId,
        /// Operation
        op: MemberOp,
    },

    /// Change our relationship with a user.
    UpdateRelationship {
        /// Other user
        username: String,
        /// Operation
        op: RelationOp,
    },

    /// Mark notifications read.
    MarkNotificationsRead {
        /// Notifications
        ids: Vec<NotificationId>,
    },

    /// Start a chat.
    CreateChat(CreateChat),

    /// Report a story as seen.
    ViewStory {
        /// Story
        story_id: StoryId,
    },

    /// Re-read the notification badge from the server.
    RefreshUnreadCount,

    /// Page visibility changed.
    Visibility(bool),

    /// Network came back.
    NetworkOnline,

    /// Keep the chat history in place after older messages were prepended.
    RestoreScroll {
        /// Content height before the prepend
        previous_height: u32,
    },
}
