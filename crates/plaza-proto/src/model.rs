//! Entity records as the server serializes them.
//!
//! Optional fields default when absent so that older or trimmed payloads
//! still decode. Unknown fields are ignored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChatId, CommentId, MessageId, NotificationId, PostId, StoryId, UserId};

/// Kind of chat message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Plain text in `content`
    #[default]
    Text,
    /// Image reference in `media_url`
    Image,
}

/// A read receipt attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadBy {
    /// Reader
    pub user_id: UserId,
    /// Reader's display name
    #[serde(default)]
    pub username: Option<String>,
    /// When the message was read. `None` if the server omitted it.
    #[serde(default, with = "crate::timestamp::option")]
    pub read_at: Option<DateTime<Utc>>,
}

/// A server-confirmed chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned id
    pub id: MessageId,
    /// Chat the message belongs to
    pub chat_id: ChatId,
    /// Sender
    pub user_id: UserId,
    /// Sender's username
    #[serde(default)]
    pub sender: String,
    /// Sender's avatar
    #[serde(default)]
    pub profile_pic: Option<String>,
    /// Content kind
    #[serde(default)]
    pub message_type: MessageType,
    /// Text body. `None` for images and deleted messages.
    #[serde(default)]
    pub content: Option<String>,
    /// Media reference for image messages
    #[serde(default)]
    pub media_url: Option<String>,
    /// Server creation time
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    /// Last server update
    #[serde(default, with = "crate::timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Soft-delete flag. Deleted messages stay in the list.
    #[serde(default)]
    pub is_deleted: bool,
    /// Read receipts
    #[serde(default)]
    pub read_by: Vec<ReadBy>,
}

impl ChatMessage {
    /// Whether `user_id` has a read receipt on this message.
    pub fn is_read_by(&self, user_id: UserId) -> bool {
        self.read_by.iter().any(|r| r.user_id == user_id)
    }

    /// Record a read receipt. Returns `false` if one was already present.
    pub fn mark_read_by(&mut self, user_id: UserId, read_at: Option<DateTime<Utc>>) -> bool {
        if self.is_read_by(user_id) {
            return false;
        }
        self.read_by.push(ReadBy { user_id, username: None, read_at });
        true
    }

    /// Mark as deleted and drop the body. Returns `false` if already deleted.
    pub fn soft_delete(&mut self) -> bool {
        if self.is_deleted {
            return false;
        }
        self.is_deleted = true;
        self.content = None;
        self.media_url = None;
        true
    }
}

/// Role of a chat member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// Can add/remove members and promote
    Admin,
    /// Regular member
    #[default]
    Member,
}

/// A chat membership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member's user id
    pub user_id: UserId,
    /// Member's username
    #[serde(default)]
    pub username: String,
    /// Member's avatar
    #[serde(default)]
    pub profile_pic: Option<String>,
    /// Role in the chat
    #[serde(default)]
    pub role: MemberRole,
    /// When the member joined
    #[serde(default, with = "crate::timestamp::option")]
    pub joined_at: Option<DateTime<Utc>>,
}

/// Minimal public user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// User id
    pub id: UserId,
    /// Username
    pub username: String,
    /// Avatar
    #[serde(default)]
    pub profile_pic: Option<String>,
    /// Profile bio
    #[serde(default)]
    pub bio: Option<String>,
}

/// A chat as shown in the chat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    /// Chat id
    pub id: ChatId,
    /// Group name. `None` for direct chats.
    #[serde(default)]
    pub name: Option<String>,
    /// Group or direct chat
    #[serde(default)]
    pub is_group: bool,
    /// Avatar for the list entry
    #[serde(default)]
    pub profile_pic: Option<String>,
    /// Most recent non-deleted message
    #[serde(default)]
    pub last_message: Option<ChatMessage>,
    /// Messages from others newer than our read watermark
    #[serde(default)]
    pub unread_count: u32,
    /// Counterpart of a direct chat
    #[serde(default)]
    pub other_user: Option<UserSummary>,
}

impl ChatSummary {
    /// Name to display: the group name, else the counterpart's username.
    pub fn display_name(&self) -> String {
        match (&self.name, &self.other_user) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Some(user)) => user.username.clone(),
            _ => format!("Chat {}", self.id),
        }
    }
}

/// Notification category.
///
/// Unknown server categories decode into [`NotificationType::Other`] rather
/// than failing the whole frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationType {
    /// Someone liked a post
    Like,
    /// Someone commented on a post
    Comment,
    /// Incoming friend request
    FriendRequest,
    /// Our friend request was accepted
    FriendAccepted,
    /// New follower
    Follow,
    /// New chat message
    Message,
    /// Added to a group chat
    ChatInvite,
    /// Category this client does not know
    Other(String),
}

impl NotificationType {
    /// Wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::FriendRequest => "friend_request",
            Self::FriendAccepted => "friend_accepted",
            Self::Follow => "follow",
            Self::Message => "message",
            Self::ChatInvite => "chat_invite",
            Self::Other(other) => other,
        }
    }

    /// Toast heading for this category.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Like => "New Like",
            Self::Comment => "New Comment",
            Self::FriendRequest => "Friend Request",
            Self::FriendAccepted => "Friend Request Accepted",
            Self::Follow => "New Follower",
            Self::Message => "New Message",
            Self::ChatInvite => "Chat Invitation",
            Self::Other(_) => "Notification",
        }
    }
}

impl From<String> for NotificationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "like" => Self::Like,
            "comment" => Self::Comment,
            "friend_request" => Self::FriendRequest,
            "friend_accepted" => Self::FriendAccepted,
            "follow" => Self::Follow,
            "message" => Self::Message,
            "chat_invite" => Self::ChatInvite,
            _ => Self::Other(value),
        }
    }
}

impl From<NotificationType> for String {
    fn from(value: NotificationType) -> Self {
        match value {
            NotificationType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Server id
    pub id: NotificationId,
    /// Recipient
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Category
    pub notification_type: NotificationType,
    /// Originating user
    #[serde(default)]
    pub sender_id: Option<UserId>,
    /// Originating user's name
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Originating user's avatar
    #[serde(default)]
    pub sender_profile_pic: Option<String>,
    /// Entity the notification concerns (post id, chat id, ...)
    #[serde(default)]
    pub reference_id: Option<u64>,
    /// Human-readable text
    #[serde(default)]
    pub content: Option<String>,
    /// Read flag
    #[serde(default)]
    pub is_read: bool,
    /// Server creation time
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A feed post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Server id
    pub id: PostId,
    /// Author id
    pub user_id: UserId,
    /// Author username
    #[serde(default)]
    pub author: String,
    /// Author avatar
    #[serde(default)]
    pub profile_pic: Option<String>,
    /// Body
    #[serde(default)]
    pub content: Option<String>,
    /// Server creation time
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    /// Number of likes
    #[serde(default)]
    pub like_count: u32,
    /// Number of comments
    #[serde(default)]
    pub comment_count: u32,
    /// Whether the current user liked the post
    #[serde(default)]
    pub liked_by_user: bool,
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Server id
    pub id: CommentId,
    /// Post commented on
    pub post_id: PostId,
    /// Author id
    pub user_id: UserId,
    /// Author username
    #[serde(default)]
    pub author: String,
    /// Author avatar
    #[serde(default)]
    pub profile_pic: Option<String>,
    /// Body
    pub content: String,
    /// Server creation time
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Kind of story content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryType {
    /// Text in `content`
    #[default]
    Text,
    /// Image in `media_url`, optional caption in `content`
    Photo,
    /// Video in `media_url`, optional caption in `content`
    Video,
    /// Unrecognized type
    #[serde(other)]
    Other,
}

/// A story: short-lived content shown full-screen, one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    /// Server id
    pub id: StoryId,
    /// Author id
    pub user_id: UserId,
    /// Content kind
    #[serde(default)]
    pub story_type: StoryType,
    /// Text or caption
    #[serde(default)]
    pub content: Option<String>,
    /// Image or video reference
    #[serde(default)]
    pub media_url: Option<String>,
    /// Server creation time
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    /// When the server stops serving it
    #[serde(with = "crate::timestamp")]
    pub expires_at: DateTime<Utc>,
    /// Whether the current user has seen it
    #[serde(default)]
    pub viewed: bool,
}

/// One author's active stories, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryUser {
    /// Author
    pub user: UserSummary,
    /// Stories
    #[serde(default)]
    pub stories: Vec<Story>,
}

impl StoryUser {
    /// Whether any story is still unseen.
    pub fn has_unviewed(&self) -> bool {
        self.stories.iter().any(|s| !s.viewed)
    }
}

/// Friendship state between the current user and a profile owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    /// We sent a request that is not yet answered
    Pending,
    /// They sent us a request
    Received,
    /// Friends
    Accepted,
    /// No relationship; also used for unrecognized values
    #[default]
    #[serde(other)]
    None,
}

/// Page position reported alongside every paged list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page that was returned
    pub current_page: u32,
    /// Total number of pages. Zero for an empty list.
    pub total_pages: u32,
}

impl Pagination {
    /// Whether pages after `current_page` exist.
    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn message_json() -> serde_json::Value {
        json!({
            "id": 9,
            "chat_id": 42,
            "user_id": 3,
            "sender": "ada",
            "message_type": "text",
            "content": "hi",
            "created_at": "2024-05-01T12:30:00.000001",
            "is_deleted": false,
            "read_by": [{"user_id": 4, "read_at": "2024-05-01T12:31:00"}]
        })
    }

    #[test]
    fn decodes_server_message() {
        let msg: ChatMessage = serde_json::from_value(message_json()).unwrap();
        assert_eq!(msg.id, 9);
        assert_eq!(msg.message_type, MessageType::Text);
        assert!(msg.is_read_by(4));
        assert!(!msg.is_read_by(3));
    }

    #[test]
    fn mark_read_is_idempotent() {
        let mut msg: ChatMessage = serde_json::from_value(message_json()).unwrap();
        assert!(msg.mark_read_by(7, None));
        assert!(!msg.mark_read_by(7, None));
        assert_eq!(msg.read_by.len(), 2);
    }

    #[test]
    fn soft_delete_clears_body_once() {
        let mut msg: ChatMessage = serde_json::from_value(message_json()).unwrap();
        assert!(msg.soft_delete());
        assert!(msg.is_deleted);
        assert_eq!(msg.content, None);
        assert!(!msg.soft_delete());
    }

    #[test]
    fn notification_type_round_trips_unknown() {
        let t: NotificationType = serde_json::from_value(json!("story_reply")).unwrap();
        assert_eq!(t, NotificationType::Other("story_reply".into()));
        assert_eq!(serde_json::to_value(&t).unwrap(), json!("story_reply"));
        assert_eq!(t.title(), "Notification");
    }

    #[test]
    fn notification_titles() {
        assert_eq!(NotificationType::FriendRequest.title(), "Friend Request");
        assert_eq!(NotificationType::FriendAccepted.title(), "Friend Request Accepted");
        assert_eq!(NotificationType::ChatInvite.title(), "Chat Invitation");
    }

    #[test]
    fn unknown_friendship_status_is_none() {
        let s: FriendshipStatus = serde_json::from_value(json!("declined")).unwrap();
        assert_eq!(s, FriendshipStatus::None);
        let s: FriendshipStatus = serde_json::from_value(json!("received")).unwrap();
        assert_eq!(s, FriendshipStatus::Received);
        let s: FriendshipStatus = serde_json::from_value(json!("none")).unwrap();
        assert_eq!(s, FriendshipStatus::None);
        assert_eq!(FriendshipStatus::default(), FriendshipStatus::None);
    }

    #[test]
    fn decodes_story_group() {
        let group: StoryUser = serde_json::from_value(json!({
            "user": {"id": 2, "username": "bob", "email": "ignored@example.com"},
            "stories": [{
                "id": 11,
                "user_id": 2,
                "story_type": "photo",
                "content": null,
                "media_url": "/uploads/s.jpg",
                "created_at": "2024-05-01T12:30:00",
                "expires_at": "2024-05-02T12:30:00",
                "viewed": false
            }, {
                "id": 10,
                "user_id": 2,
                "story_type": "boomerang",
                "created_at": "2024-05-01T11:00:00",
                "expires_at": "2024-05-02T11:00:00",
                "viewed": true
            }]
        }))
        .unwrap();
        assert_eq!(group.user.username, "bob");
        assert_eq!(group.stories[0].story_type, StoryType::Photo);
        assert_eq!(group.stories[1].story_type, StoryType::Other);
        assert!(group.has_unviewed());
    }

    #[test]
    fn chat_display_name_falls_back() {
        let chat: ChatSummary = serde_json::from_value(json!({
            "id": 5,
            "name": null,
            "other_user": {"id": 2, "username": "grace"}
        }))
        .unwrap();
        assert_eq!(chat.display_name(), "grace");

        let chat: ChatSummary = serde_json::from_value(json!({"id": 6})).unwrap();
        assert_eq!(chat.display_name(), "Chat 6");
    }

    #[test]
    fn pagination_has_more() {
        assert!(Pagination { current_page: 1, total_pages: 3 }.has_more());
        assert!(!Pagination { current_page: 3, total_pages: 3 }.has_more());
        assert!(!Pagination { current_page: 1, total_pages: 0 }.has_more());
    }
}
