//! Identifier aliases.
//!
//! All entity ids are assigned by the server. The client never invents one;
//! the only client-assigned number on the wire is the [`RequestId`] used to
//! correlate acknowledgements.

/// User account id.
pub type UserId = u64;

/// Chat (direct or group) id.
pub type ChatId = u64;

/// Chat message id. Monotonic enough for display ordering, not gap-free.
pub type MessageId = u64;

/// Notification id.
pub type NotificationId = u64;

/// Feed post id.
pub type PostId = u64;

/// Post comment id.
pub type CommentId = u64;

/// Story id.
pub type StoryId = u64;

/// Correlation id for acknowledged realtime requests.
pub type RequestId = u64;
