//! Wire contracts for the Plaza realtime channel and REST API.
//!
//! Everything the client exchanges with the server is described here as plain
//! serde types. No I/O happens in this crate.
//!
//! # Realtime Channel
//!
//! The duplex channel carries JSON text frames. Every frame has a `type`
//! field naming the event or operation and a `data` object carrying its
//! payload:
//!
//! ```text
//! server -> client   {"type": "new_message", "data": {...}}
//! server -> client   {"type": "ack", "id": 7, "data": {"success": true, ...}}
//! client -> server   {"type": "send_message", "id": 7, "data": {...}}
//! ```
//!
//! Inbound frames decode into [`ServerFrame`]: either a typed
//! [`InboundEvent`] or an [`Ack`] correlated to an earlier request by id.
//! Outbound frames are built from [`OutboundRequest`].
//!
//! # REST
//!
//! [`Endpoint`] catalogues every HTTP route the client consumes, and the
//! `rest` module holds the response bodies.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod event;
pub mod ids;
pub mod model;
pub mod request;
pub mod rest;
pub mod timestamp;

pub use errors::ProtocolError;
pub use event::{
    Ack, AckPayload, AuthResponse, AuthStatus, ChatMemberAdded, ChatMemberRemoved, ConnectedInfo,
    EventKind, InboundEvent, LikeUpdate, MessageDeleted, MessagesRead, Presence, ServerFrame,
    UserStatus,
};
pub use ids::{ChatId, CommentId, MessageId, NotificationId, PostId, RequestId, StoryId, UserId};
pub use model::{
    ChatMessage, ChatSummary, Comment, FriendshipStatus, Member, MemberRole, MessageType,
    Notification, NotificationType, Pagination, Post, ReadBy, Story, StoryType, StoryUser,
    UserSummary,
};
pub use request::{ClientFrame, OutboundRequest};
pub use rest::{Endpoint, Method};
