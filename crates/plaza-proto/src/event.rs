//! Inbound realtime frames.
//!
//! Decoding is two-step: the frame is parsed as a JSON object and its `type`
//! field is validated first, then the `data` object is decoded according to
//! that type. A frame whose type this client does not know is still a valid
//! frame and decodes into [`InboundEvent::Unknown`], so generic subscribers
//! can see it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};

use crate::{
    errors::ProtocolError,
    ids::{ChatId, MessageId, PostId, RequestId, UserId},
    model::{ChatMessage, ChatSummary, Comment, Member, Notification, Post},
};

/// Frame type used for acknowledgements.
pub const ACK_TYPE: &str = "ack";

/// Discriminant of an [`InboundEvent`].
///
/// Used as the handler key in the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Channel-level greeting
    Connected,
    /// Result of the `auth` request
    AuthResponse,
    /// Chat message broadcast
    NewMessage,
    /// Chat message soft-deleted
    MessageDeleted,
    /// Someone read a chat
    MessagesRead,
    /// Notification pushed to the user room
    NewNotification,
    /// Chat metadata or last message changed
    ChatUpdated,
    /// Member joined a chat
    MemberAdded,
    /// Member left or was removed from a chat
    MemberRemoved,
    /// Presence change
    UserStatus,
    /// New post in the feed
    NewPost,
    /// New comment on a post
    NewComment,
    /// Like count changed on a post
    NewLike,
    /// Heartbeat reply
    Pong,
    /// Any type this client does not recognize
    Unknown,
}

impl EventKind {
    /// Every recognized kind, in wire-name order of the protocol table.
    pub const KNOWN: [Self; 14] = [
        Self::Connected,
        Self::AuthResponse,
        Self::NewMessage,
        Self::MessageDeleted,
        Self::MessagesRead,
        Self::NewNotification,
        Self::ChatUpdated,
        Self::MemberAdded,
        Self::MemberRemoved,
        Self::UserStatus,
        Self::NewPost,
        Self::NewComment,
        Self::NewLike,
        Self::Pong,
    ];

    /// Wire name. `Unknown` has none and returns `"unknown"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::AuthResponse => "auth_response",
            Self::NewMessage => "new_message",
            Self::MessageDeleted => "message_deleted",
            Self::MessagesRead => "messages_read",
            Self::NewNotification => "new_notification",
            Self::ChatUpdated => "chat_updated",
            Self::MemberAdded => "member_added",
            Self::MemberRemoved => "member_removed",
            Self::UserStatus => "user_status",
            Self::NewPost => "new_post",
            Self::NewComment => "new_comment",
            Self::NewLike => "new_like",
            Self::Pong => "pong",
            Self::Unknown => "unknown",
        }
    }

    /// Look up a recognized kind by wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::KNOWN.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the `connected` greeting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedInfo {
    /// Free-form status string
    #[serde(default)]
    pub status: Option<String>,
    /// Server time of the greeting
    #[serde(default, with = "crate::timestamp::option")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Outcome of authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// Credentials accepted
    Success,
    /// Credentials rejected
    Error,
}

/// Payload of `auth_response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Outcome
    pub status: AuthStatus,
    /// Authenticated user
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Authenticated username
    #[serde(default)]
    pub username: Option<String>,
    /// Error explanation
    #[serde(default)]
    pub message: Option<String>,
}

impl AuthResponse {
    /// Whether authentication succeeded.
    pub fn is_success(&self) -> bool {
        self.status == AuthStatus::Success
    }
}

/// Payload of `message_deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeleted {
    /// Deleted message
    #[serde(alias = "message_id")]
    pub id: MessageId,
    /// Chat it belonged to
    pub chat_id: ChatId,
}

/// Payload of `messages_read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesRead {
    /// Chat that was read
    pub chat_id: ChatId,
    /// Reader
    pub user_id: UserId,
    /// Reader's read watermark
    #[serde(default, with = "crate::timestamp::option")]
    pub read_at: Option<DateTime<Utc>>,
}

/// Payload of `member_added`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMemberAdded {
    /// Chat joined
    pub chat_id: ChatId,
    /// The new member
    pub member: Member,
}

/// Payload of `member_removed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMemberRemoved {
    /// Chat left
    pub chat_id: ChatId,
    /// Removed user
    pub user_id: UserId,
}

/// Presence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Connected somewhere
    Online,
    /// Not connected; also used for unrecognized values
    #[serde(other)]
    Offline,
}

/// Payload of `user_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    /// Subject user
    pub user_id: UserId,
    /// New presence
    pub status: Presence,
}

/// Payload of `new_like`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeUpdate {
    /// Post whose count changed
    pub post_id: PostId,
    /// Authoritative like count
    pub likes: u32,
    /// User who liked or unliked
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// A typed inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Channel greeting
    Connected(ConnectedInfo),
    /// Authentication result
    AuthResponse(AuthResponse),
    /// Chat message broadcast
    NewMessage(ChatMessage),
    /// Chat message soft-deleted
    MessageDeleted(MessageDeleted),
    /// Read receipt
    MessagesRead(MessagesRead),
    /// Notification push
    NewNotification(Notification),
    /// Chat list entry changed
    ChatUpdated(ChatSummary),
    /// Member added to chat
    MemberAdded(ChatMemberAdded),
    /// Member removed from chat
    MemberRemoved(ChatMemberRemoved),
    /// Presence change
    UserStatus(UserStatus),
    /// New feed post
    NewPost(Post),
    /// New post comment
    NewComment(Comment),
    /// Post like count changed
    NewLike(LikeUpdate),
    /// Heartbeat reply
    Pong,
    /// Frame with a valid but unrecognized type
    Unknown {
        /// Wire type
        event_type: String,
        /// Raw payload
        data: Value,
    },
}

impl InboundEvent {
    /// Handler key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected(_) => EventKind::Connected,
            Self::AuthResponse(_) => EventKind::AuthResponse,
            Self::NewMessage(_) => EventKind::NewMessage,
            Self::MessageDeleted(_) => EventKind::MessageDeleted,
            Self::MessagesRead(_) => EventKind::MessagesRead,
            Self::NewNotification(_) => EventKind::NewNotification,
            Self::ChatUpdated(_) => EventKind::ChatUpdated,
            Self::MemberAdded(_) => EventKind::MemberAdded,
            Self::MemberRemoved(_) => EventKind::MemberRemoved,
            Self::UserStatus(_) => EventKind::UserStatus,
            Self::NewPost(_) => EventKind::NewPost,
            Self::NewComment(_) => EventKind::NewComment,
            Self::NewLike(_) => EventKind::NewLike,
            Self::Pong => EventKind::Pong,
            Self::Unknown { .. } => EventKind::Unknown,
        }
    }

    /// Wire type, including the raw name of unknown events.
    pub fn event_type(&self) -> &str {
        match self {
            Self::Unknown { event_type, .. } => event_type,
            other => other.kind().as_str(),
        }
    }

    /// Chat this event concerns, if any.
    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::NewMessage(msg) => Some(msg.chat_id),
            Self::MessageDeleted(d) => Some(d.chat_id),
            Self::MessagesRead(r) => Some(r.chat_id),
            Self::ChatUpdated(chat) => Some(chat.id),
            Self::MemberAdded(m) => Some(m.chat_id),
            Self::MemberRemoved(m) => Some(m.chat_id),
            _ => None,
        }
    }

    /// Decode the `data` object of an event whose type is already known.
    fn from_parts(kind: EventKind, event_type: &str, data: Value) -> Result<Self, ProtocolError> {
        Ok(match kind {
            EventKind::Connected => Self::Connected(payload(event_type, data)?),
            EventKind::AuthResponse => Self::AuthResponse(payload(event_type, data)?),
            EventKind::NewMessage => Self::NewMessage(payload(event_type, data)?),
            EventKind::MessageDeleted => Self::MessageDeleted(payload(event_type, data)?),
            EventKind::MessagesRead => Self::MessagesRead(payload(event_type, data)?),
            EventKind::NewNotification => Self::NewNotification(payload(event_type, data)?),
            EventKind::ChatUpdated => Self::ChatUpdated(payload(event_type, data)?),
            EventKind::MemberAdded => Self::MemberAdded(payload(event_type, data)?),
            EventKind::MemberRemoved => Self::MemberRemoved(payload(event_type, data)?),
            EventKind::UserStatus => Self::UserStatus(payload(event_type, data)?),
            EventKind::NewPost => Self::NewPost(payload(event_type, data)?),
            EventKind::NewComment => Self::NewComment(payload(event_type, data)?),
            EventKind::NewLike => Self::NewLike(payload(event_type, data)?),
            EventKind::Pong => Self::Pong,
            EventKind::Unknown => Self::Unknown { event_type: event_type.to_string(), data },
        })
    }

    /// Encode as a wire frame.
    ///
    /// The client never sends events; this exists for servers and test
    /// harnesses that need to produce them.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let data = match self {
            Self::Connected(p) => serde_json::to_value(p)?,
            Self::AuthResponse(p) => serde_json::to_value(p)?,
            Self::NewMessage(p) => serde_json::to_value(p)?,
            Self::MessageDeleted(p) => serde_json::to_value(p)?,
            Self::MessagesRead(p) => serde_json::to_value(p)?,
            Self::NewNotification(p) => serde_json::to_value(p)?,
            Self::ChatUpdated(p) => serde_json::to_value(p)?,
            Self::MemberAdded(p) => serde_json::to_value(p)?,
            Self::MemberRemoved(p) => serde_json::to_value(p)?,
            Self::UserStatus(p) => serde_json::to_value(p)?,
            Self::NewPost(p) => serde_json::to_value(p)?,
            Self::NewComment(p) => serde_json::to_value(p)?,
            Self::NewLike(p) => serde_json::to_value(p)?,
            Self::Pong => Value::Object(Map::new()),
            Self::Unknown { data, .. } => data.clone(),
        };
        Ok(json!({ "type": self.event_type(), "data": data }).to_string())
    }
}

fn payload<T: DeserializeOwned>(event_type: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidPayload {
        event_type: event_type.to_string(),
        reason: e.to_string(),
    })
}

/// Acknowledgement of an earlier request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Id of the request being acknowledged
    pub id: RequestId,
    /// Raw acknowledgement body
    pub data: Value,
}

impl Ack {
    /// Decode the body into a typed reply.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        payload(ACK_TYPE, self.data.clone())
    }

    /// Encode as a wire frame.
    pub fn encode(&self) -> String {
        json!({ "type": ACK_TYPE, "id": self.id, "data": self.data }).to_string()
    }
}

/// Body of `send_message` / `delete_message` acknowledgements.
///
/// `success: false` means the server rejected the request (authorization or
/// business rule). It carries the server's explanation in `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckPayload {
    /// Whether the server applied the request
    pub success: bool,
    /// The confirmed message record
    #[serde(default)]
    pub message: Option<ChatMessage>,
    /// Server-provided rejection reason
    #[serde(default)]
    pub error: Option<String>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// Pushed event
    Event(InboundEvent),
    /// Reply to a request
    Ack(Ack),
}

impl ServerFrame {
    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Json`] if the text is not JSON
    /// - [`ProtocolError::NotAnObject`] if the frame is not an object
    /// - [`ProtocolError::MissingType`] if `type` is absent or not a string
    /// - [`ProtocolError::MissingAckId`] for an ack without a numeric id
    /// - [`ProtocolError::InvalidPayload`] if `data` does not match the type
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut frame) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let event_type = match frame.remove("type") {
            Some(Value::String(t)) if !t.is_empty() => t,
            _ => return Err(ProtocolError::MissingType),
        };

        let data = match frame.remove("data") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(data) => data,
        };

        if event_type == ACK_TYPE {
            let id = frame.get("id").and_then(Value::as_u64).ok_or(ProtocolError::MissingAckId)?;
            return Ok(Self::Ack(Ack { id, data }));
        }

        let kind = EventKind::parse(&event_type).unwrap_or(EventKind::Unknown);
        InboundEvent::from_parts(kind, &event_type, data).map(Self::Event)
    }

    /// Wire type of the frame.
    pub fn frame_type(&self) -> &str {
        match self {
            Self::Event(event) => event.event_type(),
            Self::Ack(_) => ACK_TYPE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in EventKind::KNOWN {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("unknown"), None);
    }

    #[test]
    fn decodes_new_message() {
        let text = r#"{"type":"new_message","data":{"id":1,"chat_id":42,"user_id":3,
            "content":"hi","created_at":"2024-05-01T12:30:00"}}"#;
        let ServerFrame::Event(InboundEvent::NewMessage(msg)) = ServerFrame::decode(text).unwrap()
        else {
            panic!("expected new_message");
        };
        assert_eq!((msg.id, msg.chat_id), (1, 42));
        assert_eq!(msg.content.as_deref(), Some("hi"));
    }

    #[test]
    fn decodes_ack() {
        let text = r#"{"type":"ack","id":7,"data":{"success":false,"error":"not a member"}}"#;
        let ServerFrame::Ack(ack) = ServerFrame::decode(text).unwrap() else {
            panic!("expected ack");
        };
        assert_eq!(ack.id, 7);
        let body: AckPayload = ack.decode().unwrap();
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("not a member"));
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let frame = ServerFrame::decode(r#"{"type":"story_viewed","data":{"id":1}}"#).unwrap();
        let ServerFrame::Event(event) = frame else { panic!("expected event") };
        assert_eq!(event.kind(), EventKind::Unknown);
        assert_eq!(event.event_type(), "story_viewed");
    }

    #[test]
    fn missing_data_defaults_to_empty_object() {
        let frame = ServerFrame::decode(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(frame, ServerFrame::Event(InboundEvent::Pong));
        let frame = ServerFrame::decode(r#"{"type":"connected","data":null}"#).unwrap();
        assert_eq!(frame, ServerFrame::Event(InboundEvent::Connected(ConnectedInfo::default())));
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(matches!(ServerFrame::decode("not json"), Err(ProtocolError::Json(_))));
        assert_eq!(ServerFrame::decode("[1,2]"), Err(ProtocolError::NotAnObject));
        assert_eq!(ServerFrame::decode(r#"{"data":{}}"#), Err(ProtocolError::MissingType));
        assert_eq!(ServerFrame::decode(r#"{"type":3}"#), Err(ProtocolError::MissingType));
        assert_eq!(ServerFrame::decode(r#"{"type":""}"#), Err(ProtocolError::MissingType));
        assert_eq!(ServerFrame::decode(r#"{"type":"ack"}"#), Err(ProtocolError::MissingAckId));
    }

    #[test]
    fn known_type_with_bad_payload_is_rejected() {
        let err = ServerFrame::decode(r#"{"type":"new_message","data":{"id":"x"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { ref event_type, .. }
            if event_type == "new_message"));
    }

    #[test]
    fn message_deleted_accepts_message_id_alias() {
        let frame =
            ServerFrame::decode(r#"{"type":"message_deleted","data":{"message_id":5,"chat_id":2}}"#)
                .unwrap();
        assert_eq!(
            frame,
            ServerFrame::Event(InboundEvent::MessageDeleted(MessageDeleted { id: 5, chat_id: 2 }))
        );
    }

    #[test]
    fn encode_then_decode_preserves_event() {
        let event = InboundEvent::MemberRemoved(ChatMemberRemoved { chat_id: 4, user_id: 9 });
        let text = event.encode().unwrap();
        assert_eq!(ServerFrame::decode(&text).unwrap(), ServerFrame::Event(event));
    }

    #[test]
    fn chat_id_routing() {
        let event = InboundEvent::MessagesRead(MessagesRead { chat_id: 8, user_id: 1, read_at: None });
        assert_eq!(event.chat_id(), Some(8));
        assert_eq!(InboundEvent::Pong.chat_id(), None);
    }
}
