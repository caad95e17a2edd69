//! Outbound realtime frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::ProtocolError,
    ids::{ChatId, MessageId, RequestId},
    model::MessageType,
};

/// A request sent over the duplex channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundRequest {
    /// Authenticate the connection with a session-derived token
    Auth {
        /// Proof-of-identity token (CSRF-style, never a long-lived secret)
        token: String,
    },
    /// Subscribe to a chat room
    JoinChat {
        /// Room to join
        chat_id: ChatId,
    },
    /// Unsubscribe from a chat room
    LeaveChat {
        /// Room to leave
        chat_id: ChatId,
    },
    /// Post a chat message. Acknowledged with the confirmed record.
    SendMessage {
        /// Target chat
        chat_id: ChatId,
        /// Message body
        content: String,
        /// Content kind
        message_type: MessageType,
        /// Client idempotency key shared with the HTTP fallback
        client_ref: String,
    },
    /// Soft-delete a message. Acknowledged.
    DeleteMessage {
        /// Message to delete
        message_id: MessageId,
    },
    /// Advance our read watermark for a chat
    ReadMessages {
        /// Chat that was read
        chat_id: ChatId,
    },
    /// Fetch recent unread notifications. Acknowledged.
    GetNotifications {},
    /// Heartbeat
    Ping {},
}

impl OutboundRequest {
    /// Whether the server replies to this request with an ack frame.
    pub fn expects_ack(&self) -> bool {
        matches!(self, Self::SendMessage { .. } | Self::DeleteMessage { .. } | Self::GetNotifications {})
    }

    /// Wire type.
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::JoinChat { .. } => "join_chat",
            Self::LeaveChat { .. } => "leave_chat",
            Self::SendMessage { .. } => "send_message",
            Self::DeleteMessage { .. } => "delete_message",
            Self::ReadMessages { .. } => "read_messages",
            Self::GetNotifications {} => "get_notifications",
            Self::Ping {} => "ping",
        }
    }
}

/// An outbound frame: a request plus its correlation id, if acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFrame {
    /// Correlation id. `None` for fire-and-forget requests.
    pub id: Option<RequestId>,
    /// The request
    pub request: OutboundRequest,
}

impl ClientFrame {
    /// Fire-and-forget frame.
    pub fn new(request: OutboundRequest) -> Self {
        Self { id: None, request }
    }

    /// Frame expecting an ack with the given id.
    pub fn with_id(id: RequestId, request: OutboundRequest) -> Self {
        Self { id: Some(id), request }
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let mut value = serde_json::to_value(&self.request)?;
        if let (Some(id), Some(obj)) = (self.id, value.as_object_mut()) {
            obj.insert("id".to_string(), Value::from(id));
        }
        Ok(value.to_string())
    }

    /// Decode a text frame. Used by servers and test harnesses.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut value: Value = serde_json::from_str(text)?;
        let obj = value.as_object_mut().ok_or(ProtocolError::NotAnObject)?;
        if !obj.get("type").is_some_and(Value::is_string) {
            return Err(ProtocolError::MissingType);
        }
        let id = obj.remove("id").and_then(|id| id.as_u64());
        let request = serde_json::from_value(value)?;
        Ok(Self { id, request })
    }
}
