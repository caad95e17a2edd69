//! Message delivery primitives.
//!
//! - [`PendingAcks`]: correlates acknowledged requests with their replies and
//!   enforces a per-request deadline.
//! - [`ReadWatermarks`]: per-chat "read up to here" marks that make repeated
//!   read requests idempotent.
//! - Validation and ack interpretation shared by both delivery paths.
//!
//! The async dual-path send (duplex first, HTTP fallback) lives in the client
//! crate; everything here is synchronous and clock-driven.

use std::{collections::HashMap, ops::Add, time::Duration};

use plaza_proto::{AckPayload, ChatId, ChatMessage, MessageId, RequestId};

use crate::error::DeliveryError;

/// Time allowed for a duplex acknowledgement before falling back to HTTP.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug)]
struct Pending<I, T> {
    deadline: I,
    token: T,
}

/// Outstanding acknowledged requests.
///
/// `T` is whatever the caller needs to complete the request (typically a
/// oneshot sender). Each id resolves at most once: a reply that arrives
/// after expiry, or twice, finds nothing and is ignored.
#[derive(Debug)]
pub struct PendingAcks<I, T> {
    entries: HashMap<RequestId, Pending<I, T>>,
    next_id: RequestId,
}

impl<I, T> Default for PendingAcks<I, T> {
    fn default() -> Self {
        Self { entries: HashMap::new(), next_id: 1 }
    }
}

impl<I, T> PendingAcks<I, T>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Create an empty correlator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and return its correlation id.
    pub fn register(&mut self, now: I, timeout: Duration, token: T) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, Pending { deadline: now + timeout, token });
        id
    }

    /// Take the request a reply belongs to. `None` for unknown or late ids.
    pub fn resolve(&mut self, id: RequestId) -> Option<T> {
        self.entries.remove(&id).map(|p| p.token)
    }

    /// Remove and return every request whose deadline has passed, in id order.
    pub fn expire(&mut self, now: I) -> Vec<(RequestId, T)> {
        let mut expired: Vec<RequestId> =
            self.entries.iter().filter(|(_, p)| p.deadline <= now).map(|(id, _)| *id).collect();
        expired.sort_unstable();
        expired
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|p| (id, p.token)))
            .collect()
    }

    /// Remove and return every request, in id order. Used on connection loss.
    pub fn drain(&mut self) -> Vec<(RequestId, T)> {
        let mut all: Vec<(RequestId, T)> =
            self.entries.drain().map(|(id, p)| (id, p.token)).collect();
        all.sort_unstable_by_key(|(id, _)| *id);
        all
    }

    /// Earliest deadline among outstanding requests.
    pub fn next_deadline(&self) -> Option<I> {
        self.entries.values().map(|p| p.deadline).min()
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-chat read watermarks.
///
/// A watermark is the highest message id we told the server we read. Marks
/// only move forward.
#[derive(Debug, Clone, Default)]
pub struct ReadWatermarks {
    marks: HashMap<ChatId, MessageId>,
}

impl ReadWatermarks {
    /// Create an empty set of watermarks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current watermark for a chat.
    pub fn get(&self, chat_id: ChatId) -> Option<MessageId> {
        self.marks.get(&chat_id).copied()
    }

    /// Whether marking `chat_id` read up to `up_to` would say anything new.
    ///
    /// `None` means "up to whatever the server has" and always qualifies.
    pub fn is_behind(&self, chat_id: ChatId, up_to: Option<MessageId>) -> bool {
        match (up_to, self.get(chat_id)) {
            (None, _) | (Some(_), None) => true,
            (Some(target), Some(mark)) => target > mark,
        }
    }

    /// Advance the watermark. Returns `false` if it would not move.
    pub fn advance(&mut self, chat_id: ChatId, up_to: MessageId) -> bool {
        let mark = self.marks.entry(chat_id).or_insert(0);
        if up_to > *mark {
            *mark = up_to;
            true
        } else {
            false
        }
    }

    /// Forget a chat's watermark.
    pub fn forget(&mut self, chat_id: ChatId) {
        self.marks.remove(&chat_id);
    }

    /// Forget every watermark. Marks sent on a socket that later dropped may
    /// never have reached the server.
    pub fn clear(&mut self) {
        self.marks.clear();
    }
}

/// Validate message content before any network call.
///
/// Returns the trimmed content.
pub fn validate_content(content: &str) -> Result<String, DeliveryError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(DeliveryError::Validation("message cannot be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Interpret a send acknowledgement: the confirmed record or the reason it
/// was refused.
pub fn confirmed_message(payload: AckPayload) -> Result<ChatMessage, DeliveryError> {
    if !payload.success {
        return Err(rejection(payload.error));
    }
    payload
        .message
        .ok_or_else(|| DeliveryError::Malformed("acknowledgement without message".to_string()))
}

/// Interpret a delete acknowledgement. The record, if the server included it.
pub fn confirmed_delete(payload: AckPayload) -> Result<Option<ChatMessage>, DeliveryError> {
    if !payload.success {
        return Err(rejection(payload.error));
    }
    Ok(payload.message)
}

fn rejection(error: Option<String>) -> DeliveryError {
    DeliveryError::Rejected(error.unwrap_or_else(|| "request rejected".to_string()))
}
