//! Dual-path message delivery.
//!
//! Sends and deletes go over the realtime channel first and wait for the
//! server's ack. If the channel is down, the ack times out, or the socket
//! drops while we wait, the same request is retried exactly once over HTTP
//! with the same `client_ref`, so the server can drop the duplicate if both
//! paths land. A server refusal is final on either path.
//!
//! The record returned is the server's. Callers insert it by id, which makes
//! the `new_message` broadcast for the same message a no-op.

use std::sync::{Arc, Mutex, PoisonError};

use plaza_core::{
    DeliveryError, Environment, ReadWatermarks,
    delivery::{confirmed_delete, confirmed_message, validate_content},
};
use plaza_proto::{
    AckPayload, ChatId, ChatMessage, MessageId, MessageType, OutboundRequest,
    rest::SendMessageBody,
};

use crate::{api::Api, realtime::RealtimeClient};

/// Sends, deletes and read marks with HTTP fallback.
#[derive(Clone)]
pub struct Messenger<E: Environment> {
    env: E,
    realtime: RealtimeClient,
    api: Arc<dyn Api>,
    watermarks: Arc<Mutex<ReadWatermarks>>,
}

impl<E: Environment> std::fmt::Debug for Messenger<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger").field("realtime", &self.realtime).finish_non_exhaustive()
    }
}

impl<E: Environment> Messenger<E> {
    /// Create a messenger over the shared realtime handle and REST client.
    pub fn new(env: E, realtime: RealtimeClient, api: Arc<dyn Api>) -> Self {
        Self { env, realtime, api, watermarks: Arc::new(Mutex::new(ReadWatermarks::new())) }
    }

    /// Send a message and return the server-confirmed record.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::Validation`] for empty or whitespace-only content,
    ///   before any network call
    /// - [`DeliveryError::Rejected`] if the server refused the message
    /// - [`DeliveryError::Transport`] if the HTTP fallback also failed
    /// - [`DeliveryError::Malformed`] if the reply could not be interpreted
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        content: &str,
        message_type: MessageType,
    ) -> Result<ChatMessage, DeliveryError> {
        let content = validate_content(content)?;
        let client_ref = self.client_ref();

        let request = OutboundRequest::SendMessage {
            chat_id,
            content: content.clone(),
            message_type,
            client_ref: client_ref.clone(),
        };
        let payload = match self.duplex(request).await {
            Ok(payload) => payload,
            Err(error) if error.is_transient() => {
                tracing::info!(chat_id, %error, "realtime send failed; falling back to HTTP");
                let body = SendMessageBody { content, message_type, client_ref };
                self.api.send_message(chat_id, &body).await?
            },
            Err(error) => return Err(error),
        };

        let message = confirmed_message(payload)?;
        tracing::debug!(chat_id, message_id = message.id, "message confirmed");
        Ok(message)
    }

    /// Soft-delete a message. Returns the updated record if the server sent
    /// one.
    ///
    /// # Errors
    ///
    /// Same as [`Messenger::send_message`], minus validation.
    pub async fn delete_message(
        &self,
        message_id: MessageId,
    ) -> Result<Option<ChatMessage>, DeliveryError> {
        let payload = match self.duplex(OutboundRequest::DeleteMessage { message_id }).await {
            Ok(payload) => payload,
            Err(error) if error.is_transient() => {
                tracing::info!(message_id, %error, "realtime delete failed; falling back to HTTP");
                self.api.delete_message(message_id).await?
            },
            Err(error) => return Err(error),
        };
        confirmed_delete(payload)
    }

    /// Tell the server we read `chat_id` up to `latest_seen`.
    ///
    /// Skipped when the watermark already covers `latest_seen`. Failures are
    /// logged and never surfaced; the watermark is forgotten so the next
    /// trigger retries.
    pub async fn mark_read(&self, chat_id: ChatId, latest_seen: Option<MessageId>) {
        {
            let mut marks = self.watermarks.lock().unwrap_or_else(PoisonError::into_inner);
            if !marks.is_behind(chat_id, latest_seen) {
                return;
            }
            if let Some(up_to) = latest_seen {
                marks.advance(chat_id, up_to);
            }
        }
        self.report_read(chat_id).await;
    }

    /// Send a read mark even when the watermark covers `latest_seen`.
    ///
    /// A mark queued on the channel is not acknowledged, so the explicit
    /// triggers (reaching the bottom, the page becoming visible again) send
    /// unconditionally and repair a mark the server never received.
    pub async fn resend_read(&self, chat_id: ChatId, latest_seen: Option<MessageId>) {
        if let Some(up_to) = latest_seen {
            self.watermarks.lock().unwrap_or_else(PoisonError::into_inner).advance(chat_id, up_to);
        }
        self.report_read(chat_id).await;
    }

    /// Drop every watermark so the next trigger of each chat sends again.
    pub fn forget_read_marks(&self) {
        self.watermarks.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    async fn report_read(&self, chat_id: ChatId) {
        let result = match self.realtime.send(OutboundRequest::ReadMessages { chat_id }).await {
            Ok(()) => return,
            Err(_) => self.api.mark_chat_read(chat_id).await,
        };
        if let Err(error) = result {
            tracing::warn!(chat_id, %error, "failed to mark chat read");
            self.watermarks.lock().unwrap_or_else(PoisonError::into_inner).forget(chat_id);
        }
    }

    /// Highest message id we reported read for `chat_id`.
    pub fn read_watermark(&self, chat_id: ChatId) -> Option<MessageId> {
        self.watermarks.lock().unwrap_or_else(PoisonError::into_inner).get(chat_id)
    }

    async fn duplex(&self, request: OutboundRequest) -> Result<AckPayload, DeliveryError> {
        let ack = self.realtime.request(request).await?;
        Ok(ack.decode::<AckPayload>()?)
    }

    /// Fresh idempotency key.
    fn client_ref(&self) -> String {
        format!("{:016x}", self.env.random_u64())
    }
}
