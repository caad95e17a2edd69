//! Event Dispatcher.
//!
//! Demultiplexes inbound text frames:
//!
//! - malformed frames (bad JSON, no `type`, payload not matching its type) are
//!   logged and dropped
//! - acks are handed back to the caller for correlation
//! - events go to the one handler registered for their kind, then are
//!   republished on a broadcast channel for any number of loosely-coupled
//!   subscribers, whether a handler exists or not
//!
//! One handler per kind: registering a second replaces the first. This is a
//! documented limitation of the API, not something to paper over; use
//! [`EventDispatcher::subscribe`] for fan-out.

use std::{collections::HashMap, fmt};

use plaza_proto::{Ack, EventKind, InboundEvent, ProtocolError, ServerFrame};
use tokio::sync::broadcast;

/// Default capacity of the republish channel.
pub const DEFAULT_REPUBLISH_CAPACITY: usize = 256;

/// A per-kind event handler.
pub type Handler = Box<dyn FnMut(&InboundEvent) + Send>;

/// Outcome of dispatching one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Event delivered to its handler (if any) and republished
    Event(InboundEvent),
    /// Reply to a request; the caller correlates it
    Ack(Ack),
    /// Frame could not be decoded and was dropped
    Dropped(ProtocolError),
}

/// Routes inbound frames to handlers and subscribers.
pub struct EventDispatcher {
    handlers: HashMap<EventKind, Handler>,
    republish: broadcast::Sender<InboundEvent>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("EventDispatcher")
            .field("handlers", &kinds)
            .field("subscribers", &self.republish.receiver_count())
            .finish()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_REPUBLISH_CAPACITY)
    }
}

impl EventDispatcher {
    /// Create a dispatcher whose republish channel buffers `capacity` events
    /// per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (republish, _) = broadcast::channel(capacity.max(1));
        Self { handlers: HashMap::new(), republish }
    }

    /// Register the handler for `kind`, replacing any previous one.
    ///
    /// Returns `true` if a handler was replaced.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> bool
    where
        F: FnMut(&InboundEvent) + Send + 'static,
    {
        let replaced = self.handlers.insert(kind, Box::new(handler)).is_some();
        if replaced {
            tracing::debug!(%kind, "event handler replaced");
        }
        replaced
    }

    /// Remove the handler for `kind`. Returns `true` if one was registered.
    pub fn off(&mut self, kind: EventKind) -> bool {
        self.handlers.remove(&kind).is_some()
    }

    /// Whether a handler is registered for `kind`.
    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Subscribe to every event, independent of handlers.
    pub fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.republish.subscribe()
    }

    /// Sender side of the republish channel, for components that need to
    /// hand out subscriptions after the dispatcher moved into a task.
    pub fn republisher(&self) -> broadcast::Sender<InboundEvent> {
        self.republish.clone()
    }

    /// Decode and dispatch one text frame.
    pub fn dispatch_text(&mut self, text: &str) -> Dispatch {
        match ServerFrame::decode(text) {
            Ok(ServerFrame::Ack(ack)) => Dispatch::Ack(ack),
            Ok(ServerFrame::Event(event)) => {
                self.dispatch(&event);
                Dispatch::Event(event)
            },
            Err(error) => {
                tracing::warn!(%error, len = text.len(), "dropping malformed realtime frame");
                Dispatch::Dropped(error)
            },
        }
    }

    /// Dispatch an already-decoded event.
    pub fn dispatch(&mut self, event: &InboundEvent) {
        let kind = event.kind();
        if let Some(handler) = self.handlers.get_mut(&kind) {
            handler(event);
        } else if kind == EventKind::Unknown {
            tracing::debug!(event_type = event.event_type(), "no handler for unknown event");
        }
        // No subscribers is not an error
        let _ = self.republish.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn counter() -> (Arc<Mutex<Vec<String>>>, impl FnMut(&InboundEvent) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |event: &InboundEvent| {
            sink.lock().unwrap().push(event.event_type().to_string());
        })
    }

    const DELETED: &str = r#"{"type":"message_deleted","data":{"id":1,"chat_id":2}}"#;

    #[test]
    fn handler_receives_matching_kind() {
        let mut dispatcher = EventDispatcher::default();
        let (seen, handler) = counter();
        dispatcher.on(EventKind::MessageDeleted, handler);

        dispatcher.dispatch_text(DELETED);
        dispatcher.dispatch_text(r#"{"type":"pong"}"#);
        assert_eq!(*seen.lock().unwrap(), vec!["message_deleted"]);
    }

    #[test]
    fn last_registration_wins() {
        let mut dispatcher = EventDispatcher::default();
        let (first, h1) = counter();
        let (second, h2) = counter();
        assert!(!dispatcher.on(EventKind::MessageDeleted, h1));
        assert!(dispatcher.on(EventKind::MessageDeleted, h2));

        dispatcher.dispatch_text(DELETED);
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn every_event_is_republished() {
        let mut dispatcher = EventDispatcher::default();
        let mut rx = dispatcher.subscribe();
        dispatcher.dispatch_text(DELETED);
        dispatcher.dispatch_text(r#"{"type":"story_viewed","data":{}}"#);

        assert_eq!(rx.try_recv().unwrap().kind(), EventKind::MessageDeleted);
        assert_eq!(rx.try_recv().unwrap().event_type(), "story_viewed");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn malformed_frames_are_dropped_without_handlers() {
        let mut dispatcher = EventDispatcher::default();
        let mut rx = dispatcher.subscribe();
        let (seen, handler) = counter();
        dispatcher.on(EventKind::NewMessage, handler);

        for text in ["{", "[]", r#"{"data":{}}"#, r#"{"type":"new_message","data":{"id":"x"}}"#] {
            assert!(matches!(dispatcher.dispatch_text(text), Dispatch::Dropped(_)));
        }
        assert!(seen.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn acks_are_returned_not_republished() {
        let mut dispatcher = EventDispatcher::default();
        let mut rx = dispatcher.subscribe();
        let out = dispatcher.dispatch_text(r#"{"type":"ack","id":4,"data":{"success":true}}"#);
        assert!(matches!(out, Dispatch::Ack(Ack { id: 4, .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn off_removes_handler() {
        let mut dispatcher = EventDispatcher::default();
        let (_, handler) = counter();
        dispatcher.on(EventKind::Pong, handler);
        assert!(dispatcher.has_handler(EventKind::Pong));
        assert!(dispatcher.off(EventKind::Pong));
        assert!(!dispatcher.has_handler(EventKind::Pong));
    }
}
