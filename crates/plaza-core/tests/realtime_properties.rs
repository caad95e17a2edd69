//! Property-based tests for the connection and room state machines.
//!
//! Invariants checked under arbitrary event sequences:
//!
//! - reconnect delays never exceed the cap and the budget is never exceeded
//! - the room set the server sees (replayed from emitted requests) always
//!   matches what the tracker believes, and no join is ever sent twice on
//!   the same connection

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use plaza_core::{
    ConnectionAction, ConnectionConfig, ConnectionManager, ConnectionState, Environment,
    PageContext, Room, RoomTracker,
};
use plaza_proto::{ChatId, OutboundRequest};
use proptest::prelude::*;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded environment with time as an offset from zero.
#[derive(Clone)]
struct SeededEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SeededEnv {
    fn new(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }
}

impl Environment for SeededEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        Duration::ZERO
    }

    async fn sleep(&self, _duration: Duration) {}

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap().fill_bytes(buffer);
    }
}

proptest! {
    #[test]
    fn prop_reconnect_budget_is_respected(seed in any::<u64>(), extra_ticks in 0usize..20) {
        let config = ConnectionConfig::default();
        let max_delay = config.reconnect.max_delay;
        let max_attempts = config.reconnect.max_attempts;
        let mut m = ConnectionManager::new(SeededEnv::new(seed), config, "tok");

        let mut now = Duration::ZERO;
        let mut scheduled = Vec::new();
        let mut unavailable = 0;
        m.connect(now);

        for _ in 0..(max_attempts as usize + extra_ticks) {
            let generation = m.generation();
            let mut actions = m.handle_open_failed(now, generation, "refused");
            if let Some(due) = m.reconnect_at() {
                now = due;
                actions.extend(m.tick(now));
            } else {
                now += Duration::from_secs(60);
                actions.extend(m.tick(now));
            }
            for action in actions {
                match action {
                    ConnectionAction::ScheduleReconnect { attempt, delay } => {
                        prop_assert!(delay <= max_delay);
                        scheduled.push(attempt);
                    },
                    ConnectionAction::RealtimeUnavailable => unavailable += 1,
                    _ => {},
                }
            }
        }

        prop_assert_eq!(unavailable, 1);
        prop_assert_eq!(scheduled.len() as u32, max_attempts - 1);
        prop_assert!(scheduled.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(m.state(), ConnectionState::Disconnected);
        prop_assert!(m.is_degraded());
    }

    #[test]
    fn prop_backoff_is_monotonic_before_jitter(attempt in 1u32..64) {
        let policy = ConnectionConfig::default().reconnect;
        prop_assert!(policy.backoff(attempt) <= policy.backoff(attempt + 1));
        prop_assert!(policy.backoff(attempt) <= policy.max_delay);
    }

    #[test]
    fn prop_jittered_delay_within_window(attempt in 1u32..10, random in any::<u64>()) {
        let policy = ConnectionConfig::default().reconnect;
        let delay = policy.delay(attempt, random);
        let backoff = policy.backoff(attempt);
        prop_assert!(delay <= backoff);
        prop_assert!(delay >= backoff.mul_f64(1.0 - policy.jitter) - Duration::from_nanos(1));
    }
}

#[derive(Debug, Clone)]
enum RoomEvent {
    Join(ChatId),
    Leave(ChatId),
    Navigate(Option<ChatId>),
    Lost,
    Authenticated,
}

fn room_event() -> impl Strategy<Value = RoomEvent> {
    prop_oneof![
        3 => (1u64..6).prop_map(RoomEvent::Join),
        2 => (1u64..6).prop_map(RoomEvent::Leave),
        2 => prop::option::of(1u64..6).prop_map(RoomEvent::Navigate),
        1 => Just(RoomEvent::Lost),
        2 => Just(RoomEvent::Authenticated),
    ]
}

/// Server-side view of one connection's chat rooms.
#[derive(Default)]
struct ServerRooms {
    rooms: BTreeSet<ChatId>,
}

impl ServerRooms {
    fn apply(&mut self, requests: &[OutboundRequest]) -> Result<(), String> {
        for request in requests {
            match request {
                OutboundRequest::JoinChat { chat_id } => {
                    if !self.rooms.insert(*chat_id) {
                        return Err(format!("duplicate join for {chat_id}"));
                    }
                },
                OutboundRequest::LeaveChat { chat_id } => {
                    if !self.rooms.remove(chat_id) {
                        return Err(format!("leave for unjoined {chat_id}"));
                    }
                },
                _ => {},
            }
        }
        Ok(())
    }
}

fn tracker_chats(tracker: &RoomTracker) -> BTreeSet<ChatId> {
    tracker
        .membership()
        .iter()
        .filter_map(|room| match room {
            Room::Chat(id) => Some(*id),
            Room::User(_) => None,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_tracker_matches_server(events in prop::collection::vec(room_event(), 0..60)) {
        let mut tracker = RoomTracker::new(PageContext::Feed);
        let mut server = ServerRooms::default();
        let mut connected = false;

        for event in events {
            let requests = match event {
                RoomEvent::Join(id) => tracker.join_chat(id),
                RoomEvent::Leave(id) => tracker.leave_chat(id),
                RoomEvent::Navigate(Some(id)) => tracker.set_context(PageContext::Chat(id)),
                RoomEvent::Navigate(None) => tracker.set_context(PageContext::Feed),
                RoomEvent::Lost => {
                    tracker.on_connection_lost();
                    server = ServerRooms::default();
                    connected = false;
                    Vec::new()
                },
                RoomEvent::Authenticated => {
                    if connected {
                        // Auth happens once per connection
                        continue;
                    }
                    connected = true;
                    tracker.on_authenticated(Some(1))
                },
            };
            if !tracker.is_ready() {
                prop_assert!(requests.is_empty());
            }
            let applied = server.apply(&requests);
            prop_assert!(applied.is_ok(), "{:?}", applied);
            prop_assert_eq!(&server.rooms, &tracker_chats(&tracker));
        }
    }

    #[test]
    fn prop_reconnect_rebuilds_from_context(
        events in prop::collection::vec(room_event(), 0..40),
        page in prop::option::of(1u64..6),
    ) {
        let mut tracker = RoomTracker::new(PageContext::Notifications);
        for event in events {
            match event {
                RoomEvent::Join(id) => { tracker.join_chat(id); },
                RoomEvent::Leave(id) => { tracker.leave_chat(id); },
                RoomEvent::Navigate(_) => {},
                RoomEvent::Lost => tracker.on_connection_lost(),
                RoomEvent::Authenticated => {
                    tracker.on_connection_lost();
                    tracker.on_authenticated(Some(1));
                },
            }
        }

        let context = page.map_or(PageContext::Feed, PageContext::Chat);
        tracker.set_context(context.clone());
        tracker.on_connection_lost();
        tracker.on_authenticated(Some(1));

        prop_assert_eq!(tracker.membership(), &context.rooms(Some(1)));
    }
}
