//! Generic runtime for application orchestration.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`Session`]: page state machine
//! - [`RealtimeClient`] / [`Messenger`] / [`Api`]: network collaborators
//! - [`Driver`]: frontend I/O
//!
//! Every source of input is awaited in one `select!`: user intents, pushed
//! events, connection lifecycle, results of spawned work and the toast timer.
//! REST reads and the feed poll run as [`PageTasks`] and die on navigation.
//! Mutations run detached and report back even if the page changed; the
//! session drops results that no longer apply.

use std::{future::Future, sync::Arc, time::Duration};

use plaza_client::{Api, ClientConfig, Lifecycle, Messenger, RealtimeClient};
use plaza_core::Environment;
use plaza_proto::UserId;
use tokio::sync::{broadcast, mpsc};

use crate::{
    AppAction, AppEvent, Driver, Intent, Session,
    action::{Fetch, MemberOp, RelationOp},
    event::Fetched,
    tasks::PageTasks,
};

/// How often expired toasts are swept.
pub const TOAST_SWEEP_INTERVAL: Duration = Duration::from_millis(500);

/// What woke the event loop.
enum Wake {
    Intent(Intent),
    Event(AppEvent),
    Tick,
    Stop,
    Idle,
}

/// Generic runtime that orchestrates Session, client and Driver.
///
/// # Type Parameters
///
/// - `D`: Frontend driver
/// - `E`: Environment for time and randomness
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    env: E,
    session: Session<E::Instant>,
    realtime: RealtimeClient,
    messenger: Messenger<E>,
    api: Arc<dyn Api>,
    feed_poll_interval: Duration,
    tasks: PageTasks,
    results_tx: mpsc::UnboundedSender<AppEvent>,
    results_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl<D, E> Runtime<D, E>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
{
    /// Create a runtime over an already spawned realtime client.
    ///
    /// `me` is the signed-in user when the page knows it up front; otherwise
    /// it is learned from the authentication reply.
    pub fn new(
        driver: D,
        env: E,
        realtime: RealtimeClient,
        api: Arc<dyn Api>,
        config: &ClientConfig,
        me: Option<UserId>,
    ) -> Self {
        let messenger = Messenger::new(env.clone(), realtime.clone(), Arc::clone(&api));
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            driver,
            env,
            session: Session::new(me),
            realtime,
            messenger,
            api,
            feed_poll_interval: config.feed_poll_interval,
            tasks: PageTasks::new(),
            results_tx,
            results_rx,
        }
    }

    /// Run the event loop, starting at `path`, until the user quits or input
    /// closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn run(mut self, path: &str) -> Result<(), D::Error> {
        let mut events = self.realtime.subscribe();
        let mut lifecycle = self.realtime.lifecycle();
        let mut sweep = tokio::time::interval(TOAST_SWEEP_INTERVAL);

        let actions = self.session.navigate(path);
        if self.execute(actions).await? {
            return Ok(());
        }
        self.realtime.connect().await;

        loop {
            let wake = tokio::select! {
                intent = self.driver.poll_intent() => match intent? {
                    Some(intent) => Wake::Intent(intent),
                    None => Wake::Stop,
                },
                event = events.recv() => received(event, AppEvent::Realtime),
                notice = lifecycle.recv() => received(notice, AppEvent::Lifecycle),
                Some(result) = self.results_rx.recv() => Wake::Event(result),
                _ = sweep.tick() => Wake::Tick,
            };

            if let Wake::Event(AppEvent::Lifecycle(Lifecycle::ConnectionLost)) = &wake {
                self.messenger.forget_read_marks();
            }
            let now = self.env.now();
            let actions = match wake {
                Wake::Intent(intent) => self.session.intent(intent, now),
                Wake::Event(event) => self.session.handle(event, now),
                Wake::Tick => self.session.tick(now),
                Wake::Idle => continue,
                Wake::Stop => break,
            };
            if self.execute(actions).await? {
                break;
            }
        }

        tracing::info!("runtime stopped");
        self.tasks.abort_all();
        self.realtime.disconnect().await;
        Ok(())
    }

    /// Execute session actions. Returns `true` if the application should
    /// quit.
    async fn execute(&mut self, actions: Vec<AppAction>) -> Result<bool, D::Error> {
        for action in actions {
            match action {
                AppAction::Render => self.driver.render(&self.session)?,
                AppAction::Quit => return Ok(true),
                AppAction::Navigate(context) => {
                    self.tasks.abort_all();
                    self.realtime.set_context(context).await;
                },
                AppAction::Fetch(fetch) => {
                    let api = Arc::clone(&self.api);
                    let results = self.results_tx.clone();
                    self.tasks.spawn(async move {
                        let fetched = run_fetch(api.as_ref(), fetch).await;
                        let _ = results.send(AppEvent::Fetched(fetched));
                    });
                },
                AppAction::StartFeedPoll => {
                    let env = self.env.clone();
                    let period = self.feed_poll_interval;
                    let results = self.results_tx.clone();
                    self.tasks.spawn(async move {
                        loop {
                            env.sleep(period).await;
                            if results.send(AppEvent::FeedPollDue).is_err() {
                                break;
                            }
                        }
                    });
                },
                AppAction::SendMessage { chat_id, content, message_type } => {
                    let messenger = self.messenger.clone();
                    self.report(async move {
                        let result = messenger.send_message(chat_id, &content, message_type).await;
                        AppEvent::MessageSent { chat_id, result }
                    });
                },
                AppAction::DeleteMessage { message_id } => {
                    let messenger = self.messenger.clone();
                    self.report(async move {
                        let result = messenger.delete_message(message_id).await;
                        AppEvent::MessageDeleted { message_id, result }
                    });
                },
                AppAction::MarkChatRead { chat_id, up_to, resend } => {
                    let messenger = self.messenger.clone();
                    tokio::spawn(async move {
                        if resend {
                            messenger.resend_read(chat_id, up_to).await;
                        } else {
                            messenger.mark_read(chat_id, up_to).await;
                        }
                    });
                },
                AppAction::ToggleLike { post_id } => {
                    let api = Arc::clone(&self.api);
                    self.report(async move {
                        AppEvent::LikeToggled { post_id, result: api.toggle_like(post_id).await }
                    });
                },
                AppAction::AddComment { post_id, content } => {
                    let api = Arc::clone(&self.api);
                    self.report(async move {
                        let result = api.add_comment(post_id, &content).await;
                        AppEvent::CommentAdded { post_id, result }
                    });
                },
                AppAction::DeletePost { post_id } => {
                    let api = Arc::clone(&self.api);
                    self.report(async move {
                        AppEvent::PostDeleted { post_id, result: api.delete_post(post_id).await }
                    });
                },
                AppAction::UpdateMember { chat_id, user_id, op } => {
                    let api = Arc::clone(&self.api);
                    self.report(async move {
                        let result = match op {
                            MemberOp::MakeAdmin => api.make_admin(chat_id, user_id).await,
                            MemberOp::Remove => api.remove_member(chat_id, user_id).await,
                        };
                        AppEvent::MemberUpdated { chat_id, user_id, op, result }
                    });
                },
                AppAction::UpdateRelationship { username, op } => {
                    let api = Arc::clone(&self.api);
                    self.report(async move {
                        let result = match op {
                            RelationOp::FriendRequest(action) => {
                                api.friend_request(&username, action).await
                            },
                            RelationOp::RemoveFriend => api.remove_friend(&username).await,
                            RelationOp::Follow => api.follow(&username).await,
                            RelationOp::Unfollow => api.unfollow(&username).await,
                        };
                        AppEvent::RelationshipUpdated { username, op, result }
                    });
                },
                AppAction::MarkNotificationsRead { ids } => {
                    let api = Arc::clone(&self.api);
                    self.report(async move {
                        let result = api.mark_notifications_read(&ids).await;
                        AppEvent::NotificationsMarked { ids, result }
                    });
                },
                AppAction::CreateChat(request) => {
                    let api = Arc::clone(&self.api);
                    self.report(async move {
                        AppEvent::ChatCreated(api.create_chat(&request).await)
                    });
                },
                AppAction::ViewStory { story_id } => {
                    let api = Arc::clone(&self.api);
                    self.report(async move {
                        AppEvent::StoryViewed { story_id, result: api.view_story(story_id).await }
                    });
                },
                AppAction::RefreshUnreadCount => {
                    let api = Arc::clone(&self.api);
                    self.report(async move { AppEvent::UnreadCounted(api.unread_count().await) });
                },
                AppAction::Visibility(visible) => self.realtime.visibility_changed(visible).await,
                AppAction::NetworkOnline => self.realtime.network_online().await,
                AppAction::RestoreScroll { previous_height } => {
                    self.driver.restore_scroll(previous_height);
                },
            }
        }
        Ok(false)
    }

    /// Run a mutation detached from the page and feed its result back.
    fn report<F>(&self, future: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let results = self.results_tx.clone();
        tokio::spawn(async move {
            let _ = results.send(future.await);
        });
    }

    /// Get a reference to the Session
    pub fn session(&self) -> &Session<E::Instant> {
        &self.session
    }
}

fn received<T>(
    result: Result<T, broadcast::error::RecvError>,
    wrap: impl FnOnce(T) -> AppEvent,
) -> Wake {
    match result {
        Ok(value) => Wake::Event(wrap(value)),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "event subscriber lagged");
            Wake::Idle
        },
        // The runtime holds a client handle, so the senders outlive it.
        Err(broadcast::error::RecvError::Closed) => Wake::Stop,
    }
}

async fn run_fetch(api: &dyn Api, fetch: Fetch) -> Fetched {
    match fetch {
        Fetch::Chats => Fetched::Chats(api.chats().await),
        Fetch::Messages { chat_id, page, generation } => {
            let result = api.messages(chat_id, page).await;
            Fetched::Messages { chat_id, page, generation, result }
        },
        Fetch::Feed { page, generation, check_new } => {
            let result = api.feed(page, check_new).await;
            Fetched::Feed { page, generation, check_new, result }
        },
        Fetch::Notifications { page, generation } => {
            Fetched::Notifications { page, generation, result: api.notifications(page).await }
        },
        Fetch::Members { chat_id } => Fetched::Members { chat_id, result: api.members(chat_id).await },
        Fetch::Profile { username, page, generation } => {
            let result = api.profile(&username, page).await;
            Fetched::Profile { username, page, generation, result }
        },
        Fetch::Comments { post_id } => {
            Fetched::Comments { post_id, result: api.comments(post_id).await }
        },
        Fetch::Friends { search } => {
            let result = api.friends(search.as_deref()).await;
            Fetched::Friends { search, result }
        },
        Fetch::Stories => Fetched::Stories(api.stories().await),
    }
}
