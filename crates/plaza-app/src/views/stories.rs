//! Stories bar and full-screen viewer.
//!
//! The bar lists authors with active stories, those with something unseen
//! first. Opening an author shows their first unseen story; the viewer then
//! advances on its own every [`STORY_DURATION`] across stories and authors
//! and closes after the last one. Each unseen story is reported viewed once
//! when it is shown; a failed report is retried the next time it is shown.

use std::{ops::Add, time::Duration};

use plaza_client::ApiError;
use plaza_proto::{Story, StoryId, StoryUser, UserId};

use crate::{
    action::{AppAction, Fetch, StoryOp},
    guard::MutationGuard,
    view::{Update, ViewPhase},
};

/// How long one story stays on screen.
pub const STORY_DURATION: Duration = Duration::from_secs(5);

/// Stories of followed authors and the viewer position.
#[derive(Debug, Clone)]
pub struct StoriesView<I> {
    phase: ViewPhase,
    users: Vec<StoryUser>,
    /// Author index and story index of the story on screen
    position: Option<(usize, usize)>,
    advance_at: Option<I>,
    reporting: MutationGuard<StoryId>,
}

impl<I> Default for StoriesView<I> {
    fn default() -> Self {
        Self {
            phase: ViewPhase::Empty,
            users: Vec::new(),
            position: None,
            advance_at: None,
            reporting: MutationGuard::new(),
        }
    }
}

impl<I> StoriesView<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Empty bar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load phase.
    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    /// Authors in bar order.
    pub fn users(&self) -> &[StoryUser] {
        &self.users
    }

    /// Whether the viewer is open.
    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    /// Author and story on screen.
    pub fn current(&self) -> Option<(&StoryUser, &Story)> {
        let (user, story) = self.position?;
        let group = self.users.get(user)?;
        Some((group, group.stories.get(story)?))
    }

    /// When the viewer moves on by itself.
    pub fn advance_at(&self) -> Option<I> {
        self.advance_at
    }

    /// Close the viewer and reload the bar.
    pub fn refresh(&mut self) -> Update {
        self.close();
        self.users.clear();
        self.phase.begin_refresh();
        Update::action(AppAction::Fetch(Fetch::Stories))
    }

    /// The bar arrived.
    pub fn on_loaded(&mut self, result: Result<Vec<StoryUser>, ApiError>) -> Update {
        match result {
            Ok(mut users) => {
                users.retain(|group| !group.stories.is_empty());
                users.sort_by_key(|group| !group.has_unviewed());
                self.users = users;
                self.phase.succeed();
            },
            Err(error) => {
                tracing::debug!(%error, "stories failed");
                self.phase.fail(error.user_message());
            },
        }
        Update::none()
    }

    /// Apply a viewer control.
    pub fn apply(&mut self, op: StoryOp, now: I) -> Update {
        match op {
            StoryOp::Open(user_id) => self.open(user_id, now),
            StoryOp::Next => self.next(now),
            StoryOp::Prev => self.prev(now),
            StoryOp::Close => {
                self.close();
                Update::none()
            },
        }
    }

    fn open(&mut self, user_id: UserId, now: I) -> Update {
        let Some(user) = self.users.iter().position(|group| group.user.id == user_id) else {
            return Update::none();
        };
        let story = self.users[user].stories.iter().position(|s| !s.viewed).unwrap_or_default();
        self.show(user, story, now)
    }

    fn next(&mut self, now: I) -> Update {
        let Some((user, story)) = self.position else {
            return Update::none();
        };
        if story + 1 < self.users[user].stories.len() {
            self.show(user, story + 1, now)
        } else if user + 1 < self.users.len() {
            self.show(user + 1, 0, now)
        } else {
            self.close();
            Update::none()
        }
    }

    fn prev(&mut self, now: I) -> Update {
        match self.position {
            Some((user, story)) if story > 0 => self.show(user, story - 1, now),
            Some((user, _)) if user > 0 => {
                let last = self.users[user - 1].stories.len().saturating_sub(1);
                self.show(user - 1, last, now)
            },
            _ => Update::none(),
        }
    }

    fn close(&mut self) {
        self.position = None;
        self.advance_at = None;
    }

    fn show(&mut self, user: usize, story: usize, now: I) -> Update {
        self.position = Some((user, story));
        self.advance_at = Some(now + STORY_DURATION);
        match self.users[user].stories.get(story) {
            Some(shown) if !shown.viewed && self.reporting.try_begin(shown.id) => {
                Update::action(AppAction::ViewStory { story_id: shown.id })
            },
            _ => Update::none(),
        }
    }

    /// Clock tick. `Some` when the viewer moved on.
    pub fn on_tick(&mut self, now: I) -> Option<Update> {
        let due = self.advance_at.is_some_and(|at| now >= at);
        due.then(|| self.next(now))
    }

    /// A view report finished. The story counts as seen only on success.
    pub fn on_viewed(&mut self, story_id: StoryId, result: Result<(), ApiError>) -> Update {
        self.reporting.finish(&story_id);
        match result {
            Ok(()) => {
                let story = self
                    .users
                    .iter_mut()
                    .flat_map(|group| group.stories.iter_mut())
                    .find(|story| story.id == story_id);
                if let Some(story) = story {
                    story.viewed = true;
                }
            },
            Err(error) => tracing::debug!(story_id, %error, "story view not recorded"),
        }
        Update::none()
    }
}
