//! A user profile: posts, counters and our relationship with the owner.

use plaza_client::ApiError;
use plaza_proto::{
    FriendshipStatus, Post, UserSummary,
    rest::{FriendRequestAction, ProfilePage},
};

use crate::{
    action::{AppAction, Fetch, RelationOp},
    pagination::{Cursor, Viewport},
    toast::Notice,
    view::{EntityList, Update, ViewPhase},
};

/// Profile counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileCounts {
    /// Friends
    pub friends: u32,
    /// Followers
    pub followers: u32,
    /// Accounts followed
    pub following: u32,
}

/// Profile page state.
#[derive(Debug, Clone)]
pub struct ProfileView {
    username: String,
    phase: ViewPhase,
    user: Option<UserSummary>,
    posts: EntityList<Post>,
    cursor: Cursor,
    friendship: FriendshipStatus,
    following: bool,
    counts: ProfileCounts,
    /// Relationship operation in flight. One per profile.
    pending: Option<RelationOp>,
}

impl ProfileView {
    /// Empty profile of `username`.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            phase: ViewPhase::Empty,
            user: None,
            posts: EntityList::new(),
            cursor: Cursor::new(),
            friendship: FriendshipStatus::None,
            following: false,
            counts: ProfileCounts::default(),
            pending: None,
        }
    }

    /// Profile owner's username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Load phase.
    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    /// Owner record once loaded.
    pub fn user(&self) -> Option<&UserSummary> {
        self.user.as_ref()
    }

    /// Owner's posts.
    pub fn posts(&self) -> &EntityList<Post> {
        &self.posts
    }

    /// Our friendship with the owner.
    pub fn friendship(&self) -> FriendshipStatus {
        self.friendship
    }

    /// Whether we follow the owner.
    pub fn is_following(&self) -> bool {
        self.following
    }

    /// Counters.
    pub fn counts(&self) -> ProfileCounts {
        self.counts
    }

    /// Relationship operation in flight.
    pub fn pending(&self) -> Option<RelationOp> {
        self.pending
    }

    /// Drop content and load page 1.
    pub fn refresh(&mut self) -> Update {
        self.posts.clear();
        self.cursor.reset();
        self.phase.begin_refresh();
        self.fetch_next()
    }

    /// Posts scrolled.
    pub fn on_scroll(&mut self, viewport: Viewport) -> Update {
        if !viewport.near_end() || !self.phase.begin_more() {
            return Update::none();
        }
        let update = self.fetch_next();
        if update.is_empty() {
            self.phase.succeed();
        }
        update
    }

    fn fetch_next(&mut self) -> Update {
        match self.cursor.begin_next() {
            Some(page) => Update::action(AppAction::Fetch(Fetch::Profile {
                username: self.username.clone(),
                page,
                generation: self.cursor.generation(),
            })),
            None => Update::none(),
        }
    }

    /// A profile page arrived.
    pub fn on_page(
        &mut self,
        page: u32,
        generation: u64,
        result: Result<ProfilePage, ApiError>,
    ) -> Update {
        if !self.cursor.accepts(page, generation) {
            tracing::debug!(username = %self.username, page, generation, "stale page dropped");
            return Update::none();
        }
        match result {
            Ok(body) => {
                self.user = Some(body.user);
                self.friendship = body.friendship_status;
                self.following = body.is_following;
                self.counts = ProfileCounts {
                    friends: body.friend_count,
                    followers: body.follower_count,
                    following: body.following_count,
                };
                self.posts.extend(body.posts);
                self.cursor.complete(page, body.pagination.total_pages);
                self.phase.succeed();
                Update::none()
            },
            Err(error) => {
                self.cursor.fail();
                match self.phase.fail(error.user_message()) {
                    Some(message) => Update::notice(Notice::error(message)),
                    None => Update::none(),
                }
            },
        }
    }

    /// Change the relationship. Refused while another change is in flight or
    /// when the operation makes no sense from the current state.
    pub fn relate(&mut self, op: RelationOp) -> Update {
        if self.pending.is_some() || !self.phase.accepts_events() || !self.allows(op) {
            return Update::none();
        }
        self.pending = Some(op);
        Update::action(AppAction::UpdateRelationship { username: self.username.clone(), op })
    }

    fn allows(&self, op: RelationOp) -> bool {
        use FriendRequestAction as A;
        use FriendshipStatus as S;

        match op {
            RelationOp::FriendRequest(A::Send) => self.friendship == S::None,
            RelationOp::FriendRequest(A::Accept | A::Decline) => self.friendship == S::Received,
            RelationOp::FriendRequest(A::Cancel) => self.friendship == S::Pending,
            RelationOp::RemoveFriend => self.friendship == S::Accepted,
            RelationOp::Follow => !self.following,
            RelationOp::Unfollow => self.following,
        }
    }

    /// A relationship change finished. State and counters move only on
    /// success; failures toast the server's message.
    pub fn on_related(&mut self, op: RelationOp, result: Result<(), ApiError>) -> Update {
        if self.pending == Some(op) {
            self.pending = None;
        }
        if let Err(error) = result {
            return Update::notice(Notice::error(error.user_message()));
        }

        let counts = &mut self.counts;
        let message = match op {
            RelationOp::FriendRequest(FriendRequestAction::Send) => {
                self.friendship = FriendshipStatus::Pending;
                "Friend request sent"
            },
            RelationOp::FriendRequest(FriendRequestAction::Accept) => {
                self.friendship = FriendshipStatus::Accepted;
                counts.friends += 1;
                "Friend request accepted"
            },
            RelationOp::FriendRequest(FriendRequestAction::Decline) => {
                self.friendship = FriendshipStatus::None;
                "Friend request declined"
            },
            RelationOp::FriendRequest(FriendRequestAction::Cancel) => {
                self.friendship = FriendshipStatus::None;
                "Friend request cancelled"
            },
            RelationOp::RemoveFriend => {
                self.friendship = FriendshipStatus::None;
                counts.friends = counts.friends.saturating_sub(1);
                "Friend removed"
            },
            RelationOp::Follow => {
                self.following = true;
                counts.followers += 1;
                "Following"
            },
            RelationOp::Unfollow => {
                self.following = false;
                counts.followers = counts.followers.saturating_sub(1);
                "Unfollowed"
            },
        };
        Update::notice(Notice::success(message))
    }
}
