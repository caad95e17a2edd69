//! News feed.
//!
//! Posts from other users are not spliced into a list the reader is looking
//! at. A push or a poll only raises the "new posts" banner; refreshing pulls
//! them in. Like, comment and delete apply after the server confirms.

use std::collections::{BTreeMap, HashSet};

use plaza_client::ApiError;
use plaza_proto::{
    Comment, CommentId, LikeUpdate, Post, PostId, UserId,
    rest::{FeedPage, LikeAction, LikeResponse},
};

use crate::{
    action::{AppAction, Fetch},
    guard::MutationGuard,
    pagination::{Cursor, Viewport},
    toast::Notice,
    view::{EntityList, Update, ViewPhase},
};

/// Paged feed with live counters.
#[derive(Debug, Clone, Default)]
pub struct Feed {
    me: Option<UserId>,
    phase: ViewPhase,
    posts: EntityList<Post>,
    cursor: Cursor,
    /// Newer posts waiting behind the banner
    new_posts: u32,
    /// New-post ids already counted toward the banner
    announced: HashSet<PostId>,
    polling: bool,
    counted_comments: HashSet<CommentId>,
    /// Comment threads opened by the reader, oldest first
    threads: BTreeMap<PostId, EntityList<Comment>>,
    loading_threads: MutationGuard<PostId>,
    likes: MutationGuard<PostId>,
    comments: MutationGuard<PostId>,
    deletes: MutationGuard<PostId>,
}

impl Feed {
    /// Empty feed for `me`.
    pub fn new(me: Option<UserId>) -> Self {
        Self { me, ..Self::default() }
    }

    /// Load phase.
    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    /// Posts, newest first.
    pub fn posts(&self) -> &EntityList<Post> {
        &self.posts
    }

    /// Pagination.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Loaded comments under `post_id`.
    pub fn comments(&self, post_id: PostId) -> Option<&EntityList<Comment>> {
        self.threads.get(&post_id)
    }

    /// Banner text, if newer posts are waiting.
    pub fn banner(&self) -> Option<String> {
        match self.new_posts {
            0 => None,
            1 => Some("1 new post".to_string()),
            n => Some(format!("{n} new posts")),
        }
    }

    /// Set the viewing user once known.
    pub fn set_me(&mut self, me: Option<UserId>) {
        self.me = me;
    }

    /// Clear the banner, reset paging and load page 1.
    pub fn refresh(&mut self) -> Update {
        self.posts.clear();
        self.cursor.reset();
        self.new_posts = 0;
        self.announced.clear();
        self.counted_comments.clear();
        self.threads.clear();
        self.polling = false;
        self.phase.begin_refresh();
        self.fetch_next().unwrap_or_default()
    }

    /// The feed scrolled.
    pub fn on_scroll(&mut self, viewport: Viewport) -> Update {
        if !viewport.near_end() || !self.phase.begin_more() {
            return Update::none();
        }
        self.fetch_next().unwrap_or_else(|| {
            self.phase.succeed();
            Update::none()
        })
    }

    fn fetch_next(&mut self) -> Option<Update> {
        let page = self.cursor.begin_next()?;
        let generation = self.cursor.generation();
        Some(Update::action(AppAction::Fetch(Fetch::Feed { page, generation, check_new: false })))
    }

    /// Poll timer fired. Checks for newer posts only when the reader is on
    /// page 1 and nothing is loading.
    pub fn on_poll_due(&mut self) -> Update {
        let idle = self.phase == ViewPhase::Loaded && !self.cursor.is_loading() && !self.polling;
        if !idle || self.cursor.current_page() != 1 {
            return Update::none();
        }
        self.polling = true;
        let generation = self.cursor.generation();
        Update::action(AppAction::Fetch(Fetch::Feed { page: 1, generation, check_new: true }))
    }

    /// A feed page or poll reply arrived. Replies to requests issued before
    /// the last refresh are dropped.
    pub fn on_page(
        &mut self,
        page: u32,
        generation: u64,
        check_new: bool,
        result: Result<FeedPage, ApiError>,
    ) -> Update {
        if check_new {
            if generation != self.cursor.generation() {
                tracing::debug!(generation, "stale feed poll dropped");
                return Update::none();
            }
            self.polling = false;
            match result {
                Ok(body) if body.has_new_posts => {
                    self.new_posts = self.new_posts.max(body.new_posts_count);
                },
                Ok(_) => {},
                Err(error) => tracing::debug!(%error, "feed poll failed"),
            }
            return Update::none();
        }
        if !self.cursor.accepts(page, generation) {
            tracing::debug!(page, generation, "stale feed page dropped");
            return Update::none();
        }

        match result {
            Ok(body) => {
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

    /// `new_post` push. Our own post goes to the top; others raise the
    /// banner.
    pub fn on_new_post(&mut self, post: Post) {
        if !self.phase.accepts_events() || self.posts.contains(post.id) {
            return;
        }
        if Some(post.user_id) == self.me {
            self.posts.upsert_front(post);
        } else if self.announced.insert(post.id) {
            self.new_posts += 1;
        }
    }

    /// `new_like` push: authoritative count.
    pub fn on_like(&mut self, update: &LikeUpdate) {
        if !self.phase.accepts_events() {
            return;
        }
        if let Some(post) = self.posts.get_mut(update.post_id) {
            post.like_count = update.likes;
        }
    }

    /// `new_comment` push.
    pub fn on_comment(&mut self, comment: &Comment) {
        if self.phase.accepts_events() {
            self.count_comment(comment);
        }
    }

    fn count_comment(&mut self, comment: &Comment) {
        if !self.counted_comments.insert(comment.id) {
            return;
        }
        if let Some(post) = self.posts.get_mut(comment.post_id) {
            post.comment_count += 1;
        }
        if let Some(thread) = self.threads.get_mut(&comment.post_id) {
            thread.upsert(comment.clone());
        }
    }

    /// Open the comments under a post. Ignored while they are loading.
    pub fn load_comments(&mut self, post_id: PostId) -> Update {
        if !self.posts.contains(post_id) || !self.loading_threads.try_begin(post_id) {
            return Update::none();
        }
        Update::action(AppAction::Fetch(Fetch::Comments { post_id }))
    }

    /// A comment thread arrived. Its length replaces the post's counter.
    pub fn on_comments(&mut self, post_id: PostId, result: Result<Vec<Comment>, ApiError>) -> Update {
        self.loading_threads.finish(&post_id);
        let comments = match result {
            Ok(comments) => comments,
            Err(error) => return Update::notice(Notice::error(error.user_message())),
        };
        let Some(post) = self.posts.get_mut(post_id) else {
            return Update::none();
        };
        post.comment_count = u32::try_from(comments.len()).unwrap_or(u32::MAX);

        let thread = self.threads.entry(post_id).or_default();
        thread.clear();
        for comment in comments {
            self.counted_comments.insert(comment.id);
            thread.upsert(comment);
        }
        Update::none()
    }

    /// Like or unlike. Ignored while a toggle for the post is in flight.
    pub fn toggle_like(&mut self, post_id: PostId) -> Update {
        if !self.posts.contains(post_id) || !self.likes.try_begin(post_id) {
            return Update::none();
        }
        Update::action(AppAction::ToggleLike { post_id })
    }

    /// A like toggle finished.
    pub fn on_like_toggled(&mut self, post_id: PostId, result: Result<LikeResponse, ApiError>) -> Update {
        self.likes.finish(&post_id);
        match result {
            Ok(response) if response.success => {
                if let Some(post) = self.posts.get_mut(post_id) {
                    post.liked_by_user = response.action == LikeAction::Liked;
                    post.like_count = response.likes;
                }
                Update::none()
            },
            Ok(_) => Update::notice(Notice::error("Could not update like")),
            Err(error) => Update::notice(Notice::error(error.user_message())),
        }
    }

    /// Comment on a post. Empty comments are refused before any request.
    pub fn add_comment(&mut self, post_id: PostId, content: &str) -> Update {
        let content = content.trim();
        if content.is_empty() {
            return Update::notice(Notice::error("Comment cannot be empty"));
        }
        if !self.comments.try_begin(post_id) {
            return Update::none();
        }
        Update::action(AppAction::AddComment { post_id, content: content.to_string() })
    }

    /// A comment finished.
    pub fn on_comment_added(&mut self, post_id: PostId, result: Result<Comment, ApiError>) -> Update {
        self.comments.finish(&post_id);
        match result {
            Ok(comment) => {
                self.count_comment(&comment);
                Update::none()
            },
            Err(error) => Update::notice(Notice::error(error.user_message())),
        }
    }

    /// Delete one of our posts.
    pub fn delete_post(&mut self, post_id: PostId) -> Update {
        let own = self.posts.get(post_id).is_some_and(|p| Some(p.user_id) == self.me);
        if !own || !self.deletes.try_begin(post_id) {
            return Update::none();
        }
        Update::action(AppAction::DeletePost { post_id })
    }

    /// A post delete finished.
    pub fn on_post_deleted(&mut self, post_id: PostId, result: Result<(), ApiError>) -> Update {
        self.deletes.finish(&post_id);
        match result {
            Ok(()) => {
                self.posts.remove(post_id);
                Update::notice(Notice::success("Post deleted"))
            },
            Err(error) => Update::notice(Notice::error(error.user_message())),
        }
    }
}
