//! View synchronizers.
//!
//! Each view owns the state one part of a page renders and keeps it
//! consistent with REST pages, realtime pushes and mutation results. Views are
//! pure: inputs come in as method calls and side effects go out as an
//! [`crate::Update`].

mod chat_list;
mod chat_pane;
mod feed;
mod members;
mod notifications;
mod profile;
mod stories;

pub use chat_list::ChatList;
pub use chat_pane::ChatPane;
pub use feed::Feed;
pub use members::MembersPanel;
pub use notifications::NotificationCenter;
pub use profile::{ProfileCounts, ProfileView};
pub use stories::{STORY_DURATION, StoriesView};
