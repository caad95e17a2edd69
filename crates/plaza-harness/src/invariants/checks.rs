//! Standard invariant checks.
//!
//! These invariants capture properties that must hold after every input the
//! session processes, whatever order events and results arrive in.

use std::collections::HashSet;

use plaza_app::toast::MAX_TOASTS;

use super::{Invariant, InvariantResult, SessionSnapshot, Violation};

/// The chat pane holds each message once, ordered by id.
///
/// Pushes, ack confirmations and HTTP fallbacks can all deliver the same
/// message; it must appear exactly once.
pub struct PaneOrdered;

impl Invariant for PaneOrdered {
    fn name(&self) -> &'static str {
        "pane_ordered"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        for window in state.messages.windows(2) {
            if window[1] <= window[0] {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "chat {:?}: message {} follows {} in {:?}",
                        state.pane_chat, window[1], window[0], state.messages
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Views agree with the page.
///
/// A chat pane exists only on a chat page and shows that page's chat, and the
/// list highlights the same chat.
pub struct PaneMatchesContext;

impl Invariant for PaneMatchesContext {
    fn name(&self) -> &'static str {
        "pane_matches_context"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.pane_chat.is_some() && state.pane_chat != state.context_chat {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "pane shows chat {:?} on page {}",
                    state.pane_chat, state.context
                ),
            });
        }
        if state.list_open_chat.is_some() && state.list_open_chat != state.context_chat {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "list highlights chat {:?} on page {}",
                    state.list_open_chat, state.context
                ),
            });
        }
        Ok(())
    }
}

/// Badges add up and the open chat carries none.
pub struct BadgesConsistent;

impl Invariant for BadgesConsistent {
    fn name(&self) -> &'static str {
        "badges_consistent"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let sum: u32 = state.chats.iter().map(|c| c.unread).sum();
        if sum != state.total_unread {
            return Err(Violation {
                invariant: self.name(),
                message: format!("badges sum to {sum}, list reports {}", state.total_unread),
            });
        }
        if let Some(open) = state.list_open_chat
            && let Some(badge) = state.chats.iter().find(|c| c.id == open && c.unread > 0)
        {
            return Err(Violation {
                invariant: self.name(),
                message: format!("open chat {} shows {} unread", open, badge.unread),
            });
        }
        Ok(())
    }
}

/// Lists never show an entity twice.
///
/// Covers chat list entries, feed posts and notifications, which all merge
/// REST pages with pushed events.
pub struct NoDuplicates;

impl Invariant for NoDuplicates {
    fn name(&self) -> &'static str {
        "no_duplicates"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let lists: [(&str, Vec<u64>); 3] = [
            ("chat list", state.chats.iter().map(|c| c.id).collect()),
            ("feed", state.posts.clone()),
            ("notifications", state.notifications.clone()),
        ];
        for (list, ids) in lists {
            let mut seen = HashSet::new();
            if let Some(duplicate) = ids.iter().find(|id| !seen.insert(**id)) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{list} shows {duplicate} twice"),
                });
            }
        }
        Ok(())
    }
}

/// At most [`MAX_TOASTS`] toasts are up at once.
pub struct ToastsBounded;

impl Invariant for ToastsBounded {
    fn name(&self) -> &'static str {
        "toasts_bounded"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.toasts.len() > MAX_TOASTS {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{} toasts shown: {:?}", state.toasts.len(), state.toasts),
            });
        }
        Ok(())
    }
}
