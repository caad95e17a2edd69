//! Transient toasts and the persistent banner.

use std::{collections::VecDeque, ops::Add, time::Duration};

/// Toasts shown at once. The oldest is dropped first.
pub const MAX_TOASTS: usize = 3;

/// How long a toast stays up.
pub const TOAST_TTL: Duration = Duration::from_secs(5);

/// Toast styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    /// Informational (notifications)
    Info,
    /// A mutation succeeded
    Success,
    /// A mutation or request failed
    Error,
}

/// A toast requested by a view, not yet placed in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Styling
    pub level: ToastLevel,
    /// Heading
    pub title: String,
    /// Body
    pub body: String,
}

impl Notice {
    /// Informational notice.
    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { level: ToastLevel::Info, title: title.into(), body: body.into() }
    }

    /// Success notice.
    pub fn success(body: impl Into<String>) -> Self {
        Self { level: ToastLevel::Success, title: "Done".to_string(), body: body.into() }
    }

    /// Error notice.
    pub fn error(body: impl Into<String>) -> Self {
        Self { level: ToastLevel::Error, title: "Error".to_string(), body: body.into() }
    }
}

/// A transient message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast<I> {
    /// Styling
    pub level: ToastLevel,
    /// Heading
    pub title: String,
    /// Body
    pub body: String,
    /// When it disappears
    pub expires_at: I,
}

/// Bounded stack of toasts.
#[derive(Debug, Clone)]
pub struct Toasts<I> {
    items: VecDeque<Toast<I>>,
}

impl<I> Default for Toasts<I> {
    fn default() -> Self {
        Self { items: VecDeque::with_capacity(MAX_TOASTS) }
    }
}

impl<I> Toasts<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a toast, evicting the oldest past [`MAX_TOASTS`].
    pub fn push(
        &mut self,
        now: I,
        level: ToastLevel,
        title: impl Into<String>,
        body: impl Into<String>,
    ) {
        if self.items.len() == MAX_TOASTS {
            self.items.pop_front();
        }
        self.items.push_back(Toast {
            level,
            title: title.into(),
            body: body.into(),
            expires_at: now + TOAST_TTL,
        });
    }

    /// Show a view's notice.
    pub fn show(&mut self, now: I, notice: Notice) {
        self.push(now, notice.level, notice.title, notice.body);
    }

    /// Drop expired toasts. `true` if any were dropped.
    pub fn expire(&mut self, now: I) -> bool {
        let before = self.items.len();
        self.items.retain(|toast| toast.expires_at > now);
        self.items.len() != before
    }

    /// Toasts, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Toast<I>> {
        self.items.iter()
    }

    /// Number of toasts shown.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether none are shown.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Persistent banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    /// Realtime gave up reconnecting; updates need a reload
    RealtimeUnavailable,
}

impl Banner {
    /// Banner text.
    pub fn text(self) -> &'static str {
        match self {
            Self::RealtimeUnavailable => {
                "Realtime updates are unavailable. Reload the page to try again."
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_evicted_past_cap() {
        let mut toasts = Toasts::new();
        for i in 0..5u64 {
            toasts.push(Duration::from_secs(i), ToastLevel::Info, format!("t{i}"), "");
        }
        let titles: Vec<_> = toasts.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["t2", "t3", "t4"]);
    }

    #[test]
    fn expire_after_ttl() {
        let mut toasts = Toasts::new();
        toasts.show(Duration::ZERO, Notice::error("boom"));
        assert!(!toasts.expire(Duration::from_secs(4)));
        assert!(toasts.expire(TOAST_TTL));
        assert!(toasts.is_empty());
    }
}
