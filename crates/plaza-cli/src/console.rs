//! Console driver.
//!
//! Implements [`Driver`] over stdin and the log. Each input line is parsed
//! into an [`Intent`]; each render logs a one-line summary of the page when
//! it changed, plus any toast that appeared since the last render.

use std::{collections::BTreeSet, ops::Add, time::Duration};

use plaza_app::{Driver, Intent, Session};
use plaza_core::PageContext;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::command::{self, CommandError};

/// Console driver errors.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// I/O error reading input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Headless driver reading commands from stdin.
pub struct ConsoleDriver {
    input: Lines<BufReader<Stdin>>,
    last_summary: String,
    shown_toasts: BTreeSet<String>,
}

impl Default for ConsoleDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleDriver {
    /// Driver over the process's stdin.
    pub fn new() -> Self {
        Self {
            input: BufReader::new(tokio::io::stdin()).lines(),
            last_summary: String::new(),
            shown_toasts: BTreeSet::new(),
        }
    }
}

impl Driver for ConsoleDriver {
    type Error = ConsoleError;
    type Instant = tokio::time::Instant;

    async fn poll_intent(&mut self) -> Result<Option<Intent>, Self::Error> {
        // `next_line` is cancel-safe, so a line is never lost to select!
        while let Some(line) = self.input.next_line().await? {
            match command::parse(&line) {
                Ok(Some(intent)) => return Ok(Some(intent)),
                Ok(None) => tracing::info!("commands:\n{}", command::HELP),
                Err(CommandError::Empty) => {},
                Err(error) => tracing::warn!(%error, "ignored input"),
            }
        }
        Ok(None)
    }

    fn render(&mut self, session: &Session<Self::Instant>) -> Result<(), Self::Error> {
        let summary = summarize(session);
        if summary != self.last_summary {
            tracing::info!("{summary}");
            self.last_summary = summary;
        }

        let current: BTreeSet<String> = session
            .toasts()
            .iter()
            .map(|toast| format!("{}: {}", toast.title, toast.body))
            .collect();
        for toast in current.difference(&self.shown_toasts) {
            tracing::info!(toast = %toast, "notice");
        }
        self.shown_toasts = current;

        if let Some(banner) = session.banner() {
            tracing::debug!(banner = banner.text());
        }
        Ok(())
    }

    fn restore_scroll(&mut self, previous_height: u32) {
        tracing::trace!(previous_height, "older history prepended");
    }
}

/// One-line description of what the page shows.
pub fn summarize<I>(session: &Session<I>) -> String
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    let page = match session.context() {
        PageContext::Feed => {
            let (posts, banner) = session
                .feed()
                .map(|feed| (feed.posts().len(), feed.banner()))
                .unwrap_or_default();
            match banner {
                Some(banner) => format!("feed: {posts} posts ({banner})"),
                None => format!("feed: {posts} posts"),
            }
        },
        PageContext::ChatList => {
            let (chats, unread) = session
                .chat_list()
                .map(|list| (list.chats().len(), list.total_unread()))
                .unwrap_or_default();
            format!("chats: {chats} ({unread} unread)")
        },
        PageContext::Chat(chat_id) => {
            let messages = session.chat().map(|pane| pane.messages().len()).unwrap_or_default();
            let last = session
                .chat()
                .and_then(|pane| pane.messages().last())
                .map(|m| format!(", last from {}: {}", m.sender, m.content.as_deref().unwrap_or("[deleted]")))
                .unwrap_or_default();
            format!("chat {chat_id}: {messages} messages{last}")
        },
        PageContext::Profile(username) => {
            let posts = session.profile().map(|p| p.posts().len()).unwrap_or_default();
            format!("profile {username}: {posts} posts")
        },
        PageContext::Notifications => {
            format!("notifications: {} listed", session.notifications().items().len())
        },
        PageContext::Stories => {
            let authors = session.stories().map(|s| s.users().len()).unwrap_or_default();
            format!("stories: {authors} authors")
        },
        PageContext::Other(path) => format!("{path}: nothing to show"),
    };
    let viewing = session
        .stories()
        .and_then(|stories| stories.current())
        .map(|(group, story)| {
            let shown = story.content.as_deref().or(story.media_url.as_deref()).unwrap_or_default();
            format!(" | story by {}: {shown}", group.user.username)
        })
        .unwrap_or_default();
    format!(
        "[{}] {page}{viewing} | {} unread notifications",
        session.connection(),
        session.notifications().unread()
    )
}
