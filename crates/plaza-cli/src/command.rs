//! Console command parsing.
//!
//! One line of input is one command. The first word picks the command, the
//! rest are its arguments; free text (message bodies, comments) runs to the
//! end of the line.

use plaza_app::{
    Intent, Viewport,
    action::{MemberOp, RelationOp, StoryOp},
};
use plaza_proto::{MessageType, rest::FriendRequestAction};
use thiserror::Error;

/// Height the console pretends its viewport has.
const VIEW_HEIGHT: u32 = 600;
/// Content height the console pretends lists have.
const CONTENT_HEIGHT: u32 = 2_000;

/// Command parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Blank line
    #[error("empty command")]
    Empty,

    /// First word is not a command
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),

    /// Required argument missing
    #[error("`{command}` needs {what}")]
    Missing {
        /// Command name
        command: &'static str,
        /// What was expected
        what: &'static str,
    },

    /// Argument is not a valid id
    #[error("`{0}` is not a valid id")]
    InvalidId(String),
}

/// One line per command, for `help`.
pub const HELP: &str = "\
go <path>                 open a page (/, /chat, /chat/42, /profile/ada, /notifications, /stories)
say <text>                send a message in the open chat
delete <message>          delete one of your messages
like <post>               like or unlike a post
comment <post> <text>     comment on a post
comments <post>           show the comments under a post
unpost <post>             delete one of your posts
admin <user> | kick <user>  manage a member of the open chat
friend send|accept|decline|cancel, unfriend, follow, unfollow
read [ids...]             mark notifications read (all when no ids)
friends [filter]          search friends to start a chat with
dm <user> | group <name> <users...>  start a chat
story <user> | next | prev | close   watch stories
more | older              scroll to the end, or to the top of a chat
hide | show | online      page visibility and network signals
refresh | quit";

/// Parse one input line into an intent.
///
/// `Ok(None)` means the line asked for help.
pub fn parse(line: &str) -> Result<Option<Intent>, CommandError> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let intent = match word {
        "" => return Err(CommandError::Empty),
        "help" | "?" => return Ok(None),
        "go" => Intent::Navigate(required(rest, "go", "a path")?.to_string()),
        "say" => Intent::SendMessage {
            content: required(rest, "say", "some text")?.to_string(),
            message_type: MessageType::Text,
        },
        "delete" => Intent::DeleteMessage(id(rest, "delete", "a message id")?),
        "like" => Intent::ToggleLike(id(rest, "like", "a post id")?),
        "unpost" => Intent::DeletePost(id(rest, "unpost", "a post id")?),
        "comment" => {
            let (post, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Intent::AddComment {
                post_id: id(post, "comment", "a post id")?,
                content: required(text.trim(), "comment", "some text")?.to_string(),
            }
        },
        "comments" => Intent::LoadComments(id(rest, "comments", "a post id")?),
        "friends" => Intent::SearchFriends((!rest.is_empty()).then(|| rest.to_string())),
        "dm" => Intent::CreateChat { name: None, member_ids: vec![id(rest, "dm", "a user id")?] },
        "group" => {
            let mut words = rest.split_whitespace();
            let name = words.next().ok_or(CommandError::Missing { command: "group", what: "a name" })?;
            let member_ids = ids(words)?;
            if member_ids.is_empty() {
                return Err(CommandError::Missing { command: "group", what: "some user ids" });
            }
            Intent::CreateChat { name: Some(name.to_string()), member_ids }
        },
        "story" => Intent::Story(StoryOp::Open(id(rest, "story", "a user id")?)),
        "next" => Intent::Story(StoryOp::Next),
        "prev" => Intent::Story(StoryOp::Prev),
        "close" => Intent::Story(StoryOp::Close),
        "admin" => Intent::Member { user_id: id(rest, "admin", "a user id")?, op: MemberOp::MakeAdmin },
        "kick" => Intent::Member { user_id: id(rest, "kick", "a user id")?, op: MemberOp::Remove },
        "friend" => {
            let action = match required(rest, "friend", "send, accept, decline or cancel")? {
                "send" => FriendRequestAction::Send,
                "accept" => FriendRequestAction::Accept,
                "decline" => FriendRequestAction::Decline,
                "cancel" => FriendRequestAction::Cancel,
                _ => {
                    return Err(CommandError::Missing {
                        command: "friend",
                        what: "send, accept, decline or cancel",
                    });
                },
            };
            Intent::Relationship(RelationOp::FriendRequest(action))
        },
        "unfriend" => Intent::Relationship(RelationOp::RemoveFriend),
        "follow" => Intent::Relationship(RelationOp::Follow),
        "unfollow" => Intent::Relationship(RelationOp::Unfollow),
        "read" => Intent::MarkNotificationsRead(ids(rest.split_whitespace())?),
        "more" => Intent::Scroll(Viewport::new(
            CONTENT_HEIGHT - VIEW_HEIGHT,
            VIEW_HEIGHT,
            CONTENT_HEIGHT,
        )),
        "older" => Intent::Scroll(Viewport::new(0, VIEW_HEIGHT, CONTENT_HEIGHT)),
        "hide" => Intent::Visibility(false),
        "show" => Intent::Visibility(true),
        "online" => Intent::NetworkOnline,
        "refresh" => Intent::Refresh,
        "quit" | "exit" => Intent::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(intent))
}

fn required<'a>(
    value: &'a str,
    command: &'static str,
    what: &'static str,
) -> Result<&'a str, CommandError> {
    if value.is_empty() { Err(CommandError::Missing { command, what }) } else { Ok(value) }
}

fn ids<'a>(words: impl Iterator<Item = &'a str>) -> Result<Vec<u64>, CommandError> {
    words
        .map(|word| word.parse().map_err(|_| CommandError::InvalidId(word.to_string())))
        .collect()
}

fn id(value: &str, command: &'static str, what: &'static str) -> Result<u64, CommandError> {
    required(value, command, what)?
        .parse()
        .map_err(|_| CommandError::InvalidId(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_navigation_and_messages() {
        assert_eq!(parse("go /chat/42").unwrap(), Some(Intent::Navigate("/chat/42".into())));
        assert_eq!(
            parse("  say hello   there ").unwrap(),
            Some(Intent::SendMessage { content: "hello   there".into(), message_type: MessageType::Text })
        );
        assert_eq!(
            parse("comment 5 nice post").unwrap(),
            Some(Intent::AddComment { post_id: 5, content: "nice post".into() })
        );
    }

    #[test]
    fn read_without_ids_marks_everything() {
        assert_eq!(parse("read").unwrap(), Some(Intent::MarkNotificationsRead(Vec::new())));
        assert_eq!(parse("read 3 4").unwrap(), Some(Intent::MarkNotificationsRead(vec![3, 4])));
    }

    #[test]
    fn chat_and_story_commands() {
        assert_eq!(parse("comments 5").unwrap(), Some(Intent::LoadComments(5)));
        assert_eq!(parse("friends").unwrap(), Some(Intent::SearchFriends(None)));
        assert_eq!(parse("friends ad").unwrap(), Some(Intent::SearchFriends(Some("ad".into()))));
        assert_eq!(
            parse("dm 3").unwrap(),
            Some(Intent::CreateChat { name: None, member_ids: vec![3] })
        );
        assert_eq!(
            parse("group crew 3 4").unwrap(),
            Some(Intent::CreateChat { name: Some("crew".into()), member_ids: vec![3, 4] })
        );
        assert_eq!(
            parse("group crew"),
            Err(CommandError::Missing { command: "group", what: "some user ids" })
        );
        assert_eq!(parse("story 2").unwrap(), Some(Intent::Story(StoryOp::Open(2))));
        assert_eq!(parse("next").unwrap(), Some(Intent::Story(StoryOp::Next)));
    }

    #[test]
    fn scroll_commands_hit_their_triggers() {
        let Some(Intent::Scroll(more)) = parse("more").unwrap() else { panic!("not a scroll") };
        assert!(more.near_end());
        let Some(Intent::Scroll(older)) = parse("older").unwrap() else { panic!("not a scroll") };
        assert!(older.at_top());
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!(parse("   "), Err(CommandError::Empty));
        assert_eq!(parse("dance"), Err(CommandError::Unknown("dance".into())));
        assert_eq!(parse("say"), Err(CommandError::Missing { command: "say", what: "some text" }));
        assert_eq!(parse("like five"), Err(CommandError::InvalidId("five".into())));
        assert_eq!(parse("comment 5"), Err(CommandError::Missing { command: "comment", what: "some text" }));
        assert!(parse("friend maybe").is_err());
        assert_eq!(parse("help").unwrap(), None);
    }
}
