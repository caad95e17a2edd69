//! Members of the open chat.

use plaza_client::ApiError;
use plaza_proto::{ChatId, ChatMemberAdded, ChatMemberRemoved, Member, MemberRole, UserId};

use crate::{
    action::{AppAction, Fetch, MemberOp},
    guard::MutationGuard,
    toast::Notice,
    view::{EntityList, Update, ViewPhase},
};

/// Member list with admin operations.
#[derive(Debug, Clone)]
pub struct MembersPanel {
    chat_id: ChatId,
    phase: ViewPhase,
    members: EntityList<Member>,
    pending: MutationGuard<UserId>,
}

impl MembersPanel {
    /// Empty panel for `chat_id`.
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            phase: ViewPhase::Empty,
            members: EntityList::new(),
            pending: MutationGuard::new(),
        }
    }

    /// Chat shown.
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Load phase.
    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    /// Members in server order.
    pub fn members(&self) -> &EntityList<Member> {
        &self.members
    }

    /// Whether `user_id` is an admin of this chat.
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.members.get(user_id).is_some_and(|m| m.role == MemberRole::Admin)
    }

    /// Drop content and reload.
    pub fn refresh(&mut self) -> Update {
        self.members.clear();
        self.phase.begin_refresh();
        Update::action(AppAction::Fetch(Fetch::Members { chat_id: self.chat_id }))
    }

    /// The member list arrived.
    pub fn on_loaded(&mut self, result: Result<Vec<Member>, ApiError>) -> Update {
        match result {
            Ok(members) => {
                self.members.clear();
                self.members.extend(members);
                self.phase.succeed();
            },
            Err(error) => {
                self.phase.fail(error.user_message());
            },
        }
        Update::none()
    }

    /// `member_added` push. Deduplicated by user.
    pub fn on_added(&mut self, added: ChatMemberAdded) {
        if self.phase.accepts_events() && added.chat_id == self.chat_id {
            self.members.upsert(added.member);
        }
    }

    /// `member_removed` push.
    pub fn on_removed(&mut self, removed: &ChatMemberRemoved) {
        if self.phase.accepts_events() && removed.chat_id == self.chat_id {
            self.members.remove(removed.user_id);
        }
    }

    /// Promote or remove a member. Ignored while an operation on the same
    /// member is in flight.
    pub fn update(&mut self, user_id: UserId, op: MemberOp) -> Update {
        if !self.members.contains(user_id) || !self.pending.try_begin(user_id) {
            return Update::none();
        }
        Update::action(AppAction::UpdateMember { chat_id: self.chat_id, user_id, op })
    }

    /// A member operation finished. State changes only on success.
    pub fn on_updated(&mut self, user_id: UserId, op: MemberOp, result: Result<(), ApiError>) -> Update {
        self.pending.finish(&user_id);
        match result {
            Ok(()) => {
                match op {
                    MemberOp::MakeAdmin => {
                        if let Some(member) = self.members.get_mut(user_id) {
                            member.role = MemberRole::Admin;
                        }
                    },
                    MemberOp::Remove => {
                        self.members.remove(user_id);
                    },
                }
                Update::none()
            },
            Err(error) => Update::notice(Notice::error(error.user_message())),
        }
    }
}
