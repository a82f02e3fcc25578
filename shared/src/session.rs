//! Per-session vote status.
//!
//! The status lives only on the client (a cookie), so one vote per session is
//! a courtesy rather than a guarantee: a fresh session can always vote again.

use serde::{Serialize, Deserialize};

use crate::models::Choice;

pub const VOTE_COOKIE: &str = "vote_choice";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "choice")]
pub enum VoteStatus {
    #[default]
    NotVoted,
    Voted(Choice),
}

/// What a button press means for the shared counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum VoteTransition {
    /// `increment(choice)`
    FirstVote { choice: Choice },
    /// `decrement(from)` then `increment(to)`
    Changed { from: Choice, to: Choice },
    /// No store access.
    AlreadyVoted { choice: Choice },
}

impl VoteStatus {
    pub fn choice(self) -> Option<Choice> {
        match self {
            VoteStatus::NotVoted => None,
            VoteStatus::Voted(choice) => Some(choice),
        }
    }

    pub fn has_voted(self) -> bool {
        matches!(self, VoteStatus::Voted(_))
    }

    /// There is no way back to `NotVoted`.
    pub fn vote(self, choice: Choice) -> (VoteStatus, VoteTransition) {
        let transition = match self {
            VoteStatus::NotVoted => VoteTransition::FirstVote { choice },
            VoteStatus::Voted(current) if current == choice => VoteTransition::AlreadyVoted { choice },
            VoteStatus::Voted(current) => VoteTransition::Changed { from: current, to: choice },
        };
        (VoteStatus::Voted(choice), transition)
    }
}

impl VoteTransition {
    pub fn touches_store(self) -> bool {
        !matches!(self, VoteTransition::AlreadyVoted { .. })
    }

    pub fn notice(self) -> String {
        match self {
            VoteTransition::FirstVote { choice } => format!("You voted for {}!", choice.label()),
            VoteTransition::Changed { to, .. } => format!("You changed your vote to {}!", to.label()),
            VoteTransition::AlreadyVoted { choice } => format!("You already voted for {}!", choice.label()),
        }
    }
}

#[cfg(feature = "backend")]
mod backend_impl {
    use super::*;
    use rocket::request::{FromRequest, Outcome};
    use rocket::Request;

    #[rocket::async_trait]
    impl<'r> FromRequest<'r> for VoteStatus {
        type Error = ();

        async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
            let status = req
                .cookies()
                .get(VOTE_COOKIE)
                .and_then(|cookie| cookie.value().parse::<Choice>().ok())
                .map(VoteStatus::Voted)
                .unwrap_or_default();

            Outcome::Success(status)
        }
    }
}
