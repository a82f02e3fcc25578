use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::ValidationError;
use crate::session::{VoteStatus, VoteTransition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    ClassicMusic,
    RockMusic,
}

impl Choice {
    pub const ALL: [Choice; 2] = [Choice::ClassicMusic, Choice::RockMusic];

    pub const fn as_str(self) -> &'static str {
        match self {
            Choice::ClassicMusic => "classic_music",
            Choice::RockMusic => "rock_music",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Choice::ClassicMusic => "Classic Music",
            Choice::RockMusic => "Rock Music",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Choice {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Choice::ALL
            .into_iter()
            .find(|choice| choice.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownChoice(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub classic_music: u64,
    pub rock_music: u64,
}

impl VoteCounts {
    pub const fn zero() -> Self {
        Self { classic_music: 0, rock_music: 0 }
    }

    pub fn get(&self, choice: Choice) -> u64 {
        match choice {
            Choice::ClassicMusic => self.classic_music,
            Choice::RockMusic => self.rock_music,
        }
    }

    pub fn set(&mut self, choice: Choice, count: u64) {
        match choice {
            Choice::ClassicMusic => self.classic_music = count,
            Choice::RockMusic => self.rock_music = count,
        }
    }

    pub fn total(&self) -> u64 {
        self.classic_music + self.rock_music
    }

    pub fn tally(&self) -> VoteTally {
        VoteTally::from_counts(self)
    }
}

impl FromIterator<(Choice, u64)> for VoteCounts {
    fn from_iter<I: IntoIterator<Item = (Choice, u64)>>(iter: I) -> Self {
        let mut counts = VoteCounts::zero();
        for (choice, count) in iter {
            counts.set(choice, count);
        }
        counts
    }
}

/// Derived view of the counts used by the results panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteTally {
    pub total_votes: u64,
    pub classic_music_percentage: f64,
    pub rock_music_percentage: f64,
    /// `None` on a tie, including the empty 0-0 poll.
    pub leader: Option<Choice>,
}

impl VoteTally {
    pub fn from_counts(counts: &VoteCounts) -> Self {
        let total_votes = counts.total();
        let percentage = |count: u64| {
            if total_votes == 0 {
                0.0
            } else {
                count as f64 / total_votes as f64 * 100.0
            }
        };

        let leader = match counts.classic_music.cmp(&counts.rock_music) {
            std::cmp::Ordering::Greater => Some(Choice::ClassicMusic),
            std::cmp::Ordering::Less => Some(Choice::RockMusic),
            std::cmp::Ordering::Equal => None,
        };

        Self {
            total_votes,
            classic_music_percentage: percentage(counts.classic_music),
            rock_music_percentage: percentage(counts.rock_music),
            leader,
        }
    }

    pub fn is_tie(&self) -> bool {
        self.leader.is_none()
    }
}

/// Counts as seen by the caller, plus the non-fatal error that produced them
/// when the backend could not be reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSnapshot {
    pub counts: VoteCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VoteSnapshot {
    pub fn ok(counts: VoteCounts) -> Self {
        Self { counts, error: None }
    }

    pub fn degraded(counts: VoteCounts, error: impl Into<String>) -> Self {
        Self { counts, error: Some(error.into()) }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub counts: VoteCounts,
    pub tally: VoteTally,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<VoteSnapshot> for VoteSummary {
    fn from(snapshot: VoteSnapshot) -> Self {
        Self {
            tally: snapshot.counts.tally(),
            counts: snapshot.counts,
            error: snapshot.error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub choice: Choice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteResponse {
    pub status: VoteStatus,
    pub transition: VoteTransition,
    pub notice: String,
    pub summary: VoteSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestVoteResponse {
    pub success: bool,
    pub choice: Choice,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
