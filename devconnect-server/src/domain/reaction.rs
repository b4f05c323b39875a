use std::fmt;
use std::str::FromStr;

use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ReactionKind {
    Happy,
    Sad,
}

impl ReactionKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Happy => "happy",
            ReactionKind::Sad => "sad",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "happy" => Ok(ReactionKind::Happy),
            "sad" => Ok(ReactionKind::Sad),
            _ => Err(DomainError::Validation {
                field: "kind",
                message: "must be 'happy' or 'sad'",
            }),
        }
    }
}

/// What a toggle request does to the stored reaction of one user on one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReactionChange {
    Added(ReactionKind),
    Removed(ReactionKind),
    Replaced { from: ReactionKind, to: ReactionKind },
}

impl ReactionChange {
    pub(crate) fn decide(current: Option<ReactionKind>, requested: ReactionKind) -> Self {
        match current {
            Some(kind) if kind == requested => ReactionChange::Removed(kind),
            Some(kind) => ReactionChange::Replaced {
                from: kind,
                to: requested,
            },
            None => ReactionChange::Added(requested),
        }
    }

    /// Removals are silent, everything else is worth telling the post author about.
    pub(crate) fn is_addition(self) -> bool {
        !matches!(self, ReactionChange::Removed(_))
    }
}

/// User ids grouped by reaction kind for a single post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Reactions {
    pub(crate) happy: Vec<i64>,
    pub(crate) sad: Vec<i64>,
}
