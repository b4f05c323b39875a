use chrono::{DateTime, Utc};

use super::error::{DomainError, validate_positive_id};

#[derive(Debug, Clone)]
pub(crate) struct Follow {
    pub(crate) id: i64,
    pub(crate) follower_id: i64,
    pub(crate) following_id: i64,
    pub(crate) created_at: DateTime<Utc>,
}

impl Follow {
    pub(crate) fn new(
        id: i64,
        follower_id: i64,
        following_id: i64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_positive_id("id", id)?;
        validate_follow_pair(follower_id, following_id)?;
        Ok(Self {
            id,
            follower_id,
            following_id,
            created_at,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FollowCounts {
    pub(crate) followers: i64,
    pub(crate) following: i64,
}

pub(crate) fn validate_follow_pair(follower_id: i64, following_id: i64) -> Result<(), DomainError> {
    validate_positive_id("follower_id", follower_id)?;
    validate_positive_id("following_id", following_id)?;
    if follower_id == following_id {
        return Err(DomainError::Validation {
            field: "following_id",
            message: "users cannot follow themselves",
        });
    }
    Ok(())
}
