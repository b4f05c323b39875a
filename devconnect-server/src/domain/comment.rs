use chrono::{DateTime, Utc};

use super::error::{DomainError, validate_positive_id};
use super::user::AuthorSummary;

pub(crate) const MAX_COMMENT_CHARS: usize = 200;

/// Root comments live at depth 0; replies are accepted up to this depth.
pub(crate) const MAX_REPLY_DEPTH: i32 = 3;

#[derive(Debug, Clone)]
pub(crate) struct CreateCommentRequest {
    pub(crate) content: String,
    pub(crate) parent_id: Option<i64>,
}

impl CreateCommentRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        if let Some(parent_id) = self.parent_id {
            validate_positive_id("parent_id", parent_id)?;
        }
        let content = self.content.trim();
        let len = content.chars().count();
        if len == 0 || len > MAX_COMMENT_CHARS {
            return Err(DomainError::Validation {
                field: "content",
                message: "must be 1..200 chars",
            });
        }
        Ok(Self {
            content: content.to_string(),
            parent_id: self.parent_id,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Comment {
    pub(crate) id: i64,
    pub(crate) post_id: i64,
    pub(crate) author: AuthorSummary,
    pub(crate) parent_id: Option<i64>,
    pub(crate) content: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl Comment {
    pub(crate) fn new(
        id: i64,
        post_id: i64,
        author: AuthorSummary,
        parent_id: Option<i64>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_positive_id("id", id)?;
        validate_positive_id("post_id", post_id)?;
        validate_positive_id("author_id", author.id)?;
        if parent_id == Some(id) {
            return Err(DomainError::Validation {
                field: "parent_id",
                message: "must not reference the comment itself",
            });
        }
        Ok(Self {
            id,
            post_id,
            author,
            parent_id,
            content: content.into(),
            created_at,
        })
    }
}

/// Where a parent comment sits, used to accept or reject a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParentComment {
    pub(crate) id: i64,
    pub(crate) post_id: i64,
    pub(crate) author_id: i64,
    pub(crate) depth: i32,
}

impl ParentComment {
    pub(crate) fn accepts_reply_on(&self, post_id: i64) -> Result<(), DomainError> {
        if self.post_id != post_id {
            return Err(DomainError::Validation {
                field: "parent_id",
                message: "must belong to the same post",
            });
        }
        if self.depth >= MAX_REPLY_DEPTH {
            return Err(DomainError::Validation {
                field: "parent_id",
                message: "reply nesting is too deep",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CreateCommentRequest, ParentComment};

    #[test]
    fn create_comment_request_trims_content() {
        let req = CreateCommentRequest {
            content: "  nice post ".to_string(),
            parent_id: None,
        };
        assert_eq!(req.validate().expect("valid").content, "nice post");
    }

    #[test]
    fn create_comment_request_rejects_long_content() {
        let req = CreateCommentRequest {
            content: "x".repeat(201),
            parent_id: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn create_comment_request_rejects_bad_parent() {
        let req = CreateCommentRequest {
            content: "reply".to_string(),
            parent_id: Some(0),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn parent_accepts_reply_until_max_depth() {
        let parent = ParentComment {
            id: 1,
            post_id: 10,
            author_id: 2,
            depth: 2,
        };
        assert!(parent.accepts_reply_on(10).is_ok());

        let too_deep = ParentComment { depth: 3, ..parent };
        assert!(too_deep.accepts_reply_on(10).is_err());
    }

    #[test]
    fn parent_on_other_post_is_rejected() {
        let parent = ParentComment {
            id: 1,
            post_id: 10,
            author_id: 2,
            depth: 0,
        };
        assert!(parent.accepts_reply_on(11).is_err());
    }
}
