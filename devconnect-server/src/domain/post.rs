use chrono::{DateTime, Utc};

use super::error::{DomainError, validate_positive_id};
use super::reaction::Reactions;
use super::topic::normalize_topics;
use super::user::AuthorSummary;

pub(crate) const MAX_POST_CHARS: usize = 280;

#[derive(Debug, Clone)]
pub(crate) struct CreatePostRequest {
    pub(crate) content: String,
    pub(crate) topics: Vec<String>,
    pub(crate) image_url: Option<String>,
}

impl CreatePostRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        let image_url = self
            .image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        if let Some(url) = &image_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(DomainError::Validation {
                field: "image_url",
                message: "must be an http(s) url",
            });
        }

        Ok(Self {
            content: normalize_content(&self.content)?,
            topics: normalize_topics(&self.topics)?,
            image_url,
        })
    }
}

/// A post as shown in feeds: author, topics, comment count and reactions resolved.
#[derive(Debug, Clone)]
pub(crate) struct PostDetails {
    pub(crate) id: i64,
    pub(crate) content: String,
    pub(crate) image_url: Option<String>,
    pub(crate) author: AuthorSummary,
    pub(crate) topics: Vec<String>,
    pub(crate) comments_count: i64,
    pub(crate) reactions: Reactions,
    pub(crate) created_at: DateTime<Utc>,
}

impl PostDetails {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: i64,
        content: impl Into<String>,
        image_url: Option<String>,
        author: AuthorSummary,
        topics: Vec<String>,
        comments_count: i64,
        reactions: Reactions,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_positive_id("id", id)?;
        validate_positive_id("author_id", author.id)?;
        if comments_count < 0 {
            return Err(DomainError::Validation {
                field: "comments_count",
                message: "must be >= 0",
            });
        }
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::Validation {
                field: "content",
                message: "must not be empty",
            });
        }

        Ok(Self {
            id,
            content,
            image_url,
            author,
            topics,
            comments_count,
            reactions,
            created_at,
        })
    }
}

fn normalize_content(content: &str) -> Result<String, DomainError> {
    let content = content.trim();
    let len = content.chars().count();
    if len == 0 || len > MAX_POST_CHARS {
        return Err(DomainError::Validation {
            field: "content",
            message: "must be 1..280 chars",
        });
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{CreatePostRequest, DomainError, PostDetails};
    use crate::domain::reaction::Reactions;
    use crate::domain::user::AuthorSummary;

    #[test]
    fn create_post_request_rejects_empty_content() {
        let req = CreatePostRequest {
            content: "   ".to_string(),
            topics: vec![],
            image_url: None,
        };

        let err = req.validate().expect_err("content must be rejected");
        assert_validation_field(err, "content");
    }

    #[test]
    fn create_post_request_rejects_content_over_limit() {
        let req = CreatePostRequest {
            content: "ñ".repeat(281),
            topics: vec![],
            image_url: None,
        };

        let err = req.validate().expect_err("content must be rejected");
        assert_validation_field(err, "content");
    }

    #[test]
    fn create_post_request_counts_chars_not_bytes() {
        let req = CreatePostRequest {
            content: "ñ".repeat(280),
            topics: vec![],
            image_url: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn create_post_request_normalizes_fields() {
        let req = CreatePostRequest {
            content: "  hello devs  ".to_string(),
            topics: vec!["React".to_string(), "react".to_string()],
            image_url: Some("  ".to_string()),
        };

        let validated = req.validate().expect("must validate");
        assert_eq!(validated.content, "hello devs");
        assert_eq!(validated.topics, vec!["react"]);
        assert!(validated.image_url.is_none());
    }

    #[test]
    fn create_post_request_rejects_non_http_image() {
        let req = CreatePostRequest {
            content: "look".to_string(),
            topics: vec![],
            image_url: Some("file:///etc/passwd".to_string()),
        };

        let err = req.validate().expect_err("image url must be rejected");
        assert_validation_field(err, "image_url");
    }

    #[test]
    fn post_details_rejects_negative_comment_count() {
        let err = PostDetails::new(
            1,
            "content",
            None,
            author(2),
            vec![],
            -1,
            Reactions::default(),
            Utc::now(),
        )
        .expect_err("negative count must fail");
        assert_validation_field(err, "comments_count");
    }

    #[test]
    fn post_details_rejects_non_positive_author() {
        let err = PostDetails::new(
            1,
            "content",
            None,
            author(0),
            vec![],
            0,
            Reactions::default(),
            Utc::now(),
        )
        .expect_err("author id must be > 0");
        assert_validation_field(err, "author_id");
    }

    fn author(id: i64) -> AuthorSummary {
        AuthorSummary {
            id,
            username: Some("codemaster".to_string()),
            full_name: None,
            avatar_url: None,
        }
    }

    fn assert_validation_field(err: DomainError, expected_field: &'static str) {
        match err {
            DomainError::Validation { field, .. } => assert_eq!(field, expected_field),
            _ => panic!("expected DomainError::Validation"),
        }
    }
}
