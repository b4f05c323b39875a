use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use super::error::{DomainError, validate_positive_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AuthProvider {
    Password,
    Github,
    Google,
}

impl AuthProvider {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AuthProvider::Password => "password",
            AuthProvider::Github => "github",
            AuthProvider::Google => "google",
        }
    }

    pub(crate) fn is_oauth(self) -> bool {
        !matches!(self, AuthProvider::Password)
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "password" => Ok(AuthProvider::Password),
            "github" => Ok(AuthProvider::Github),
            "google" => Ok(AuthProvider::Google),
            _ => Err(DomainError::Validation {
                field: "provider",
                message: "must be one of: password, github, google",
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RegisterRequest {
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password: String,
}

impl RegisterRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        let username = normalize_username(&self.username)?;
        let email = normalize_email(&self.email)?;
        let password_len = self.password.chars().count();
        if !(8..=128).contains(&password_len) {
            return Err(DomainError::Validation {
                field: "password",
                message: "must be 8..128 chars",
            });
        }
        Ok(Self {
            username,
            email,
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) username: String,
    pub(crate) password: String,
}

impl LoginRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        let username = self.username.trim();
        if username.is_empty() || username.len() > 64 {
            return Err(DomainError::Validation {
                field: "username",
                message: "must be 1..64 chars",
            });
        }

        if self.password.is_empty() {
            return Err(DomainError::Validation {
                field: "password",
                message: "must not be empty",
            });
        }
        Ok(Self {
            username: username.to_string(),
            password: self.password,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SetUsernameRequest {
    pub(crate) username: String,
}

impl SetUsernameRequest {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            username: normalize_username(&self.username)?,
        })
    }
}

/// Profile data reported by an OAuth provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExternalProfile {
    pub(crate) provider: AuthProvider,
    pub(crate) provider_id: String,
    pub(crate) email: String,
    pub(crate) full_name: Option<String>,
    pub(crate) avatar_url: Option<String>,
}

impl ExternalProfile {
    pub(crate) fn validate(self) -> Result<Self, DomainError> {
        if !self.provider.is_oauth() {
            return Err(DomainError::Validation {
                field: "provider",
                message: "must be an oauth provider",
            });
        }
        let provider_id = self.provider_id.trim().to_string();
        if provider_id.is_empty() {
            return Err(DomainError::Validation {
                field: "provider_id",
                message: "must not be empty",
            });
        }
        Ok(Self {
            provider: self.provider,
            provider_id,
            email: normalize_email(&self.email)?,
            full_name: normalize_optional(self.full_name),
            avatar_url: normalize_optional(self.avatar_url),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct User {
    pub(crate) id: i64,
    pub(crate) username: Option<String>,
    pub(crate) full_name: Option<String>,
    pub(crate) email: String,
    pub(crate) avatar_url: Option<String>,
    pub(crate) provider: AuthProvider,
    pub(crate) username_set: bool,
    pub(crate) created_at: DateTime<Utc>,
}

impl User {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: i64,
        username: Option<String>,
        full_name: Option<String>,
        email: impl Into<String>,
        avatar_url: Option<String>,
        provider: AuthProvider,
        username_set: bool,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_positive_id("id", id)?;
        let username = username.map(|name| normalize_username(&name)).transpose()?;
        if username_set && username.is_none() {
            return Err(DomainError::Validation {
                field: "username",
                message: "must be present when username_set is true",
            });
        }
        let email = normalize_email(&email.into())?;

        Ok(Self {
            id,
            username,
            full_name: normalize_optional(full_name),
            email,
            avatar_url: normalize_optional(avatar_url),
            provider,
            username_set,
            created_at,
        })
    }

    pub(crate) fn summary(&self) -> AuthorSummary {
        AuthorSummary {
            id: self.id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Public part of a profile embedded into posts, comments and follow lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AuthorSummary {
    pub(crate) id: i64,
    pub(crate) username: Option<String>,
    pub(crate) full_name: Option<String>,
    pub(crate) avatar_url: Option<String>,
}

pub(crate) fn normalize_username(username: &str) -> Result<String, DomainError> {
    let username = username.trim();
    if username.len() < 3 || username.len() > 64 {
        return Err(DomainError::Validation {
            field: "username",
            message: "must be 3..64 chars",
        });
    }
    if !username
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.')
    {
        return Err(DomainError::Validation {
            field: "username",
            message: "may contain only letters, digits, '_', '-' and '.'",
        });
    }
    // Mentions drop a trailing '.' or '-' as punctuation.
    if username.ends_with(['.', '-']) {
        return Err(DomainError::Validation {
            field: "username",
            message: "must not end with '.' or '-'",
        });
    }
    Ok(username.to_string())
}

fn normalize_email(email: &str) -> Result<String, DomainError> {
    let email = email.trim().to_lowercase();
    if !email.validate_email() {
        return Err(DomainError::Validation {
            field: "email",
            message: "must be a valid email",
        });
    }
    Ok(email)
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
