pub(crate) mod auth;
pub(crate) mod comments;
pub(crate) mod media;
pub(crate) mod notifications;
pub(crate) mod posts;
pub(crate) mod reactions;
pub(crate) mod users;
