pub(crate) mod auth_service;
pub(crate) mod comment_service;
#[cfg(test)]
pub(crate) mod fakes;
pub(crate) mod follow_service;
pub(crate) mod media_service;
pub(crate) mod notification_service;
pub(crate) mod post_service;
pub(crate) mod reaction_service;
pub(crate) mod user_service;
