pub(crate) mod comment_repository;
pub(crate) mod follow_repository;
pub(crate) mod notification_repository;
pub(crate) mod oauth_state_repository;
pub(crate) mod post_repository;
pub(crate) mod reaction_repository;
pub(crate) mod repositories;
pub(crate) mod user_repository;
