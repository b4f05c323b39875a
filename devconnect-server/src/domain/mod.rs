pub(crate) mod comment;
pub(crate) mod error;
pub(crate) mod follow;
pub(crate) mod notification;
pub(crate) mod post;
pub(crate) mod reaction;
pub(crate) mod topic;
pub(crate) mod user;
