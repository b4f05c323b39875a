pub(crate) mod database;
pub(crate) mod jwt;
pub(crate) mod logging;
pub(crate) mod notification_hub;
pub(crate) mod object_storage;
pub(crate) mod oauth;
pub(crate) mod settings;
