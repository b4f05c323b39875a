pub(crate) mod interceptors;
pub(crate) mod mappers;
pub(crate) mod proto;
pub(crate) mod service;
pub(crate) mod status;
