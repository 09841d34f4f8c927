pub(crate) mod config;
pub(crate) mod receipt;
pub(crate) mod user;
