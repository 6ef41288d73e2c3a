//! CLI command modules.

pub mod http;
pub mod photo;
pub mod status;
