//! CLI command implementations

pub mod completions;
pub mod config;
pub mod import;
pub mod init;
pub mod list;
pub mod refs;
