//! Core module - storage, configuration and project layout

pub mod backend;
pub mod config;
pub mod project;

pub use backend::{Backend, BackendError, MemoryBackend, Query, Record, SqliteBackend, Value};
pub use config::{Config, ConfigError};
pub use project::{Project, ProjectError};
