//! Shared helper functions for CLI commands

use miette::Result;

use crate::cli::GlobalOpts;
use crate::core::{Project, SqliteBackend};
use crate::entities::Module;
use crate::import::ReferenceDef;

/// Locate the project from `--project` or the current directory
pub fn open_project(global: &GlobalOpts) -> Result<Project> {
    let project = match &global.project {
        Some(path) => Project::discover_from(path)?,
        None => Project::discover()?,
    };
    Ok(project)
}

/// Open the project database
pub fn open_backend(project: &Project) -> Result<SqliteBackend> {
    Ok(project.open_database()?)
}

/// clap value parser for import modules
pub fn parse_module(s: &str) -> std::result::Result<Module, String> {
    s.parse::<Module>().map_err(|_| {
        let names: Vec<&str> = Module::ALL.iter().map(Module::as_str).collect();
        format!("unknown module '{}'. Supported: {}", s, names.join(", "))
    })
}

/// clap value parser for reference sets
pub fn parse_reference(s: &str) -> std::result::Result<ReferenceDef, String> {
    crate::entities::references::by_name(s).ok_or_else(|| {
        let names: Vec<&str> = crate::entities::references::ALL
            .iter()
            .map(|r| r.set)
            .collect();
        format!("unknown reference set '{}'. Supported: {}", s, names.join(", "))
    })
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
