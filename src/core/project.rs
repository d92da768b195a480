//! Project discovery and structure

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::core::backend::SqliteBackend;
use crate::entities;

/// Directory marking a project root
pub const PROJECT_DIR: &str = ".cadastro";

const DATABASE_FILE: &str = "cadastro.db";

/// Represents a cadastro project
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .cadastro/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project: config file plus a database with every table
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if root.join(PROJECT_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }
        Self::create(root)
    }

    /// Force initialization even if .cadastro/ exists. Existing data is kept;
    /// missing tables are created and the config file is rewritten.
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::create(root)
    }

    fn create(root: PathBuf) -> Result<Self, ProjectError> {
        let dir = root.join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        let project = Self { root };
        project.open_database()?;
        Ok(project)
    }

    fn default_config() -> &'static str {
        r#"# Cadastro project configuration
# Run `cadastro config keys` for all options

# Work-site code stamped on imported rows
# cca: ""

# Rows per bulk insert during commit
# chunk_size: 50

# Import rows that only carry warnings
# allow_warnings: true

# Worksheet read from workbooks (default: first)
# default_sheet: ""
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .cadastro configuration directory
    pub fn project_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.project_dir().join("config.yaml")
    }

    pub fn database_path(&self) -> PathBuf {
        self.project_dir().join(DATABASE_FILE)
    }

    /// Open the project database, creating any missing tables
    pub fn open_database(&self) -> Result<SqliteBackend, ProjectError> {
        SqliteBackend::open(&self.database_path(), &entities::catalog())
            .map_err(|e| ProjectError::Database(e.to_string()))
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error, Diagnostic)]
pub enum ProjectError {
    #[error("not a cadastro project (searched from {searched_from:?})")]
    #[diagnostic(
        code(cadastro::project::not_found),
        help("run `cadastro init` to create one")
    )]
    NotFound { searched_from: PathBuf },

    #[error("cadastro project already exists at {0:?}")]
    #[diagnostic(
        code(cadastro::project::exists),
        help("use `cadastro init --force` to repair it")
    )]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    #[diagnostic(code(cadastro::project::io))]
    IoError(String),

    #[error("failed to open project database: {0}")]
    #[diagnostic(code(cadastro::project::database))]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::{Backend, Query};
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.project_dir().is_dir());
        assert!(project.config_path().exists());
        assert!(project.database_path().exists());

        let db = project.open_database().unwrap();
        for table in ["juntas", "valvulas", "cabos", "desenhos", "equipamentos", "luminarias", "linhas", "areas"] {
            assert!(db.select(&Query::table(table)).unwrap().is_empty(), "{table}");
        }
    }

    #[test]
    fn test_project_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let err = Project::init(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
        assert!(Project::init_force(tmp.path()).is_ok());
    }

    #[test]
    fn test_project_discover_finds_project_dir() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("planilhas/2024");
        std::fs::create_dir_all(&subdir).unwrap();

        let project = Project::discover_from(&subdir).unwrap();
        assert_eq!(
            project.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_project_discover_fails_without_project_dir() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }
}
