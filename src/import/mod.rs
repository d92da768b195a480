//! Spreadsheet import pipeline
//!
//! A sheet flows through four stages: the [`ReferenceCache`] snapshots the
//! lookup tables, [`validate_all`] classifies every row, the [`Preview`]
//! aggregates counts and picks the importable rows, and the
//! [`BatchCommitter`] writes them in ordered chunks.

pub mod commit;
pub mod preview;
pub mod reference;
pub mod rules;
pub mod session;
pub mod sheet;
pub mod template;
pub mod validator;

use miette::Diagnostic;
use thiserror::Error;

use crate::core::backend::BackendError;

pub use commit::{
    BatchCommitter, CommitOptions, CommitResult, Progress, RowOutcome, DEFAULT_CHUNK_SIZE,
};
pub use preview::{Preview, PreviewSummary};
pub use reference::{ReferenceCache, ReferenceSet};
pub use rules::{FieldSpec, ImportSchema, ReferenceDef, Rule, Strength};
pub use session::ImportSession;
pub use sheet::{ImportRow, Sheet, SheetError};
pub use template::{template_rows, write_template, write_template_csv};
pub use validator::{validate, validate_all, Issue, KnownKeys, PreviewRow, RowStatus, Severity};

/// Errors that stop an import before or while building the preview
#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    #[error("failed to load reference table '{set}'")]
    #[diagnostic(
        code(cadastro::import::reference_load),
        help("no rows were validated; check the database and try again")
    )]
    ReferenceLoad {
        set: String,
        #[source]
        source: BackendError,
    },

    #[error("reference tables not loaded: {}", .0.join(", "))]
    #[diagnostic(code(cadastro::import::references_unavailable))]
    ReferencesUnavailable(Vec<String>),

    #[error("failed to load existing keys from '{table}'")]
    #[diagnostic(code(cadastro::import::existing_keys))]
    ExistingKeys {
        table: String,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sheet(#[from] SheetError),

    #[error("unknown import module '{0}'")]
    #[diagnostic(
        code(cadastro::import::unknown_module),
        help("run `cadastro import --help` to see the available modules")
    )]
    UnknownModule(String),

    #[error("chunk size must be at least 1")]
    #[diagnostic(code(cadastro::import::chunk_size))]
    InvalidChunkSize,
}
