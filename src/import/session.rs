//! Import session: one sheet, one reference snapshot

use tracing::{debug, info};

use crate::core::backend::{Backend, Query, Value};

use super::commit::{BatchCommitter, CommitOptions};
use super::preview::Preview;
use super::reference::ReferenceCache;
use super::rules::ImportSchema;
use super::sheet::ImportRow;
use super::validator::{validate_all, KnownKeys};
use super::ImportError;

/// State shared by the preview and commit stages of one import
#[derive(Debug)]
pub struct ImportSession<'a> {
    schema: &'a ImportSchema,
    refs: ReferenceCache,
    known: KnownKeys,
}

impl<'a> ImportSession<'a> {
    /// Load every reference table the schema needs plus the natural keys
    /// already persisted. Nothing is validated unless all loads succeed.
    pub fn open<B: Backend + ?Sized>(
        backend: &B,
        schema: &'a ImportSchema,
    ) -> Result<Self, ImportError> {
        let defs = schema.references();
        let refs = ReferenceCache::load(backend, &defs)?;

        let known = match schema.key_field() {
            Some(key) => {
                let query = Query::table(schema.table.as_str()).active();
                let records = backend
                    .select(&query)
                    .map_err(|source| ImportError::ExistingKeys {
                        table: schema.table.clone(),
                        source,
                    })?;
                records
                    .iter()
                    .filter_map(|r| r.get(&key.column).and_then(Value::as_str))
                    .collect()
            }
            None => KnownKeys::new(),
        };

        info!(
            module = %schema.module,
            references = defs.len(),
            existing = known.len(),
            "import session opened"
        );
        Self::from_parts(schema, refs, known)
    }

    /// Build a session from an already loaded snapshot
    pub fn from_parts(
        schema: &'a ImportSchema,
        refs: ReferenceCache,
        known: KnownKeys,
    ) -> Result<Self, ImportError> {
        let missing = refs.missing(schema.references().iter().map(|r| r.set));
        if !missing.is_empty() {
            return Err(ImportError::ReferencesUnavailable(missing));
        }
        Ok(Self {
            schema,
            refs,
            known,
        })
    }

    pub fn schema(&self) -> &ImportSchema {
        self.schema
    }

    pub fn references(&self) -> &ReferenceCache {
        &self.refs
    }

    pub fn known_keys(&self) -> &KnownKeys {
        &self.known
    }

    /// Validate every row against this session's snapshot
    pub fn preview(&self, rows: &[ImportRow], allow_warnings: bool) -> Preview {
        let preview = Preview::new(
            validate_all(self.schema, rows, &self.refs, &self.known),
            allow_warnings,
        );
        let summary = preview.summary();
        debug!(
            module = %self.schema.module,
            total = summary.total,
            ok = summary.ok,
            warning = summary.warning,
            error = summary.error,
            "preview built"
        );
        preview
    }

    pub fn committer(&self, options: CommitOptions) -> Result<BatchCommitter<'_>, ImportError> {
        BatchCommitter::new(self.schema, &self.refs, options)
    }
}
