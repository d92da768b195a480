//! Batch committer
//!
//! Importable rows are written in fixed-size chunks, strictly in input
//! order, one bulk insert per chunk. A failed chunk is recorded and the
//! next chunk is still attempted. There is no rollback across chunks:
//! chunks already written stay written when a later one fails.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::backend::{fold_key, Backend, BackendError, Query, Record, Value};

use super::preview::Preview;
use super::reference::ReferenceCache;
use super::rules::{FieldSpec, ImportSchema, Strength, CCA_COLUMN};
use super::sheet::{write_table, ImportRow, SheetError};
use super::validator::{parse_number, PreviewRow};
use super::ImportError;

/// Rows per bulk insert
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Keys per uniqueness re-check query; stays under SQLite's bound-parameter limit
pub const RECHECK_BATCH: usize = 500;

/// Column appended to retry spreadsheets
pub const RETRY_REASON_HEADER: &str = "MOTIVO_FALHA";

/// Reason written for rows skipped after cancellation
pub const NOT_ATTEMPTED_REASON: &str = "não processada";

/// Options for one commit run
#[derive(Debug, Clone)]
pub struct CommitOptions {
    pub chunk_size: usize,
    /// Work-site code stamped on every row
    pub cca: Option<String>,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            cca: None,
        }
    }
}

/// Progress emitted after every chunk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Rows handled so far, successful or not
    pub processed: usize,
    pub total: usize,
    /// 1-based chunk number just handled
    pub chunk: usize,
    pub chunks: usize,
    /// Whether any row of this chunk failed
    pub chunk_failed: bool,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        percent(self.processed, self.total)
    }
}

fn percent(processed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        processed as f64 / total as f64 * 100.0
    }
}

/// What happened to one row during commit
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Imported { id: i64 },
    /// Rejected by the backend or the insert-time re-check; retry possible
    Failed { message: String },
    /// Not attempted because the run was cancelled
    NotAttempted,
}

/// Outcome of a commit run, keyed by preview row index
#[derive(Debug, Clone, Default)]
pub struct CommitResult {
    outcomes: BTreeMap<usize, RowOutcome>,
    total: usize,
    processed: usize,
    cancelled: bool,
}

impl CommitResult {
    fn record(&mut self, index: usize, outcome: RowOutcome) {
        self.outcomes.insert(index, outcome);
    }

    fn count(&self, pred: impl Fn(&RowOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(o)).count()
    }

    pub fn imported(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Imported { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Failed { .. }))
    }

    pub fn not_attempted(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::NotAttempted))
    }

    /// Importable rows submitted to this run
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn percent(&self) -> f64 {
        percent(self.processed, self.total)
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn outcome(&self, index: usize) -> Option<&RowOutcome> {
        self.outcomes.get(&index)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (usize, &RowOutcome)> {
        self.outcomes.iter().map(|(i, o)| (*i, o))
    }

    /// Failed rows with their messages, in input order
    pub fn failures(&self) -> Vec<(usize, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(i, o)| match o {
                RowOutcome::Failed { message } => Some((*i, message.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Rows worth retrying: failed or never attempted
    pub fn retry_rows<'p>(&self, preview: &'p Preview) -> Vec<&'p PreviewRow> {
        preview
            .rows()
            .iter()
            .filter(|r| {
                matches!(
                    self.outcomes.get(&r.index()),
                    Some(RowOutcome::Failed { .. } | RowOutcome::NotAttempted)
                )
            })
            .collect()
    }

    /// Retry spreadsheet contents: the template headers plus
    /// [`RETRY_REASON_HEADER`], one record per retry row with its cells as read
    pub fn retry_table(
        &self,
        schema: &ImportSchema,
        preview: &Preview,
    ) -> (Vec<String>, Vec<Vec<String>>) {
        let mut headers: Vec<String> = schema.fields.iter().map(|f| f.header.clone()).collect();
        headers.push(RETRY_REASON_HEADER.to_string());

        let records = self
            .retry_rows(preview)
            .into_iter()
            .map(|row| {
                let mut cells: Vec<String> = schema
                    .fields
                    .iter()
                    .map(|f| row.data().raw(&f.header).to_string())
                    .collect();
                let reason = match self.outcome(row.index()) {
                    Some(RowOutcome::Failed { message }) => message.clone(),
                    _ => NOT_ATTEMPTED_REASON.to_string(),
                };
                cells.push(reason);
                cells
            })
            .collect();

        (headers, records)
    }

    /// Write the retry spreadsheet; format follows the extension.
    /// Returns the number of rows written.
    pub fn write_retry_file(
        &self,
        path: &Path,
        schema: &ImportSchema,
        preview: &Preview,
    ) -> Result<usize, SheetError> {
        let (headers, records) = self.retry_table(schema, preview);
        write_table(path, &headers, &records)?;
        Ok(records.len())
    }
}

/// Writes importable rows to a backend in sequential chunks
pub struct BatchCommitter<'a> {
    schema: &'a ImportSchema,
    refs: &'a ReferenceCache,
    options: CommitOptions,
}

impl<'a> BatchCommitter<'a> {
    pub fn new(
        schema: &'a ImportSchema,
        refs: &'a ReferenceCache,
        options: CommitOptions,
    ) -> Result<Self, ImportError> {
        if options.chunk_size == 0 {
            return Err(ImportError::InvalidChunkSize);
        }
        Ok(Self {
            schema,
            refs,
            options,
        })
    }

    /// Commit the preview's importable rows
    pub fn commit_preview<B, F>(
        &self,
        backend: &mut B,
        preview: &Preview,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> CommitResult
    where
        B: Backend + ?Sized,
        F: FnMut(&Progress),
    {
        self.commit(backend, &preview.importable(), cancel, on_progress)
    }

    /// Commit rows in order. Rows with status `error` are dropped before
    /// chunking and never reach the backend.
    pub fn commit<B, F>(
        &self,
        backend: &mut B,
        rows: &[&PreviewRow],
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> CommitResult
    where
        B: Backend + ?Sized,
        F: FnMut(&Progress),
    {
        let rows: Vec<&PreviewRow> = rows.iter().copied().filter(|r| !r.is_error()).collect();
        let size = self.options.chunk_size;
        let chunks = rows.len().div_ceil(size);

        let mut result = CommitResult {
            total: rows.len(),
            ..Default::default()
        };

        for (n, chunk) in rows.chunks(size).enumerate() {
            if cancel.is_cancelled() {
                for row in &rows[n * size..] {
                    result.record(row.index(), RowOutcome::NotAttempted);
                }
                result.cancelled = true;
                info!(
                    module = %self.schema.module,
                    chunk = n + 1,
                    chunks,
                    "import cancelled before chunk"
                );
                break;
            }

            let failed_before = result.failed();
            self.commit_chunk(backend, chunk, &mut result);
            result.processed += chunk.len();

            let progress = Progress {
                processed: result.processed,
                total: result.total,
                chunk: n + 1,
                chunks,
                chunk_failed: result.failed() > failed_before,
            };
            info!(
                module = %self.schema.module,
                chunk = progress.chunk,
                chunks,
                rows = chunk.len(),
                failed = progress.chunk_failed,
                "chunk committed"
            );
            on_progress(&progress);
        }

        result
    }

    fn commit_chunk<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        chunk: &[&PreviewRow],
        result: &mut CommitResult,
    ) {
        let mut pending: Vec<(&PreviewRow, Record)> = Vec::with_capacity(chunk.len());
        for row in chunk {
            match self.build_record(row.data()) {
                Ok(record) => pending.push((row, record)),
                Err(message) => result.record(row.index(), RowOutcome::Failed { message }),
            }
        }

        // Keys may have been taken since the preview ran
        if let Some(key_field) = self.schema.key_field() {
            let keys: Vec<String> = pending
                .iter()
                .filter_map(|(row, _)| row.data().get(&key_field.header).map(String::from))
                .collect();
            if !keys.is_empty() {
                match self.taken_keys(&*backend, key_field, keys) {
                    Ok(taken) => {
                        let message = key_field.unique_message().unwrap_or_default();
                        pending.retain(|(row, _)| {
                            let conflict = row
                                .data()
                                .get(&key_field.header)
                                .is_some_and(|k| taken.contains(&fold_key(k)));
                            if conflict {
                                result.record(
                                    row.index(),
                                    RowOutcome::Failed {
                                        message: message.to_string(),
                                    },
                                );
                            }
                            !conflict
                        });
                    }
                    Err(e) => {
                        warn!(module = %self.schema.module, error = %e, "uniqueness re-check failed");
                        let message = e.to_string();
                        for (row, _) in pending {
                            result.record(
                                row.index(),
                                RowOutcome::Failed {
                                    message: message.clone(),
                                },
                            );
                        }
                        return;
                    }
                }
            }
        }

        if pending.is_empty() {
            return;
        }

        let (rows, records): (Vec<&PreviewRow>, Vec<Record>) = pending.into_iter().unzip();
        match backend.insert(&self.schema.table, &records) {
            Ok(ids) => {
                for (row, id) in rows.iter().zip(ids) {
                    result.record(row.index(), RowOutcome::Imported { id });
                }
            }
            Err(e) => {
                warn!(module = %self.schema.module, rows = rows.len(), error = %e, "chunk insert failed");
                let message = e.to_string();
                for row in rows {
                    result.record(
                        row.index(),
                        RowOutcome::Failed {
                            message: message.clone(),
                        },
                    );
                }
            }
        }
    }

    /// Folded keys already held by active rows, queried in bounded batches
    fn taken_keys<B: Backend + ?Sized>(
        &self,
        backend: &B,
        key_field: &FieldSpec,
        keys: Vec<String>,
    ) -> Result<HashSet<String>, BackendError> {
        let mut taken = HashSet::new();
        for batch in keys.chunks(RECHECK_BATCH) {
            let query = Query::table(self.schema.table.as_str())
                .active()
                .filter_in_ignore_case(key_field.column.as_str(), batch.to_vec());
            taken.extend(
                backend
                    .select(&query)?
                    .iter()
                    .filter_map(|r| r.get(&key_field.column).and_then(Value::as_str))
                    .map(fold_key),
            );
        }
        Ok(taken)
    }

    /// Map a row onto backend columns, resolving deferred foreign keys
    fn build_record(&self, row: &ImportRow) -> Result<Record, String> {
        let mut record = Record::new();
        for field in &self.schema.fields {
            let value = match (row.get(&field.header), field.reference_rule()) {
                (None, _) => Value::Null,
                (Some(raw), Some((reference, strength))) => {
                    match (self.refs.find(reference.set, raw), strength) {
                        (Some(id), _) => Value::Integer(id),
                        (None, Strength::Soft) => Value::Null,
                        (None, Strength::Hard) => {
                            return Err(format!(
                                "{} não encontrado(a) em {}: '{}'",
                                reference.label, field.header, raw
                            ))
                        }
                    }
                }
                (Some(raw), None) if field.is_numeric() => match parse_number(raw) {
                    Some(n) => Value::Real(n),
                    None => return Err(format!("{} deve ser um número positivo: '{}'", field.header, raw)),
                },
                (Some(raw), None) => Value::Text(raw.to_string()),
            };
            record.insert(field.column.clone(), value);
        }
        if let Some(cca) = &self.options.cca {
            record.insert(CCA_COLUMN.to_string(), Value::Text(cca.clone()));
        }
        Ok(record)
    }
}
