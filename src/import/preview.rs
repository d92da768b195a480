//! Preview aggregation: counts and the importable subset

use super::validator::{PreviewRow, RowStatus};

/// Row counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewSummary {
    pub total: usize,
    pub ok: usize,
    pub warning: usize,
    pub error: usize,
}

impl PreviewSummary {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a PreviewRow>) -> Self {
        let mut summary = Self::default();
        for row in rows {
            summary.total += 1;
            match row.status() {
                RowStatus::Ok => summary.ok += 1,
                RowStatus::Warning => summary.warning += 1,
                RowStatus::Error => summary.error += 1,
            }
        }
        summary
    }

    /// Rows that would be committed under the given policy
    pub fn importable(&self, allow_warnings: bool) -> usize {
        if allow_warnings {
            self.ok + self.warning
        } else {
            self.ok
        }
    }
}

/// Validated rows plus the warning policy of this import
#[derive(Debug, Clone)]
pub struct Preview {
    rows: Vec<PreviewRow>,
    allow_warnings: bool,
}

impl Preview {
    pub fn new(rows: Vec<PreviewRow>, allow_warnings: bool) -> Self {
        Self {
            rows,
            allow_warnings,
        }
    }

    pub fn rows(&self) -> &[PreviewRow] {
        &self.rows
    }

    pub fn allow_warnings(&self) -> bool {
        self.allow_warnings
    }

    pub fn summary(&self) -> PreviewSummary {
        PreviewSummary::from_rows(&self.rows)
    }

    pub fn is_importable(&self, row: &PreviewRow) -> bool {
        match row.status() {
            RowStatus::Ok => true,
            RowStatus::Warning => self.allow_warnings,
            RowStatus::Error => false,
        }
    }

    /// Rows eligible for commit, in input order
    pub fn importable(&self) -> Vec<&PreviewRow> {
        self.rows.iter().filter(|r| self.is_importable(r)).collect()
    }

    /// Rows excluded from commit, in input order
    pub fn excluded(&self) -> Vec<&PreviewRow> {
        self.rows.iter().filter(|r| !self.is_importable(r)).collect()
    }

    /// Look up a row by its sheet index
    pub fn get(&self, index: usize) -> Option<&PreviewRow> {
        self.rows.iter().find(|r| r.index() == index)
    }
}
