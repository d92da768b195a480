//! In-process backend with the same constraint semantics as SQLite

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;

use super::{
    fold_key, Backend, BackendError, Filter, Query, Record, TableDef, Value, ACTIVE_COLUMN,
    CREATED_COLUMN, ID_COLUMN,
};

struct MemTable {
    def: TableDef,
    rows: Vec<Record>,
    next_id: i64,
}

impl MemTable {
    fn is_active(row: &Record) -> bool {
        row.get(ACTIVE_COLUMN)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    fn check_columns(&self, row: &Record) -> Result<(), BackendError> {
        for column in row.keys() {
            if !self.def.has_column(column) {
                return Err(BackendError::UnknownColumn {
                    table: self.def.name.clone(),
                    column: column.clone(),
                });
            }
        }
        for col in self.def.columns.iter().filter(|c| c.not_null) {
            if row.get(&col.name).map_or(true, Value::is_null) {
                return Err(BackendError::Constraint {
                    table: self.def.name.clone(),
                    message: format!("NOT NULL constraint failed: {}.{}", self.def.name, col.name),
                });
            }
        }
        Ok(())
    }

    /// Folded keys of active rows for a unique column, skipping `except_id`
    fn active_keys(&self, column: &str, except_id: Option<i64>) -> HashSet<String> {
        self.rows
            .iter()
            .filter(|r| Self::is_active(r))
            .filter(|r| except_id.is_none() || r.get(ID_COLUMN).and_then(Value::as_i64) != except_id)
            .filter_map(|r| r.get(column).and_then(Value::as_str).map(fold_key))
            .collect()
    }

    fn unique_violation(&self, column: &str, key: &str) -> BackendError {
        BackendError::Constraint {
            table: self.def.name.clone(),
            message: format!("UNIQUE constraint failed: {}.{} ({})", self.def.name, column, key),
        }
    }
}

fn matches(row: &Record, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, expected) => {
            let actual = row.get(column).unwrap_or(&Value::Null);
            match (actual.as_bool(), expected) {
                (Some(b), Value::Bool(e)) => b == *e,
                _ => actual == expected,
            }
        }
        Filter::InIgnoreCase(column, keys) => {
            let Some(value) = row.get(column).and_then(Value::as_str) else {
                return false;
            };
            let folded = fold_key(value);
            keys.iter().any(|k| fold_key(k) == folded)
        }
    }
}

/// Backend that keeps every table in memory
#[derive(Default)]
pub struct MemoryBackend {
    tables: BTreeMap<String, MemTable>,
}

impl MemoryBackend {
    pub fn new(tables: &[TableDef]) -> Self {
        Self {
            tables: tables
                .iter()
                .map(|def| {
                    (
                        def.name.clone(),
                        MemTable {
                            def: def.clone(),
                            rows: Vec::new(),
                            next_id: 1,
                        },
                    )
                })
                .collect(),
        }
    }

    fn table(&self, name: &str) -> Result<&MemTable, BackendError> {
        self.tables
            .get(name)
            .ok_or_else(|| BackendError::UnknownTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemTable, BackendError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| BackendError::UnknownTable(name.to_string()))
    }

    /// Number of rows (active or not) stored in a table
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows.len())
    }
}

impl Backend for MemoryBackend {
    fn select(&self, query: &Query) -> Result<Vec<Record>, BackendError> {
        let table = self.table(&query.table)?;
        for filter in &query.filters {
            let column = match filter {
                Filter::Eq(c, _) | Filter::InIgnoreCase(c, _) => c,
            };
            if !table.def.has_column(column) {
                return Err(BackendError::UnknownColumn {
                    table: table.def.name.clone(),
                    column: column.clone(),
                });
            }
        }

        let mut rows: Vec<Record> = table
            .rows
            .iter()
            .filter(|r| query.filters.iter().all(|f| matches(r, f)))
            .cloned()
            .collect();

        if let Some(order) = &query.order_by {
            if !table.def.has_column(order) {
                return Err(BackendError::UnknownColumn {
                    table: table.def.name.clone(),
                    column: order.clone(),
                });
            }
            rows.sort_by_key(|r| {
                r.get(order)
                    .map(|v| fold_key(&v.to_string()))
                    .unwrap_or_default()
            });
        }
        Ok(rows)
    }

    fn insert(&mut self, table: &str, rows: &[Record]) -> Result<Vec<i64>, BackendError> {
        let mem = self.table_mut(table)?;

        // Validate the whole batch before touching storage
        let mut taken: BTreeMap<String, HashSet<String>> = mem
            .def
            .unique
            .iter()
            .map(|c| (c.clone(), mem.active_keys(c, None)))
            .collect();
        for row in rows {
            mem.check_columns(row)?;
            if !MemTable::is_active(row) {
                continue;
            }
            for (column, keys) in taken.iter_mut() {
                if let Some(key) = row.get(column).and_then(Value::as_str) {
                    if !keys.insert(fold_key(key)) {
                        return Err(mem.unique_violation(column, key));
                    }
                }
            }
        }

        let created = Utc::now().to_rfc3339();
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id = mem.next_id;
            mem.next_id += 1;

            let mut stored = row.clone();
            stored.insert(ID_COLUMN.to_string(), Value::Integer(id));
            stored
                .entry(ACTIVE_COLUMN.to_string())
                .or_insert(Value::Bool(true));
            stored
                .entry(CREATED_COLUMN.to_string())
                .or_insert_with(|| Value::Text(created.clone()));
            for col in &mem.def.columns {
                stored.entry(col.name.clone()).or_insert(Value::Null);
            }
            mem.rows.push(stored);
            ids.push(id);
        }
        Ok(ids)
    }

    fn update(&mut self, table: &str, id: i64, changes: &Record) -> Result<(), BackendError> {
        let mem = self.table_mut(table)?;
        for column in changes.keys() {
            if !mem.def.has_column(column) {
                return Err(BackendError::UnknownColumn {
                    table: mem.def.name.clone(),
                    column: column.clone(),
                });
            }
        }
        let position = mem
            .rows
            .iter()
            .position(|r| r.get(ID_COLUMN).and_then(Value::as_i64) == Some(id))
            .ok_or_else(|| BackendError::NotFound {
                table: table.to_string(),
                id,
            })?;

        let mut updated = mem.rows[position].clone();
        for (column, value) in changes {
            if column != ID_COLUMN {
                updated.insert(column.clone(), value.clone());
            }
        }
        if MemTable::is_active(&updated) {
            for column in &mem.def.unique {
                if let Some(key) = updated.get(column).and_then(Value::as_str) {
                    if mem.active_keys(column, Some(id)).contains(&fold_key(key)) {
                        return Err(mem.unique_violation(column, key));
                    }
                }
            }
        }
        mem.rows[position] = updated;
        Ok(())
    }
}
