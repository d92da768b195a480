//! SQLite backend for project databases

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, ToSql};
use tracing::debug;

use super::{
    fold_key, Backend, BackendError, ColumnKind, Filter, Query, Record, TableDef, Value,
    ACTIVE_COLUMN, CREATED_COLUMN, ID_COLUMN,
};

/// SQL function used by unique indexes and case-insensitive filters
const FOLD_FUNCTION: &str = "fold_key";

/// Backend over a SQLite database file
pub struct SqliteBackend {
    conn: Connection,
    tables: BTreeMap<String, TableDef>,
}

impl SqliteBackend {
    /// Open (or create) a database and make sure every table exists
    pub fn open(path: &Path, tables: &[TableDef]) -> Result<Self, BackendError> {
        let conn = Connection::open(path).map_err(db_error)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(db_error)?;
        Self::with_connection(conn, tables)
    }

    /// Database that lives only as long as the backend
    pub fn open_in_memory(tables: &[TableDef]) -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::with_connection(conn, tables)
    }

    fn with_connection(conn: Connection, tables: &[TableDef]) -> Result<Self, BackendError> {
        conn.create_scalar_function(
            FOLD_FUNCTION,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let value: Option<String> = ctx.get(0)?;
                Ok(value.map(|v| fold_key(&v)))
            },
        )
        .map_err(db_error)?;

        let mut backend = Self {
            conn,
            tables: tables
                .iter()
                .map(|t| (t.name.clone(), t.clone()))
                .collect(),
        };
        backend.init_schema()?;
        Ok(backend)
    }

    fn init_schema(&mut self) -> Result<(), BackendError> {
        let mut ddl = String::new();
        for def in self.tables.values() {
            ddl.push_str(&create_table_sql(def));
        }
        self.conn.execute_batch(&ddl).map_err(db_error)?;
        debug!(tables = self.tables.len(), "sqlite schema ready");
        Ok(())
    }

    fn table_def(&self, table: &str) -> Result<&TableDef, BackendError> {
        self.tables
            .get(table)
            .ok_or_else(|| BackendError::UnknownTable(table.to_string()))
    }
}

fn create_table_sql(def: &TableDef) -> String {
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", ID_COLUMN)];
    for col in &def.columns {
        columns.push(format!(
            "\"{}\" {}{}",
            col.name,
            col.kind.sql_type(),
            if col.not_null { " NOT NULL" } else { "" }
        ));
    }
    columns.push(format!("{} INTEGER NOT NULL DEFAULT 1", ACTIVE_COLUMN));
    columns.push(format!("{} TEXT", CREATED_COLUMN));

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n);\n",
        def.name,
        columns.join(",\n    ")
    );
    for unique in &def.unique {
        sql.push_str(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS \"ux_{table}_{col}\" ON \"{table}\"({func}(\"{col}\")) WHERE {active} = 1;\n",
            table = def.name,
            col = unique,
            func = FOLD_FUNCTION,
            active = ACTIVE_COLUMN,
        ));
    }
    sql
}

fn check_column(def: &TableDef, column: &str) -> Result<(), BackendError> {
    if def.has_column(column) {
        Ok(())
    } else {
        Err(BackendError::UnknownColumn {
            table: def.name.clone(),
            column: column.to_string(),
        })
    }
}

fn column_kind(def: &TableDef, column: &str) -> Option<ColumnKind> {
    if column == ACTIVE_COLUMN {
        return Some(ColumnKind::Bool);
    }
    def.columns
        .iter()
        .find(|c| c.name == column)
        .map(|c| c.kind)
}

fn db_error(e: rusqlite::Error) -> BackendError {
    BackendError::Database(e.to_string())
}

fn write_error(table: &str, e: rusqlite::Error) -> BackendError {
    match e {
        rusqlite::Error::SqliteFailure(err, message)
            if err.code == ErrorCode::ConstraintViolation =>
        {
            BackendError::Constraint {
                table: table.to_string(),
                message: message.unwrap_or_else(|| err.to_string()),
            }
        }
        other => db_error(other),
    }
}

fn read_value(value: ValueRef<'_>, kind: Option<ColumnKind>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if kind == Some(ColumnKind::Bool) => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bool(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
        })
    }
}

impl Backend for SqliteBackend {
    fn select(&self, query: &Query) -> Result<Vec<Record>, BackendError> {
        let def = self.table_def(&query.table)?;

        let mut params: Vec<Value> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();
        for filter in &query.filters {
            match filter {
                Filter::Eq(column, value) => {
                    check_column(def, column)?;
                    if value.is_null() {
                        clauses.push(format!("\"{}\" IS NULL", column));
                    } else {
                        params.push(value.clone());
                        clauses.push(format!("\"{}\" = ?{}", column, params.len()));
                    }
                }
                Filter::InIgnoreCase(column, keys) => {
                    check_column(def, column)?;
                    if keys.is_empty() {
                        clauses.push("0".to_string());
                        continue;
                    }
                    let mut placeholders = Vec::with_capacity(keys.len());
                    for key in keys {
                        params.push(Value::Text(fold_key(key)));
                        placeholders.push(format!("?{}", params.len()));
                    }
                    clauses.push(format!(
                        "{}(\"{}\") IN ({})",
                        FOLD_FUNCTION,
                        column,
                        placeholders.join(", ")
                    ));
                }
            }
        }

        let mut sql = format!("SELECT * FROM \"{}\"", def.name);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        match &query.order_by {
            Some(column) => {
                check_column(def, column)?;
                sql.push_str(&format!(
                    " ORDER BY {}(\"{}\"), {}",
                    FOLD_FUNCTION, column, ID_COLUMN
                ));
            }
            None => sql.push_str(&format!(" ORDER BY {}", ID_COLUMN)),
        }

        let mut stmt = self.conn.prepare(&sql).map_err(db_error)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let kinds: Vec<Option<ColumnKind>> = names.iter().map(|n| column_kind(def, n)).collect();

        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let mut record = Record::new();
                for (i, name) in names.iter().enumerate() {
                    record.insert(name.clone(), read_value(row.get_ref(i)?, kinds[i]));
                }
                Ok(record)
            })
            .map_err(db_error)?;

        let records = rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?;
        Ok(records)
    }

    fn insert(&mut self, table: &str, rows: &[Record]) -> Result<Vec<i64>, BackendError> {
        let def = self.table_def(table)?.clone();
        for row in rows {
            for column in row.keys() {
                check_column(&def, column)?;
            }
        }

        let created = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().map_err(db_error)?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let mut columns: Vec<&str> = Vec::new();
            let mut values: Vec<Value> = Vec::new();
            for (column, value) in row {
                if column == ID_COLUMN {
                    continue;
                }
                columns.push(column.as_str());
                values.push(value.clone());
            }
            if !row.contains_key(ACTIVE_COLUMN) {
                columns.push(ACTIVE_COLUMN);
                values.push(Value::Bool(true));
            }
            if !row.contains_key(CREATED_COLUMN) {
                columns.push(CREATED_COLUMN);
                values.push(Value::Text(created.clone()));
            }

            let sql = format!(
                "INSERT INTO \"{}\" ({}) VALUES ({})",
                def.name,
                columns
                    .iter()
                    .map(|c| format!("\"{}\"", c))
                    .collect::<Vec<_>>()
                    .join(", "),
                (1..=values.len())
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            tx.execute(&sql, params_from_iter(values.iter()))
                .map_err(|e| write_error(table, e))?;
            ids.push(tx.last_insert_rowid());
        }
        tx.commit().map_err(|e| write_error(table, e))?;

        debug!(table, rows = ids.len(), "inserted rows");
        Ok(ids)
    }

    fn update(&mut self, table: &str, id: i64, changes: &Record) -> Result<(), BackendError> {
        let def = self.table_def(table)?;
        let mut assignments = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        for (column, value) in changes {
            if column == ID_COLUMN {
                continue;
            }
            check_column(def, column)?;
            values.push(value.clone());
            assignments.push(format!("\"{}\" = ?{}", column, values.len()));
        }
        if assignments.is_empty() {
            return Ok(());
        }
        values.push(Value::Integer(id));
        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE {} = ?{}",
            def.name,
            assignments.join(", "),
            ID_COLUMN,
            values.len()
        );

        let changed = self
            .conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(|e| write_error(table, e))?;
        if changed == 0 {
            return Err(BackendError::NotFound {
                table: table.to_string(),
                id,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::ColumnDef;
    use tempfile::tempdir;

    fn linhas() -> TableDef {
        TableDef::new("linhas")
            .column(ColumnDef::new("nome", ColumnKind::Text).not_null())
            .column(ColumnDef::new("diametro", ColumnKind::Real))
            .unique("nome")
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_insert_and_select_ordered() {
        let mut backend = SqliteBackend::open_in_memory(&[linhas()]).unwrap();
        backend
            .insert(
                "linhas",
                &[
                    record(&[("nome", "Linha B".into())]),
                    record(&[("nome", "linha a".into()), ("diametro", 4.5.into())]),
                ],
            )
            .unwrap();

        let rows = backend
            .select(&Query::table("linhas").active().order_by("nome"))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["nome"], Value::Text("linha a".into()));
        assert_eq!(rows[0]["diametro"], Value::Real(4.5));
        assert_eq!(rows[0]["ativo"], Value::Bool(true));
        assert!(rows[1]["diametro"].is_null());
    }

    #[test]
    fn test_unique_is_case_insensitive_and_atomic() {
        let mut backend = SqliteBackend::open_in_memory(&[linhas()]).unwrap();
        backend
            .insert("linhas", &[record(&[("nome", "Linha A".into())])])
            .unwrap();

        let err = backend
            .insert(
                "linhas",
                &[
                    record(&[("nome", "Linha C".into())]),
                    record(&[("nome", "LINHA A".into())]),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, BackendError::Constraint { .. }));

        // The whole call rolled back
        let rows = backend.select(&Query::table("linhas")).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_deactivated_rows_free_their_key() {
        let mut backend = SqliteBackend::open_in_memory(&[linhas()]).unwrap();
        let ids = backend
            .insert("linhas", &[record(&[("nome", "Linha A".into())])])
            .unwrap();
        backend.deactivate("linhas", ids[0]).unwrap();

        assert!(backend
            .select(&Query::table("linhas").active())
            .unwrap()
            .is_empty());
        backend
            .insert("linhas", &[record(&[("nome", "linha a".into())])])
            .unwrap();
    }

    #[test]
    fn test_filter_in_ignore_case() {
        let mut backend = SqliteBackend::open_in_memory(&[linhas()]).unwrap();
        backend
            .insert(
                "linhas",
                &[
                    record(&[("nome", "Área Norte".into())]),
                    record(&[("nome", "Linha B".into())]),
                ],
            )
            .unwrap();

        let rows = backend
            .select(
                &Query::table("linhas")
                    .filter_in_ignore_case("nome", vec!["ÁREA NORTE".into(), "x".into()]),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);

        let none = backend
            .select(&Query::table("linhas").filter_in_ignore_case("nome", vec![]))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_unknown_table_and_column() {
        let backend = SqliteBackend::open_in_memory(&[linhas()]).unwrap();
        assert!(matches!(
            backend.select(&Query::table("nada")),
            Err(BackendError::UnknownTable(_))
        ));
        assert!(matches!(
            backend.select(&Query::table("linhas").filter_eq("x; DROP", 1_i64)),
            Err(BackendError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_update_missing_row() {
        let mut backend = SqliteBackend::open_in_memory(&[linhas()]).unwrap();
        let err = backend.deactivate("linhas", 42).unwrap_err();
        assert!(matches!(err, BackendError::NotFound { id: 42, .. }));
    }

    #[test]
    fn test_reopen_file_keeps_data() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("cadastro.db");
        {
            let mut backend = SqliteBackend::open(&path, &[linhas()]).unwrap();
            backend
                .insert("linhas", &[record(&[("nome", "Linha A".into())])])
                .unwrap();
        }
        let backend = SqliteBackend::open(&path, &[linhas()]).unwrap();
        assert_eq!(backend.select(&Query::table("linhas")).unwrap().len(), 1);
    }
}
