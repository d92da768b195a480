//! Table rendering for preview, commit outcome and record listings

use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::truncate_str;
use crate::core::backend::{Record, Value, ID_COLUMN};
use crate::import::{CommitResult, ImportSchema, Preview, PreviewRow, RowStatus};

const MESSAGE_WIDTH: usize = 70;

fn status_label(status: RowStatus) -> &'static str {
    match status {
        RowStatus::Ok => "ok",
        RowStatus::Warning => "aviso",
        RowStatus::Error => "erro",
    }
}

fn key_value(schema: &ImportSchema, row: &PreviewRow) -> String {
    schema
        .key_field()
        .and_then(|k| row.data().get(&k.header))
        .unwrap_or("-")
        .to_string()
}

/// Preview rows with their status and messages.
///
/// With `all` false only rows carrying issues are listed.
pub fn preview_table(schema: &ImportSchema, preview: &Preview, all: bool) -> Option<String> {
    let key_header = schema.key_field().map(|k| k.header.as_str()).unwrap_or("CHAVE");

    let mut builder = Builder::default();
    builder.push_record(["LINHA", "STATUS", key_header, "MENSAGENS"]);
    let mut rows = 0;
    for row in preview.rows() {
        if !all && row.issues().is_empty() {
            continue;
        }
        rows += 1;
        let messages: Vec<String> = row
            .messages()
            .iter()
            .map(|m| truncate_str(m, MESSAGE_WIDTH))
            .collect();
        builder.push_record([
            row.data().line().to_string(),
            status_label(row.status()).to_string(),
            key_value(schema, row),
            messages.join("\n"),
        ]);
    }

    if rows == 0 {
        return None;
    }
    Some(builder.build().with(Style::rounded()).to_string())
}

/// Rows that failed during commit
pub fn failures_table(schema: &ImportSchema, preview: &Preview, result: &CommitResult) -> Option<String> {
    let failures = result.failures();
    if failures.is_empty() {
        return None;
    }

    let key_header = schema.key_field().map(|k| k.header.as_str()).unwrap_or("CHAVE");
    let mut builder = Builder::default();
    builder.push_record(["LINHA", key_header, "FALHA"]);
    for (index, message) in failures {
        let (line, key) = match preview.get(index) {
            Some(row) => (row.data().line().to_string(), key_value(schema, row)),
            None => ("-".to_string(), "-".to_string()),
        };
        builder.push_record([line, key, truncate_str(message, MESSAGE_WIDTH)]);
    }
    Some(builder.build().with(Style::rounded()).to_string())
}

/// Stored records under the schema's headers
pub fn records_table(
    schema: &ImportSchema,
    records: &[Record],
    resolve: impl Fn(&str, &Value) -> String,
) -> String {
    let mut builder = Builder::default();
    let mut header = vec![ID_COLUMN.to_uppercase()];
    header.extend(schema.fields.iter().map(|f| f.header.clone()));
    builder.push_record(header);

    for record in records {
        let mut cells = vec![record.get(ID_COLUMN).map(Value::to_string).unwrap_or_default()];
        for field in &schema.fields {
            let value = record.get(&field.column).unwrap_or(&Value::Null);
            cells.push(truncate_str(&resolve(&field.column, value), 40));
        }
        builder.push_record(cells);
    }
    builder.build().with(Style::rounded()).to_string()
}
