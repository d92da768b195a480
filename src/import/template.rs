//! Import template export

use std::io::Write;
use std::path::Path;

use super::reference::ReferenceCache;
use super::rules::ImportSchema;
use super::sheet::{write_csv, write_table, SheetError};

/// Example rows included below the header
pub const TEMPLATE_ROWS: usize = 2;

/// Example rows for a schema. Reference columns use names currently in the
/// cache so the template imports cleanly as-is.
pub fn template_rows(schema: &ImportSchema, refs: &ReferenceCache) -> Vec<Vec<String>> {
    (0..TEMPLATE_ROWS)
        .map(|n| {
            schema
                .fields
                .iter()
                .map(|field| {
                    if let Some((reference, _)) = field.reference_rule() {
                        let names = refs.set(reference.set).map(|s| s.names()).unwrap_or(&[]);
                        if names.is_empty() {
                            field.example.clone()
                        } else {
                            names[n % names.len()].clone()
                        }
                    } else if field.unique_message().is_some() && !field.example.is_empty() {
                        format!("{}-{:03}", field.example, n + 1)
                    } else {
                        field.example.clone()
                    }
                })
                .collect()
        })
        .collect()
}

fn headers(schema: &ImportSchema) -> Vec<String> {
    schema.fields.iter().map(|f| f.header.clone()).collect()
}

/// Write the template to a file; format follows the extension
pub fn write_template(path: &Path, schema: &ImportSchema, refs: &ReferenceCache) -> Result<(), SheetError> {
    write_table(path, &headers(schema), &template_rows(schema, refs))
}

/// Write the template as CSV
pub fn write_template_csv<W: Write>(
    writer: W,
    schema: &ImportSchema,
    refs: &ReferenceCache,
) -> Result<(), SheetError> {
    write_csv(writer, &headers(schema), &template_rows(schema, refs))
}
