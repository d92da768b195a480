//! Row validation
//!
//! [`validate`] is a pure function of the row, the schema, the reference
//! cache and the set of already known natural keys. Rules run in a fixed
//! order (required, duplicate, reference, numeric) and every applicable
//! message is collected.

use std::collections::HashSet;
use std::fmt;

use crate::core::backend::fold_key;

use super::reference::ReferenceCache;
use super::rules::{FieldSpec, ImportSchema, Strength};
use super::sheet::ImportRow;

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// One validation finding on a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub severity: Severity,
    /// Header the issue refers to
    pub field: Option<String>,
    pub message: String,
}

impl Issue {
    fn error(field: &FieldSpec, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            field: Some(field.header.clone()),
            message: message.into(),
        }
    }

    fn warning(field: &FieldSpec, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field: Some(field.header.clone()),
            message: message.into(),
        }
    }
}

/// Derived classification of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Ok,
    Warning,
    Error,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Ok => "ok",
            RowStatus::Warning => "warning",
            RowStatus::Error => "error",
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated row ready for preview
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRow {
    index: usize,
    data: ImportRow,
    issues: Vec<Issue>,
}

impl PreviewRow {
    pub fn new(index: usize, data: ImportRow, issues: Vec<Issue>) -> Self {
        Self {
            index,
            data,
            issues,
        }
    }

    /// Position of the row within the uploaded sheet (0-based)
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn data(&self) -> &ImportRow {
        &self.data
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Status follows the most severe issue
    pub fn status(&self) -> RowStatus {
        match self.issues.iter().map(|i| i.severity).max() {
            None => RowStatus::Ok,
            Some(Severity::Warning) => RowStatus::Warning,
            Some(Severity::Error) => RowStatus::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status() == RowStatus::Error
    }

    /// All messages in rule order
    pub fn messages(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.message.as_str()).collect()
    }
}

/// Natural keys known to exist (persisted or earlier in the same file)
#[derive(Debug, Clone, Default)]
pub struct KnownKeys {
    keys: HashSet<String>,
}

impl KnownKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(&fold_key(key))
    }

    /// Returns false when the key was already known
    pub fn insert(&mut self, key: &str) -> bool {
        self.keys.insert(fold_key(key))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for KnownKeys {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(|k| fold_key(k.as_ref())).collect(),
        }
    }
}

/// Parse a numeric cell; accepts `.` or `,` as decimal separator
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Classify a single row
pub fn validate(
    schema: &ImportSchema,
    row: &ImportRow,
    index: usize,
    refs: &ReferenceCache,
    known: &KnownKeys,
) -> PreviewRow {
    let mut issues = Vec::new();

    for field in schema.fields.iter().filter(|f| f.is_required()) {
        if row.get(&field.header).is_none() {
            issues.push(Issue::error(
                field,
                format!("Campo obrigatório não preenchido: {}", field.header),
            ));
        }
    }

    for field in &schema.fields {
        if let (Some(message), Some(value)) = (field.unique_message(), row.get(&field.header)) {
            if known.contains(value) {
                issues.push(Issue::error(field, message));
            }
        }
    }

    for field in &schema.fields {
        let Some((reference, strength)) = field.reference_rule() else {
            continue;
        };
        let Some(value) = row.get(&field.header) else {
            continue;
        };
        if refs.find(reference.set, value).is_some() {
            continue;
        }
        match strength {
            Strength::Hard => issues.push(Issue::error(
                field,
                format!("{} não encontrado(a) em {}: '{}'", reference.label, field.header, value),
            )),
            Strength::Soft => issues.push(Issue::warning(
                field,
                format!(
                    "{} não encontrado(a) em {}: '{}' (será salvo sem vínculo)",
                    reference.label, field.header, value
                ),
            )),
        }
    }

    for field in schema.fields.iter().filter(|f| f.is_numeric()) {
        if let Some(value) = row.get(&field.header) {
            if !parse_number(value).is_some_and(|n| n > 0.0) {
                issues.push(Issue::error(
                    field,
                    format!("{} deve ser um número positivo: '{}'", field.header, value),
                ));
            }
        }
    }

    PreviewRow::new(index, row.clone(), issues)
}

/// Validate a whole sheet.
///
/// The known-key set starts from the persisted keys and grows with every row
/// that has no errors, so a key repeated inside the file is a duplicate from
/// its second valid occurrence. Rows with errors never claim a key.
pub fn validate_all(
    schema: &ImportSchema,
    rows: &[ImportRow],
    refs: &ReferenceCache,
    persisted: &KnownKeys,
) -> Vec<PreviewRow> {
    let key_header = schema.key_field().map(|f| f.header.as_str());
    let mut known = persisted.clone();

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let preview = validate(schema, row, index, refs, &known);
            if !preview.is_error() {
                if let Some(key) = key_header.and_then(|h| row.get(h)) {
                    known.insert(key);
                }
            }
            preview
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::reference::ReferenceSet;
    use crate::import::rules::ReferenceDef;

    const LINHAS: ReferenceDef = ReferenceDef {
        set: "linhas",
        table: "linhas",
        key_column: "nome",
        label: "Linha",
    };

    const AREAS: ReferenceDef = ReferenceDef {
        set: "areas",
        table: "areas",
        key_column: "nome",
        label: "Área",
    };

    fn juntas() -> ImportSchema {
        ImportSchema::new("juntas", "Juntas", "juntas")
            .field(
                FieldSpec::text("NUMERO_JUNTA", "numero_junta")
                    .required()
                    .unique("Junta já existe no sistema"),
            )
            .field(FieldSpec::reference("LINHA", "linha_id", LINHAS, Strength::Hard).required())
            .field(FieldSpec::reference("ÁREA", "area_id", AREAS, Strength::Soft))
            .field(FieldSpec::number("DIAMETRO", "diametro"))
    }

    fn refs() -> ReferenceCache {
        ReferenceCache::new()
            .with_set(ReferenceSet::new("linhas").with("Linha A", 1))
            .with_set(ReferenceSet::new("areas").with("Área 1", 10))
    }

    fn row(numero: &str, linha: &str) -> ImportRow {
        ImportRow::new(2)
            .with("NUMERO_JUNTA", numero)
            .with("LINHA", linha)
    }

    #[test]
    fn test_valid_row_is_ok() {
        let preview = validate(&juntas(), &row("J-001", "linha a"), 0, &refs(), &KnownKeys::new());
        assert_eq!(preview.status(), RowStatus::Ok);
        assert!(preview.issues().is_empty());
    }

    #[test]
    fn test_blank_required_field_names_the_field() {
        for blank in ["", "   "] {
            let preview = validate(&juntas(), &row(blank, "Linha A"), 0, &refs(), &KnownKeys::new());
            assert_eq!(preview.status(), RowStatus::Error);
            assert!(preview
                .messages()
                .iter()
                .any(|m| m.contains("NUMERO_JUNTA")));
        }
    }

    #[test]
    fn test_duplicate_is_error_regardless_of_other_fields() {
        let known: KnownKeys = ["j-001"].into_iter().collect();

        let good = validate(&juntas(), &row("J-001", "Linha A"), 0, &refs(), &known);
        assert_eq!(good.status(), RowStatus::Error);
        assert_eq!(good.messages(), vec!["Junta já existe no sistema"]);

        let bad = validate(
            &juntas(),
            &row("J-001", "Linha X").with("DIAMETRO", "abc"),
            0,
            &refs(),
            &known,
        );
        assert_eq!(bad.status(), RowStatus::Error);
        assert!(bad.messages().contains(&"Junta já existe no sistema"));
    }

    #[test]
    fn test_hard_reference_missing_is_error() {
        let preview = validate(&juntas(), &row("J-002", "Linha X"), 0, &refs(), &KnownKeys::new());
        assert_eq!(preview.status(), RowStatus::Error);
        assert!(preview.messages()[0].contains("'Linha X'"));
    }

    #[test]
    fn test_soft_reference_missing_is_warning() {
        let preview = validate(
            &juntas(),
            &row("J-002", "Linha A").with("ÁREA", "Área 9"),
            0,
            &refs(),
            &KnownKeys::new(),
        );
        assert_eq!(preview.status(), RowStatus::Warning);
        assert_eq!(preview.issues()[0].severity, Severity::Warning);
        assert_eq!(preview.issues()[0].field.as_deref(), Some("ÁREA"));
    }

    #[test]
    fn test_numeric_rule() {
        for (value, ok) in [("10", true), ("2,5", true), ("0", false), ("-1", false), ("abc", false)] {
            let preview = validate(
                &juntas(),
                &row("J-003", "Linha A").with("DIAMETRO", value),
                0,
                &refs(),
                &KnownKeys::new(),
            );
            assert_eq!(preview.status() == RowStatus::Ok, ok, "value {value}");
        }
    }

    #[test]
    fn test_all_rules_collected_in_order() {
        let known: KnownKeys = ["J-004"].into_iter().collect();
        let r = ImportRow::new(5)
            .with("NUMERO_JUNTA", "J-004")
            .with("ÁREA", "nenhuma")
            .with("DIAMETRO", "x");
        let preview = validate(&juntas(), &r, 3, &refs(), &known);

        let fields: Vec<_> = preview
            .issues()
            .iter()
            .map(|i| i.field.clone().unwrap())
            .collect();
        // required (LINHA) -> duplicate -> reference -> numeric
        assert_eq!(fields, vec!["LINHA", "NUMERO_JUNTA", "ÁREA", "DIAMETRO"]);
        assert_eq!(preview.status(), RowStatus::Error);
        assert_eq!(preview.index(), 3);
    }

    #[test]
    fn test_duplicate_inside_file() {
        let rows = vec![row("J-001", "Linha A"), row("J-001", "Linha A")];
        let previews = validate_all(&juntas(), &rows, &refs(), &KnownKeys::new());

        assert_eq!(previews[0].status(), RowStatus::Ok);
        assert_eq!(previews[1].status(), RowStatus::Error);
        assert_eq!(previews[1].messages(), vec!["Junta já existe no sistema"]);
    }

    #[test]
    fn test_error_row_does_not_claim_its_key() {
        let rows = vec![
            row("J-001", "Linha X"),
            row("J-001", "Linha A"),
            row("j-001", "Linha A"),
        ];
        let previews = validate_all(&juntas(), &rows, &refs(), &KnownKeys::new());

        assert_eq!(previews[0].status(), RowStatus::Error);
        assert!(!previews[0].messages().contains(&"Junta já existe no sistema"));
        assert_eq!(previews[1].status(), RowStatus::Ok);
        assert_eq!(previews[2].messages(), vec!["Junta já existe no sistema"]);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1.5"), Some(1.5));
        assert_eq!(parse_number(" 2,25 "), Some(2.25));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("1,000.5"), None);
    }
}
