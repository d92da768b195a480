//! Declarative field rules and import schemas
//!
//! An [`ImportSchema`] describes one cadastre module: the target table, the
//! spreadsheet headers it expects, and the rules each column must satisfy.
//! The validator and committer are generic over these descriptions.

use crate::core::backend::{ColumnDef, ColumnKind, TableDef};

/// Column stamped with the work-site code on every imported row
pub const CCA_COLUMN: &str = "cca";

/// How an unresolved reference affects a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    /// Unresolved value blocks the row
    Hard,
    /// Unresolved value is a warning; the link is stored as NULL
    Soft,
}

/// A lookup table consulted during validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDef {
    /// Reference set name used in lookups and messages
    pub set: &'static str,
    /// Backend table holding the rows
    pub table: &'static str,
    /// Natural key column (name or code)
    pub key_column: &'static str,
    /// Human label (singular)
    pub label: &'static str,
}

impl ReferenceDef {
    /// Table definition for a standalone lookup table
    pub fn table_def(&self) -> TableDef {
        TableDef::new(self.table)
            .column(ColumnDef::new(self.key_column, ColumnKind::Text).not_null())
            .column(ColumnDef::new("descricao", ColumnKind::Text))
            .column(ColumnDef::new(CCA_COLUMN, ColumnKind::Text))
            .unique(self.key_column)
    }
}

/// A single validation rule attached to a field
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// The cell must be present and non-blank
    Required,
    /// The value is the module's natural key; `message` is reported on duplicates
    Unique { message: String },
    /// The value names a row in a reference table
    Reference {
        reference: ReferenceDef,
        strength: Strength,
    },
    /// When present, the value must parse as a number greater than zero
    NumericPositive,
}

/// One spreadsheet column mapped to one backend column
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub header: String,
    pub column: String,
    pub rules: Vec<Rule>,
    pub example: String,
}

impl FieldSpec {
    /// Free-text column
    pub fn text(header: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            column: column.into(),
            rules: Vec::new(),
            example: String::new(),
        }
    }

    /// Optional positive number column
    pub fn number(header: impl Into<String>, column: impl Into<String>) -> Self {
        let mut field = Self::text(header, column);
        field.rules.push(Rule::NumericPositive);
        field
    }

    /// Column resolved against a reference table into an id column
    pub fn reference(
        header: impl Into<String>,
        column: impl Into<String>,
        reference: ReferenceDef,
        strength: Strength,
    ) -> Self {
        let mut field = Self::text(header, column);
        field.rules.push(Rule::Reference {
            reference,
            strength,
        });
        field
    }

    pub fn required(mut self) -> Self {
        self.rules.push(Rule::Required);
        self
    }

    pub fn unique(mut self, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Unique {
            message: message.into(),
        });
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = example.into();
        self
    }

    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::Required))
    }

    pub fn is_numeric(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::NumericPositive))
    }

    pub fn unique_message(&self) -> Option<&str> {
        self.rules.iter().find_map(|r| match r {
            Rule::Unique { message } => Some(message.as_str()),
            _ => None,
        })
    }

    pub fn reference_rule(&self) -> Option<(&ReferenceDef, Strength)> {
        self.rules.iter().find_map(|r| match r {
            Rule::Reference {
                reference,
                strength,
            } => Some((reference, *strength)),
            _ => None,
        })
    }

    /// Storage type of the backend column
    pub fn column_kind(&self) -> ColumnKind {
        if self.reference_rule().is_some() {
            ColumnKind::Integer
        } else if self.is_numeric() {
            ColumnKind::Real
        } else {
            ColumnKind::Text
        }
    }
}

/// Declarative description of one importable cadastre
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSchema {
    /// Module name used on the command line
    pub module: String,
    /// Human label (plural)
    pub label: String,
    /// Target backend table
    pub table: String,
    pub fields: Vec<FieldSpec>,
}

impl ImportSchema {
    pub fn new(
        module: impl Into<String>,
        label: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            label: label.into(),
            table: table.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Field carrying the natural unique key, if any
    pub fn key_field(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.unique_message().is_some())
    }

    pub fn field_by_header(&self, header: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.header == header)
    }

    /// Template headers in declaration order
    pub fn headers(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.header.as_str()).collect()
    }

    /// Distinct reference tables consulted by this schema
    pub fn references(&self) -> Vec<ReferenceDef> {
        let mut refs: Vec<ReferenceDef> = Vec::new();
        for (reference, _) in self.fields.iter().filter_map(FieldSpec::reference_rule) {
            if !refs.iter().any(|r| r.set == reference.set) {
                refs.push(*reference);
            }
        }
        refs
    }

    /// Backend table definition derived from the fields
    pub fn table_def(&self) -> TableDef {
        let mut def = TableDef::new(self.table.clone());
        for field in &self.fields {
            let mut column = ColumnDef::new(field.column.clone(), field.column_kind());
            if field.is_required() {
                column = column.not_null();
            }
            def = def.column(column);
        }
        def = def.column(ColumnDef::new(CCA_COLUMN, ColumnKind::Text));
        if let Some(key) = self.key_field() {
            def = def.unique(key.column.clone());
        }
        def
    }
}
