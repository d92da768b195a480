//! Spreadsheet reading and writing
//!
//! Workbooks (`.xlsx`, `.xlsm`, `.xls`, `.ods`) are read with calamine and
//! CSV files with the csv crate. The first row holds the headers; headers are
//! matched exactly after trimming surrounding whitespace.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::Timelike;
use miette::Diagnostic;
use rust_xlsxwriter::{Format, Workbook};
use thiserror::Error;

use super::rules::ImportSchema;

/// Errors reading or writing spreadsheets
#[derive(Debug, Error, Diagnostic)]
pub enum SheetError {
    #[error("IO error: {0}")]
    #[diagnostic(code(cadastro::sheet::io))]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    #[diagnostic(code(cadastro::sheet::csv))]
    Csv(#[from] csv::Error),

    #[error("failed to read workbook: {0}")]
    #[diagnostic(code(cadastro::sheet::workbook))]
    Workbook(String),

    #[error("failed to write workbook: {0}")]
    #[diagnostic(code(cadastro::sheet::xlsx_write))]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("worksheet '{0}' not found")]
    #[diagnostic(code(cadastro::sheet::not_found))]
    SheetNotFound(String),

    #[error("workbook has no worksheets")]
    #[diagnostic(code(cadastro::sheet::empty_workbook))]
    NoWorksheet,

    #[error("unsupported file type '{0}'")]
    #[diagnostic(
        code(cadastro::sheet::unsupported),
        help("use .xlsx, .xlsm, .xls, .ods or .csv")
    )]
    UnsupportedFormat(String),

    #[error("spreadsheet has no header row")]
    #[diagnostic(
        code(cadastro::sheet::no_headers),
        help("the first row must contain the column names of the import template")
    )]
    NoHeaders,
}

/// A raw spreadsheet record: header to cell text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRow {
    line: usize,
    cells: BTreeMap<String, String>,
}

impl ImportRow {
    /// Empty row at the given 1-based spreadsheet line
    pub fn new(line: usize) -> Self {
        Self {
            line,
            cells: BTreeMap::new(),
        }
    }

    /// Builder-style cell setter
    pub fn with(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(header, value);
        self
    }

    pub fn set(&mut self, header: impl Into<String>, value: impl Into<String>) {
        self.cells.insert(header.into(), value.into());
    }

    /// Cell value, trimmed; `None` when the column is absent or blank
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .get(header)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Raw cell text as read, for re-export
    pub fn raw(&self, header: &str) -> &str {
        self.cells.get(header).map(String::as_str).unwrap_or("")
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.trim().is_empty())
    }
}

/// A parsed worksheet
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    headers: Vec<String>,
    rows: Vec<ImportRow>,
}

impl Sheet {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[ImportRow] {
        &self.rows
    }

    /// Read a spreadsheet file; `sheet_name` selects a worksheet (default: first)
    pub fn from_path(path: &Path, sheet_name: Option<&str>) -> Result<Self, SheetError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => {
                let file = File::open(path)?;
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Self::from_csv_reader(BufReader::new(file), name)
            }
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Self::from_workbook(path, sheet_name),
            other => Err(SheetError::UnsupportedFormat(other.to_string())),
        }
    }

    fn from_workbook(path: &Path, sheet_name: Option<&str>) -> Result<Self, SheetError> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| SheetError::Workbook(e.to_string()))?;

        let names = workbook.sheet_names().to_vec();
        let name = match sheet_name {
            Some(wanted) => names
                .iter()
                .find(|n| n.as_str() == wanted)
                .cloned()
                .ok_or_else(|| SheetError::SheetNotFound(wanted.to_string()))?,
            None => names.first().cloned().ok_or(SheetError::NoWorksheet)?,
        };

        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| SheetError::Workbook(e.to_string()))?;
        Self::from_range(name, &range)
    }

    /// Build a sheet from a calamine cell range
    pub fn from_range(name: String, range: &Range<Data>) -> Result<Self, SheetError> {
        let mut rows_iter = range.rows();
        let headers: Vec<String> = rows_iter
            .next()
            .ok_or(SheetError::NoHeaders)?
            .iter()
            .map(|c| cell_text(c).unwrap_or_default())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(SheetError::NoHeaders);
        }

        let mut rows = Vec::new();
        for (offset, cells) in rows_iter.enumerate() {
            let mut row = ImportRow::new(offset + 2);
            for (header, cell) in headers.iter().zip(cells) {
                if header.is_empty() {
                    continue;
                }
                if let Some(text) = cell_text(cell) {
                    row.set(header.clone(), text);
                }
            }
            if !row.is_blank() {
                rows.push(row);
            }
        }

        Ok(Self {
            name,
            headers,
            rows,
        })
    }

    /// Build a sheet from CSV text with a header row
    pub fn from_csv_reader<R: Read>(reader: R, name: String) -> Result<Self, SheetError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(SheetError::NoHeaders);
        }

        let mut rows = Vec::new();
        for (offset, record) in rdr.records().enumerate() {
            let record = record?;
            let mut row = ImportRow::new(offset + 2);
            for (header, value) in headers.iter().zip(record.iter()) {
                if !header.is_empty() && !value.trim().is_empty() {
                    row.set(header.clone(), value.trim());
                }
            }
            if !row.is_blank() {
                rows.push(row);
            }
        }

        Ok(Self {
            name,
            headers,
            rows,
        })
    }

    /// Template headers that are required but absent from this sheet
    pub fn missing_headers<'s>(&self, schema: &'s ImportSchema) -> Vec<&'s str> {
        schema
            .fields
            .iter()
            .filter(|f| f.is_required() && !self.headers.contains(&f.header))
            .map(|f| f.header.as_str())
            .collect()
    }

    /// Headers in this sheet that the template does not know
    pub fn unknown_headers(&self, schema: &ImportSchema) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| !h.is_empty() && schema.field_by_header(h).is_none())
            .map(String::as_str)
            .collect()
    }
}

/// Cell text as the validator sees it
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(d) if d.num_seconds_from_midnight() == 0 => d.date().to_string(),
            Some(d) => d.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Write a header row plus data rows; `.xlsx` gets a workbook, anything else CSV
pub fn write_table(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<(), SheetError> {
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("xlsx"))
        .unwrap_or(false);

    if is_xlsx {
        write_xlsx(path, headers, rows)
    } else {
        let file = File::create(path)?;
        write_csv(file, headers, rows)
    }
}

/// Write CSV to any writer
pub fn write_csv<W: Write>(writer: W, headers: &[String], rows: &[Vec<String>]) -> Result<(), SheetError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_xlsx(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<(), SheetError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Importacao")?;

    for (col, header) in headers.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, header, &bold)?;
        worksheet.set_column_width(col, (header.chars().count().max(12) + 2) as f64)?;
    }
    for (r, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            worksheet.write_string((r + 1) as u32, col as u16, value)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}
