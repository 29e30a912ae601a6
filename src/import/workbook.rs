//! Local spreadsheet parsing (xlsx, xls, ods) via calamine.

use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::Serialize;

use super::cell::CellValue;
use super::source::{DriveFile, ExcelSource, RawSheet, SourceError};

/// One worksheet as a grid of cells, header row included.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetGrid {
    pub name: String,
    pub grid: Vec<Vec<CellValue>>,
}

fn to_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        // dates stay serial numbers; the value normalizer converts them
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            if s.trim().is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(s.clone())
            }
        }
    }
}

/// Every worksheet in workbook order. Sheets that fail to load are
/// returned empty rather than failing the whole file.
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<SheetGrid>, SourceError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SourceError::Workbook(e.to_string()))?;

    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let grid = match workbook.worksheet_range(&name) {
            Ok(range) => range
                .rows()
                .map(|row| row.iter().map(to_cell).collect())
                .collect(),
            Err(err) => {
                tracing::warn!(sheet = %name, error = %err, "skipping unreadable worksheet");
                Vec::new()
            }
        };
        sheets.push(SheetGrid { name, grid });
    }
    Ok(sheets)
}

/// Header row and rows of the first worksheet.
pub fn first_sheet(bytes: &[u8], label: &str) -> Result<RawSheet, SourceError> {
    let first = read_workbook(bytes)?
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::Empty(label.to_string()))?;
    let sheet = RawSheet::from_grid(first.grid);
    if sheet.headers.is_empty() {
        return Err(SourceError::Empty(label.to_string()));
    }
    Ok(sheet)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub headers: Vec<String>,
    pub total_rows: usize,
    pub total_columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub unique_values: usize,
}

/// Structure report for a workbook; top-level fields describe the first
/// sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookAnalysis {
    pub headers: Vec<String>,
    pub sheet_names: Vec<String>,
    pub total_rows: usize,
    pub total_columns: usize,
    pub sheet_data: BTreeMap<String, SheetSummary>,
    pub column_summary: BTreeMap<String, ColumnSummary>,
}

fn summarize_sheet(sheet: &RawSheet) -> SheetSummary {
    SheetSummary {
        headers: sheet.headers.clone(),
        total_rows: sheet.rows.len(),
        total_columns: sheet.headers.len(),
    }
}

/// Type is the first non-text kind seen in the column, `string` otherwise.
fn summarize_columns(sheet: &RawSheet) -> BTreeMap<String, ColumnSummary> {
    sheet
        .headers
        .iter()
        .map(|header| {
            let cells = sheet.rows.iter().filter_map(|row| row.get(header));
            let mut distinct = HashSet::new();
            let mut kind = "string";
            for cell in cells {
                let Some(text) = cell.as_text() else { continue };
                if kind == "string" {
                    kind = cell.kind().unwrap_or("string");
                }
                distinct.insert(text);
            }
            (
                header.clone(),
                ColumnSummary {
                    kind,
                    unique_values: distinct.len(),
                },
            )
        })
        .collect()
}

pub fn analyze_sheets(sheets: Vec<SheetGrid>) -> Result<WorkbookAnalysis, SourceError> {
    let sheet_names: Vec<String> = sheets.iter().map(|s| s.name.clone()).collect();
    let parsed: Vec<(String, RawSheet)> = sheets
        .into_iter()
        .map(|s| (s.name, RawSheet::from_grid(s.grid)))
        .collect();

    let (_, first) = parsed
        .first()
        .ok_or_else(|| SourceError::Empty("workbook".into()))?;
    let top = summarize_sheet(first);
    let column_summary = summarize_columns(first);

    let sheet_data = parsed
        .iter()
        .map(|(name, sheet)| (name.clone(), summarize_sheet(sheet)))
        .collect();

    Ok(WorkbookAnalysis {
        headers: top.headers,
        sheet_names,
        total_rows: top.total_rows,
        total_columns: top.total_columns,
        sheet_data,
        column_summary,
    })
}

pub fn analyze(bytes: &[u8]) -> Result<WorkbookAnalysis, SourceError> {
    analyze_sheets(read_workbook(bytes)?)
}

/// A workbook received as an upload; it is the only file it lists.
pub struct UploadedWorkbook {
    name: String,
    bytes: Bytes,
}

impl UploadedWorkbook {
    pub fn new(name: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl ExcelSource for UploadedWorkbook {
    async fn list_files(&self) -> Result<Vec<DriveFile>, SourceError> {
        Ok(vec![DriveFile {
            id: self.name.clone(),
            name: self.name.clone(),
            path: self.name.clone(),
            web_url: None,
        }])
    }

    async fn get_content(&self, path: &str) -> Result<RawSheet, SourceError> {
        if path != self.name {
            return Err(SourceError::NotFound(path.to_string()));
        }
        let bytes = self.bytes.clone();
        let label = self.name.clone();
        tokio::task::spawn_blocking(move || first_sheet(&bytes, &label))
            .await
            .map_err(|e| SourceError::Workbook(e.to_string()))?
    }
}
