//! Uniform view over the places a subscription sheet can come from.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use super::cell::CellValue;

#[derive(Debug, Error)]
pub enum SourceError {
    /// No usable token for the cloud drive; the caller should reconnect.
    #[error("Not connected to Microsoft")]
    NotConnected,

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("no worksheet data in {0}")]
    Empty(String),

    #[error("unreadable workbook: {0}")]
    Workbook(String),

    #[error("invalid drive url: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("drive api returned {status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "webUrl", skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}

/// Header row plus data rows keyed by raw header text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, CellValue>>,
}

impl RawSheet {
    /// First grid row is the header row; blank header cells get a
    /// positional name so their data is still addressable.
    pub fn from_grid(grid: Vec<Vec<CellValue>>) -> Self {
        let mut lines = grid.into_iter();
        let Some(header_row) = lines.next() else {
            return Self::default();
        };
        let headers: Vec<String> = header_row
            .iter()
            .enumerate()
            .map(|(i, cell)| cell.as_text().unwrap_or_else(|| format!("column_{}", i + 1)))
            .collect();

        let rows = lines
            .map(|line| {
                headers
                    .iter()
                    .cloned()
                    .zip(line.into_iter().chain(std::iter::repeat(CellValue::Empty)))
                    .collect::<HashMap<_, _>>()
            })
            .filter(|row| row.values().any(|cell| cell.as_text().is_some()))
            .collect();

        Self { headers, rows }
    }
}

#[async_trait]
pub trait ExcelSource: Send + Sync {
    async fn list_files(&self) -> Result<Vec<DriveFile>, SourceError>;

    /// Headers and rows of the first worksheet of the file at `path`.
    async fn get_content(&self, path: &str) -> Result<RawSheet, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_becomes_named_rows_without_blank_lines() {
        let grid = vec![
            vec!["Klant".into(), "PHP".into(), CellValue::Empty],
            vec!["Acme BV".into(), CellValue::Number(8.1)],
            vec![CellValue::Empty, CellValue::Text("  ".into()), CellValue::Empty],
            vec!["Bakker".into(), CellValue::Empty, "extra".into()],
        ];
        let sheet = RawSheet::from_grid(grid);
        assert_eq!(sheet.headers, ["Klant", "PHP", "column_3"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0]["PHP"], CellValue::Number(8.1));
        assert_eq!(sheet.rows[0]["column_3"], CellValue::Empty);
        assert_eq!(sheet.rows[1]["column_3"], CellValue::from("extra"));
    }

    #[test]
    fn empty_grid_has_no_headers() {
        assert_eq!(RawSheet::from_grid(vec![]), RawSheet::default());
    }
}
