use serde::{Deserialize, Serialize};

use super::cell::CellValue;
use super::services::ImportMode;
use super::source::DriveFile;

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub mode: ImportMode,
}

/// JSON import body: a cloud drive path, or positional rows from older
/// sheets without headers.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub file_path: Option<String>,
    pub rows: Option<Vec<Vec<CellValue>>>,
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<DriveFile>,
}
