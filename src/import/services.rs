use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};

use super::columns::{map_headers, CanonicalField, ColumnMapping};
use super::importer::{BatchReport, Importer, RowTally};
use super::source::{ExcelSource, RawSheet};
use super::store::SubscriptionSink;
use super::values::normalize_row;
use crate::config::ImportConfig;
use crate::error::ApiResult;
use crate::subscriptions::model::NewSubscription;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Deduplicated upserts in paced batches.
    #[default]
    Batch,
    /// Insert new clients one by one, leave existing ones alone.
    Rows,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ImportResult {
    Batch(BatchReport),
    Rows(RowTally),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    #[serde(flatten)]
    pub result: ImportResult,
    pub column_mapping: BTreeMap<String, &'static str>,
    pub skipped_columns: Vec<String>,
}

/// Maps the headers and normalizes every row of a sheet.
pub fn prepare(sheet: &RawSheet, now: OffsetDateTime) -> (Vec<NewSubscription>, ColumnMapping) {
    let mapping = map_headers(&sheet.headers);
    if !mapping.mapped.iter().any(|(_, f)| *f == CanonicalField::ClientName) {
        warn!(headers = ?sheet.headers, "no client name column found");
    }
    let rows = sheet
        .rows
        .iter()
        .map(|row| normalize_row(row, &mapping).into_new(now))
        .collect();
    (rows, mapping)
}

pub async fn run_import(
    sink: &dyn SubscriptionSink,
    config: &ImportConfig,
    sheet: RawSheet,
    mode: ImportMode,
    now: OffsetDateTime,
) -> ApiResult<ImportOutcome> {
    let (rows, mapping) = prepare(&sheet, now);
    info!(
        rows = rows.len(),
        mapped = mapping.mapped.len(),
        skipped = mapping.skipped.len(),
        ?mode,
        "import started"
    );

    let importer = Importer::new(sink, config);
    let result = match mode {
        ImportMode::Batch => ImportResult::Batch(importer.import_batched(rows).await?),
        ImportMode::Rows => ImportResult::Rows(importer.import_rows(rows).await),
    };

    Ok(ImportOutcome {
        result,
        column_mapping: mapping.report(),
        skipped_columns: mapping.skipped,
    })
}

/// Fetches the first worksheet of `path` from `source` and imports it.
pub async fn import_from_source(
    source: &dyn ExcelSource,
    path: &str,
    sink: &dyn SubscriptionSink,
    config: &ImportConfig,
    mode: ImportMode,
) -> ApiResult<ImportOutcome> {
    let sheet = source.get_content(path).await?;
    run_import(sink, config, sheet, mode, OffsetDateTime::now_utc()).await
}
