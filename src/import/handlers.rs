use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::broker::{IdentityBroker, StaticTokenBroker};
use super::dto::{FileListResponse, ImportQuery, ImportRequest};
use super::graph::GraphDriveSource;
use super::legacy;
use super::services::{import_from_source, run_import, ImportOutcome};
use super::source::ExcelSource;
use super::workbook::{self, UploadedWorkbook, WorkbookAnalysis};
use crate::{
    auth::services::AuthUser,
    error::{ApiResult, AppError},
    state::AppState,
    subscriptions::repo::PgSubscriptionSink,
};

/// Per-request Graph token, overriding the configured broker.
pub const GRAPH_TOKEN_HEADER: &str = "x-graph-token";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/import", post(import))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
        .route("/onedrive/files", get(list_drive_files))
        .route("/excel/analyze", get(analyze_reference_workbook))
}

fn drive_source(state: &AppState, headers: &HeaderMap) -> GraphDriveSource {
    let broker: Arc<dyn IdentityBroker> = match headers
        .get(GRAPH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(token) => Arc::new(StaticTokenBroker::new(Some(token.to_string()))),
        None => state.broker.clone(),
    };
    GraphDriveSource::new(state.http.clone(), &state.config.graph, broker)
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

async fn read_upload(mut mp: Multipart) -> ApiResult<Option<UploadedWorkbook>> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.xlsx").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if data.is_empty() {
            return Ok(None);
        }
        return Ok(Some(UploadedWorkbook::new(name, data)));
    }
    Ok(None)
}

/// POST /import, multipart `file` or JSON `{filePath}` / `{rows}`.
#[instrument(skip(state, headers, request))]
pub async fn import(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ImportQuery>,
    headers: HeaderMap,
    request: Request,
) -> ApiResult<Json<ImportOutcome>> {
    let sink = PgSubscriptionSink::new(state.db.clone());
    let config = &state.config.import;

    let outcome = if is_multipart(&headers) {
        let mp = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let upload = read_upload(mp)
            .await?
            .ok_or_else(|| AppError::BadRequest("No file provided".into()))?;
        info!(%user_id, file = upload.name(), "importing uploaded workbook");
        let name = upload.name().to_string();
        import_from_source(&upload, &name, &sink, config, query.mode).await?
    } else {
        let Json(body) = Json::<ImportRequest>::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        match body {
            ImportRequest {
                file_path: Some(path),
                ..
            } if !path.trim().is_empty() => {
                info!(%user_id, %path, "importing drive workbook");
                let source = drive_source(&state, &headers);
                import_from_source(&source, path.trim(), &sink, config, query.mode).await?
            }
            ImportRequest {
                rows: Some(rows), ..
            } if !rows.is_empty() => {
                info!(%user_id, rows = rows.len(), "importing positional rows");
                let sheet = legacy::from_positional(rows);
                run_import(&sink, config, sheet, query.mode, OffsetDateTime::now_utc()).await?
            }
            _ => return Err(AppError::BadRequest("No file or path provided".into())),
        }
    };

    Ok(Json(outcome))
}

#[instrument(skip(state, headers))]
pub async fn list_drive_files(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    headers: HeaderMap,
) -> ApiResult<Json<FileListResponse>> {
    let files = drive_source(&state, &headers).list_files().await?;
    Ok(Json(FileListResponse { files }))
}

#[instrument(skip(state))]
pub async fn analyze_reference_workbook(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> ApiResult<Json<WorkbookAnalysis>> {
    let path = state.config.reference_workbook.clone();
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            AppError::NotFound(format!("Reference workbook not found: {}", path.display()))
        }
        _ => AppError::Internal(anyhow::Error::new(e).context("read reference workbook")),
    })?;
    let analysis = tokio::task::spawn_blocking(move || workbook::analyze(&bytes))
        .await
        .map_err(anyhow::Error::new)??;
    Ok(Json(analysis))
}
