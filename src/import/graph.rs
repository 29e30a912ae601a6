//! OneDrive workbooks through the Microsoft Graph REST API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::broker::IdentityBroker;
use super::cell::CellValue;
use super::source::{DriveFile, ExcelSource, RawSheet, SourceError};
use crate::config::GraphConfig;

#[derive(Debug, Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParentReference {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveItem {
    id: String,
    name: String,
    web_url: Option<String>,
    parent_reference: Option<ParentReference>,
}

#[derive(Debug, Deserialize)]
struct Worksheet {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct UsedRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Path relative to the drive root, e.g. `Klanten/abonnementen.xlsx`.
fn drive_relative_path(item: &DriveItem) -> String {
    let parent = item
        .parent_reference
        .as_ref()
        .and_then(|p| p.path.as_deref())
        .and_then(|p| p.split_once("root:"))
        .map(|(_, rest)| rest.trim_matches('/'))
        .unwrap_or("");
    if parent.is_empty() {
        item.name.clone()
    } else {
        format!("{parent}/{}", item.name)
    }
}

pub struct GraphDriveSource {
    http: reqwest::Client,
    base_url: String,
    drive_path: String,
    broker: Arc<dyn IdentityBroker>,
}

impl GraphDriveSource {
    pub fn new(http: reqwest::Client, config: &GraphConfig, broker: Arc<dyn IdentityBroker>) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            drive_path: config.drive_path.clone(),
            broker,
        }
    }

    fn url<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Result<Url, SourceError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| SourceError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(self.drive_path.split('/').filter(|s| !s.is_empty()))
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, SourceError> {
        let token = self
            .broker
            .access_token()
            .await?
            .ok_or(SourceError::NotConnected)?;

        debug!(%url, "graph request");
        let resp = self.http.get(url).bearer_auth(token).send().await?;
        match resp.status() {
            status if status.is_success() => Ok(resp.json::<T>().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(what, "graph rejected the token");
                Err(SourceError::NotConnected)
            }
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(what.to_string())),
            status => Err(SourceError::Api {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl ExcelSource for GraphDriveSource {
    #[instrument(skip(self))]
    async fn list_files(&self) -> Result<Vec<DriveFile>, SourceError> {
        let url = self.url(["root", "search(q='.xlsx')"])?;
        let found: ValueList<DriveItem> = self.get_json(url, "drive search").await?;
        Ok(found
            .value
            .into_iter()
            .filter(|item| item.name.to_lowercase().ends_with(".xlsx"))
            .map(|item| DriveFile {
                path: drive_relative_path(&item),
                id: item.id,
                name: item.name,
                web_url: item.web_url,
            })
            .collect())
    }

    /// Reads the used range of the first worksheet.
    #[instrument(skip(self))]
    async fn get_content(&self, path: &str) -> Result<RawSheet, SourceError> {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        let Some((last, dirs)) = parts.split_last() else {
            return Err(SourceError::NotFound(path.to_string()));
        };
        let tail = format!("{last}:");
        let item_url = self.url(
            std::iter::once("root:")
                .chain(dirs.iter().copied())
                .chain(std::iter::once(tail.as_str())),
        )?;
        let item: DriveItem = self.get_json(item_url, path).await?;

        let sheets_url = self.url(["items", item.id.as_str(), "workbook", "worksheets"])?;
        let sheets: ValueList<Worksheet> = self.get_json(sheets_url, path).await?;
        let first = sheets
            .value
            .first()
            .ok_or_else(|| SourceError::Empty(path.to_string()))?;
        debug!(sheet = %first.name, "reading used range");

        let range_url = self.url([
            "items",
            item.id.as_str(),
            "workbook",
            "worksheets",
            first.id.as_str(),
            "usedRange",
        ])?;
        let range: UsedRange = self.get_json(range_url, path).await?;

        let grid = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(CellValue::from).collect())
            .collect();
        let sheet = RawSheet::from_grid(grid);
        if sheet.headers.is_empty() {
            return Err(SourceError::Empty(path.to_string()));
        }
        Ok(sheet)
    }
}
