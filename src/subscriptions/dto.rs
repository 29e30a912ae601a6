use serde::Deserialize;
use time::OffsetDateTime;

use super::model::{DatabaseDetails, Frequency, Ga4Status, HostingDetails, UpdateStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    ClientName,
    Frequency,
    WpTheme,
    PhpVersion,
    Ga4Status,
    LastUpdate,
    NextUpdateDue,
    UpdateStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// `GET /subscriptions` query string.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub sort: SortField,
    #[serde(default)]
    pub dir: SortDirection,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub status: Option<UpdateStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub client_name: String,
    #[serde(default)]
    pub frequency: Frequency,
    pub wp_theme: Option<String>,
    pub php_version: Option<String>,
    #[serde(default)]
    pub ga4_status: Ga4Status,
    #[serde(default)]
    pub analytics_check: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    pub comments: Option<String>,
}

/// Full edit form as submitted by the dashboard.
#[derive(Debug, Deserialize)]
pub struct SaveSubscriptionRequest {
    pub client_name: String,
    pub frequency: Frequency,
    pub wp_theme: Option<String>,
    pub php_version: Option<String>,
    pub ga4_status: Ga4Status,
    pub analytics_check: bool,
    pub comments: Option<String>,
    pub hosting_details: Option<HostingDetails>,
    pub database_details: Option<DatabaseDetails>,
    /// Version the editor loaded; omitted means last write wins.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expected_updated_at: Option<OffsetDateTime>,
}
