use serde::de::DeserializeOwned;
use sqlx::FromRow;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use super::model::{DatabaseDetails, HostingDetails, Subscription};

/// Raw `subscriptions` row; enums are stored as text.
#[derive(Debug, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub client_name: String,
    pub frequency: String,
    pub wp_theme: Option<String>,
    pub php_version: Option<String>,
    pub ga4_status: String,
    pub analytics_check: bool,
    pub last_update: Option<OffsetDateTime>,
    pub next_update_due: Option<OffsetDateTime>,
    pub update_status: String,
    pub updated_by: Option<Uuid>,
    pub comments: Option<String>,
    pub comment_updated_at: Option<OffsetDateTime>,
    pub comment_updated_by: Option<Uuid>,
    pub hosting_details: Option<serde_json::Value>,
    pub database_details: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Credential blobs written by older clients are JSON strings holding JSON,
/// so both shapes are accepted. Unreadable blobs are dropped.
fn decode_blob<T: DeserializeOwned>(id: Uuid, column: &str, value: Option<serde_json::Value>) -> Option<T> {
    let value = match value? {
        serde_json::Value::Null => return None,
        serde_json::Value::String(s) => serde_json::from_str(&s),
        other => serde_json::from_value(other),
    };
    match value {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(%id, column, error = %e, "unreadable credential blob");
            None
        }
    }
}

impl From<SubscriptionRow> for Subscription {
    fn from(r: SubscriptionRow) -> Self {
        Self {
            hosting_details: decode_blob::<HostingDetails>(r.id, "hosting_details", r.hosting_details),
            database_details: decode_blob::<DatabaseDetails>(r.id, "database_details", r.database_details),
            id: r.id,
            client_name: r.client_name,
            frequency: r.frequency.parse().unwrap_or_default(),
            wp_theme: r.wp_theme,
            php_version: r.php_version,
            ga4_status: r.ga4_status.parse().unwrap_or_default(),
            analytics_check: r.analytics_check,
            last_update: r.last_update,
            next_update_due: r.next_update_due,
            update_status: r.update_status.parse().unwrap_or_default(),
            updated_by: r.updated_by,
            comments: r.comments,
            comment_updated_at: r.comment_updated_at,
            comment_updated_by: r.comment_updated_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
