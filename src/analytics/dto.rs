use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Week,
    #[default]
    Month,
    Year,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusCounts {
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrequencyCounts {
    pub monthly: usize,
    pub quarterly: usize,
    pub yearly: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserUpdates {
    pub user_id: Uuid,
    pub display_name: String,
    pub updates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentUpdate {
    pub id: Uuid,
    pub client_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_update: OffsetDateTime,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub timeframe: Timeframe,
    pub total_clients: usize,
    pub clients_with_update: usize,
    pub status: StatusCounts,
    pub frequency: FrequencyCounts,
    pub updates_in_timeframe: usize,
    pub updates_by_user: Vec<UserUpdates>,
    pub recent_updates: Vec<RecentUpdate>,
}
