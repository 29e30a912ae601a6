use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Maintenance cycle length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Monthly,
    Quarterly,
    /// Only found in older stored records; never produced by import.
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Calendar months in one cycle.
    pub fn months(&self) -> u8 {
        match self {
            Frequency::Monthly => 1,
            Frequency::Quarterly => 3,
            Frequency::Yearly => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Ga4Status {
    #[serde(rename = "yes")]
    Yes,
    #[serde(rename = "yes - basic")]
    YesBasic,
    #[serde(rename = "no")]
    No,
    #[default]
    #[serde(rename = "pending")]
    Pending,
}

impl Ga4Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ga4Status::Yes => "yes",
            Ga4Status::YesBasic => "yes - basic",
            Ga4Status::No => "no",
            Ga4Status::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Completed,
    #[default]
    Pending,
    Overdue,
}

impl UpdateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStatus::Completed => "completed",
            UpdateStatus::Pending => "pending",
            UpdateStatus::Overdue => "overdue",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl FromStr for Frequency {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(ParseEnumError {
                kind: "frequency",
                value: other.into(),
            }),
        }
    }
}

impl FromStr for Ga4Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Ga4Status::Yes),
            "yes - basic" => Ok(Ga4Status::YesBasic),
            "no" => Ok(Ga4Status::No),
            "pending" => Ok(Ga4Status::Pending),
            other => Err(ParseEnumError {
                kind: "ga4_status",
                value: other.into(),
            }),
        }
    }
}

impl FromStr for UpdateStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(UpdateStatus::Completed),
            "pending" => Ok(UpdateStatus::Pending),
            "overdue" => Ok(UpdateStatus::Overdue),
            other => Err(ParseEnumError {
                kind: "update_status",
                value: other.into(),
            }),
        }
    }
}

/// Hosting account credentials, stored as a JSON blob.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostingDetails {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub port: String,
}

/// Database credentials, stored as a JSON blob.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseDetails {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub database_name: String,
    #[serde(default)]
    pub database_user: String,
    #[serde(default)]
    pub password: String,
}

// Passwords never reach the logs.
impl fmt::Debug for HostingDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostingDetails")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .field("port", &self.port)
            .finish()
    }
}

impl fmt::Debug for DatabaseDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseDetails")
            .field("host", &self.host)
            .field("database_name", &self.database_name)
            .field("database_user", &self.database_user)
            .field("password", &"***")
            .finish()
    }
}

/// One client's maintenance subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub client_name: String,
    pub frequency: Frequency,
    pub wp_theme: Option<String>,
    pub php_version: Option<String>,
    pub ga4_status: Ga4Status,
    pub analytics_check: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_update_due: Option<OffsetDateTime>,
    pub update_status: UpdateStatus,
    pub updated_by: Option<Uuid>,
    pub comments: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub comment_updated_at: Option<OffsetDateTime>,
    pub comment_updated_by: Option<Uuid>,
    pub hosting_details: Option<HostingDetails>,
    pub database_details: Option<DatabaseDetails>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Row version for optimistic concurrency on edits.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Insert payload produced by import and the create endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSubscription {
    pub client_name: String,
    pub frequency: Frequency,
    pub wp_theme: Option<String>,
    pub php_version: Option<String>,
    pub ga4_status: Ga4Status,
    pub analytics_check: bool,
    pub last_update: Option<OffsetDateTime>,
    pub next_update_due: Option<OffsetDateTime>,
    pub update_status: UpdateStatus,
    pub comments: Option<String>,
}

impl From<Subscription> for NewSubscription {
    fn from(sub: Subscription) -> Self {
        Self {
            client_name: sub.client_name,
            frequency: sub.frequency,
            wp_theme: sub.wp_theme,
            php_version: sub.php_version,
            ga4_status: sub.ga4_status,
            analytics_check: sub.analytics_check,
            last_update: sub.last_update,
            next_update_due: sub.next_update_due,
            update_status: sub.update_status,
            comments: sub.comments,
        }
    }
}

impl NewSubscription {
    /// Case-insensitive identity of a client.
    pub fn dedup_key(&self) -> String {
        self.client_name.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_use_storage_spelling() {
        assert_eq!(serde_json::to_string(&Ga4Status::YesBasic).unwrap(), "\"yes - basic\"");
        assert_eq!(serde_json::to_string(&Frequency::Quarterly).unwrap(), "\"quarterly\"");
        assert_eq!("yes - basic".parse::<Ga4Status>().unwrap(), Ga4Status::YesBasic);
        assert_eq!("overdue".parse::<UpdateStatus>().unwrap(), UpdateStatus::Overdue);
        assert!("weekly".parse::<Frequency>().is_err());
    }

    #[test]
    fn credential_debug_output_is_redacted() {
        let hosting = HostingDetails {
            host: "ftp.acme.nl".into(),
            username: "acme".into(),
            password: "hunter2".into(),
            port: "21".into(),
        };
        let printed = format!("{hosting:?}");
        assert!(printed.contains("ftp.acme.nl"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn database_details_use_camel_case_keys() {
        let json = r#"{"host":"db","databaseName":"wp","databaseUser":"wpuser","password":"x"}"#;
        let details: DatabaseDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.database_name, "wp");
        assert_eq!(details.database_user, "wpuser");
    }
}
