use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Microsoft Graph access used by the OneDrive import source.
#[derive(Debug, Clone, Default)]
pub struct GraphConfig {
    pub base_url: String,
    /// Drive root, `/me/drive` for delegated tokens or `/users/{id}/drive`
    /// for application tokens.
    pub drive_path: String,
    pub access_token: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl GraphConfig {
    /// All three app-registration values are present.
    pub fn client_credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.tenant_id, &self.client_id, &self.client_secret) {
            (Some(t), Some(c), Some(s)) => Some((t.as_str(), c.as_str(), s.as_str())),
            _ => None,
        }
    }

    /// Application tokens have no signed-in user, so `/me` paths fail.
    pub fn app_token_on_me_drive(&self) -> bool {
        let path = self.drive_path.trim_end_matches('/');
        self.client_credentials().is_some() && (path == "/me" || path.starts_with("/me/"))
    }
}

/// Pacing of the batched importer.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub batch_delay: Duration,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            max_retries: 3,
            retry_base: Duration::from_millis(1000),
            batch_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub minio_endpoint: String,
    pub minio_bucket: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub graph: GraphConfig,
    pub import: ImportConfig,
    pub reference_workbook: PathBuf,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "sociallane".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "sociallane-dashboard".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };

        let graph = GraphConfig {
            base_url: std::env::var("GRAPH_BASE_URL")
                .unwrap_or_else(|_| "https://graph.microsoft.com/v1.0".into()),
            drive_path: std::env::var("GRAPH_DRIVE_PATH").unwrap_or_else(|_| "/me/drive".into()),
            access_token: env_opt("GRAPH_ACCESS_TOKEN"),
            tenant_id: env_opt("GRAPH_TENANT_ID"),
            client_id: env_opt("GRAPH_CLIENT_ID"),
            client_secret: env_opt("GRAPH_CLIENT_SECRET"),
        };

        let defaults = ImportConfig::default();
        let import = ImportConfig {
            batch_size: env_parse::<usize>("IMPORT_BATCH_SIZE")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.batch_size),
            max_retries: env_parse::<u32>("IMPORT_MAX_RETRIES")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_retries),
            retry_base: env_parse::<u64>("IMPORT_RETRY_BASE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base),
            batch_delay: env_parse::<u64>("IMPORT_BATCH_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.batch_delay),
        };

        Ok(Self {
            database_url,
            jwt,
            minio_endpoint: std::env::var("MINIO_ENDPOINT")?,
            minio_bucket: std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "avatars".into()),
            minio_access_key: std::env::var("MINIO_ACCESS_KEY")?,
            minio_secret_key: std::env::var("MINIO_SECRET_KEY")?,
            graph,
            import,
            reference_workbook: std::env::var("REFERENCE_WORKBOOK")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/0. Update abonnementen DRIVE.xlsx")),
        })
    }
}
