//! Access tokens for Microsoft Graph. Built once at startup and handed to
//! whoever needs a token through `AppState`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::source::SourceError;
use crate::config::GraphConfig;

pub const LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

#[async_trait]
pub trait IdentityBroker: Send + Sync {
    /// `Ok(None)` when no account is connected.
    async fn access_token(&self) -> Result<Option<String>, SourceError>;
}

/// Fixed token from configuration or from the request.
pub struct StaticTokenBroker {
    token: Option<String>,
}

impl StaticTokenBroker {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }
}

#[async_trait]
impl IdentityBroker for StaticTokenBroker {
    async fn access_token(&self) -> Result<Option<String>, SourceError> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

fn default_expiry() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// App-registration (client credentials) flow with an in-memory cache.
pub struct ClientCredentialsBroker {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsBroker {
    pub fn new(
        http: reqwest::Client,
        login_base_url: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        Self {
            http,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                login_base_url.trim_end_matches('/'),
                tenant_id
            ),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<TokenResponse, SourceError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<TokenResponse>().await?);
        }
        let message = resp.text().await.unwrap_or_default();
        warn!(%status, "token request rejected");
        match status.as_u16() {
            400 | 401 => Err(SourceError::NotConnected),
            code => Err(SourceError::Api {
                status: code,
                message,
            }),
        }
    }
}

#[async_trait]
impl IdentityBroker for ClientCredentialsBroker {
    async fn access_token(&self) -> Result<Option<String>, SourceError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(Some(token.value.clone()));
        }

        let fresh = self.fetch().await?;
        // refresh a minute early so a token never expires mid-import
        let lifetime = Duration::from_secs(fresh.expires_in.saturating_sub(60));
        debug!(expires_in = fresh.expires_in, "graph token acquired");
        *cached = Some(CachedToken {
            value: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(Some(fresh.access_token))
    }
}

pub fn from_config(config: &GraphConfig, http: reqwest::Client) -> Arc<dyn IdentityBroker> {
    select(config, http, LOGIN_BASE_URL)
}

fn select(config: &GraphConfig, http: reqwest::Client, login_base: &str) -> Arc<dyn IdentityBroker> {
    if let Some((tenant, client_id, secret)) = config.client_credentials() {
        info!(tenant, "graph broker: client credentials");
        if config.app_token_on_me_drive() {
            warn!(
                drive_path = %config.drive_path,
                "application tokens cannot reach /me; set GRAPH_DRIVE_PATH to /users/{{id}}/drive"
            );
        }
        return Arc::new(ClientCredentialsBroker::new(
            http,
            login_base,
            tenant,
            client_id,
            secret,
        ));
    }
    if config.access_token.is_some() {
        info!("graph broker: static token");
    } else {
        info!("graph broker: not connected");
    }
    Arc::new(StaticTokenBroker::new(config.access_token.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Form, Json, Router};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn static_broker_treats_blank_as_disconnected() {
        assert_eq!(StaticTokenBroker::new(None).access_token().await.unwrap(), None);
        assert_eq!(
            StaticTokenBroker::new(Some("  ".into())).access_token().await.unwrap(),
            None
        );
        assert_eq!(
            StaticTokenBroker::new(Some("abc".into())).access_token().await.unwrap(),
            Some("abc".into())
        );
    }

    #[tokio::test]
    async fn client_credentials_token_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/tenant-1/oauth2/v2.0/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(form["grant_type"], "client_credentials");
                    assert_eq!(form["client_id"], "app");
                    Json(serde_json::json!({ "access_token": "tok-1", "expires_in": 3600 }))
                }
            }),
        );
        let base = serve(router).await;

        let broker = ClientCredentialsBroker::new(reqwest::Client::new(), &base, "tenant-1", "app", "s3cret");
        assert_eq!(broker.access_token().await.unwrap().as_deref(), Some("tok-1"));
        assert_eq!(broker.access_token().await.unwrap().as_deref(), Some("tok-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_credentials_mean_not_connected() {
        let router = Router::new().route(
            "/t/oauth2/v2.0/token",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "invalid_client") }),
        );
        let base = serve(router).await;
        let broker = ClientCredentialsBroker::new(reqwest::Client::new(), &base, "t", "app", "bad");
        assert!(matches!(broker.access_token().await, Err(SourceError::NotConnected)));
    }

    #[tokio::test]
    async fn config_selects_broker() {
        let http = reqwest::Client::new();

        let unset = select(&GraphConfig::default(), http.clone(), "http://127.0.0.1:9");
        assert_eq!(unset.access_token().await.unwrap(), None);

        let fixed = GraphConfig {
            access_token: Some("delegated".into()),
            ..Default::default()
        };
        let fixed = select(&fixed, http.clone(), "http://127.0.0.1:9");
        assert_eq!(fixed.access_token().await.unwrap().as_deref(), Some("delegated"));

        let router = Router::new().route(
            "/t/oauth2/v2.0/token",
            post(|| async { Json(serde_json::json!({ "access_token": "app-tok", "expires_in": 3600 })) }),
        );
        let base = serve(router).await;
        let app = GraphConfig {
            access_token: Some("delegated".into()),
            tenant_id: Some("t".into()),
            client_id: Some("c".into()),
            client_secret: Some("s".into()),
            ..Default::default()
        };
        let app = select(&app, http, &base);
        assert_eq!(app.access_token().await.unwrap().as_deref(), Some("app-tok"));
    }
}
