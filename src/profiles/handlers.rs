use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{ProfileResponse, UpdateProfileRequest};
use super::services::{ext_from_mime, replace_avatar, to_response};
use super::repo;
use crate::{
    auth::services::{is_valid_email, AuthUser},
    error::{ApiResult, AppError},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/avatar", post(upload_avatar))
        .layer(DefaultBodyLimit::max(5 * 1024 * 1024))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = repo::get_or_create(&state.db, user_id).await?;
    Ok(Json(to_response(&state, profile).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let display_name = trimmed(payload.display_name);
    let email = trimmed(payload.email).map(|e| e.to_lowercase());
    if let Some(email) = email.as_deref() {
        if !is_valid_email(email) {
            warn!(%user_id, "invalid profile email");
            return Err(AppError::BadRequest("Invalid email".into()));
        }
    }

    let profile =
        repo::upsert(&state.db, user_id, display_name.as_deref(), email.as_deref()).await?;
    info!(%user_id, "profile updated");
    Ok(Json(to_response(&state, profile).await?))
}

/// POST /profile/avatar (multipart), field `avatar` or `file`.
#[instrument(skip(state, mp))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> ApiResult<Json<ProfileResponse>> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if !matches!(field.name(), Some("avatar") | Some("file")) {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let Some(ext) = ext_from_mime(&content_type) else {
            return Err(AppError::BadRequest(format!(
                "Unsupported image type: {content_type}"
            )));
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if data.is_empty() {
            break;
        }

        let key = replace_avatar(&state, user_id, data, &content_type, ext).await?;
        info!(%user_id, %key, "avatar replaced");
        let profile = repo::get_or_create(&state.db, user_id).await?;
        return Ok(Json(to_response(&state, profile).await?));
    }
    Err(AppError::BadRequest("avatar file is required".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::services::JwtKeys;
    use axum::body::Body;
    use axum::extract::FromRef;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app() -> (Router, String) {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4()).unwrap();
        (routes().with_state(state), token)
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_before_saving() {
        let (app, token) = app();
        let resp = app
            .oneshot(
                Request::put("/profile")
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"email":"not-an-email"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_image_avatar_is_rejected() {
        let (app, token) = app();
        let body = "--B\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"a.pdf\"\r\nContent-Type: application/pdf\r\n\r\n%PDF\r\n--B--\r\n";
        let resp = app
            .oneshot(
                Request::post("/profile/avatar")
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", "multipart/form-data; boundary=B")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn profile_requires_login() {
        let (app, _) = app();
        let resp = app
            .oneshot(Request::get("/profile").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
