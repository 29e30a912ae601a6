use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{CreateSubscriptionRequest, ListQuery, SaveSubscriptionRequest};
use super::model::Subscription;
use super::{repo, services};
use crate::{
    auth::services::AuthUser,
    error::{ApiResult, AppError},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", get(list_subscriptions).post(create_subscription))
        .route(
            "/subscriptions/:id",
            get(get_subscription)
                .put(save_subscription)
                .delete(delete_subscription),
        )
}

#[instrument(skip(state))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Subscription>>> {
    let subs = repo::list_all(&state.db).await?;
    Ok(Json(services::query_subscriptions(
        subs,
        &query,
        OffsetDateTime::now_utc(),
    )))
}

#[instrument(skip(state))]
pub async fn get_subscription(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Subscription>> {
    let mut sub = repo::get(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription not found".into()))?;
    sub.refresh_status(OffsetDateTime::now_utc());
    Ok(Json(sub))
}

#[instrument(skip(state, payload))]
pub async fn create_subscription(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateSubscriptionRequest>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    if payload.client_name.trim().is_empty() {
        return Err(AppError::BadRequest("client_name is required".into()));
    }
    let new = services::new_from_request(payload, OffsetDateTime::now_utc());
    let created = repo::create(&state.db, &new, user_id).await.map_err(|e| {
        let is_duplicate = e
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "23505");
        if is_duplicate {
            AppError::Conflict(format!("Client already exists: {}", new.client_name))
        } else {
            e.into()
        }
    })?;
    info!(id = %created.id, client = %created.client_name, "subscription created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, payload))]
pub async fn save_subscription(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SaveSubscriptionRequest>,
) -> ApiResult<Json<Subscription>> {
    if payload.client_name.trim().is_empty() {
        return Err(AppError::BadRequest("client_name is required".into()));
    }
    let existing = repo::get(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription not found".into()))?;

    let expected = payload.expected_updated_at;
    let next = services::apply_edit(&existing, payload, user_id, OffsetDateTime::now_utc());

    match repo::update(&state.db, &next, expected).await? {
        Some(saved) => {
            info!(%id, %user_id, status = saved.update_status.as_str(), "subscription saved");
            Ok(Json(saved))
        }
        None if expected.is_none() => Err(AppError::NotFound("Subscription not found".into())),
        None => {
            warn!(%id, %user_id, "stale edit rejected");
            Err(AppError::Conflict(
                "Subscription was changed by someone else; reload and try again".into(),
            ))
        }
    }
}

#[instrument(skip(state))]
pub async fn delete_subscription(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !repo::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Subscription not found".into()));
    }
    info!(%id, %user_id, "subscription deleted");
    Ok(StatusCode::NO_CONTENT)
}
