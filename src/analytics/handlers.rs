use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::dto::{AnalyticsQuery, AnalyticsSummary};
use super::services::{summarize, updater_ids};
use crate::{
    auth::services::AuthUser, error::ApiResult, profiles::repo as profiles_repo,
    state::AppState, subscriptions::repo as subscriptions_repo,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/analytics", get(get_analytics))
}

#[instrument(skip(state))]
pub async fn get_analytics(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<AnalyticsSummary>> {
    let subs = subscriptions_repo::list_all(&state.db).await?;
    let names: HashMap<_, _> = profiles_repo::display_names(&state.db, &updater_ids(&subs))
        .await?
        .into_iter()
        .filter_map(|(id, name)| name.map(|n| (id, n)))
        .collect();

    Ok(Json(summarize(
        subs,
        &names,
        query.timeframe,
        OffsetDateTime::now_utc(),
    )))
}
