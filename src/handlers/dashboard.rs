use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiResult,
    models::{DashboardStats, RecentActivity},
};

const RECENT_LIMIT: i64 = 5;

/// get_stats
///
/// [Authenticated Route] Entity counters for the admin dashboard. `messages` counts
/// unread messages only.
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Stats", body = DashboardStats),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_stats(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.repo.get_stats().await?))
}

/// get_recent
///
/// [Authenticated Route] The five latest publications and contact messages.
#[utoipa::path(
    get,
    path = "/api/dashboard/recent",
    responses(
        (status = 200, description = "Recent activity", body = RecentActivity),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_recent(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<RecentActivity>> {
    let publications = state.repo.recent_publications(RECENT_LIMIT).await?;
    let messages = state.repo.recent_messages(RECENT_LIMIT).await?;
    Ok(Json(RecentActivity {
        publications,
        messages,
    }))
}
