//! Usage route: today's remaining generations for the caller.

use axum::extract::State;
use axum::response::Json;
use tracing::warn;

use crate::routes::auth::AuthUser;
use crate::services::quota::{self, UsageCheck};
use crate::state::AppState;

/// `GET /api/usage`: register the caller on first sight and report the gate.
pub async fn usage(State(state): State<AppState>, auth: AuthUser) -> Json<UsageCheck> {
    let today = quota::today_utc();
    if let Err(e) = state.quota.ensure_user(&auth.profile, &today).await {
        warn!(user = %auth.uid(), error = %e, "quota: could not ensure user record");
    }
    Json(quota::check_usage(state.quota.as_ref(), auth.uid(), &today).await)
}
