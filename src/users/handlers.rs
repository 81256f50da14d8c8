use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::AuthUser,
    error::AppError,
    models::{Spot, User},
    spots::services::conquered_spots,
    state::AppState,
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/me/conquered", get(my_conquered_spots))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: i64,
    pub username: String,
    pub image_name: Option<String>,
    pub current_spot_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub cooldown_expires_at: Option<OffsetDateTime>,
    pub conquered_spots: Vec<i64>,
}

impl From<User> for MeResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            image_name: u.image_name,
            current_spot_id: u.current_spot_id,
            cooldown_expires_at: u.cooldown_expires_at,
            conquered_spots: u.conquered_spots,
        }
    }
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let user = state
        .store
        .get_user(user_id)
        .await?
        .ok_or(AppError::UserNotFound(user_id))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn my_conquered_spots(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Spot>>, AppError> {
    Ok(Json(conquered_spots(&state, user_id).await?))
}
