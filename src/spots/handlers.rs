use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{ActionResponse, AddReviewRequest, PageQuery};
use super::services;
use crate::{
    auth::AuthUser,
    error::AppError,
    models::{Review, ReviewerSnapshot, Spot},
    state::AppState,
};

// --- public routers ---

pub fn reroll_routes() -> Router<AppState> {
    Router::new().route("/spots/random", get(random_spot))
}

pub fn spot_routes() -> Router<AppState> {
    Router::new()
        .route("/spots", get(list_spots))
        .route("/spots/:spot_id", get(get_spot))
        .route("/spots/:spot_id/reviews", get(list_reviews).post(add_review))
        .route(
            "/spots/:spot_id/conquer",
            get(list_conquerors).post(conquer_spot),
        )
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn random_spot(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Spot>, AppError> {
    let spot = services::get_random_spot(&state, user_id).await?;
    Ok(Json(spot))
}

#[instrument(skip(state))]
pub async fn list_spots(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Vec<Spot>>, AppError> {
    Ok(Json(services::list_spots(&state).await?))
}

#[instrument(skip(state))]
pub async fn get_spot(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(spot_id): Path<i64>,
) -> Result<Json<Spot>, AppError> {
    Ok(Json(services::get_spot(&state, spot_id).await?))
}

#[instrument(skip(state))]
pub async fn list_reviews(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(spot_id): Path<i64>,
    Query(p): Query<PageQuery>,
) -> Result<Json<Vec<Review>>, AppError> {
    let reviews = services::list_reviews(&state, spot_id, p.page_num).await?;
    Ok(Json(reviews))
}

#[instrument(skip(state, body))]
pub async fn add_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(spot_id): Path<i64>,
    Json(body): Json<AddReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let review =
        services::add_review(&state, user_id, spot_id, body.rating, body.comment).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[instrument(skip(state))]
pub async fn conquer_spot(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(spot_id): Path<i64>,
) -> Result<Json<ActionResponse>, AppError> {
    services::conquer_spot(&state, user_id, spot_id).await?;
    Ok(Json(ActionResponse {
        action: "conquer",
        message: format!("spot {spot_id} conquered"),
    }))
}

#[instrument(skip(state))]
pub async fn list_conquerors(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(spot_id): Path<i64>,
    Query(p): Query<PageQuery>,
) -> Result<Json<Vec<ReviewerSnapshot>>, AppError> {
    let conquerors = services::list_conquerors(&state, spot_id, p.page_num).await?;
    Ok(Json(conquerors))
}
