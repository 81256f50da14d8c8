use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{dto::InitiatePaymentRequest, services};
use crate::{auth::AuthUser, error::AppError, models::Payment, state::AppState};

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments/initiate", post(initiate_payment))
        .route("/payments/:user_id", get(get_payment))
}

#[instrument(skip(state))]
pub async fn initiate_payment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<InitiatePaymentRequest>,
) -> Result<Json<i64>, AppError> {
    let payment_id = services::initiate_payment(&state, user_id, body.amount, body.is_ad).await?;
    Ok(Json(payment_id))
}

#[instrument(skip(state))]
pub async fn get_payment(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Payment>, AppError> {
    if caller != user_id {
        return Err(AppError::Forbidden);
    }
    let payment = services::get_payment(&state, user_id).await?;
    Ok(Json(payment))
}
