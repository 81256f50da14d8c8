use rand::{rngs::StdRng, SeedableRng};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use super::rating;
use crate::error::AppError;
use crate::models::{NewReview, Review, ReviewerSnapshot, Spot};
use crate::payments::services::current_payment;
use crate::reroll::{gate, selector, Decision};
use crate::state::AppState;
use crate::store::{RerollCommit, StoreError};

const VANISHED_SPOT_REPICKS: u32 = 5;

/// Issues a new random spot to `user_id` if the reroll gate lets it through.
///
/// The load, evaluate, pick and persist steps run against the user's row
/// version. When another request for the same user commits first, the whole
/// sequence is re-run on the fresh state, so a single unlock is never spent
/// twice and the cooldown is never skipped.
pub async fn get_random_spot(st: &AppState, user_id: i64) -> Result<Spot, AppError> {
    let cfg = &st.config.reroll;

    for attempt in 1..=cfg.commit_retries.max(1) {
        let Some((min_id, max_id)) = st.store.spot_id_range().await? else {
            return Err(AppError::SpotPoolEmpty);
        };
        let user = st
            .store
            .get_user(user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))?;
        // last-known status, no gateway round trip
        let payment = current_payment(st, user_id).await?;
        let now = OffsetDateTime::now_utc();

        let unlock = match gate::evaluate(&user, payment.as_ref(), now) {
            Decision::Allowed(kind) => kind,
            Decision::DeniedCooldown(remaining) => {
                info!(user_id, remaining_secs = remaining.whole_seconds(), "reroll denied: cooldown");
                return Err(AppError::DeniedCooldown(remaining));
            }
            Decision::DeniedAlreadyUsed => {
                info!(user_id, "reroll denied: unlock already used");
                return Err(AppError::DeniedAlreadyUsed);
            }
        };

        let spot = pick_existing_spot(st, (min_id, max_id)).await?;
        let spot_id = spot.id;

        let commit = RerollCommit {
            user_id,
            expected_version: user.version,
            cooldown_expires_at: now + Duration::hours(cfg.cooldown_hours),
            spot_id,
            consume_payment: payment
                .as_ref()
                .filter(|_| unlock.is_monetized())
                .map(|p| p.id),
        };
        match st.store.commit_reroll(&commit).await {
            Ok(()) => {
                info!(user_id, spot_id, unlock = ?unlock, "reroll granted");
                return Ok(spot);
            }
            Err(StoreError::Conflict) => {
                debug!(user_id, attempt, "reroll commit conflict, re-evaluating");
            }
            Err(e) => return Err(e.into()),
        }
    }

    warn!(user_id, "reroll gave up after repeated conflicts");
    Err(AppError::Conflict)
}

/// Re-picks when the chosen spot is deleted between the pick and the fetch.
async fn pick_existing_spot(st: &AppState, range: (i64, i64)) -> Result<Spot, AppError> {
    let max_attempts = st.config.reroll.selector_max_attempts;
    let mut rng = StdRng::from_entropy();
    let (mut min_id, mut max_id) = range;

    for _ in 0..VANISHED_SPOT_REPICKS {
        let Some(spot_id) =
            selector::pick(st.store.as_ref(), &mut rng, min_id, max_id, max_attempts).await?
        else {
            return Err(AppError::SpotPoolEmpty);
        };
        if let Some(spot) = st.store.get_spot(spot_id).await? {
            return Ok(spot);
        }
        debug!(spot_id, "picked spot was deleted, picking again");
        (min_id, max_id) = st
            .store
            .spot_id_range()
            .await?
            .ok_or(AppError::SpotPoolEmpty)?;
    }

    Err(AppError::Internal(anyhow::anyhow!(
        "picked spots kept disappearing after {VANISHED_SPOT_REPICKS} tries"
    )))
}

pub async fn list_spots(st: &AppState) -> Result<Vec<Spot>, AppError> {
    Ok(st.store.list_spots().await?)
}

pub async fn get_spot(st: &AppState, spot_id: i64) -> Result<Spot, AppError> {
    st.store
        .get_spot(spot_id)
        .await?
        .ok_or(AppError::SpotNotFound(spot_id))
}

pub async fn list_reviews(st: &AppState, spot_id: i64, page: i64) -> Result<Vec<Review>, AppError> {
    if page < 0 {
        return Err(AppError::Validation("pageNum must not be negative".into()));
    }
    if !st.store.spot_exists(spot_id).await? {
        return Err(AppError::SpotNotFound(spot_id));
    }
    Ok(st
        .store
        .reviews_by_spot(spot_id, page, st.config.reviews_page_size)
        .await?)
}

/// Stores a review and refreshes the spot's overall rating before returning.
///
/// Two reviews landing on the same spot at once may each write a mean that
/// misses the other one; the next review for that spot corrects it.
pub async fn add_review(
    st: &AppState,
    user_id: i64,
    spot_id: i64,
    rating: f64,
    comment: Option<String>,
) -> Result<Review, AppError> {
    if !(1.0..=10.0).contains(&rating) {
        return Err(AppError::Validation("rating must be between 1 and 10".into()));
    }
    let user = st
        .store
        .get_user(user_id)
        .await?
        .ok_or(AppError::UserNotFound(user_id))?;
    let spot = get_spot(st, spot_id).await?;

    let review = st
        .store
        .insert_review(NewReview {
            spot_id,
            reviewer: ReviewerSnapshot::from(&user),
            rating,
            comment,
        })
        .await?;

    let overall = rating::recompute(st.store.as_ref(), spot_id, spot.overall_rating).await?;
    st.store.update_spot_rating(spot_id, overall).await?;

    info!(user_id, spot_id, review_id = review.id, overall, "review added");
    Ok(review)
}

pub async fn conquer_spot(st: &AppState, user_id: i64, spot_id: i64) -> Result<(), AppError> {
    if st.store.get_user(user_id).await?.is_none() {
        return Err(AppError::UserNotFound(user_id));
    }
    if !st.store.spot_exists(spot_id).await? {
        return Err(AppError::SpotNotFound(spot_id));
    }
    if !st.store.add_conquered_spot(user_id, spot_id).await? {
        return Err(AppError::SpotAlreadyConquered);
    }
    info!(user_id, spot_id, "spot conquered");
    Ok(())
}

pub async fn list_conquerors(
    st: &AppState,
    spot_id: i64,
    page: i64,
) -> Result<Vec<ReviewerSnapshot>, AppError> {
    if page < 0 {
        return Err(AppError::Validation("pageNum must not be negative".into()));
    }
    if !st.store.spot_exists(spot_id).await? {
        return Err(AppError::SpotNotFound(spot_id));
    }
    Ok(st
        .store
        .conquerors_of(spot_id, page, st.config.reviews_page_size)
        .await?)
}

/// The spots `user_id` has conquered. Spots deleted since are left out.
pub async fn conquered_spots(st: &AppState, user_id: i64) -> Result<Vec<Spot>, AppError> {
    let user = st
        .store
        .get_user(user_id)
        .await?
        .ok_or(AppError::UserNotFound(user_id))?;
    Ok(st.store.spots_by_ids(&user.conquered_spots).await?)
}
