use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use super::{RecordStore, RerollCommit, StoreError};
use crate::models::{
    Location, NewPayment, NewReview, Payment, Review, ReviewerSnapshot, Spot, User,
};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    image_name: Option<String>,
    cooldown_expires_at: Option<OffsetDateTime>,
    current_spot_id: Option<i64>,
    conquered_spots: Vec<i64>,
    version: i64,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            image_name: r.image_name,
            cooldown_expires_at: r.cooldown_expires_at,
            current_spot_id: r.current_spot_id,
            conquered_spots: r.conquered_spots,
            version: r.version,
        }
    }
}

#[derive(Debug, FromRow)]
struct ConquerorRow {
    id: i64,
    username: String,
    image_name: Option<String>,
}

impl From<ConquerorRow> for ReviewerSnapshot {
    fn from(r: ConquerorRow) -> Self {
        Self {
            user_id: r.id,
            username: r.username,
            image_name: r.image_name,
        }
    }
}

#[derive(Debug, FromRow)]
struct SpotRow {
    id: i64,
    name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    description: Option<String>,
    overall_rating: f64,
    image_name: Option<String>,
}

impl From<SpotRow> for Spot {
    fn from(r: SpotRow) -> Self {
        let location = r
            .latitude
            .zip(r.longitude)
            .map(|(latitude, longitude)| Location {
                latitude,
                longitude,
            });
        Self {
            id: r.id,
            name: r.name,
            location,
            description: r.description,
            overall_rating: r.overall_rating,
            image_name: r.image_name,
        }
    }
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: i64,
    spot_id: i64,
    reviewer_id: i64,
    reviewer_username: String,
    reviewer_image_name: Option<String>,
    rating: f64,
    comment: Option<String>,
}

impl From<ReviewRow> for Review {
    fn from(r: ReviewRow) -> Self {
        Self {
            id: r.id,
            spot_id: r.spot_id,
            reviewer: ReviewerSnapshot {
                user_id: r.reviewer_id,
                username: r.reviewer_username,
                image_name: r.reviewer_image_name,
            },
            rating: r.rating,
            comment: r.comment,
        }
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: i64,
    user_id: i64,
    external_id: Option<String>,
    status: String,
    sats: i64,
    invoice_ref: Option<String>,
    uri: Option<String>,
    used: bool,
    is_ad_watched: bool,
}

impl From<PaymentRow> for Payment {
    fn from(r: PaymentRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            external_id: r.external_id,
            status: r.status,
            sats: r.sats,
            invoice_ref: r.invoice_ref,
            uri: r.uri,
            used: r.used,
            is_ad_watched: r.is_ad_watched,
        }
    }
}

const USER_COLUMNS: &str =
    "id, username, image_name, cooldown_expires_at, current_spot_id, conquered_spots, version";
const SPOT_COLUMNS: &str =
    "id, name, latitude, longitude, description, overall_rating, image_name";
const REVIEW_COLUMNS: &str =
    "id, spot_id, reviewer_id, reviewer_username, reviewer_image_name, rating, comment";
const PAYMENT_COLUMNS: &str =
    "id, user_id, external_id, status, sats, invoice_ref, uri, used, is_ad_watched";

#[async_trait]
impl RecordStore for PgStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn add_conquered_spot(&self, user_id: i64, spot_id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET conquered_spots = array_append(conquered_spots, $2)
             WHERE id = $1 AND NOT ($2 = ANY(conquered_spots))
            "#,
        )
        .bind(user_id)
        .bind(spot_id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn conquerors_of(
        &self,
        spot_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<ReviewerSnapshot>, StoreError> {
        let rows = sqlx::query_as::<_, ConquerorRow>(
            r#"
            SELECT id, username, image_name
              FROM users
             WHERE $1 = ANY(conquered_spots)
             ORDER BY id
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(spot_id)
        .bind(page_size)
        .bind(page.saturating_mul(page_size))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_spot(&self, id: i64) -> Result<Option<Spot>, StoreError> {
        let row = sqlx::query_as::<_, SpotRow>(&format!(
            "SELECT {SPOT_COLUMNS} FROM spots WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_spots(&self) -> Result<Vec<Spot>, StoreError> {
        let rows = sqlx::query_as::<_, SpotRow>(&format!(
            "SELECT {SPOT_COLUMNS} FROM spots ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn spots_by_ids(&self, ids: &[i64]) -> Result<Vec<Spot>, StoreError> {
        let rows = sqlx::query_as::<_, SpotRow>(&format!(
            "SELECT {SPOT_COLUMNS} FROM spots WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn spot_exists(&self, id: i64) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM spots WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(exists)
    }

    async fn spot_id_range(&self) -> Result<Option<(i64, i64)>, StoreError> {
        let (min, max): (Option<i64>, Option<i64>) =
            sqlx::query_as("SELECT MIN(id), MAX(id) FROM spots")
                .fetch_one(&self.db)
                .await?;
        Ok(min.zip(max))
    }

    async fn spot_ids_between(&self, min: i64, max: i64) -> Result<Vec<i64>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM spots WHERE id BETWEEN $1 AND $2 ORDER BY id")
            .bind(min)
            .bind(max)
            .fetch_all(&self.db)
            .await?;
        Ok(ids)
    }

    async fn update_spot_rating(&self, spot_id: i64, rating: f64) -> Result<(), StoreError> {
        sqlx::query("UPDATE spots SET overall_rating = $2 WHERE id = $1")
            .bind(spot_id)
            .bind(rating)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, StoreError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            INSERT INTO reviews (spot_id, reviewer_id, reviewer_username, reviewer_image_name, rating, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(review.spot_id)
        .bind(review.reviewer.user_id)
        .bind(&review.reviewer.username)
        .bind(&review.reviewer.image_name)
        .bind(review.rating)
        .bind(&review.comment)
        .fetch_one(&self.db)
        .await?;
        Ok(row.into())
    }

    async fn reviews_by_spot(
        &self,
        spot_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Review>, StoreError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            SELECT {REVIEW_COLUMNS}
              FROM reviews
             WHERE spot_id = $1
             ORDER BY id
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(spot_id)
        .bind(page_size)
        .bind(page.saturating_mul(page_size))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn latest_payment_for_user(&self, user_id: i64) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY id DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn open_payment_for_user(&self, user_id: i64) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 AND NOT used"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let res = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            INSERT INTO payments (user_id, external_id, status, sats, invoice_ref, uri, is_ad_watched)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment.user_id)
        .bind(&payment.external_id)
        .bind(&payment.status)
        .bind(payment.sats)
        .bind(&payment.invoice_ref)
        .bind(&payment.uri)
        .bind(payment.is_ad_watched)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(row) => Ok(row.into()),
            // payments_one_open_per_user
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                StoreError::Duplicate(format!("open payment for user {}", payment.user_id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_payment_status(
        &self,
        payment_id: i64,
        status: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE payments SET status = $2 WHERE id = $1")
            .bind(payment_id)
            .bind(status)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn commit_reroll(&self, commit: &RerollCommit) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        let user = sqlx::query(
            r#"
            UPDATE users
               SET cooldown_expires_at = $3,
                   current_spot_id = $4,
                   version = version + 1
             WHERE id = $1 AND version = $2
            "#,
        )
        .bind(commit.user_id)
        .bind(commit.expected_version)
        .bind(commit.cooldown_expires_at)
        .bind(commit.spot_id)
        .execute(&mut *tx)
        .await?;
        if user.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }

        if let Some(payment_id) = commit.consume_payment {
            let spent = sqlx::query("UPDATE payments SET used = TRUE WHERE id = $1 AND NOT used")
                .bind(payment_id)
                .execute(&mut *tx)
                .await?;
            if spent.rows_affected() == 0 {
                return Err(StoreError::Conflict);
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
