use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::models::{NewPayment, NewReview, Payment, Review, ReviewerSnapshot, Spot, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A guarded write lost a race with another writer.
    #[error("concurrent modification")]
    Conflict,
    #[error("duplicate record: {0}")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Everything a successful reroll writes, applied atomically.
#[derive(Debug, Clone)]
pub struct RerollCommit {
    pub user_id: i64,
    /// Version of the user row the decision was made against.
    pub expected_version: i64,
    pub cooldown_expires_at: OffsetDateTime,
    pub spot_id: i64,
    /// Payment whose unlock is spent by this reroll.
    pub consume_payment: Option<i64>,
}

/// Durable storage for users, spots, reviews and payments.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError>;
    /// Returns `false` when the spot was already in the user's set.
    async fn add_conquered_spot(&self, user_id: i64, spot_id: i64) -> Result<bool, StoreError>;
    /// 0-indexed page of the users who conquered `spot_id`, ordered by user id.
    async fn conquerors_of(
        &self,
        spot_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<ReviewerSnapshot>, StoreError>;

    async fn get_spot(&self, id: i64) -> Result<Option<Spot>, StoreError>;
    async fn list_spots(&self) -> Result<Vec<Spot>, StoreError>;
    /// Spots among `ids` that still exist, ordered by id.
    async fn spots_by_ids(&self, ids: &[i64]) -> Result<Vec<Spot>, StoreError>;
    async fn spot_exists(&self, id: i64) -> Result<bool, StoreError>;
    /// Smallest and largest stored spot id, `None` when there are no spots.
    async fn spot_id_range(&self) -> Result<Option<(i64, i64)>, StoreError>;
    async fn spot_ids_between(&self, min: i64, max: i64) -> Result<Vec<i64>, StoreError>;
    async fn update_spot_rating(&self, spot_id: i64, rating: f64) -> Result<(), StoreError>;

    async fn insert_review(&self, review: NewReview) -> Result<Review, StoreError>;
    /// 0-indexed page of a spot's reviews ordered by id.
    async fn reviews_by_spot(
        &self,
        spot_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Review>, StoreError>;

    async fn latest_payment_for_user(&self, user_id: i64) -> Result<Option<Payment>, StoreError>;
    async fn open_payment_for_user(&self, user_id: i64) -> Result<Option<Payment>, StoreError>;
    /// Fails with [`StoreError::Duplicate`] while the user has an unused payment.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError>;
    async fn update_payment_status(&self, payment_id: i64, status: &str)
        -> Result<(), StoreError>;

    /// Applies a reroll if the user is still at `expected_version` and the
    /// consumed payment (if any) is still unused. Otherwise [`StoreError::Conflict`].
    async fn commit_reroll(&self, commit: &RerollCommit) -> Result<(), StoreError>;
}
