use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{RecordStore, RerollCommit, StoreError};
use crate::models::{NewPayment, NewReview, Payment, Review, ReviewerSnapshot, Spot, User};

/// In-process record store. Sequences live inside the store, next to the data
/// they number.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    spots: BTreeMap<i64, Spot>,
    reviews: BTreeMap<i64, Review>,
    payments: BTreeMap<i64, Payment>,
    review_seq: i64,
    payment_seq: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put_user(&self, user: User) {
        self.lock().users.insert(user.id, user);
    }

    pub fn put_spot(&self, spot: Spot) {
        self.lock().spots.insert(spot.id, spot);
    }

    pub fn remove_spot(&self, id: i64) -> Option<Spot> {
        self.lock().spots.remove(&id)
    }

    /// Stores a payment verbatim, bypassing the open-payment check.
    pub fn put_payment(&self, payment: Payment) {
        let mut inner = self.lock();
        inner.payment_seq = inner.payment_seq.max(payment.id);
        inner.payments.insert(payment.id, payment);
    }

    pub fn payments_of(&self, user_id: i64) -> Vec<Payment> {
        self.lock()
            .payments
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn add_conquered_spot(&self, user_id: i64, spot_id: i64) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(false);
        };
        if user.conquered_spots.contains(&spot_id) {
            return Ok(false);
        }
        user.conquered_spots.push(spot_id);
        Ok(true)
    }

    async fn conquerors_of(
        &self,
        spot_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<ReviewerSnapshot>, StoreError> {
        let skip = usize::try_from(page.saturating_mul(page_size)).unwrap_or(usize::MAX);
        let take = usize::try_from(page_size).unwrap_or(0);
        let inner = self.lock();
        let mut conquerors: Vec<&User> = inner
            .users
            .values()
            .filter(|u| u.conquered_spots.contains(&spot_id))
            .collect();
        conquerors.sort_by_key(|u| u.id);
        Ok(conquerors
            .into_iter()
            .skip(skip)
            .take(take)
            .map(ReviewerSnapshot::from)
            .collect())
    }

    async fn get_spot(&self, id: i64) -> Result<Option<Spot>, StoreError> {
        Ok(self.lock().spots.get(&id).cloned())
    }

    async fn list_spots(&self) -> Result<Vec<Spot>, StoreError> {
        Ok(self.lock().spots.values().cloned().collect())
    }

    async fn spots_by_ids(&self, ids: &[i64]) -> Result<Vec<Spot>, StoreError> {
        Ok(self
            .lock()
            .spots
            .values()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn spot_exists(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.lock().spots.contains_key(&id))
    }

    async fn spot_id_range(&self) -> Result<Option<(i64, i64)>, StoreError> {
        let inner = self.lock();
        let min = inner.spots.keys().next().copied();
        let max = inner.spots.keys().next_back().copied();
        Ok(min.zip(max))
    }

    async fn spot_ids_between(&self, min: i64, max: i64) -> Result<Vec<i64>, StoreError> {
        if min > max {
            return Ok(Vec::new());
        }
        Ok(self.lock().spots.range(min..=max).map(|(id, _)| *id).collect())
    }

    async fn update_spot_rating(&self, spot_id: i64, rating: f64) -> Result<(), StoreError> {
        if let Some(spot) = self.lock().spots.get_mut(&spot_id) {
            spot.overall_rating = rating;
        }
        Ok(())
    }

    async fn insert_review(&self, review: NewReview) -> Result<Review, StoreError> {
        let mut inner = self.lock();
        inner.review_seq += 1;
        let stored = Review {
            id: inner.review_seq,
            spot_id: review.spot_id,
            reviewer: review.reviewer,
            rating: review.rating,
            comment: review.comment,
        };
        inner.reviews.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn reviews_by_spot(
        &self,
        spot_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Review>, StoreError> {
        let skip = usize::try_from(page.saturating_mul(page_size)).unwrap_or(usize::MAX);
        let take = usize::try_from(page_size).unwrap_or(0);
        Ok(self
            .lock()
            .reviews
            .values()
            .filter(|r| r.spot_id == spot_id)
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn latest_payment_for_user(&self, user_id: i64) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .lock()
            .payments
            .values()
            .rev()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn open_payment_for_user(&self, user_id: i64) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .lock()
            .payments
            .values()
            .find(|p| p.user_id == user_id && !p.used)
            .cloned())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut inner = self.lock();
        if inner
            .payments
            .values()
            .any(|p| p.user_id == payment.user_id && !p.used)
        {
            return Err(StoreError::Duplicate(format!(
                "open payment for user {}",
                payment.user_id
            )));
        }
        inner.payment_seq += 1;
        let stored = Payment {
            id: inner.payment_seq,
            user_id: payment.user_id,
            external_id: payment.external_id,
            status: payment.status,
            sats: payment.sats,
            invoice_ref: payment.invoice_ref,
            uri: payment.uri,
            used: false,
            is_ad_watched: payment.is_ad_watched,
        };
        inner.payments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_payment_status(
        &self,
        payment_id: i64,
        status: &str,
    ) -> Result<(), StoreError> {
        if let Some(p) = self.lock().payments.get_mut(&payment_id) {
            p.status = status.to_string();
        }
        Ok(())
    }

    async fn commit_reroll(&self, commit: &RerollCommit) -> Result<(), StoreError> {
        let mut inner = self.lock();
        match inner.users.get(&commit.user_id) {
            Some(u) if u.version == commit.expected_version => {}
            _ => return Err(StoreError::Conflict),
        }
        if let Some(pid) = commit.consume_payment {
            match inner.payments.get_mut(&pid) {
                Some(p) if !p.used => p.used = true,
                _ => return Err(StoreError::Conflict),
            }
        }
        if let Some(user) = inner.users.get_mut(&commit.user_id) {
            user.cooldown_expires_at = Some(commit.cooldown_expires_at);
            user.current_spot_id = Some(commit.spot_id);
            user.version += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_RATING;
    use time::OffsetDateTime;

    fn spot(id: i64) -> Spot {
        Spot {
            id,
            name: format!("spot-{id}"),
            location: None,
            description: None,
            overall_rating: DEFAULT_RATING,
            image_name: None,
        }
    }

    #[tokio::test]
    async fn id_range_tracks_min_and_max() {
        let store = MemoryStore::new();
        assert_eq!(store.spot_id_range().await.unwrap(), None);
        for id in [9, 5, 12] {
            store.put_spot(spot(id));
        }
        assert_eq!(store.spot_id_range().await.unwrap(), Some((5, 12)));
        assert_eq!(store.spot_ids_between(6, 12).await.unwrap(), vec![9, 12]);
    }

    #[tokio::test]
    async fn second_open_payment_is_rejected() {
        let store = MemoryStore::new();
        store.insert_payment(NewPayment::ad_watch(1)).await.unwrap();
        let err = store.insert_payment(NewPayment::ad_watch(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        // other users are independent
        store.insert_payment(NewPayment::ad_watch(2)).await.unwrap();
    }

    #[tokio::test]
    async fn commit_rejects_stale_version_and_spent_payment() {
        let store = MemoryStore::new();
        store.put_user(User::new(1, "u1"));
        let payment = store.insert_payment(NewPayment::ad_watch(1)).await.unwrap();
        let commit = RerollCommit {
            user_id: 1,
            expected_version: 0,
            cooldown_expires_at: OffsetDateTime::now_utc(),
            spot_id: 4,
            consume_payment: Some(payment.id),
        };
        store.commit_reroll(&commit).await.unwrap();

        let user = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(user.version, 1);
        assert_eq!(user.current_spot_id, Some(4));
        assert!(store.payments_of(1)[0].used);

        assert!(matches!(
            store.commit_reroll(&commit).await,
            Err(StoreError::Conflict)
        ));
        let fresh_version = RerollCommit {
            expected_version: 1,
            ..commit
        };
        assert!(matches!(
            store.commit_reroll(&fresh_version).await,
            Err(StoreError::Conflict)
        ));
        // the failed commit left the user untouched
        assert_eq!(store.get_user(1).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn reviews_are_paged_from_zero() {
        let store = MemoryStore::new();
        for rating in [2.0, 4.0, 6.0] {
            store
                .insert_review(NewReview {
                    spot_id: 7,
                    reviewer: ReviewerSnapshot {
                        user_id: 1,
                        username: "u1".into(),
                        image_name: None,
                    },
                    rating,
                    comment: None,
                })
                .await
                .unwrap();
        }
        let first = store.reviews_by_spot(7, 0, 2).await.unwrap();
        let second = store.reviews_by_spot(7, 1, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].rating, 6.0);
        assert!(store.reviews_by_spot(8, 0, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conquerors_are_paged_by_user_id() {
        let store = MemoryStore::new();
        for id in [3, 1, 2, 4] {
            store.put_user(User::new(id, format!("u{id}")));
            if id != 4 {
                assert!(store.add_conquered_spot(id, 9).await.unwrap());
            }
        }
        let first = store.conquerors_of(9, 0, 2).await.unwrap();
        let ids: Vec<i64> = first.iter().map(|c| c.user_id).collect();
        assert_eq!(ids, vec![1, 2]);
        let second = store.conquerors_of(9, 1, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].username, "u3");
        assert!(store.conquerors_of(9, 2, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn spots_by_ids_skips_missing() {
        let store = MemoryStore::new();
        for id in [1, 2, 3] {
            store.put_spot(spot(id));
        }
        let found = store.spots_by_ids(&[3, 1, 8]).await.unwrap();
        let ids: Vec<i64> = found.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(store.list_spots().await.unwrap().len(), 3);
    }
}
