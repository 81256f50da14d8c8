use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Rating a spot carries until its first review lands.
pub const DEFAULT_RATING: f64 = 1.0;

/// Gateway status that unlocks a reroll. Every other status is opaque.
pub const STATUS_PAID: &str = "paid";

/// Local status given to ad-watch payments; they never reach the gateway.
pub const STATUS_AD_WATCHED: &str = "ad_watched";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub image_name: Option<String>,
    /// `None` means the user never rolled and is immediately eligible.
    #[serde(with = "time::serde::rfc3339::option")]
    pub cooldown_expires_at: Option<OffsetDateTime>,
    pub current_spot_id: Option<i64>,
    pub conquered_spots: Vec<i64>,
    /// Bumped on every reroll commit; guards check-then-act races.
    #[serde(skip)]
    pub version: i64,
}

impl User {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            image_name: None,
            cooldown_expires_at: None,
            current_spot_id: None,
            conquered_spots: Vec::new(),
            version: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spot {
    pub id: i64,
    pub name: String,
    pub location: Option<Location>,
    pub description: Option<String>,
    pub overall_rating: f64,
    pub image_name: Option<String>,
}

/// Public summary of a user. Reviews store a copy taken when the review was
/// written, so later profile changes do not touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerSnapshot {
    pub user_id: i64,
    pub username: String,
    pub image_name: Option<String>,
}

impl From<&User> for ReviewerSnapshot {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.id,
            username: u.username.clone(),
            image_name: u.image_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: i64,
    pub spot_id: i64,
    pub reviewer: ReviewerSnapshot,
    pub rating: f64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub spot_id: i64,
    pub reviewer: ReviewerSnapshot,
    pub rating: f64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    /// Gateway invoice id; absent for ad-watch unlocks.
    pub external_id: Option<String>,
    pub status: String,
    pub sats: i64,
    /// Lightning payment request (`lnbc...`).
    pub invoice_ref: Option<String>,
    pub uri: Option<String>,
    pub used: bool,
    pub is_ad_watched: bool,
}

impl Payment {
    /// Paid through the gateway or unlocked by an ad.
    pub fn is_unlocked(&self) -> bool {
        self.status == STATUS_PAID || self.is_ad_watched
    }
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: i64,
    pub external_id: Option<String>,
    pub status: String,
    pub sats: i64,
    pub invoice_ref: Option<String>,
    pub uri: Option<String>,
    pub is_ad_watched: bool,
}

impl NewPayment {
    pub fn ad_watch(user_id: i64) -> Self {
        Self {
            user_id,
            external_id: None,
            status: STATUS_AD_WATCHED.to_string(),
            sats: 0,
            invoice_ref: None,
            uri: None,
            is_ad_watched: true,
        }
    }
}
