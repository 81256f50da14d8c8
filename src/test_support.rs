use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{AppConfig, GatewayConfig, JwtConfig, RerollConfig};
use crate::gateway::{Charge, GatewayError, PaymentGateway};
use crate::models::{Spot, User, DEFAULT_RATING};
use crate::state::AppState;
use crate::store::MemoryStore;

/// Scriptable stand-in for the Lightning gateway.
pub struct FakeGateway {
    pub status: Mutex<String>,
    pub unavailable: AtomicBool,
    pub charges_created: AtomicUsize,
    pub status_polls: AtomicUsize,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            status: Mutex::new("pending".into()),
            unavailable: AtomicBool::new(false),
            charges_created: AtomicUsize::new(0),
            status_polls: AtomicUsize::new(0),
        }
    }
}

impl FakeGateway {
    pub fn set_status(&self, status: &str) {
        *self.status.lock().unwrap() = status.to_string();
    }

    pub fn go_down(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_charge(&self, sats: i64) -> Result<Charge, GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout);
        }
        self.charges_created.fetch_add(1, Ordering::SeqCst);
        Ok(Charge {
            id: "abc".into(),
            status: self.status.lock().unwrap().clone(),
            uri: Some(format!("lightning:lnbc{sats}")),
            payreq: Some(format!("lnbc{sats}")),
        })
    }

    async fn charge_status(&self, _external_id: &str) -> Result<String, GatewayError> {
        self.status_polls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout);
        }
        Ok(self.status.lock().unwrap().clone())
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        },
        gateway: GatewayConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: "test".into(),
            timeout_secs: 1,
        },
        reroll: RerollConfig::default(),
        reviews_page_size: 5,
    }
}

pub fn spot(id: i64) -> Spot {
    Spot {
        id,
        name: format!("spot-{id}"),
        location: None,
        description: None,
        overall_rating: DEFAULT_RATING,
        image_name: None,
    }
}

pub struct Fixture {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
}

/// State backed by the in-process store with the given spots and users `1..=users`.
pub fn fixture(spot_ids: &[i64], users: i64) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    for &id in spot_ids {
        store.put_spot(spot(id));
    }
    for id in 1..=users {
        store.put_user(User::new(id, format!("user{id}")));
    }
    let gateway = Arc::new(FakeGateway::default());
    let state = AppState::from_parts(Arc::new(test_config()), store.clone(), gateway.clone());
    Fixture {
        state,
        store,
        gateway,
    }
}
