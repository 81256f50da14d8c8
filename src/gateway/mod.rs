//! Outbound Lightning invoice provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod client;

pub use client::HttpGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,
    #[error("gateway transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("gateway responded with status {0}")]
    Status(u16),
    #[error("gateway response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            GatewayError::Status(status.as_u16())
        } else {
            GatewayError::Transport(e)
        }
    }
}

/// A freshly created invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    pub status: String,
    pub uri: Option<String>,
    pub payreq: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_charge(&self, sats: i64) -> Result<Charge, GatewayError>;
    /// Current status string of an invoice, passed through verbatim.
    async fn charge_status(&self, external_id: &str) -> Result<String, GatewayError>;
}
