use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{Charge, GatewayError, PaymentGateway};
use crate::config::GatewayConfig;

#[derive(Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct CreateChargeRequest {
    amount: i64,
    description: &'static str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    id: String,
    status: String,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    lightning_invoice: Option<LightningInvoice>,
}

#[derive(Debug, Deserialize)]
struct LightningInvoice {
    #[serde(default)]
    payreq: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeStatusData {
    status: String,
}

impl HttpGateway {
    pub fn new(cfg: &GatewayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn create_charge(&self, sats: i64) -> Result<Charge, GatewayError> {
        let url = format!("{}/v1/charges/", self.base_url);
        let body: Envelope<ChargeData> = self
            .http
            .post(&url)
            .header(AUTHORIZATION, &self.api_key)
            .header(ACCEPT, "application/json")
            .json(&CreateChargeRequest {
                amount: sats,
                description: "spot reroll unlock",
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let data = body.data;
        debug!(charge_id = %data.id, status = %data.status, "charge created");
        Ok(Charge {
            id: data.id,
            status: data.status,
            uri: data.uri,
            payreq: data.lightning_invoice.and_then(|li| li.payreq),
        })
    }

    #[instrument(skip(self))]
    async fn charge_status(&self, external_id: &str) -> Result<String, GatewayError> {
        let url = format!("{}/v2/charge/{}", self.base_url, external_id);
        let body: Envelope<ChargeStatusData> = self
            .http
            .get(&url)
            .header(AUTHORIZATION, &self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.data.status)
    }
}
