use serde::Deserialize;

/// Request body for `POST /payments/initiate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub is_ad: bool,
}
