use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default, rename = "pageNum")]
    pub page_num: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddReviewRequest {
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub action: &'static str,
    pub message: String,
}
