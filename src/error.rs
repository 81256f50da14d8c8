use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{
        header::{ALLOW, RETRY_AFTER},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use time::{macros::format_description, Duration, OffsetDateTime};
use tracing::{error, warn};

use crate::{gateway::GatewayError, store::StoreError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidToken(&'static str),
    #[error("no spots available yet")]
    SpotPoolEmpty,
    #[error("random spot is not available yet, retry in {}s", .0.whole_seconds())]
    DeniedCooldown(Duration),
    #[error("spot reroll already used for this unlock, initiate a new payment")]
    DeniedAlreadyUsed,
    #[error("this user already initiated a payment")]
    DuplicateOpenPayment,
    #[error("no payment found for user {0}")]
    InvalidPaymentId(i64),
    #[error("payment gateway unavailable")]
    GatewayUnavailable(#[source] GatewayError),
    #[error("spot {0} does not exist")]
    SpotNotFound(i64),
    #[error("user {0} does not exist")]
    UserNotFound(i64),
    #[error("spot is already conquered")]
    SpotAlreadyConquered,
    #[error("{0}")]
    Validation(String),
    #[error("forbidden")]
    Forbidden,
    #[error("too many concurrent updates, try again")]
    Conflict,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AppError::SpotPoolEmpty
            | AppError::DeniedCooldown(_)
            | AppError::DeniedAlreadyUsed
            | AppError::SpotAlreadyConquered
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::InvalidPaymentId(_) | AppError::SpotNotFound(_) | AppError::UserNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::DuplicateOpenPayment | AppError::Conflict => StatusCode::CONFLICT,
            AppError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the caller. Server-side failures stay generic.
    fn public_message(&self) -> String {
        match self {
            AppError::Store(_) | AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Carries the public message from `into_response` to [`error_envelope`],
/// which knows the request path.
#[derive(Debug, Clone)]
struct ErrorMessage(String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        } else {
            warn!(error = %self, "request rejected");
        }

        let mut res = status.into_response();
        if let AppError::DeniedCooldown(remaining) = &self {
            let secs = remaining.whole_seconds().max(0);
            if let Ok(v) = HeaderValue::from_str(&secs.to_string()) {
                res.headers_mut().insert(RETRY_AFTER, v);
            }
        }
        res.extensions_mut().insert(ErrorMessage(self.public_message()));
        res
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub path: String,
}

fn timestamp(now: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");
    now.format(&fmt).unwrap_or_default()
}

/// Largest rejection body read back to become the envelope's `error` text.
const REJECTION_BODY_LIMIT: usize = 4 * 1024;

/// Rewrites every error response into the `{timestamp, status, error, path}` body.
///
/// [`AppError`] responses carry their message in an extension. Other 4xx/5xx
/// responses (extractor rejections, unknown routes) keep their plain-text body
/// as the message; server errors fall back to the status reason.
pub async fn error_envelope(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let mut res = next.run(req).await;
    let status = res.status();
    let tagged = res.extensions_mut().remove::<ErrorMessage>();

    let message = match tagged {
        Some(ErrorMessage(message)) => message,
        None if status.is_client_error() => {
            let (parts, body) = res.into_parts();
            let text = to_bytes(body, REJECTION_BODY_LIMIT)
                .await
                .ok()
                .map(|b| String::from_utf8_lossy(&b).trim().to_string())
                .filter(|t| !t.is_empty());
            res = Response::from_parts(parts, Body::empty());
            text.unwrap_or_else(|| reason(status))
        }
        None if status.is_server_error() => reason(status),
        None => return res,
    };

    let body = ErrorEnvelope {
        timestamp: timestamp(OffsetDateTime::now_utc()),
        status: status.as_u16(),
        error: message,
        path,
    };
    let mut out = (status, Json(body)).into_response();
    for name in [RETRY_AFTER, ALLOW] {
        if let Some(v) = res.headers().get(&name) {
            out.headers_mut().insert(name, v.clone());
        }
    }
    out
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}
