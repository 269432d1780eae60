//! Payments API handlers.
//!
//! # Endpoints
//!
//! - `POST /initialize` – start a checkout (auth)
//! - `GET  /verify`     – verify a checkout after the gateway redirect (auth, owner)
//! - `POST /webhook`    – gateway notifications (signature-authenticated)

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use storepay_core::entities::GatewayName;
use storepay_core::gateways::GatewayError;
use storepay_core::processors::{CheckoutError, ReconcileError, VerifyError, WebhookIntakeError};

use crate::state::AppState;

mod initialize;
mod verify;
mod webhook;

/// Build the Payments API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(initialize::initialize))
        .route("/verify", get(verify::verify))
        .route("/webhook", post(webhook::webhook))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in Payments API handlers.
#[derive(Debug)]
pub(crate) enum PaymentsApiError {
    /// The request body or query is invalid.
    Validation(String),
    /// No payment with this reference belongs to the caller.
    NotFound,
    /// Webhook signature missing or invalid.
    Unauthorized,
    /// The record's gateway is no longer configured.
    GatewayUnavailable(GatewayName),
    Gateway(GatewayError),
    Reconcile(ReconcileError),
    Database(sqlx::Error),
}

impl From<CheckoutError> for PaymentsApiError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::Validation(msg) => PaymentsApiError::Validation(msg),
            CheckoutError::Gateway(e) => PaymentsApiError::Gateway(e),
            CheckoutError::Database(e) => PaymentsApiError::Database(e),
        }
    }
}

impl From<ReconcileError> for PaymentsApiError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::NotFound(_) => PaymentsApiError::NotFound,
            ReconcileError::Database(e) => PaymentsApiError::Database(e),
            other => PaymentsApiError::Reconcile(other),
        }
    }
}

impl From<VerifyError> for PaymentsApiError {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::Gateway(e) => PaymentsApiError::Gateway(e),
            VerifyError::Reconcile(e) => e.into(),
        }
    }
}

impl From<WebhookIntakeError> for PaymentsApiError {
    fn from(e: WebhookIntakeError) -> Self {
        match e {
            WebhookIntakeError::InvalidSignature => PaymentsApiError::Unauthorized,
            WebhookIntakeError::Malformed(e) => PaymentsApiError::Validation(e.to_string()),
            WebhookIntakeError::Reconcile(e) => e.into(),
        }
    }
}

impl IntoResponse for PaymentsApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            PaymentsApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            PaymentsApiError::NotFound => {
                (StatusCode::NOT_FOUND, "payment not found").into_response()
            }
            PaymentsApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "invalid signature").into_response()
            }
            PaymentsApiError::GatewayUnavailable(gateway) => {
                tracing::error!(gateway = %gateway, "Payment gateway is not configured");
                (StatusCode::BAD_GATEWAY, "payment gateway unavailable").into_response()
            }
            PaymentsApiError::Gateway(e) => {
                tracing::error!(error = %e, timeout = e.is_timeout(), "Payments API gateway error");
                (StatusCode::BAD_GATEWAY, "payment gateway error").into_response()
            }
            PaymentsApiError::Reconcile(e) => {
                tracing::error!(
                    error = %e,
                    integrity = e.is_integrity(),
                    "Payments API reconciliation error"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            PaymentsApiError::Database(e) => {
                tracing::error!(error = %e, "Payments API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses() {
        let status = |e: PaymentsApiError| e.into_response().status();

        assert_eq!(
            status(CheckoutError::Validation("bad".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(CheckoutError::Gateway(GatewayError::Timeout).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(ReconcileError::NotFound("REF_1".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(
                ReconcileError::AmountMismatch {
                    reference: "REF_1".into(),
                    expected_minor: 200_000,
                    paid_minor: 100,
                }
                .into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(WebhookIntakeError::InvalidSignature.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(VerifyError::Gateway(GatewayError::Timeout).into()),
            StatusCode::BAD_GATEWAY
        );
    }
}
