//! Admin API handlers.
//!
//! These endpoints are called by the admin dashboard frontend and require
//! an access token carrying `role = "admin"`.
//!
//! # Endpoints
//!
//! - `GET  /orders`                         – list orders (paginated, filterable)
//! - `PUT  /orders/{order_id}`              – update fulfillment fields
//! - `POST /payments/{reference}/reverify`  – re-check a payment with its gateway

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use storepay_core::entities::GatewayName;
use storepay_core::gateways::GatewayError;
use storepay_core::processors::{MaterializeError, ReconcileError, VerifyError};

use crate::state::AppState;

mod list_orders;
mod reverify;
mod update_order;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders::list_orders))
        .route("/orders/{order_id}", put(update_order::update_order))
        .route(
            "/payments/{reference}/reverify",
            post(reverify::reverify_payment),
        )
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in Admin API handlers.
#[derive(Debug)]
pub(crate) enum AdminApiError {
    Database(sqlx::Error),
    NotFound,
    Validation(String),
    GatewayUnavailable(GatewayName),
    Gateway(GatewayError),
    Reconcile(ReconcileError),
    Materialize(MaterializeError),
}

impl From<VerifyError> for AdminApiError {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::Gateway(e) => AdminApiError::Gateway(e),
            VerifyError::Reconcile(ReconcileError::NotFound(_)) => AdminApiError::NotFound,
            VerifyError::Reconcile(ReconcileError::Database(e)) => AdminApiError::Database(e),
            VerifyError::Reconcile(e) => AdminApiError::Reconcile(e),
        }
    }
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Database(e) => {
                tracing::error!(error = %e, "Admin API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::NotFound => {
                (StatusCode::NOT_FOUND, "resource not found").into_response()
            }
            AdminApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AdminApiError::GatewayUnavailable(gateway) => {
                tracing::error!(gateway = %gateway, "Admin API: gateway is not configured");
                (StatusCode::BAD_GATEWAY, "payment gateway unavailable").into_response()
            }
            AdminApiError::Gateway(e) => {
                tracing::error!(error = %e, "Admin API gateway error");
                (StatusCode::BAD_GATEWAY, "payment gateway error").into_response()
            }
            AdminApiError::Reconcile(e) => {
                tracing::error!(error = %e, integrity = e.is_integrity(), "Admin API reconciliation error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            AdminApiError::Materialize(e) => {
                tracing::error!(error = %e, integrity = e.is_integrity(), "Admin API order materialization error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::extractors::tests::{SECRET, token};
    use crate::api::test_support::router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    fn get_orders(role: Option<&str>) -> Request<Body> {
        let token = token(&uuid::Uuid::now_v7().to_string(), role, SECRET);
        Request::get("/api/admin/orders")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn anonymous_is_unauthorized() {
        let response = router()
            .oneshot(Request::get("/api/admin/orders").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_admin_is_forbidden() {
        for role in [None, Some("customer")] {
            let response = router().oneshot(get_orders(role)).await.unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn empty_update_is_rejected_before_touching_the_database() {
        let token = token(&uuid::Uuid::now_v7().to_string(), Some("admin"), SECRET);
        let request = Request::put(format!("/api/admin/orders/{}", uuid::Uuid::now_v7()))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
