use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use kanau::processor::Processor;
use storepay_core::processors::{Checkout, StartCheckout};
use storepay_sdk::objects::{InitializePaymentRequest, InitializePaymentResponse};

use super::PaymentsApiError;
use crate::api::extractors::AuthUser;
use crate::state::AppState;

/// `POST /initialize` — start a checkout.
///
/// Persists an `initialized` payment record for the caller's cart and
/// returns the gateway checkout page to redirect to. A blank `email` falls
/// back to the one in the caller's token.
pub(super) async fn initialize(
    state: State<AppState>,
    user: AuthUser,
    body: Result<Json<InitializePaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, PaymentsApiError> {
    let Json(request) = body.map_err(|e| PaymentsApiError::Validation(e.body_text()))?;

    let callback_url = state.config.server.read().await.payment_callback_url();
    let default_currency = state.config.payments.read().await.default_currency.clone();
    let gateways = state.gateways.snapshot().await;

    let started = Checkout::new(state.processor())
        .process(StartCheckout {
            user_id: user.user_id,
            account_email: user.email,
            request,
            callback_url,
            default_currency,
            gateways,
        })
        .await?;

    Ok(Json(InitializePaymentResponse {
        authorization_url: started.authorization_url,
        reference: started.reference,
        gateway: started.gateway.into(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::extractors::tests::{SECRET, token};
    use crate::api::test_support::router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    fn request(auth: Option<String>, body: &'static str) -> Request<Body> {
        let mut builder = Request::post("/api/payments/initialize")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = auth {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn user_token() -> String {
        token(&uuid::Uuid::now_v7().to_string(), None, SECRET)
    }

    #[tokio::test]
    async fn requires_authentication() {
        let response = router()
            .oneshot(request(None, r#"{"amount":2000,"email":"a@b.c","cart":[]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn accepts_token_from_cookie() {
        let request = Request::post("/api/payments/initialize")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, format!("accessToken={}", user_token()))
            .body(Body::from(r#"{"amount":0,"email":"a@b.c","cart":[]}"#))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_checkout_is_bad_request() {
        for body in [
            r#"{"amount":0,"email":"buyer@example.com","cart":[]}"#,
            r#"{"amount":2000,"email":"buyer@example.com","cart":[]}"#,
            r#"{"amount":2000,"email":"buyer@example.com","cart":[{"productId":"p-1","quantity":1,"price":1000}]}"#,
            r#"{"amount":"abc","email":"buyer@example.com"}"#,
            "not json",
        ] {
            let response = router()
                .oneshot(request(Some(user_token()), body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        }
    }
}
