use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use kanau::processor::Processor;
use storepay_core::entities::PaymentStatus;
use storepay_core::entities::order_records::GetOrderByPaymentReference;
use storepay_core::entities::payment_records::GetPaymentByReference;
use storepay_core::processors::ReconcileOutcome;
use storepay_sdk::objects::{VerifyPaymentQuery, VerifyPaymentResponse};

use super::PaymentsApiError;
use crate::api::extractors::AuthUser;
use crate::state::AppState;

/// `GET /verify?reference=` — verify a checkout.
///
/// A record that is already `paid` is answered from the database. Otherwise
/// the gateway is asked and its verdict reconciled, racing any webhook for
/// the same reference.
pub(super) async fn verify(
    state: State<AppState>,
    user: AuthUser,
    Query(query): Query<VerifyPaymentQuery>,
) -> Result<impl IntoResponse, PaymentsApiError> {
    let reference = query
        .reference
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| PaymentsApiError::Validation("reference is required".to_string()))?;

    let processor = state.processor();
    let record = processor
        .process(GetPaymentByReference {
            reference: reference.clone(),
        })
        .await
        .map_err(PaymentsApiError::Database)?
        .filter(|r| r.user_id == user.user_id)
        .ok_or(PaymentsApiError::NotFound)?;

    if record.is_paid() {
        let order_id = processor
            .process(GetOrderByPaymentReference {
                payment_reference: reference.clone(),
            })
            .await
            .map_err(PaymentsApiError::Database)?
            .map(|o| o.id);
        return Ok(Json(VerifyPaymentResponse {
            reference,
            paid: true,
            status: PaymentStatus::Paid.into(),
            order_id,
        }));
    }

    let gateway = state
        .gateways
        .read()
        .await
        .get(record.gateway)
        .ok_or(PaymentsApiError::GatewayUnavailable(record.gateway))?;

    let outcome = state
        .reconciler()
        .verify_and_reconcile(gateway.as_ref(), &reference)
        .await?;

    let response = match outcome {
        ReconcileOutcome::Paid(materialized) => VerifyPaymentResponse {
            reference,
            paid: true,
            status: PaymentStatus::Paid.into(),
            order_id: Some(materialized.order.id),
        },
        ReconcileOutcome::AlreadyProcessed => {
            // A concurrent webhook won the transition; its order may still be in flight.
            let order_id = processor
                .process(GetOrderByPaymentReference {
                    payment_reference: reference.clone(),
                })
                .await
                .map_err(PaymentsApiError::Database)?
                .map(|o| o.id);
            VerifyPaymentResponse {
                reference,
                paid: true,
                status: PaymentStatus::Paid.into(),
                order_id,
            }
        }
        ReconcileOutcome::Failed => VerifyPaymentResponse {
            reference,
            paid: false,
            status: PaymentStatus::Failed.into(),
            order_id: None,
        },
    };

    Ok(Json(response))
}
