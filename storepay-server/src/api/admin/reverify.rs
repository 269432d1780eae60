use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use kanau::processor::Processor;
use storepay_core::entities::PaymentStatus;
use storepay_core::entities::order_records::GetOrderByPaymentReference;
use storepay_core::entities::payment_records::GetPaymentByReference;
use storepay_core::processors::order_materializer::Materialize;
use storepay_core::processors::ReconcileOutcome;
use storepay_sdk::objects::VerifyPaymentResponse;

use crate::api::extractors::AdminUser;
use crate::state::AppState;

use super::AdminApiError;

/// `POST /payments/{reference}/reverify` — re-check a payment.
///
/// For a record that is not yet `paid` the gateway is asked again and its
/// verdict reconciled. For a `paid` record the order is materialized if it
/// is missing, without waiting for the repair sweeper. Records the sweeper
/// has blocked are attempted too.
pub async fn reverify_payment(
    state: State<AppState>,
    AdminUser(admin): AdminUser,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AdminApiError> {
    let processor = state.processor();
    let record = processor
        .process(GetPaymentByReference {
            reference: reference.clone(),
        })
        .await
        .map_err(AdminApiError::Database)?
        .ok_or(AdminApiError::NotFound)?;

    tracing::info!(reference = %reference, admin = %admin.user_id, "Admin re-verifying payment");

    if record.is_paid() {
        let materialized = state
            .materializer()
            .process(Materialize { record })
            .await
            .map_err(AdminApiError::Materialize)?;
        return Ok(Json(VerifyPaymentResponse {
            reference,
            paid: true,
            status: PaymentStatus::Paid.into(),
            order_id: Some(materialized.order.id),
        }));
    }

    let gateway = state
        .gateways
        .read()
        .await
        .get(record.gateway)
        .ok_or(AdminApiError::GatewayUnavailable(record.gateway))?;

    let outcome = state
        .reconciler()
        .verify_and_reconcile(gateway.as_ref(), &reference)
        .await?;

    let (paid, order_id) = match outcome {
        ReconcileOutcome::Paid(materialized) => (true, Some(materialized.order.id)),
        ReconcileOutcome::AlreadyProcessed => {
            let order = processor
                .process(GetOrderByPaymentReference {
                    payment_reference: reference.clone(),
                })
                .await
                .map_err(AdminApiError::Database)?;
            (true, order.map(|o| o.id))
        }
        ReconcileOutcome::Failed => (false, None),
    };

    Ok(Json(VerifyPaymentResponse {
        reference,
        paid,
        status: if paid {
            PaymentStatus::Paid.into()
        } else {
            PaymentStatus::Failed.into()
        },
        order_id,
    }))
}
