use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use kanau::processor::Processor;
use storepay_core::entities::GatewayName;
use storepay_core::processors::{WebhookDelivery, WebhookDisposition, WebhookIntake};
use storepay_sdk::signature::{MONNIFY_SIGNATURE_HEADER, PAYSTACK_SIGNATURE_HEADER};

use super::PaymentsApiError;
use crate::state::AppState;

/// Pick the provider by which signature header the delivery carries.
fn signed_by(headers: &HeaderMap) -> Option<(GatewayName, String)> {
    [
        (GatewayName::Paystack, PAYSTACK_SIGNATURE_HEADER),
        (GatewayName::Monnify, MONNIFY_SIGNATURE_HEADER),
    ]
    .into_iter()
    .find_map(|(gateway, header)| {
        let value = headers.get(header)?.to_str().ok()?;
        Some((gateway, value.trim().to_string()))
    })
}

/// `POST /webhook` — gateway payment notifications.
///
/// The body is taken as raw bytes so the signature is checked over exactly
/// what the gateway sent. Anything the store accepted, including duplicate
/// deliveries and events it has no use for, is acknowledged with 200 so the
/// gateway stops retrying.
pub(super) async fn webhook(
    state: State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, PaymentsApiError> {
    let Some((name, signature)) = signed_by(&headers) else {
        tracing::warn!("Webhook without a known signature header");
        return Err(PaymentsApiError::Unauthorized);
    };

    let Some(gateway) = state.gateways.read().await.get(name) else {
        tracing::warn!(gateway = %name, "Webhook for a gateway that is not configured");
        return Err(PaymentsApiError::Unauthorized);
    };

    let disposition = WebhookIntake::new(state.reconciler())
        .process(WebhookDelivery {
            gateway,
            signature: Some(signature),
            raw_body: body.to_vec(),
        })
        .await?;

    match disposition {
        WebhookDisposition::Processed(outcome) => {
            tracing::debug!(gateway = %name, outcome = ?outcome, "Webhook processed");
        }
        WebhookDisposition::Ignored => {
            tracing::debug!(gateway = %name, "Webhook event ignored");
        }
        WebhookDisposition::UnknownReference(_) | WebhookDisposition::GatewayMismatch(_) => {}
    }

    Ok(StatusCode::OK)
}
