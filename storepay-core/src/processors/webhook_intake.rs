//! WebhookIntake processor.
//!
//! Authenticates a gateway webhook delivery over its exact raw bytes, parses
//! it and hands any payment verdict to the [`Reconciler`]. Gateways retry
//! deliveries they consider failed, so repeated deliveries of the same event
//! must be harmless; the reconciler's fast path takes care of that.

use crate::framework::PaymentLedger;
use crate::gateways::{GatewayError, PaymentGateway};
use crate::processors::reconciliation::{Reconcile, ReconcileError, ReconcileOutcome, Reconciler};
use kanau::processor::Processor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum WebhookIntakeError {
    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("malformed webhook payload: {0}")]
    Malformed(#[source] GatewayError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDisposition {
    Processed(ReconcileOutcome),
    /// Event type without a payment verdict.
    Ignored,
    /// A verdict for a reference this store never issued.
    UnknownReference(String),
    /// A verdict signed by a gateway that did not handle the payment.
    GatewayMismatch(String),
}

pub struct WebhookDelivery {
    pub gateway: Arc<dyn PaymentGateway>,
    pub signature: Option<String>,
    pub raw_body: Vec<u8>,
}

#[derive(Clone)]
pub struct WebhookIntake<L> {
    reconciler: Reconciler<L>,
}

impl<L> WebhookIntake<L> {
    pub fn new(reconciler: Reconciler<L>) -> Self {
        Self { reconciler }
    }
}

impl<L: PaymentLedger> Processor<WebhookDelivery> for WebhookIntake<L> {
    type Output = WebhookDisposition;
    type Error = WebhookIntakeError;

    #[tracing::instrument(skip_all, err, fields(gateway = %delivery.gateway.name()))]
    async fn process(
        &self,
        delivery: WebhookDelivery,
    ) -> Result<WebhookDisposition, WebhookIntakeError> {
        let gateway = delivery.gateway;
        let signature = delivery.signature.unwrap_or_default();
        if !gateway.validate_webhook_signature(&delivery.raw_body, &signature) {
            warn!(gateway = %gateway.name(), "Rejected webhook with invalid signature");
            return Err(WebhookIntakeError::InvalidSignature);
        }

        let Some(notice) = gateway
            .parse_webhook(&delivery.raw_body)
            .map_err(WebhookIntakeError::Malformed)?
        else {
            return Ok(WebhookDisposition::Ignored);
        };

        info!(
            gateway = %gateway.name(),
            reference = %notice.reference,
            success = notice.observed.is_success(),
            "Webhook received"
        );

        match self
            .reconciler
            .process(Reconcile {
                reference: notice.reference,
                observed: notice.observed,
                gateway: Some(gateway.name()),
            })
            .await
        {
            Ok(outcome) => Ok(WebhookDisposition::Processed(outcome)),
            Err(ReconcileError::NotFound(reference)) => {
                warn!(
                    gateway = %gateway.name(),
                    reference = %reference,
                    "Webhook for unknown payment reference"
                );
                Ok(WebhookDisposition::UnknownReference(reference))
            }
            Err(ReconcileError::GatewayMismatch { reference, .. }) => {
                Ok(WebhookDisposition::GatewayMismatch(reference))
            }
            Err(e) => Err(e.into()),
        }
    }
}
