//! Paystack adapter.
//!
//! Paystack takes amounts in minor units (kobo) and reports them the same
//! way. Webhooks are signed with the merchant secret key.

use super::{
    GatewayError, InitializeTransaction, InitializedTransaction, ObservedPayment, ObservedStatus,
    PaymentGateway, VerifiedTransaction, WebhookNotice, build_http_client, provider_error,
};
use crate::config::PaystackConfig;
use crate::entities::GatewayName;
use crate::utils::amount::to_minor_units;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub struct PaystackGateway {
    secret_key: String,
    base_url: url::Url,
    http_client: reqwest::Client,
}

/// Every Paystack API response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    reference: &'a str,
    currency: &'a str,
    callback_url: &'a str,
    metadata: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    #[serde(default)]
    access_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    gateway_response: Option<String>,
}

impl TransactionData {
    fn observe(&self) -> ObservedPayment {
        let status = match self.status.as_deref() {
            Some("success") => ObservedStatus::Success,
            _ => ObservedStatus::Failed,
        };
        ObservedPayment {
            status,
            amount_minor: self.amount,
            gateway_response: self.gateway_response.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    event: String,
    data: TransactionData,
}

impl PaystackGateway {
    pub fn new(config: &PaystackConfig, timeout: Duration) -> Self {
        Self {
            secret_key: config.secret_key.clone(),
            base_url: config.base_url.clone(),
            http_client: build_http_client(timeout),
        }
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::Parse(format!("invalid Paystack URL: {e}")))
    }
}

fn parse_envelope<T: for<'de> Deserialize<'de>>(
    body: serde_json::Value,
    status: u16,
) -> Result<T, GatewayError> {
    let envelope: Envelope<T> =
        serde_json::from_value(body).map_err(|e| GatewayError::Parse(e.to_string()))?;
    if !envelope.status {
        return Err(GatewayError::Provider {
            status,
            message: envelope.message,
        });
    }
    envelope
        .data
        .ok_or_else(|| GatewayError::Parse("Paystack response has no data".to_string()))
}

fn parse_webhook_body(raw_body: &[u8]) -> Result<Option<WebhookNotice>, GatewayError> {
    let event: WebhookEvent =
        serde_json::from_slice(raw_body).map_err(|e| GatewayError::Parse(e.to_string()))?;
    let status = match event.event.as_str() {
        "charge.success" => ObservedStatus::Success,
        "charge.failed" => ObservedStatus::Failed,
        _ => return Ok(None),
    };
    let Some(reference) = event.data.reference.clone() else {
        return Err(GatewayError::Parse(
            "Paystack webhook has no reference".to_string(),
        ));
    };
    Ok(Some(WebhookNotice {
        reference,
        observed: ObservedPayment {
            status,
            ..event.data.observe()
        },
    }))
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    fn name(&self) -> GatewayName {
        GatewayName::Paystack
    }

    async fn initialize(
        &self,
        request: InitializeTransaction,
    ) -> Result<InitializedTransaction, GatewayError> {
        let amount = to_minor_units(request.amount_major)?;
        let response = self
            .http_client
            .post(self.endpoint("/transaction/initialize")?)
            .bearer_auth(&self.secret_key)
            .json(&InitializeBody {
                email: &request.email,
                amount,
                reference: &request.reference,
                currency: &request.currency,
                callback_url: &request.callback_url,
                metadata: &request.metadata,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(provider_error(response).await);
        }
        let data: InitializeData = parse_envelope(response.json().await?, status.as_u16())?;
        debug!(
            reference = %request.reference,
            access_code = ?data.access_code,
            "Paystack transaction initialized"
        );
        Ok(InitializedTransaction {
            checkout_url: data.authorization_url,
            provider_reference: data.access_code,
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        let path = format!("/transaction/verify/{}", urlencoding::encode(reference));
        let response = self
            .http_client
            .get(self.endpoint(&path)?)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(provider_error(response).await);
        }
        let raw: serde_json::Value = response.json().await?;
        let data: TransactionData = parse_envelope(raw.clone(), status.as_u16())?;
        Ok(VerifiedTransaction {
            observed: data.observe(),
            raw,
        })
    }

    fn validate_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        storepay_sdk::signature::verify_sha512_hex(
            raw_body,
            signature,
            self.secret_key.as_bytes(),
        )
        .is_ok()
    }

    fn parse_webhook(&self, raw_body: &[u8]) -> Result<Option<WebhookNotice>, GatewayError> {
        parse_webhook_body(raw_body)
    }
}
