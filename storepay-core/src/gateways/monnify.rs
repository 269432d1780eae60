//! Monnify adapter.
//!
//! Monnify works in major units and needs a short-lived bearer token obtained
//! with the API key and secret. Webhooks are signed with the client secret.

use super::{
    GatewayError, InitializeTransaction, InitializedTransaction, ObservedPayment, ObservedStatus,
    PaymentGateway, VerifiedTransaction, WebhookNotice, build_http_client, provider_error,
};
use crate::config::MonnifyConfig;
use crate::entities::GatewayName;
use crate::utils::amount::to_minor_units;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use storepay_sdk::objects::amount::lenient_decimal_opt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Tokens are refreshed this long before Monnify says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct MonnifyGateway {
    api_key: String,
    secret_key: String,
    contract_code: String,
    base_url: url::Url,
    http_client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    request_successful: bool,
    #[serde(default)]
    response_message: String,
    response_body: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitTransactionBody<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    customer_name: &'a str,
    customer_email: &'a str,
    payment_reference: &'a str,
    payment_description: String,
    currency_code: &'a str,
    contract_code: &'a str,
    redirect_url: &'a str,
    payment_methods: [&'static str; 2],
    meta_data: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitTransactionResponse {
    checkout_url: String,
    #[serde(default)]
    transaction_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionStatus {
    #[serde(default)]
    payment_reference: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default, with = "lenient_decimal_opt")]
    amount_paid: Option<Decimal>,
}

impl TransactionStatus {
    fn observe(&self) -> Result<ObservedPayment, GatewayError> {
        let status = match self.payment_status.as_deref() {
            Some("PAID") | Some("OVERPAID") => ObservedStatus::Success,
            _ => ObservedStatus::Failed,
        };
        let amount_minor = self.amount_paid.map(major_to_minor).transpose()?;
        Ok(ObservedPayment {
            status,
            amount_minor,
            gateway_response: self.payment_status.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookEvent {
    event_type: String,
    event_data: TransactionStatus,
}

fn major_to_minor(amount: Decimal) -> Result<i64, GatewayError> {
    if amount.is_zero() {
        return Ok(0);
    }
    Ok(to_minor_units(amount)?)
}

fn parse_envelope<T: for<'de> Deserialize<'de>>(
    body: serde_json::Value,
    status: u16,
) -> Result<T, GatewayError> {
    let envelope: Envelope<T> =
        serde_json::from_value(body).map_err(|e| GatewayError::Parse(e.to_string()))?;
    if !envelope.request_successful {
        return Err(GatewayError::Provider {
            status,
            message: envelope.response_message,
        });
    }
    envelope
        .response_body
        .ok_or_else(|| GatewayError::Parse("Monnify response has no responseBody".to_string()))
}

fn parse_webhook_body(raw_body: &[u8]) -> Result<Option<WebhookNotice>, GatewayError> {
    let event: WebhookEvent =
        serde_json::from_slice(raw_body).map_err(|e| GatewayError::Parse(e.to_string()))?;
    if event.event_type != "SUCCESSFUL_TRANSACTION" {
        return Ok(None);
    }
    let Some(reference) = event.event_data.payment_reference.clone() else {
        return Err(GatewayError::Parse(
            "Monnify webhook has no paymentReference".to_string(),
        ));
    };
    Ok(Some(WebhookNotice {
        reference,
        observed: event.event_data.observe()?,
    }))
}

impl MonnifyGateway {
    pub fn new(config: &MonnifyConfig, timeout: Duration) -> Self {
        Self {
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            contract_code: config.contract_code.clone(),
            base_url: config.base_url.clone(),
            http_client: build_http_client(timeout),
            token: Mutex::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::Parse(format!("invalid Monnify URL: {e}")))
    }

    /// Return a cached access token, logging in again when it is about to expire.
    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .http_client
            .post(self.endpoint("/api/v1/auth/login")?)
            .basic_auth(&self.api_key, Some(&self.secret_key))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(provider_error(response).await);
        }
        let login: LoginBody = parse_envelope(response.json().await?, status.as_u16())?;
        let lifetime = Duration::from_secs(login.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        info!(expires_in = login.expires_in, "Monnify access token refreshed");
        *cached = Some(CachedToken {
            access_token: login.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(login.access_token)
    }
}

#[async_trait]
impl PaymentGateway for MonnifyGateway {
    fn name(&self) -> GatewayName {
        GatewayName::Monnify
    }

    async fn initialize(
        &self,
        request: InitializeTransaction,
    ) -> Result<InitializedTransaction, GatewayError> {
        // Rejects amounts finer than a kobo before anything is sent.
        to_minor_units(request.amount_major)?;
        let token = self.access_token().await?;
        let response = self
            .http_client
            .post(self.endpoint("/api/v1/merchant/transactions/init-transaction")?)
            .bearer_auth(token)
            .json(&InitTransactionBody {
                amount: request.amount_major,
                customer_name: &request.email,
                customer_email: &request.email,
                payment_reference: &request.reference,
                payment_description: format!("Order payment {}", request.reference),
                currency_code: &request.currency,
                contract_code: &self.contract_code,
                redirect_url: &request.callback_url,
                payment_methods: ["CARD", "ACCOUNT_TRANSFER"],
                meta_data: &request.metadata,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(provider_error(response).await);
        }
        let body: InitTransactionResponse =
            parse_envelope(response.json().await?, status.as_u16())?;
        debug!(
            reference = %request.reference,
            transaction_reference = ?body.transaction_reference,
            "Monnify transaction initialized"
        );
        Ok(InitializedTransaction {
            checkout_url: body.checkout_url,
            provider_reference: body.transaction_reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        let token = self.access_token().await?;
        let response = self
            .http_client
            .get(self.endpoint("/api/v2/merchant/transactions/query")?)
            .query(&[("paymentReference", reference)])
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(provider_error(response).await);
        }
        let raw: serde_json::Value = response.json().await?;
        let transaction: TransactionStatus = parse_envelope(raw.clone(), status.as_u16())?;
        Ok(VerifiedTransaction {
            observed: transaction.observe()?,
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_response_maps_paid_and_overpaid() {
        for (status, expected) in [
            ("PAID", ObservedStatus::Success),
            ("OVERPAID", ObservedStatus::Success),
            ("PARTIALLY_PAID", ObservedStatus::Failed),
            ("PENDING", ObservedStatus::Failed),
        ] {
            let body = json!({
                "requestSuccessful": true,
                "responseMessage": "success",
                "responseBody": {"paymentReference": "REF_1", "paymentStatus": status, "amountPaid": 2000.00}
            });
            let tx: TransactionStatus = parse_envelope(body, 200).unwrap();
            let observed = tx.observe().unwrap();
            assert_eq!(observed.status, expected, "{status}");
            assert_eq!(observed.amount_minor, Some(200_000));
        }
    }

    #[test]
    fn unsuccessful_request_is_a_provider_error() {
        let result: Result<TransactionStatus, _> = parse_envelope(
            json!({"requestSuccessful": false, "responseMessage": "Invalid reference"}),
            200,
        );
        assert!(matches!(result, Err(GatewayError::Provider { .. })));
    }

    #[test]
    fn webhook_events() {
        let body = br#"{
            "eventType": "SUCCESSFUL_TRANSACTION",
            "eventData": {"paymentReference": "REF_1", "amountPaid": "2000.00", "paymentStatus": "PAID"}
        }"#;
        let notice = parse_webhook_body(body).unwrap().unwrap();
        assert_eq!(notice.reference, "REF_1");
        assert!(notice.observed.is_success());
        assert_eq!(notice.observed.amount_minor, Some(200_000));

        let settlement = br#"{"eventType": "SETTLEMENT", "eventData": {}}"#;
        assert!(parse_webhook_body(settlement).unwrap().is_none());
    }

    #[test]
    fn webhook_signature_uses_client_secret() {
        let gateway = MonnifyGateway::new(
            &MonnifyConfig {
                api_key: "MK_TEST".to_string(),
                secret_key: "client-secret".to_string(),
                contract_code: "1234567890".to_string(),
                base_url: url::Url::parse("https://sandbox.monnify.com").unwrap(),
            },
            Duration::from_secs(5),
        );
        let body = br#"{"eventType":"SUCCESSFUL_TRANSACTION"}"#;
        let signature = storepay_sdk::signature::sign_sha512_hex(body, b"client-secret");
        assert!(gateway.validate_webhook_signature(body, &signature));
        assert!(!gateway.validate_webhook_signature(b"{}", &signature));
    }
}
