//! Payment gateway adapters.
//!
//! Each provider implements [`PaymentGateway`] so checkout, verification and
//! webhook intake never branch on the provider. Provider credentials are
//! injected at construction; the server rebuilds the [`GatewayRegistry`] on
//! configuration reload.

pub mod monnify;
pub mod paystack;

use crate::config::{MonnifyConfig, PaymentsConfig, PaystackConfig};
use crate::entities::GatewayName;
use crate::utils::amount::AmountError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub use monnify::MonnifyGateway;
pub use paystack::PaystackGateway;

/// Errors that can occur while talking to a payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure (connection refused, TLS, body decode).
    #[error("gateway request error: {0}")]
    Request(reqwest::Error),

    /// The call did not complete within the configured timeout.
    #[error("gateway request timed out")]
    Timeout,

    /// Non-2xx response, or a 2xx whose envelope reports failure.
    #[error("gateway error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    /// The response or webhook body did not have the expected shape.
    #[error("gateway response parsing error: {0}")]
    Parse(String),

    #[error("amount conversion error: {0}")]
    Amount(#[from] AmountError),
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Request(error)
        }
    }
}

impl GatewayError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeTransaction {
    pub email: String,
    /// Amount in major units; adapters convert to what their API expects.
    pub amount_major: Decimal,
    pub currency: String,
    pub reference: String,
    pub callback_url: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializedTransaction {
    /// Hosted checkout page to redirect the user to.
    pub checkout_url: String,
    pub provider_reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedStatus {
    Success,
    Failed,
}

/// A gateway's verdict about a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedPayment {
    pub status: ObservedStatus,
    /// Amount the gateway says was paid, in minor units, when reported.
    pub amount_minor: Option<i64>,
    /// Human readable gateway message, stored on the payment record.
    pub gateway_response: Option<String>,
}

impl ObservedPayment {
    pub fn success(amount_minor: Option<i64>) -> Self {
        Self {
            status: ObservedStatus::Success,
            amount_minor,
            gateway_response: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: ObservedStatus::Failed,
            amount_minor: None,
            gateway_response: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ObservedStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransaction {
    pub observed: ObservedPayment,
    pub raw: serde_json::Value,
}

/// A webhook delivery that carries a payment verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotice {
    pub reference: String,
    pub observed: ObservedPayment,
}

/// Uniform contract over the supported payment providers.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> GatewayName;

    /// Create a transaction on the provider and return its checkout URL.
    async fn initialize(
        &self,
        request: InitializeTransaction,
    ) -> Result<InitializedTransaction, GatewayError>;

    /// Ask the provider for the current state of a transaction.
    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError>;

    /// Check the webhook signature header against the exact raw body.
    fn validate_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool;

    /// Parse a webhook body whose signature has already been validated.
    ///
    /// Returns `Ok(None)` for event types that carry no payment verdict.
    fn parse_webhook(&self, raw_body: &[u8]) -> Result<Option<WebhookNotice>, GatewayError>;
}

/// The configured gateways, keyed by name, plus the default for checkouts
/// that do not name one.
#[derive(Clone)]
pub struct GatewayRegistry {
    gateways: HashMap<GatewayName, Arc<dyn PaymentGateway>>,
    default: GatewayName,
}

impl GatewayRegistry {
    pub fn new(default: GatewayName) -> Self {
        Self {
            gateways: HashMap::new(),
            default,
        }
    }

    /// Construct adapters for every provider that has credentials configured.
    pub fn from_config(
        payments: &PaymentsConfig,
        paystack: Option<&PaystackConfig>,
        monnify: Option<&MonnifyConfig>,
    ) -> Self {
        let mut registry = Self::new(payments.default_gateway);
        if let Some(config) = paystack {
            registry = registry.with_gateway(Arc::new(PaystackGateway::new(
                config,
                payments.gateway_timeout,
            )));
        }
        if let Some(config) = monnify {
            registry = registry.with_gateway(Arc::new(MonnifyGateway::new(
                config,
                payments.gateway_timeout,
            )));
        }
        registry
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.name(), gateway);
        self
    }

    pub fn get(&self, name: GatewayName) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(&name).cloned()
    }

    pub fn default_gateway(&self) -> GatewayName {
        self.default
    }

    /// The requested gateway, or the default when none was requested.
    pub fn resolve(&self, requested: Option<GatewayName>) -> Option<Arc<dyn PaymentGateway>> {
        self.get(requested.unwrap_or(self.default))
    }

    pub fn configured(&self) -> impl Iterator<Item = GatewayName> + '_ {
        self.gateways.keys().copied()
    }
}

/// Build the HTTP client shared by an adapter's calls.
pub(crate) fn build_http_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Read a non-2xx response into a provider error.
pub(crate) async fn provider_error(response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("responseMessage"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);
    GatewayError::Provider { status, message }
}

#[cfg(test)]
pub(crate) mod fake {
    //! A scriptable in-process gateway for processor tests.

    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct FakeGateway {
        pub name: GatewayName,
        pub secret: Vec<u8>,
        pub verify_result: Mutex<Option<ObservedPayment>>,
        pub fail_initialize: bool,
        pub initialize_calls: AtomicUsize,
        pub verify_calls: AtomicUsize,
        pub last_initialize: Mutex<Option<InitializeTransaction>>,
    }

    impl FakeGateway {
        pub fn new(name: GatewayName) -> Self {
            Self {
                name,
                secret: b"fake-secret".to_vec(),
                verify_result: Mutex::new(None),
                fail_initialize: false,
                initialize_calls: AtomicUsize::new(0),
                verify_calls: AtomicUsize::new(0),
                last_initialize: Mutex::new(None),
            }
        }

        pub fn verifying(self, observed: ObservedPayment) -> Self {
            *self.verify_result.lock().unwrap() = Some(observed);
            self
        }

        pub fn verify_count(&self) -> usize {
            self.verify_calls.load(Ordering::SeqCst)
        }

        pub fn initialize_count(&self) -> usize {
            self.initialize_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        fn name(&self) -> GatewayName {
            self.name
        }

        async fn initialize(
            &self,
            request: InitializeTransaction,
        ) -> Result<InitializedTransaction, GatewayError> {
            self.initialize_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_initialize {
                return Err(GatewayError::Timeout);
            }
            let reference = request.reference.clone();
            *self.last_initialize.lock().unwrap() = Some(request);
            Ok(InitializedTransaction {
                checkout_url: format!("https://checkout.test/{reference}"),
                provider_reference: Some(format!("PRV-{reference}")),
            })
        }

        async fn verify(&self, _reference: &str) -> Result<VerifiedTransaction, GatewayError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            match self.verify_result.lock().unwrap().clone() {
                Some(observed) => Ok(VerifiedTransaction {
                    observed,
                    raw: serde_json::Value::Null,
                }),
                None => Err(GatewayError::Timeout),
            }
        }

        fn validate_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
            storepay_sdk::signature::verify_sha512_hex(raw_body, signature, &self.secret).is_ok()
        }

        fn parse_webhook(&self, raw_body: &[u8]) -> Result<Option<WebhookNotice>, GatewayError> {
            // {"reference": "...", "success": bool, "amountMinor": i64?}
            let value: serde_json::Value = serde_json::from_slice(raw_body)
                .map_err(|e| GatewayError::Parse(e.to_string()))?;
            let Some(reference) = value.get("reference").and_then(|r| r.as_str()) else {
                return Ok(None);
            };
            let amount = value.get("amountMinor").and_then(|a| a.as_i64());
            let observed = if value.get("success").and_then(|s| s.as_bool()) == Some(true) {
                ObservedPayment::success(amount)
            } else {
                ObservedPayment::failed()
            };
            Ok(Some(WebhookNotice {
                reference: reference.to_string(),
                observed,
            }))
        }
    }
}
