//! Checkout processor.
//!
//! Validates a checkout request, persists the `initialized` payment record
//! and only then asks the gateway for a checkout page. Persisting first
//! means a webhook arriving before the gateway call returns always finds its
//! record.

use crate::entities::GatewayName;
use crate::entities::payment_records::{AttachProviderReference, CartLine, CreatePaymentRecord};
use crate::framework::PaymentLedger;
use crate::gateways::{GatewayError, GatewayRegistry, InitializeTransaction};
use crate::utils::amount::to_minor_units;
use crate::utils::reference::generate_reference;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use storepay_sdk::objects::InitializePaymentRequest;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid checkout request: {0}")]
    Validation(String),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct StartCheckout {
    pub user_id: Uuid,
    /// Email from the caller's access token, used when the request has none.
    pub account_email: Option<String>,
    pub request: InitializePaymentRequest,
    pub callback_url: String,
    pub default_currency: String,
    pub gateways: GatewayRegistry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutStarted {
    pub reference: String,
    pub authorization_url: String,
    pub gateway: GatewayName,
}

/// A request that passed validation, with its amount in minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCheckout {
    pub amount_major: Decimal,
    pub amount_minor: i64,
    pub email: String,
    pub cart: Vec<CartLine>,
}

pub fn validate_checkout(request: &InitializePaymentRequest) -> Result<ValidatedCheckout, CheckoutError> {
    let invalid = |msg: &str| CheckoutError::Validation(msg.to_string());

    if request.amount <= Decimal::ZERO {
        return Err(invalid("amount must be greater than zero"));
    }
    let email = request.email.trim();
    if email.is_empty() {
        return Err(invalid("email is required"));
    }
    if request.cart.is_empty() {
        return Err(invalid("cart must not be empty"));
    }

    let mut total = Decimal::ZERO;
    let mut cart = Vec::with_capacity(request.cart.len());
    for item in &request.cart {
        if item.product_id.trim().is_empty() {
            return Err(invalid("cart item is missing productId"));
        }
        if item.quantity == 0 {
            return Err(CheckoutError::Validation(format!(
                "quantity for {} must be greater than zero",
                item.product_id
            )));
        }
        // Order items store quantity as a Postgres INT.
        if i32::try_from(item.quantity).is_err() {
            return Err(CheckoutError::Validation(format!(
                "quantity for {} is too large",
                item.product_id
            )));
        }
        if item.price < Decimal::ZERO {
            return Err(CheckoutError::Validation(format!(
                "price for {} must not be negative",
                item.product_id
            )));
        }
        if !item.price.is_zero() && to_minor_units(item.price).is_err() {
            return Err(CheckoutError::Validation(format!(
                "price for {} is not a whole number of minor units",
                item.product_id
            )));
        }
        total = item
            .price
            .checked_mul(Decimal::from(item.quantity))
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or_else(|| invalid("cart total is out of range"))?;
        cart.push(CartLine {
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            quantity: item.quantity,
            unit_price: item.price,
            name: item.name.clone(),
        });
    }

    if total != request.amount {
        return Err(CheckoutError::Validation(format!(
            "cart total {total} does not match amount {}",
            request.amount
        )));
    }

    let amount_minor =
        to_minor_units(request.amount).map_err(|e| CheckoutError::Validation(e.to_string()))?;

    Ok(ValidatedCheckout {
        amount_major: request.amount,
        amount_minor,
        email: email.to_string(),
        cart,
    })
}

#[derive(Clone)]
pub struct Checkout<L> {
    ledger: L,
}

impl<L> Checkout<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }
}

impl<L: PaymentLedger> Processor<StartCheckout> for Checkout<L> {
    type Output = CheckoutStarted;
    type Error = CheckoutError;

    #[tracing::instrument(skip_all, err, fields(user_id = %cmd.user_id))]
    async fn process(&self, mut cmd: StartCheckout) -> Result<CheckoutStarted, CheckoutError> {
        if cmd.request.email.trim().is_empty() {
            if let Some(email) = cmd.account_email.take() {
                cmd.request.email = email;
            }
        }
        let validated = validate_checkout(&cmd.request)?;

        let requested = cmd.request.gateway.map(GatewayName::from);
        let gateway = cmd.gateways.resolve(requested).ok_or_else(|| {
            CheckoutError::Validation(format!(
                "gateway {} is not configured",
                requested.unwrap_or(cmd.gateways.default_gateway())
            ))
        })?;

        let currency = cmd
            .request
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
            .unwrap_or(cmd.default_currency);
        let reference = generate_reference();
        let metadata = cmd
            .request
            .meta
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));

        self.ledger
            .process(CreatePaymentRecord {
                reference: reference.clone(),
                user_id: cmd.user_id,
                email: validated.email.clone(),
                gateway: gateway.name(),
                amount_minor: validated.amount_minor,
                currency: currency.clone(),
                cart: validated.cart,
                meta: cmd.request.meta,
            })
            .await?;

        let initialized = gateway
            .initialize(InitializeTransaction {
                email: validated.email,
                amount_major: validated.amount_major,
                currency,
                reference: reference.clone(),
                callback_url: cmd.callback_url,
                metadata,
            })
            .await
            .inspect_err(|e| {
                error!(
                    reference = %reference,
                    gateway = %gateway.name(),
                    error = %e,
                    "Gateway initialization failed; payment stays initialized"
                );
            })?;

        if let Some(provider_reference) = initialized.provider_reference {
            self.ledger
                .process(AttachProviderReference {
                    reference: reference.clone(),
                    provider_reference,
                })
                .await?;
        }

        info!(
            reference = %reference,
            gateway = %gateway.name(),
            amount_minor = validated.amount_minor,
            "Checkout started"
        );

        Ok(CheckoutStarted {
            reference,
            authorization_url: initialized.checkout_url,
            gateway: gateway.name(),
        })
    }
}
