//! Checkout API request and response types.
//!
//! Field names follow the storefront frontend (`camelCase`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::amount::lenient_decimal;
use super::{Gateway, PaymentStatus};

/// One cart line as submitted by the storefront.
///
/// `price` is the unit price in major currency units (naira for NGN).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: u32,
    #[serde(with = "lenient_decimal")]
    pub price: Decimal,
    #[serde(default)]
    pub name: Option<String>,
}

/// Request body of `POST /api/payments/initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentRequest {
    /// Total in major currency units.
    #[serde(with = "lenient_decimal")]
    pub amount: Decimal,
    /// May be left empty when the access token carries an email.
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub cart: Vec<CartItem>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    /// Gateway to use. Falls back to the server's configured default.
    #[serde(default)]
    pub gateway: Option<Gateway>,
}

/// Response of `POST /api/payments/initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentResponse {
    /// Gateway checkout page the user should be redirected to.
    pub authorization_url: String,
    pub reference: String,
    pub gateway: Gateway,
}

/// Query string of `GET /api/payments/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentQuery {
    #[serde(default)]
    pub reference: Option<String>,
}

/// Response of `GET /api/payments/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub reference: String,
    pub paid: bool,
    pub status: PaymentStatus,
    /// Order created for this payment, once materialized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
}
