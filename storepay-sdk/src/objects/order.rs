//! Order API response types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OrderStatus;

/// One purchased line, priced at purchase time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// An order as returned to its owner and to admins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub payment_reference: String,
    pub user_id: Uuid,
    /// Total in major currency units.
    pub amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub shipping_status: Option<String>,
    pub delivery_date: Option<time::Date>,
    /// Unix timestamp of when the order was created.
    pub created_at: i64,
    /// Unix timestamp of the last update.
    pub updated_at: i64,
    pub items: Vec<OrderItemResponse>,
}
