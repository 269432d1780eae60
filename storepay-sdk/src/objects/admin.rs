//! Admin API request and response types.

use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// Body of `PUT /api/admin/orders/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub shipping_status: Option<String>,
    #[serde(default)]
    pub delivery_date: Option<time::Date>,
}

impl UpdateOrderRequest {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.shipping_status.is_none() && self.delivery_date.is_none()
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 200;
const MAX_OFFSET: i64 = 100_000;

/// Query parameters for listing orders.
#[derive(Debug, Clone, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub status: Option<OrderStatus>,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Clamp limit and offset to safe maximums.
pub fn clamp_pagination(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, MAX_LIMIT), offset.clamp(0, MAX_OFFSET))
}
