//! Checkout and reconciliation settings.

use crate::entities::GatewayName;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    /// Gateway used when a checkout request does not name one.
    pub default_gateway: GatewayName,
    /// Currency used when a checkout request does not name one.
    pub default_currency: String,
    /// Upper bound on every gateway HTTP call.
    pub gateway_timeout: Duration,
    /// How often the order repair sweeper runs.
    pub repair_interval: Duration,
}
