pub mod order_records;
pub mod payment_records;

use storepay_sdk::objects::{
    Gateway as SdkGateway, OrderStatus as SdkOrderStatus, PaymentStatus as SdkPaymentStatus,
};

/// Payment gateway name for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `storepay_sdk::objects::Gateway`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "payment_gateway")]
pub enum GatewayName {
    Paystack,
    Monnify,
}

impl std::fmt::Display for GatewayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        SdkGateway::from(*self).fmt(f)
    }
}

impl From<GatewayName> for SdkGateway {
    fn from(value: GatewayName) -> Self {
        match value {
            GatewayName::Paystack => SdkGateway::Paystack,
            GatewayName::Monnify => SdkGateway::Monnify,
        }
    }
}

impl From<SdkGateway> for GatewayName {
    fn from(value: SdkGateway) -> Self {
        match value {
            SdkGateway::Paystack => GatewayName::Paystack,
            SdkGateway::Monnify => GatewayName::Monnify,
        }
    }
}

/// Payment record status for database operations.
///
/// `Paid` is terminal: no update ever moves a record out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "payment_status")]
pub enum PaymentStatus {
    Initialized,
    Paid,
    Failed,
}

impl From<PaymentStatus> for SdkPaymentStatus {
    fn from(value: PaymentStatus) -> Self {
        match value {
            PaymentStatus::Initialized => SdkPaymentStatus::Initialized,
            PaymentStatus::Paid => SdkPaymentStatus::Paid,
            PaymentStatus::Failed => SdkPaymentStatus::Failed,
        }
    }
}

impl From<SdkPaymentStatus> for PaymentStatus {
    fn from(value: SdkPaymentStatus) -> Self {
        match value {
            SdkPaymentStatus::Initialized => PaymentStatus::Initialized,
            SdkPaymentStatus::Paid => PaymentStatus::Paid,
            SdkPaymentStatus::Failed => PaymentStatus::Failed,
        }
    }
}

/// Order fulfillment status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "order_status")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Fulfilled,
    Cancelled,
}

impl From<OrderStatus> for SdkOrderStatus {
    fn from(value: OrderStatus) -> Self {
        match value {
            OrderStatus::Pending => SdkOrderStatus::Pending,
            OrderStatus::Processing => SdkOrderStatus::Processing,
            OrderStatus::Shipped => SdkOrderStatus::Shipped,
            OrderStatus::Fulfilled => SdkOrderStatus::Fulfilled,
            OrderStatus::Cancelled => SdkOrderStatus::Cancelled,
        }
    }
}

impl From<SdkOrderStatus> for OrderStatus {
    fn from(value: SdkOrderStatus) -> Self {
        match value {
            SdkOrderStatus::Pending => OrderStatus::Pending,
            SdkOrderStatus::Processing => OrderStatus::Processing,
            SdkOrderStatus::Shipped => OrderStatus::Shipped,
            SdkOrderStatus::Fulfilled => OrderStatus::Fulfilled,
            SdkOrderStatus::Cancelled => OrderStatus::Cancelled,
        }
    }
}
