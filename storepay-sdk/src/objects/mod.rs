//! Request and response types of the storepay HTTP API.

pub mod admin;
pub mod amount;
pub mod order;
pub mod payment;

pub use order::{OrderItemResponse, OrderResponse};
pub use payment::{
    CartItem, InitializePaymentRequest, InitializePaymentResponse, VerifyPaymentQuery,
    VerifyPaymentResponse,
};

use serde::{Deserialize, Serialize};

/// Payment gateway selector.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use `storepay_core::entities::GatewayName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    Paystack,
    Monnify,
}

impl std::fmt::Display for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gateway::Paystack => write!(f, "paystack"),
            Gateway::Monnify => write!(f, "monnify"),
        }
    }
}

/// Payment status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `storepay_core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Initialized,
    Paid,
    Failed,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Initialized => write!(f, "initialized"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Order status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `storepay_core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Fulfilled,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Processing => write!(f, "processing"),
            OrderStatus::Shipped => write!(f, "shipped"),
            OrderStatus::Fulfilled => write!(f, "fulfilled"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}
