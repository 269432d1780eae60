//! Events emitted by the payment flow for background workers.

use crate::entities::order_records::OrderRecord;
use crate::entities::payment_records::{CartLine, PaymentRecord};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Buffer for the confirmation channel. When it is full the confirmation is
/// dropped and logged rather than holding up the request that paid.
pub const CONFIRMATION_CHANNEL_BUFFER: usize = 256;

/// An order was created for a paid payment and the buyer should be told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub reference: String,
    pub order_id: Uuid,
    pub recipient: String,
    pub amount: Decimal,
    pub currency: String,
    pub items: Vec<CartLine>,
}

impl OrderConfirmation {
    /// The checkout metadata may carry a delivery email that differs from
    /// the account email; it wins when present.
    pub fn new(record: &PaymentRecord, order: &OrderRecord) -> Self {
        let recipient = record
            .meta
            .as_ref()
            .and_then(|meta| meta.0.get("email"))
            .and_then(|email| email.as_str())
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .unwrap_or(&record.email)
            .to_string();
        Self {
            reference: record.reference.clone(),
            order_id: order.id,
            recipient,
            amount: order.amount,
            currency: order.currency.clone(),
            items: record.cart_lines().to_vec(),
        }
    }
}

pub type OrderConfirmationSender = mpsc::Sender<OrderConfirmation>;
pub type OrderConfirmationReceiver = mpsc::Receiver<OrderConfirmation>;

pub fn order_confirmation_channel() -> (OrderConfirmationSender, OrderConfirmationReceiver) {
    mpsc::channel(CONFIRMATION_CHANNEL_BUFFER)
}
