//! OrderMaterializer processor.
//!
//! Turns a `paid` payment record into an order with line items built from
//! the cart snapshot taken at checkout. Running it again for the same record
//! returns the existing order and writes nothing.
//!
//! Only the call that actually inserts the order queues an
//! [`OrderConfirmation`], so the buyer gets one email per order however many
//! times the payment is reconciled.

use crate::entities::OrderStatus;
use crate::entities::order_records::{
    CreateOrderWithItems, GetOrderByPaymentReference, NewOrder, NewOrderItem, OrderRecord,
};
use crate::entities::payment_records::PaymentRecord;
use crate::events::{OrderConfirmation, OrderConfirmationSender};
use crate::framework::PaymentLedger;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("payment {0} is not paid")]
    NotPaid(String),

    #[error("payment {0} has an empty cart snapshot")]
    EmptyCart(String),

    #[error("payment {reference} has an invalid quantity for product {product_id}")]
    InvalidQuantity {
        reference: String,
        product_id: String,
    },

    #[error("payment {reference} cart totals {computed}, expected {expected}")]
    AmountMismatch {
        reference: String,
        expected: Decimal,
        computed: Decimal,
    },

    #[error("payment {reference} line for product {product_id} is out of range")]
    LineOverflow {
        reference: String,
        product_id: String,
    },

    /// The insert hit the unique constraint but no order could be read back.
    #[error("order for payment {0} conflicted but could not be loaded")]
    MissingAfterConflict(String),
}

impl MaterializeError {
    /// Data inconsistencies that retrying will not fix.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            MaterializeError::NotPaid(_)
                | MaterializeError::EmptyCart(_)
                | MaterializeError::InvalidQuantity { .. }
                | MaterializeError::AmountMismatch { .. }
                | MaterializeError::LineOverflow { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedOrder {
    pub order: OrderRecord,
    /// `false` when the order already existed.
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct Materialize {
    pub record: PaymentRecord,
}

#[derive(Clone)]
pub struct OrderMaterializer<L> {
    ledger: L,
    confirmations: Option<OrderConfirmationSender>,
}

impl<L> OrderMaterializer<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            confirmations: None,
        }
    }

    /// Queue a confirmation email for every order this materializer creates.
    pub fn with_confirmations(mut self, confirmations: Option<OrderConfirmationSender>) -> Self {
        self.confirmations = confirmations;
        self
    }

    fn queue_confirmation(&self, record: &PaymentRecord, order: &OrderRecord) {
        let Some(tx) = &self.confirmations else {
            return;
        };
        match tx.try_send(OrderConfirmation::new(record, order)) {
            Ok(()) => {}
            Err(TrySendError::Full(confirmation)) => {
                warn!(
                    reference = %confirmation.reference,
                    "Confirmation queue is full; email not sent"
                );
            }
            Err(TrySendError::Closed(confirmation)) => {
                warn!(
                    reference = %confirmation.reference,
                    "Confirmation worker is gone; email not sent"
                );
            }
        }
    }
}

/// Build order lines from the cart snapshot and check they add up to the
/// amount the payment was created for.
pub fn build_order_items(record: &PaymentRecord) -> Result<Vec<NewOrderItem>, MaterializeError> {
    let cart = record.cart_lines();
    if cart.is_empty() {
        return Err(MaterializeError::EmptyCart(record.reference.clone()));
    }

    let mut items = Vec::with_capacity(cart.len());
    let mut computed = Decimal::ZERO;
    for line in cart {
        let quantity = i32::try_from(line.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| MaterializeError::InvalidQuantity {
                reference: record.reference.clone(),
                product_id: line.product_id.clone(),
            })?;
        let overflow = || MaterializeError::LineOverflow {
            reference: record.reference.clone(),
            product_id: line.product_id.clone(),
        };
        let line_total = line
            .unit_price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(overflow)?;
        computed = computed.checked_add(line_total).ok_or_else(overflow)?;
        items.push(NewOrderItem {
            product_id: line.product_id.clone(),
            variant_id: line.variant_id.clone(),
            quantity,
            unit_price: line.unit_price,
            line_total,
        });
    }

    let expected = record.amount_major();
    if computed != expected {
        return Err(MaterializeError::AmountMismatch {
            reference: record.reference.clone(),
            expected,
            computed,
        });
    }
    Ok(items)
}

impl<L: PaymentLedger> Processor<Materialize> for OrderMaterializer<L> {
    type Output = MaterializedOrder;
    type Error = MaterializeError;

    #[tracing::instrument(skip_all, err, fields(reference = %cmd.record.reference))]
    async fn process(&self, cmd: Materialize) -> Result<MaterializedOrder, MaterializeError> {
        let record = cmd.record;
        if !record.is_paid() {
            return Err(MaterializeError::NotPaid(record.reference));
        }

        if let Some(order) = self
            .ledger
            .process(GetOrderByPaymentReference {
                payment_reference: record.reference.clone(),
            })
            .await?
        {
            return Ok(MaterializedOrder {
                order,
                created: false,
            });
        }

        let items = build_order_items(&record).inspect_err(|e| {
            error!(
                reference = %record.reference,
                error = %e,
                "Paid payment cannot be materialized into an order"
            );
        })?;

        let inserted = self
            .ledger
            .process(CreateOrderWithItems {
                order: NewOrder {
                    id: Uuid::now_v7(),
                    payment_reference: record.reference.clone(),
                    user_id: record.user_id,
                    amount: record.amount_major(),
                    currency: record.currency.clone(),
                    status: OrderStatus::Processing,
                },
                items,
            })
            .await?;

        match inserted {
            Some(order) => {
                info!(
                    reference = %record.reference,
                    order_id = %order.id,
                    amount = %order.amount,
                    "Order created"
                );
                self.queue_confirmation(&record, &order);
                Ok(MaterializedOrder {
                    order,
                    created: true,
                })
            }
            None => {
                let existing = self
                    .ledger
                    .process(GetOrderByPaymentReference {
                        payment_reference: record.reference.clone(),
                    })
                    .await?
                    .ok_or_else(|| MaterializeError::MissingAfterConflict(record.reference))?;
                Ok(MaterializedOrder {
                    order: existing,
                    created: false,
                })
            }
        }
    }
}
