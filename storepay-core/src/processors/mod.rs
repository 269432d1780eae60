//! Payment flow processors.
//!
//! - `Checkout`: validates a cart, persists the payment record, initializes the gateway
//! - `Reconciler`: applies a gateway verdict to a payment record
//! - `OrderMaterializer`: creates the order for a paid record, once
//! - `WebhookIntake`: authenticates and parses webhooks, feeds the `Reconciler`
//! - `OrderRepairSweeper`: background repair of paid records without an order
//! - `OrderConfirmationNotifier`: emails the buyer once an order is created

pub mod checkout;
pub mod order_confirmation;
pub mod order_materializer;
pub mod reconciliation;
pub mod repair_sweeper;
pub mod webhook_intake;

#[cfg(test)]
pub(crate) mod test_support;

pub use checkout::{Checkout, CheckoutError, CheckoutStarted, StartCheckout};
pub use order_confirmation::OrderConfirmationNotifier;
pub use order_materializer::{MaterializeError, MaterializedOrder, OrderMaterializer};
pub use reconciliation::{Reconcile, ReconcileError, ReconcileOutcome, Reconciler, VerifyError};
pub use repair_sweeper::{OrderRepairSweeper, SweepReport};
pub use webhook_intake::{WebhookDelivery, WebhookDisposition, WebhookIntake, WebhookIntakeError};
