//! OrderConfirmationNotifier processor.
//!
//! Receives [`OrderConfirmation`] events from the materializer and emails
//! the buyer. Failed deliveries are retried with exponential backoff
//! (2^0 to 2^6 seconds) up to the configured attempt limit. Permanent
//! failures such as a malformed recipient are not retried. A confirmation
//! that cannot be delivered is logged and dropped; the order is unaffected.

use crate::events::{OrderConfirmation, OrderConfirmationReceiver};
use crate::mail::{Mailer, render_confirmation};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Largest backoff exponent (2^6 = 64 seconds).
const MAX_BACKOFF_EXPONENT: u32 = 6;

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT))
}

pub struct OrderConfirmationNotifier {
    mailer: Arc<dyn Mailer>,
    confirmation_rx: OrderConfirmationReceiver,
    shutdown_rx: watch::Receiver<bool>,
    max_attempts: u32,
}

impl OrderConfirmationNotifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        confirmation_rx: OrderConfirmationReceiver,
        shutdown_rx: watch::Receiver<bool>,
        max_attempts: u32,
    ) -> Self {
        Self {
            mailer,
            confirmation_rx,
            shutdown_rx,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run until shutdown or until every sender is gone.
    pub async fn run(mut self) {
        info!(max_attempts = self.max_attempts, "OrderConfirmationNotifier started");

        loop {
            if *self.shutdown_rx.borrow() {
                info!("OrderConfirmationNotifier received shutdown signal");
                break;
            }

            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                received = self.confirmation_rx.recv() => {
                    let Some(confirmation) = received else {
                        info!("Order confirmation channel closed");
                        break;
                    };
                    self.deliver(confirmation).await;
                }
            }
        }

        info!("OrderConfirmationNotifier shutdown complete");
    }

    /// Send one confirmation, retrying transient failures.
    async fn deliver(&mut self, confirmation: OrderConfirmation) {
        let mail = render_confirmation(&confirmation);

        for attempt in 1..=self.max_attempts {
            let error = match self.mailer.send(mail.clone()).await {
                Ok(()) => {
                    info!(
                        reference = %confirmation.reference,
                        order_id = %confirmation.order_id,
                        attempt,
                        "Order confirmation sent"
                    );
                    return;
                }
                Err(e) => e,
            };

            if error.is_permanent() || attempt == self.max_attempts {
                error!(
                    reference = %confirmation.reference,
                    permanent = error.is_permanent(),
                    attempt,
                    error = %error,
                    "Giving up on order confirmation"
                );
                return;
            }

            let delay = backoff(attempt);
            warn!(
                reference = %confirmation.reference,
                attempt,
                retry_in_secs = delay.as_secs(),
                error = %error,
                "Order confirmation failed"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_rx.changed() => {
                    warn!(
                        reference = %confirmation.reference,
                        "Shutdown while retrying order confirmation"
                    );
                    return;
                }
            }
        }
    }
}
