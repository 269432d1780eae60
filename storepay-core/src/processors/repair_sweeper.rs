//! OrderRepairSweeper processor.
//!
//! A record can end up `paid` without an order when the process stops, or
//! the database fails, between the status transition and the order insert.
//! The sweeper runs at startup and then periodically, re-running the
//! materializer for such records until they have their order.
//!
//! Every failed attempt is recorded on the payment. A record whose data can
//! never produce an order is blocked from further sweeps, and records with
//! more failures sort behind fresh ones, so a batch is never filled by the
//! same hopeless records forever.

use crate::config::ConfigStore;
use crate::entities::payment_records::{ListPaidPaymentsWithoutOrder, RecordRepairFailure};
use crate::events::OrderConfirmationSender;
use crate::framework::PaymentLedger;
use crate::processors::order_materializer::{Materialize, OrderMaterializer};
use kanau::processor::Processor;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Records repaired per sweep.
const SWEEP_BATCH_SIZE: i64 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub repaired: usize,
    pub failed: usize,
    /// Failures that took the record out of the repair queue.
    pub blocked: usize,
}

pub struct OrderRepairSweeper<L> {
    ledger: L,
    materializer: OrderMaterializer<L>,
    /// Reloadable sweep period.
    interval: ConfigStore<Duration>,
}

fn sweep_ticker(start: Instant, period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

impl<L: PaymentLedger + Clone> OrderRepairSweeper<L> {
    pub fn new(ledger: L, interval: ConfigStore<Duration>) -> Self {
        Self {
            materializer: OrderMaterializer::new(ledger.clone()),
            ledger,
            interval,
        }
    }

    pub fn with_confirmations(mut self, confirmations: Option<OrderConfirmationSender>) -> Self {
        self.materializer = self.materializer.with_confirmations(confirmations);
        self
    }

    /// Materialize orders for one batch of paid records that have none.
    pub async fn sweep_once(&self) -> Result<SweepReport, sqlx::Error> {
        let orphans = self
            .ledger
            .process(ListPaidPaymentsWithoutOrder {
                limit: SWEEP_BATCH_SIZE,
            })
            .await?;
        if orphans.is_empty() {
            return Ok(SweepReport::default());
        }

        warn!(count = orphans.len(), "Found paid payments without an order");
        let mut report = SweepReport::default();
        for record in orphans {
            let reference = record.reference.clone();
            match self.materializer.process(Materialize { record }).await {
                Ok(materialized) => {
                    info!(
                        reference = %reference,
                        order_id = %materialized.order.id,
                        "Repaired missing order"
                    );
                    report.repaired += 1;
                }
                Err(e) => {
                    let blocked = e.is_integrity();
                    error!(
                        reference = %reference,
                        integrity = blocked,
                        error = %e,
                        "Failed to repair missing order"
                    );
                    if let Err(db) = self
                        .ledger
                        .process(RecordRepairFailure {
                            reference: reference.clone(),
                            error: e.to_string(),
                            blocked,
                        })
                        .await
                    {
                        error!(reference = %reference, error = %db, "Failed to record repair failure");
                    }
                    report.failed += 1;
                    if blocked {
                        report.blocked += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    /// Run until the shutdown signal is received.
    ///
    /// A new period from a configuration reload takes effect right away; the
    /// next sweep is one new period after the reload.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut period = self.interval.snapshot().await;
        let mut interval_watcher = self.interval.subscribe();
        info!(interval_secs = period.as_secs(), "OrderRepairSweeper started");
        let mut ticker = sweep_ticker(Instant::now(), period);

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("OrderRepairSweeper received shutdown signal");
                        break;
                    }
                }

                Ok(()) = interval_watcher.changed() => {
                    let reloaded = self.interval.snapshot().await;
                    if reloaded != period {
                        info!(
                            interval_secs = reloaded.as_secs(),
                            "Order repair interval changed"
                        );
                        period = reloaded;
                        ticker = sweep_ticker(Instant::now() + period, period);
                    }
                }

                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(report) if report == SweepReport::default() => {
                            debug!("No orders to repair");
                        }
                        Ok(report) => {
                            info!(
                                repaired = report.repaired,
                                failed = report.failed,
                                blocked = report.blocked,
                                "Order repair sweep finished"
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "Order repair sweep failed");
                        }
                    }
                }
            }
        }

        info!("OrderRepairSweeper shutdown complete");
    }
}
