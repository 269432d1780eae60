//! Reconciler processor.
//!
//! Applies a gateway verdict to a payment record. Webhook deliveries, user
//! verify polls, admin re-verification and gateway retries all end up here,
//! often concurrently for the same reference. The only coordination between
//! them is the guarded status update in the ledger:
//!
//! ```text
//! initialized --success--> paid      (terminal)
//! initialized --failed---> failed
//! failed      --success--> paid
//! paid        --anything-> paid      (no write)
//! ```
//!
//! Only the caller whose guarded update moves the record to `paid` goes on
//! to materialize the order.

use crate::entities::{GatewayName, PaymentStatus};
use crate::entities::payment_records::{GetPaymentByReference, TransitionPaymentStatus};
use crate::events::OrderConfirmationSender;
use crate::framework::PaymentLedger;
use crate::gateways::{GatewayError, ObservedPayment, PaymentGateway};
use crate::processors::order_materializer::{
    Materialize, MaterializeError, MaterializedOrder, OrderMaterializer,
};
use kanau::processor::Processor;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("payment {0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The gateway reports success for less than the record's amount.
    #[error("payment {reference} paid {paid_minor} minor units, expected {expected_minor}")]
    AmountMismatch {
        reference: String,
        expected_minor: i64,
        paid_minor: i64,
    },

    /// The verdict came from a gateway other than the one the checkout used.
    #[error("payment {reference} belongs to {expected}, verdict came from {reported}")]
    GatewayMismatch {
        reference: String,
        expected: GatewayName,
        reported: GatewayName,
    },

    /// The record is `paid` but its order could not be created. The repair
    /// sweeper retries these.
    #[error("payment {reference} is paid but order creation failed: {source}")]
    Materialization {
        reference: String,
        #[source]
        source: MaterializeError,
    },
}

impl ReconcileError {
    pub fn is_integrity(&self) -> bool {
        match self {
            ReconcileError::AmountMismatch { .. } | ReconcileError::GatewayMismatch { .. } => true,
            ReconcileError::Materialization { source, .. } => source.is_integrity(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record was already `paid`, or another caller won the transition.
    AlreadyProcessed,
    /// This call moved the record to `paid`.
    Paid(MaterializedOrder),
    /// This call recorded a failed payment.
    Failed,
}

#[derive(Debug, Clone)]
pub struct Reconcile {
    pub reference: String,
    pub observed: ObservedPayment,
    /// Gateway that produced the verdict. When set it must match the
    /// record's gateway or nothing is written.
    pub gateway: Option<GatewayName>,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

#[derive(Clone)]
pub struct Reconciler<L> {
    ledger: L,
    materializer: OrderMaterializer<L>,
}

impl<L: Clone> Reconciler<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            materializer: OrderMaterializer::new(ledger.clone()),
            ledger,
        }
    }

    pub fn with_confirmations(mut self, confirmations: Option<OrderConfirmationSender>) -> Self {
        self.materializer = self.materializer.with_confirmations(confirmations);
        self
    }
}

impl<L: PaymentLedger> Reconciler<L> {
    /// Ask the gateway for the transaction's state and reconcile it.
    ///
    /// A gateway failure (including a timeout) writes nothing, so the record
    /// keeps whatever state it had.
    pub async fn verify_and_reconcile(
        &self,
        gateway: &dyn PaymentGateway,
        reference: &str,
    ) -> Result<ReconcileOutcome, VerifyError> {
        let verified = gateway.verify(reference).await.inspect_err(|e| {
            warn!(
                reference,
                gateway = %gateway.name(),
                error = %e,
                "Gateway verification failed"
            );
        })?;
        let outcome = self
            .process(Reconcile {
                reference: reference.to_string(),
                observed: verified.observed,
                gateway: Some(gateway.name()),
            })
            .await?;
        Ok(outcome)
    }
}

impl<L: PaymentLedger> Processor<Reconcile> for Reconciler<L> {
    type Output = ReconcileOutcome;
    type Error = ReconcileError;

    #[tracing::instrument(skip_all, err, fields(reference = %cmd.reference))]
    async fn process(&self, cmd: Reconcile) -> Result<ReconcileOutcome, ReconcileError> {
        let Reconcile {
            reference,
            observed,
            gateway,
        } = cmd;

        let record = self
            .ledger
            .process(GetPaymentByReference {
                reference: reference.clone(),
            })
            .await?
            .ok_or_else(|| ReconcileError::NotFound(reference.clone()))?;

        if let Some(reported) = gateway {
            if reported != record.gateway {
                warn!(
                    reference = %reference,
                    expected = %record.gateway,
                    reported = %reported,
                    "Verdict from a gateway that did not handle this payment"
                );
                return Err(ReconcileError::GatewayMismatch {
                    reference,
                    expected: record.gateway,
                    reported,
                });
            }
        }

        if record.is_paid() {
            return Ok(ReconcileOutcome::AlreadyProcessed);
        }

        if observed.is_success() {
            if let Some(paid_minor) = observed.amount_minor {
                if paid_minor < record.amount_minor {
                    warn!(
                        reference = %reference,
                        expected_minor = record.amount_minor,
                        paid_minor,
                        "Gateway reports success for less than the expected amount"
                    );
                    return Err(ReconcileError::AmountMismatch {
                        reference,
                        expected_minor: record.amount_minor,
                        paid_minor,
                    });
                }
            }
        }

        let new_status = if observed.is_success() {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Failed
        };

        let Some(updated) = self
            .ledger
            .process(TransitionPaymentStatus {
                reference: reference.clone(),
                status: new_status,
                gateway_response: observed.gateway_response,
            })
            .await?
        else {
            info!(reference = %reference, "Payment already reconciled by a concurrent caller");
            return Ok(ReconcileOutcome::AlreadyProcessed);
        };

        if updated.status != PaymentStatus::Paid {
            info!(reference = %reference, "Payment marked failed");
            return Ok(ReconcileOutcome::Failed);
        }

        info!(
            reference = %reference,
            gateway = %updated.gateway,
            amount_minor = updated.amount_minor,
            "Payment marked paid"
        );

        let materialized = self
            .materializer
            .process(Materialize { record: updated })
            .await
            .map_err(|source| ReconcileError::Materialization {
                reference: reference.clone(),
                source,
            })?;
        Ok(ReconcileOutcome::Paid(materialized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::GatewayName;
    use crate::framework::memory::MemoryProcessor;
    use crate::gateways::fake::FakeGateway;
    use crate::processors::test_support::{cart_line, initialized_record, seed};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn setup(reference: &str) -> (MemoryProcessor, Reconciler<MemoryProcessor>) {
        let ledger = MemoryProcessor::default();
        seed(
            &ledger,
            initialized_record(reference, 200_000, vec![cart_line("p-1", 2, 1000)]),
        );
        (ledger.clone(), Reconciler::new(ledger))
    }

    fn reconcile(reference: &str, observed: ObservedPayment) -> Reconcile {
        Reconcile {
            reference: reference.to_string(),
            observed,
            gateway: None,
        }
    }

    #[tokio::test]
    async fn success_marks_paid_and_creates_one_order() {
        let (ledger, reconciler) = setup("REF_1");

        let outcome = reconciler
            .process(reconcile("REF_1", ObservedPayment::success(Some(200_000))))
            .await
            .unwrap();

        let ReconcileOutcome::Paid(materialized) = outcome else {
            panic!("expected Paid, got {outcome:?}");
        };
        assert!(materialized.created);
        assert_eq!(materialized.order.amount, Decimal::from(2000));
        assert_eq!(ledger.payment("REF_1").unwrap().status, PaymentStatus::Paid);
        assert!(ledger.payment("REF_1").unwrap().paid_at.is_some());

        let items = ledger.items_of(materialized.order.id);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line_total, Decimal::from(2000));
    }

    #[tokio::test]
    async fn duplicate_success_is_a_no_op() {
        let (ledger, reconciler) = setup("REF_1");

        reconciler
            .process(reconcile("REF_1", ObservedPayment::success(None)))
            .await
            .unwrap();
        let second = reconciler
            .process(reconcile("REF_1", ObservedPayment::success(None)))
            .await
            .unwrap();

        assert_eq!(second, ReconcileOutcome::AlreadyProcessed);
        assert_eq!(ledger.order_count(), 1);
        assert_eq!(ledger.state().order_insert_attempts, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_successes_insert_exactly_one_order() {
        let (ledger, reconciler) = setup("REF_RACE");
        let reconciler = Arc::new(reconciler);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let reconciler = Arc::clone(&reconciler);
            tasks.spawn(async move {
                reconciler
                    .process(reconcile("REF_RACE", ObservedPayment::success(Some(200_000))))
                    .await
            });
        }

        let mut paid = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap().unwrap() {
                ReconcileOutcome::Paid(m) => {
                    assert!(m.created);
                    paid += 1;
                }
                ReconcileOutcome::AlreadyProcessed => {}
                ReconcileOutcome::Failed => panic!("success must never fail a payment"),
            }
        }

        assert_eq!(paid, 1);
        assert_eq!(ledger.order_count(), 1);
        assert_eq!(ledger.state().orders_inserted, 1);
        assert_eq!(ledger.state().order_insert_attempts, 1);
    }

    #[tokio::test]
    async fn paid_never_moves_to_failed() {
        let (ledger, reconciler) = setup("REF_1");
        reconciler
            .process(reconcile("REF_1", ObservedPayment::success(None)))
            .await
            .unwrap();

        let outcome = reconciler
            .process(reconcile("REF_1", ObservedPayment::failed()))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::AlreadyProcessed);
        assert_eq!(ledger.payment("REF_1").unwrap().status, PaymentStatus::Paid);
        assert_eq!(ledger.order_count(), 1);
    }

    #[tokio::test]
    async fn failure_then_later_success_pays_once() {
        let (ledger, reconciler) = setup("REF_1");

        let first = reconciler
            .process(reconcile("REF_1", ObservedPayment::failed()))
            .await
            .unwrap();
        assert_eq!(first, ReconcileOutcome::Failed);
        assert_eq!(ledger.payment("REF_1").unwrap().status, PaymentStatus::Failed);
        assert_eq!(ledger.order_count(), 0);

        let second = reconciler
            .process(reconcile("REF_1", ObservedPayment::success(Some(200_000))))
            .await
            .unwrap();
        assert!(matches!(second, ReconcileOutcome::Paid(_)));
        assert_eq!(ledger.payment("REF_1").unwrap().status, PaymentStatus::Paid);
        assert_eq!(ledger.order_count(), 1);
    }

    #[tokio::test]
    async fn unknown_reference_creates_nothing() {
        let (ledger, reconciler) = setup("REF_1");

        let err = reconciler
            .process(reconcile("REF_UNKNOWN", ObservedPayment::success(None)))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::NotFound(r) if r == "REF_UNKNOWN"));
        assert!(ledger.payment("REF_UNKNOWN").is_none());
        assert_eq!(ledger.order_count(), 0);
    }

    #[tokio::test]
    async fn underpayment_is_refused_without_writes() {
        let (ledger, reconciler) = setup("REF_1");

        let err = reconciler
            .process(reconcile("REF_1", ObservedPayment::success(Some(100_000))))
            .await
            .unwrap_err();

        assert!(err.is_integrity());
        assert_eq!(
            ledger.payment("REF_1").unwrap().status,
            PaymentStatus::Initialized
        );
        assert_eq!(ledger.order_count(), 0);
    }

    #[tokio::test]
    async fn verdict_from_another_gateway_writes_nothing() {
        let (ledger, reconciler) = setup("REF_1");

        let err = reconciler
            .process(Reconcile {
                gateway: Some(GatewayName::Monnify),
                ..reconcile("REF_1", ObservedPayment::success(Some(200_000)))
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::GatewayMismatch {
                expected: GatewayName::Paystack,
                reported: GatewayName::Monnify,
                ..
            }
        ));
        assert!(err.is_integrity());
        assert_eq!(
            ledger.payment("REF_1").unwrap().status,
            PaymentStatus::Initialized
        );
        assert_eq!(ledger.order_count(), 0);

        let outcome = reconciler
            .process(Reconcile {
                gateway: Some(GatewayName::Paystack),
                ..reconcile("REF_1", ObservedPayment::success(Some(200_000)))
            })
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Paid(_)));
    }

    #[tokio::test]
    async fn verify_with_another_gateway_is_refused() {
        let (ledger, reconciler) = setup("REF_1");
        let gateway = FakeGateway::new(GatewayName::Monnify)
            .verifying(ObservedPayment::success(Some(200_000)));

        let err = reconciler
            .verify_and_reconcile(&gateway, "REF_1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            VerifyError::Reconcile(ReconcileError::GatewayMismatch { .. })
        ));
        assert_eq!(ledger.order_count(), 0);
    }

    #[tokio::test]
    async fn materialization_failure_leaves_record_paid() {
        let (ledger, reconciler) = setup("REF_1");
        ledger.set_fail_order_inserts(true);

        let err = reconciler
            .process(reconcile("REF_1", ObservedPayment::success(None)))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Materialization { .. }));
        assert!(!err.is_integrity());
        assert_eq!(ledger.payment("REF_1").unwrap().status, PaymentStatus::Paid);
        assert_eq!(ledger.order_count(), 0);
    }

    #[tokio::test]
    async fn gateway_timeout_leaves_record_initialized() {
        let (ledger, reconciler) = setup("REF_1");
        let gateway = FakeGateway::new(GatewayName::Paystack);

        let err = reconciler
            .verify_and_reconcile(&gateway, "REF_1")
            .await
            .unwrap_err();

        assert!(matches!(err, VerifyError::Gateway(GatewayError::Timeout)));
        assert_eq!(gateway.verify_count(), 1);
        assert_eq!(
            ledger.payment("REF_1").unwrap().status,
            PaymentStatus::Initialized
        );
    }

    #[tokio::test]
    async fn verify_applies_gateway_verdict() {
        let (ledger, reconciler) = setup("REF_1");
        let gateway = FakeGateway::new(GatewayName::Paystack)
            .verifying(ObservedPayment::success(Some(200_000)));

        let outcome = reconciler
            .verify_and_reconcile(&gateway, "REF_1")
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Paid(_)));
        assert_eq!(ledger.order_count(), 1);
    }
}
