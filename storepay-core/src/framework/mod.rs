use crate::entities::order_records::{CreateOrderWithItems, GetOrderByPaymentReference, OrderRecord};
use crate::entities::payment_records::{
    AttachProviderReference, CreatePaymentRecord, GetPaymentByReference,
    ListPaidPaymentsWithoutOrder, PaymentRecord, RecordRepairFailure, TransitionPaymentStatus,
};
use kanau::processor::Processor;
use sqlx::PgPool;

#[cfg(test)]
pub(crate) mod memory;

#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

/// The storage commands the checkout, reconciliation and repair flows run.
///
/// `DatabaseProcessor` is the production implementation. Every command is a
/// single atomic statement or transaction; in particular
/// `TransitionPaymentStatus` is a guarded update that never touches a
/// `paid` row, and `CreateOrderWithItems` inserts nothing when an order for
/// the payment reference already exists.
pub trait PaymentLedger:
    Processor<CreatePaymentRecord, Output = PaymentRecord, Error = sqlx::Error>
    + Processor<GetPaymentByReference, Output = Option<PaymentRecord>, Error = sqlx::Error>
    + Processor<AttachProviderReference, Output = (), Error = sqlx::Error>
    + Processor<TransitionPaymentStatus, Output = Option<PaymentRecord>, Error = sqlx::Error>
    + Processor<ListPaidPaymentsWithoutOrder, Output = Vec<PaymentRecord>, Error = sqlx::Error>
    + Processor<RecordRepairFailure, Output = (), Error = sqlx::Error>
    + Processor<GetOrderByPaymentReference, Output = Option<OrderRecord>, Error = sqlx::Error>
    + Processor<CreateOrderWithItems, Output = Option<OrderRecord>, Error = sqlx::Error>
    + Send
    + Sync
{
}

impl<T> PaymentLedger for T where
    T: Processor<CreatePaymentRecord, Output = PaymentRecord, Error = sqlx::Error>
        + Processor<GetPaymentByReference, Output = Option<PaymentRecord>, Error = sqlx::Error>
        + Processor<AttachProviderReference, Output = (), Error = sqlx::Error>
        + Processor<TransitionPaymentStatus, Output = Option<PaymentRecord>, Error = sqlx::Error>
        + Processor<ListPaidPaymentsWithoutOrder, Output = Vec<PaymentRecord>, Error = sqlx::Error>
        + Processor<RecordRepairFailure, Output = (), Error = sqlx::Error>
        + Processor<GetOrderByPaymentReference, Output = Option<OrderRecord>, Error = sqlx::Error>
        + Processor<CreateOrderWithItems, Output = Option<OrderRecord>, Error = sqlx::Error>
        + Send
        + Sync
{
}
