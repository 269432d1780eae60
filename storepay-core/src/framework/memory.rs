//! In-memory ledger implementing the same commands as `DatabaseProcessor`.
//!
//! Each command takes the state lock once, so a command is atomic the same
//! way its SQL statement is. Commands yield before locking so concurrent
//! tasks interleave between commands.

use crate::entities::order_records::{
    CreateOrderWithItems, GetOrderByPaymentReference, OrderItemRecord, OrderRecord,
};
use crate::entities::payment_records::{
    AttachProviderReference, CreatePaymentRecord, GetPaymentByReference,
    ListPaidPaymentsWithoutOrder, PaymentRecord, RecordRepairFailure, TransitionPaymentStatus,
};
use crate::entities::PaymentStatus;
use kanau::processor::Processor;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub(crate) struct MemoryState {
    pub payments: HashMap<String, PaymentRecord>,
    pub orders: HashMap<String, OrderRecord>,
    pub items: Vec<OrderItemRecord>,
    pub next_id: i64,
    /// Successful order inserts.
    pub orders_inserted: usize,
    /// Order insert statements executed, including ones that hit the conflict.
    pub order_insert_attempts: usize,
    /// When set, order inserts fail as if the database went away.
    pub fail_order_inserts: bool,
}

#[derive(Clone, Default)]
pub(crate) struct MemoryProcessor {
    state: Arc<Mutex<MemoryState>>,
}

fn now() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}

impl MemoryProcessor {
    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn payment(&self, reference: &str) -> Option<PaymentRecord> {
        self.state().payments.get(reference).cloned()
    }

    pub fn order(&self, reference: &str) -> Option<OrderRecord> {
        self.state().orders.get(reference).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.state().orders.len()
    }

    pub fn items_of(&self, order_id: Uuid) -> Vec<OrderItemRecord> {
        self.state()
            .items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn set_fail_order_inserts(&self, fail: bool) {
        self.state().fail_order_inserts = fail;
    }
}

impl Processor<CreatePaymentRecord> for MemoryProcessor {
    type Output = PaymentRecord;
    type Error = sqlx::Error;
    async fn process(&self, cmd: CreatePaymentRecord) -> Result<PaymentRecord, sqlx::Error> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        if state.payments.contains_key(&cmd.reference) {
            return Err(sqlx::Error::Protocol(format!(
                "duplicate payment reference {}",
                cmd.reference
            )));
        }
        state.next_id += 1;
        let record = PaymentRecord {
            id: state.next_id,
            reference: cmd.reference.clone(),
            user_id: cmd.user_id,
            email: cmd.email,
            gateway: cmd.gateway,
            amount_minor: cmd.amount_minor,
            currency: cmd.currency,
            status: PaymentStatus::Initialized,
            cart: Json(cmd.cart),
            meta: cmd.meta.map(Json),
            provider_reference: None,
            gateway_response: None,
            paid_at: None,
            repair_attempts: 0,
            repair_error: None,
            repair_blocked_at: None,
            created_at: now(),
            updated_at: now(),
        };
        state.payments.insert(cmd.reference, record.clone());
        Ok(record)
    }
}

impl Processor<GetPaymentByReference> for MemoryProcessor {
    type Output = Option<PaymentRecord>;
    type Error = sqlx::Error;
    async fn process(
        &self,
        query: GetPaymentByReference,
    ) -> Result<Option<PaymentRecord>, sqlx::Error> {
        tokio::task::yield_now().await;
        Ok(self.payment(&query.reference))
    }
}

impl Processor<AttachProviderReference> for MemoryProcessor {
    type Output = ();
    type Error = sqlx::Error;
    async fn process(&self, cmd: AttachProviderReference) -> Result<(), sqlx::Error> {
        tokio::task::yield_now().await;
        if let Some(record) = self.state().payments.get_mut(&cmd.reference) {
            record.provider_reference = Some(cmd.provider_reference);
            record.updated_at = now();
        }
        Ok(())
    }
}

impl Processor<TransitionPaymentStatus> for MemoryProcessor {
    type Output = Option<PaymentRecord>;
    type Error = sqlx::Error;
    async fn process(
        &self,
        cmd: TransitionPaymentStatus,
    ) -> Result<Option<PaymentRecord>, sqlx::Error> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        let Some(record) = state.payments.get_mut(&cmd.reference) else {
            return Ok(None);
        };
        if record.status == PaymentStatus::Paid {
            return Ok(None);
        }
        record.status = cmd.status;
        if cmd.status == PaymentStatus::Paid {
            record.paid_at = Some(now());
        }
        if cmd.gateway_response.is_some() {
            record.gateway_response = cmd.gateway_response;
        }
        record.updated_at = now();
        Ok(Some(record.clone()))
    }
}

impl Processor<ListPaidPaymentsWithoutOrder> for MemoryProcessor {
    type Output = Vec<PaymentRecord>;
    type Error = sqlx::Error;
    async fn process(
        &self,
        query: ListPaidPaymentsWithoutOrder,
    ) -> Result<Vec<PaymentRecord>, sqlx::Error> {
        tokio::task::yield_now().await;
        let state = self.state();
        let mut records: Vec<PaymentRecord> = state
            .payments
            .values()
            .filter(|p| {
                p.status == PaymentStatus::Paid
                    && p.repair_blocked_at.is_none()
                    && !state.orders.contains_key(&p.reference)
            })
            .cloned()
            .collect();
        records.sort_by_key(|p| (p.repair_attempts, p.id));
        records.truncate(query.limit.max(0) as usize);
        Ok(records)
    }
}

impl Processor<RecordRepairFailure> for MemoryProcessor {
    type Output = ();
    type Error = sqlx::Error;
    async fn process(&self, cmd: RecordRepairFailure) -> Result<(), sqlx::Error> {
        tokio::task::yield_now().await;
        if let Some(record) = self.state().payments.get_mut(&cmd.reference) {
            record.repair_attempts += 1;
            record.repair_error = Some(cmd.error);
            if cmd.blocked {
                record.repair_blocked_at = Some(now());
            }
            record.updated_at = now();
        }
        Ok(())
    }
}

impl Processor<GetOrderByPaymentReference> for MemoryProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    async fn process(
        &self,
        query: GetOrderByPaymentReference,
    ) -> Result<Option<OrderRecord>, sqlx::Error> {
        tokio::task::yield_now().await;
        Ok(self.order(&query.payment_reference))
    }
}

impl Processor<CreateOrderWithItems> for MemoryProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    async fn process(&self, cmd: CreateOrderWithItems) -> Result<Option<OrderRecord>, sqlx::Error> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        if state.fail_order_inserts {
            return Err(sqlx::Error::PoolTimedOut);
        }
        state.order_insert_attempts += 1;
        if state.orders.contains_key(&cmd.order.payment_reference) {
            return Ok(None);
        }
        let order = OrderRecord {
            id: cmd.order.id,
            payment_reference: cmd.order.payment_reference.clone(),
            user_id: cmd.order.user_id,
            amount: cmd.order.amount,
            currency: cmd.order.currency,
            status: cmd.order.status,
            shipping_status: None,
            delivery_date: None,
            created_at: now(),
            updated_at: now(),
        };
        for item in cmd.items {
            state.next_id += 1;
            let id = state.next_id;
            state.items.push(OrderItemRecord {
                id,
                order_id: order.id,
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total,
            });
        }
        state.orders_inserted += 1;
        state.orders.insert(cmd.order.payment_reference, order.clone());
        Ok(Some(order))
    }
}
