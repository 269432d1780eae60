use crate::entities::{GatewayName, PaymentStatus};
use crate::framework::DatabaseProcessor;
use crate::utils::amount::to_major_units;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use storepay_sdk::objects::amount::lenient_decimal;
use uuid::Uuid;

macro_rules! payment_columns {
    () => {
        "id, reference, user_id, email, gateway, amount_minor, currency, status, cart, meta, \
         provider_reference, gateway_response, paid_at, repair_attempts, repair_error, \
         repair_blocked_at, created_at, updated_at"
    };
}

/// A cart line snapshotted into the payment record at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: u32,
    #[serde(with = "lenient_decimal")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRecord {
    pub id: i64,
    pub reference: String,
    pub user_id: Uuid,
    pub email: String,
    pub gateway: GatewayName,
    /// Expected total in minor units (kobo for NGN).
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub cart: Json<Vec<CartLine>>,
    pub meta: Option<Json<serde_json::Value>>,
    pub provider_reference: Option<String>,
    pub gateway_response: Option<String>,
    pub paid_at: Option<time::PrimitiveDateTime>,
    /// Failed order-repair attempts for this payment.
    pub repair_attempts: i32,
    pub repair_error: Option<String>,
    /// Set once repair hit a data problem retrying cannot fix. The sweeper
    /// skips the record from then on; an admin re-verify still works.
    pub repair_blocked_at: Option<time::PrimitiveDateTime>,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

impl PaymentRecord {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }

    pub fn amount_major(&self) -> Decimal {
        to_major_units(self.amount_minor)
    }

    pub fn cart_lines(&self) -> &[CartLine] {
        &self.cart.0
    }
}

#[derive(Debug, Clone)]
/// Insert a new payment record in the `initialized` state.
///
/// Fails with a unique violation if the reference already exists.
pub struct CreatePaymentRecord {
    pub reference: String,
    pub user_id: Uuid,
    pub email: String,
    pub gateway: GatewayName,
    pub amount_minor: i64,
    pub currency: String,
    pub cart: Vec<CartLine>,
    pub meta: Option<serde_json::Value>,
}

impl Processor<CreatePaymentRecord> for DatabaseProcessor {
    type Output = PaymentRecord;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreatePaymentRecord")]
    async fn process(&self, cmd: CreatePaymentRecord) -> Result<PaymentRecord, sqlx::Error> {
        let record = sqlx::query_as::<_, PaymentRecord>(concat!(
            r#"
            INSERT INTO payments (reference, user_id, email, gateway, amount_minor, currency, status, cart, meta)
            VALUES ($1, $2, $3, $4, $5, $6, 'initialized', $7, $8)
            RETURNING "#,
            payment_columns!()
        ))
        .bind(cmd.reference)
        .bind(cmd.user_id)
        .bind(cmd.email)
        .bind(cmd.gateway)
        .bind(cmd.amount_minor)
        .bind(cmd.currency)
        .bind(Json(cmd.cart))
        .bind(cmd.meta.map(Json))
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }
}

#[derive(Debug, Clone)]
pub struct GetPaymentByReference {
    pub reference: String,
}

impl Processor<GetPaymentByReference> for DatabaseProcessor {
    type Output = Option<PaymentRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPaymentByReference")]
    async fn process(
        &self,
        query: GetPaymentByReference,
    ) -> Result<Option<PaymentRecord>, sqlx::Error> {
        let record = sqlx::query_as::<_, PaymentRecord>(concat!(
            "SELECT ",
            payment_columns!(),
            " FROM payments WHERE reference = $1"
        ))
        .bind(query.reference)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

#[derive(Debug, Clone)]
/// Store the gateway's own identifier for a transaction after initialization.
pub struct AttachProviderReference {
    pub reference: String,
    pub provider_reference: String,
}

impl Processor<AttachProviderReference> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AttachProviderReference")]
    async fn process(&self, cmd: AttachProviderReference) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE payments
            SET provider_reference = $2, updated_at = NOW()
            WHERE reference = $1
            "#,
        )
        .bind(cmd.reference)
        .bind(cmd.provider_reference)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Conditionally move a payment record to a new status.
///
/// This is the compare-and-set every reconciliation path goes through. The
/// update only applies while the record is not yet `paid`, so concurrent
/// callers racing to mark the same reference paid see exactly one winner.
/// Returns the updated record for the winner and `None` for everyone else
/// (including when the reference does not exist).
pub struct TransitionPaymentStatus {
    pub reference: String,
    pub status: PaymentStatus,
    pub gateway_response: Option<String>,
}

impl Processor<TransitionPaymentStatus> for DatabaseProcessor {
    type Output = Option<PaymentRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:TransitionPaymentStatus")]
    async fn process(
        &self,
        cmd: TransitionPaymentStatus,
    ) -> Result<Option<PaymentRecord>, sqlx::Error> {
        let record = sqlx::query_as::<_, PaymentRecord>(concat!(
            r#"
            UPDATE payments
            SET status = $2,
                paid_at = CASE WHEN $2 = 'paid'::payment_status THEN NOW() ELSE paid_at END,
                gateway_response = COALESCE($3, gateway_response),
                updated_at = NOW()
            WHERE reference = $1 AND status <> 'paid'
            RETURNING "#,
            payment_columns!()
        ))
        .bind(cmd.reference)
        .bind(cmd.status)
        .bind(cmd.gateway_response)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

#[derive(Debug, Clone)]
/// Paid records that never got an order and are not blocked from repair.
///
/// Records with fewer failed attempts come first, then oldest first, so a
/// run of failing records cannot starve newer ones out of a batch.
pub struct ListPaidPaymentsWithoutOrder {
    pub limit: i64,
}

impl Processor<ListPaidPaymentsWithoutOrder> for DatabaseProcessor {
    type Output = Vec<PaymentRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListPaidPaymentsWithoutOrder")]
    async fn process(
        &self,
        query: ListPaidPaymentsWithoutOrder,
    ) -> Result<Vec<PaymentRecord>, sqlx::Error> {
        let records = sqlx::query_as::<_, PaymentRecord>(
            r#"
            SELECT p.id, p.reference, p.user_id, p.email, p.gateway, p.amount_minor, p.currency,
                   p.status, p.cart, p.meta, p.provider_reference, p.gateway_response, p.paid_at,
                   p.repair_attempts, p.repair_error, p.repair_blocked_at, p.created_at, p.updated_at
            FROM payments p
            LEFT JOIN orders o ON o.payment_reference = p.reference
            WHERE p.status = 'paid' AND o.id IS NULL AND p.repair_blocked_at IS NULL
            ORDER BY p.repair_attempts ASC, p.paid_at ASC NULLS FIRST
            LIMIT $1
            "#,
        )
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

#[derive(Debug, Clone)]
/// Record a failed order-repair attempt.
///
/// `blocked` takes the record out of the repair queue for good. Transient
/// failures only bump the attempt counter, which moves the record behind
/// fresher ones.
pub struct RecordRepairFailure {
    pub reference: String,
    pub error: String,
    pub blocked: bool,
}

impl Processor<RecordRepairFailure> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RecordRepairFailure")]
    async fn process(&self, cmd: RecordRepairFailure) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE payments
            SET repair_attempts = repair_attempts + 1,
                repair_error = $2,
                repair_blocked_at = CASE WHEN $3 THEN NOW() ELSE repair_blocked_at END,
                updated_at = NOW()
            WHERE reference = $1
            "#,
        )
        .bind(cmd.reference)
        .bind(cmd.error)
        .bind(cmd.blocked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
