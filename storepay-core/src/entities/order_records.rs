use crate::entities::OrderStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use storepay_sdk::objects::{OrderItemResponse, OrderResponse};
use uuid::Uuid;

macro_rules! order_columns {
    () => {
        "id, payment_reference, user_id, amount, currency, status, shipping_status, \
         delivery_date, created_at, updated_at"
    };
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderRecord {
    pub id: Uuid,
    pub payment_reference: String,
    pub user_id: Uuid,
    /// Total in major currency units.
    pub amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub shipping_status: Option<String>,
    pub delivery_date: Option<time::Date>,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OrderItemRecord {
    pub id: i64,
    pub order_id: Uuid,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl OrderRecord {
    /// Build the API view of this order from its items.
    pub fn into_response(self, items: Vec<OrderItemRecord>) -> OrderResponse {
        OrderResponse {
            order_id: self.id,
            payment_reference: self.payment_reference,
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency,
            status: self.status.into(),
            shipping_status: self.shipping_status,
            delivery_date: self.delivery_date,
            created_at: self.created_at.assume_utc().unix_timestamp(),
            updated_at: self.updated_at.assume_utc().unix_timestamp(),
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    variant_id: item.variant_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.line_total,
                })
                .collect(),
        }
    }
}

/// Attach each order's items, preserving the order list's ordering.
pub fn assemble_responses(
    orders: Vec<OrderRecord>,
    mut items: Vec<OrderItemRecord>,
) -> Vec<OrderResponse> {
    orders
        .into_iter()
        .map(|order| {
            let (own, rest): (Vec<_>, Vec<_>) =
                items.drain(..).partition(|item| item.order_id == order.id);
            items = rest;
            order.into_response(own)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub id: Uuid,
    pub payment_reference: String,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone)]
/// Insert an order and its items in one transaction.
///
/// The order insert is `ON CONFLICT (payment_reference) DO NOTHING`: when an
/// order already exists for the payment reference nothing is written and
/// `None` is returned.
pub struct CreateOrderWithItems {
    pub order: NewOrder,
    pub items: Vec<NewOrderItem>,
}

impl Processor<CreateOrderWithItems> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CreateOrderWithItems")]
    async fn process(&self, cmd: CreateOrderWithItems) -> Result<Option<OrderRecord>, sqlx::Error> {
        let CreateOrderWithItems { order, items } = cmd;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, OrderRecord>(concat!(
            r#"
            INSERT INTO orders (id, payment_reference, user_id, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (payment_reference) DO NOTHING
            RETURNING "#,
            order_columns!()
        ))
        .bind(order.id)
        .bind(order.payment_reference)
        .bind(order.user_id)
        .bind(order.amount)
        .bind(order.currency)
        .bind(order.status)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(inserted) = inserted else {
            tx.rollback().await?;
            return Ok(None);
        };

        if !items.is_empty() {
            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO order_items \
                (order_id, product_id, variant_id, quantity, unit_price, line_total) ",
            );
            query_builder.push_values(items, |mut b, item| {
                b.push_bind(inserted.id)
                    .push_bind(item.product_id)
                    .push_bind(item.variant_id)
                    .push_bind(item.quantity)
                    .push_bind(item.unit_price)
                    .push_bind(item.line_total);
            });
            query_builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(Some(inserted))
    }
}

#[derive(Debug, Clone)]
pub struct GetOrderByPaymentReference {
    pub payment_reference: String,
}

impl Processor<GetOrderByPaymentReference> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderByPaymentReference")]
    async fn process(
        &self,
        query: GetOrderByPaymentReference,
    ) -> Result<Option<OrderRecord>, sqlx::Error> {
        let order = sqlx::query_as::<_, OrderRecord>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE payment_reference = $1"
        ))
        .bind(query.payment_reference)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }
}

#[derive(Debug, Clone)]
pub struct GetOrderItems {
    pub order_ids: Vec<Uuid>,
}

impl Processor<GetOrderItems> for DatabaseProcessor {
    type Output = Vec<OrderItemRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderItems")]
    async fn process(&self, query: GetOrderItems) -> Result<Vec<OrderItemRecord>, sqlx::Error> {
        if query.order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let items = sqlx::query_as::<_, OrderItemRecord>(
            r#"
            SELECT id, order_id, product_id, variant_id, quantity, unit_price, line_total
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(query.order_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

#[derive(Debug, Clone)]
/// A user's own orders, newest first.
pub struct ListOrdersForUser {
    pub user_id: Uuid,
    pub limit: i64,
    pub offset: i64,
}

impl Processor<ListOrdersForUser> for DatabaseProcessor {
    type Output = Vec<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListOrdersForUser")]
    async fn process(&self, query: ListOrdersForUser) -> Result<Vec<OrderRecord>, sqlx::Error> {
        let orders = sqlx::query_as::<_, OrderRecord>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(query.user_id)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }
}

#[derive(Debug, Clone)]
/// A single order, only if it belongs to the given user.
pub struct GetOrderForUser {
    pub order_id: Uuid,
    pub user_id: Uuid,
}

impl Processor<GetOrderForUser> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderForUser")]
    async fn process(&self, query: GetOrderForUser) -> Result<Option<OrderRecord>, sqlx::Error> {
        let order = sqlx::query_as::<_, OrderRecord>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(query.order_id)
        .bind(query.user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }
}

#[derive(Debug, Clone)]
/// List all orders for the admin view, optionally filtered by status.
pub struct ListOrderRecords {
    pub limit: i64,
    pub offset: i64,
    pub status: Option<OrderStatus>,
}

impl Processor<ListOrderRecords> for DatabaseProcessor {
    type Output = Vec<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListOrderRecords")]
    async fn process(&self, query: ListOrderRecords) -> Result<Vec<OrderRecord>, sqlx::Error> {
        let orders = sqlx::query_as::<_, OrderRecord>(concat!(
            "SELECT ",
            order_columns!(),
            r#"
            FROM orders
            WHERE ($3::order_status IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(query.limit)
        .bind(query.offset)
        .bind(query.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }
}

#[derive(Debug, Clone)]
/// Admin fulfillment update. `None` fields keep their current value.
pub struct UpdateOrderFulfillment {
    pub order_id: Uuid,
    pub status: Option<OrderStatus>,
    pub shipping_status: Option<String>,
    pub delivery_date: Option<time::Date>,
}

impl Processor<UpdateOrderFulfillment> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateOrderFulfillment")]
    async fn process(&self, cmd: UpdateOrderFulfillment) -> Result<Option<OrderRecord>, sqlx::Error> {
        let order = sqlx::query_as::<_, OrderRecord>(concat!(
            r#"
            UPDATE orders
            SET status = COALESCE($2, status),
                shipping_status = COALESCE($3, shipping_status),
                delivery_date = COALESCE($4, delivery_date),
                updated_at = NOW()
            WHERE id = $1
            RETURNING "#,
            order_columns!()
        ))
        .bind(cmd.order_id)
        .bind(cmd.status)
        .bind(cmd.shipping_status)
        .bind(cmd.delivery_date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn order(id: u128) -> OrderRecord {
        OrderRecord {
            id: Uuid::from_u128(id),
            payment_reference: format!("REF_{id}"),
            user_id: Uuid::from_u128(99),
            amount: Decimal::from(2000),
            currency: "NGN".to_string(),
            status: OrderStatus::Processing,
            shipping_status: None,
            delivery_date: None,
            created_at: datetime!(2025-01-01 00:00:00),
            updated_at: datetime!(2025-01-01 00:00:10),
        }
    }

    fn item(id: i64, order_id: u128) -> OrderItemRecord {
        OrderItemRecord {
            id,
            order_id: Uuid::from_u128(order_id),
            product_id: format!("p-{id}"),
            variant_id: None,
            quantity: 1,
            unit_price: Decimal::from(1000),
            line_total: Decimal::from(1000),
        }
    }

    #[test]
    fn items_are_grouped_under_their_orders() {
        let responses = assemble_responses(
            vec![order(2), order(1)],
            vec![item(1, 1), item(2, 2), item(3, 1)],
        );
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].order_id, Uuid::from_u128(2));
        assert_eq!(responses[0].items.len(), 1);
        assert_eq!(responses[0].items[0].product_id, "p-2");
        assert_eq!(responses[1].items.len(), 2);
        assert_eq!(responses[1].created_at, 1_735_689_600);
        assert_eq!(responses[1].updated_at, 1_735_689_610);
    }
}
