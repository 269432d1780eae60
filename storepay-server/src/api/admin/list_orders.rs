use axum::{Json, extract::Query, response::IntoResponse};
use kanau::processor::Processor;
use storepay_core::entities::order_records::{GetOrderItems, ListOrderRecords, assemble_responses};
use storepay_sdk::objects::admin::{ListOrdersQuery, clamp_pagination};

use crate::api::extractors::AdminUser;
use crate::state::AppState;

use super::AdminApiError;

/// `GET /orders` — list orders with pagination and optional status filter.
pub async fn list_orders(
    state: axum::extract::State<AppState>,
    _auth: AdminUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, AdminApiError> {
    let processor = state.processor();

    let (limit, offset) = clamp_pagination(query.limit, query.offset);

    let records = processor
        .process(ListOrderRecords {
            limit,
            offset,
            status: query.status.map(Into::into),
        })
        .await
        .map_err(AdminApiError::Database)?;
    let items = processor
        .process(GetOrderItems {
            order_ids: records.iter().map(|r| r.id).collect(),
        })
        .await
        .map_err(AdminApiError::Database)?;

    Ok(Json(assemble_responses(records, items)))
}
