use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use kanau::processor::Processor;
use storepay_core::entities::order_records::{GetOrderItems, UpdateOrderFulfillment};
use storepay_sdk::objects::admin::UpdateOrderRequest;
use uuid::Uuid;

use crate::api::extractors::AdminUser;
use crate::state::AppState;

use super::AdminApiError;

/// `PUT /orders/{order_id}` — update status, shipping status or delivery date.
///
/// Absent fields keep their current value; an empty body is rejected.
pub async fn update_order(
    state: State<AppState>,
    AdminUser(admin): AdminUser,
    Path(order_id): Path<Uuid>,
    body: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AdminApiError> {
    let Json(request) = body.map_err(|e| AdminApiError::Validation(e.body_text()))?;
    if request.is_empty() {
        return Err(AdminApiError::Validation(
            "at least one of status, shippingStatus or deliveryDate is required".to_string(),
        ));
    }

    let processor = state.processor();
    let order = processor
        .process(UpdateOrderFulfillment {
            order_id,
            status: request.status.map(Into::into),
            shipping_status: request.shipping_status,
            delivery_date: request.delivery_date,
        })
        .await
        .map_err(AdminApiError::Database)?
        .ok_or(AdminApiError::NotFound)?;

    tracing::info!(
        order_id = %order.id,
        admin = %admin.user_id,
        status = ?order.status,
        "Admin updated order"
    );

    let items = processor
        .process(GetOrderItems {
            order_ids: vec![order.id],
        })
        .await
        .map_err(AdminApiError::Database)?;

    Ok(Json(order.into_response(items)))
}
