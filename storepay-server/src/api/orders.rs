//! Orders API handlers.
//!
//! Orders are created by reconciliation, never by the client. These
//! endpoints only read the caller's own orders.
//!
//! # Endpoints
//!
//! - `GET /`           – the caller's orders, newest first
//! - `GET /{order_id}` – one of the caller's orders

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use kanau::processor::Processor;
use storepay_core::entities::order_records::{
    GetOrderForUser, GetOrderItems, ListOrdersForUser, assemble_responses,
};
use storepay_sdk::objects::admin::{ListOrdersQuery, clamp_pagination};
use uuid::Uuid;

use crate::api::extractors::AuthUser;
use crate::state::AppState;

/// Build the Orders API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/{order_id}", get(get_order))
}

#[derive(Debug)]
enum OrdersApiError {
    Database(sqlx::Error),
    NotFound,
}

impl IntoResponse for OrdersApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            OrdersApiError::Database(e) => {
                tracing::error!(error = %e, "Orders API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            OrdersApiError::NotFound => (StatusCode::NOT_FOUND, "order not found").into_response(),
        }
    }
}

/// `GET /` — list the caller's orders with their items.
async fn list_orders(
    state: State<AppState>,
    user: AuthUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, OrdersApiError> {
    let processor = state.processor();
    let (limit, offset) = clamp_pagination(query.limit, query.offset);

    let orders = processor
        .process(ListOrdersForUser {
            user_id: user.user_id,
            limit,
            offset,
        })
        .await
        .map_err(OrdersApiError::Database)?;
    let items = processor
        .process(GetOrderItems {
            order_ids: orders.iter().map(|o| o.id).collect(),
        })
        .await
        .map_err(OrdersApiError::Database)?;

    Ok(Json(assemble_responses(orders, items)))
}

/// `GET /{order_id}` — one order. Orders of other users are reported as missing.
async fn get_order(
    state: State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, OrdersApiError> {
    let processor = state.processor();

    let order = processor
        .process(GetOrderForUser {
            order_id,
            user_id: user.user_id,
        })
        .await
        .map_err(OrdersApiError::Database)?
        .ok_or(OrdersApiError::NotFound)?;
    let items = processor
        .process(GetOrderItems {
            order_ids: vec![order.id],
        })
        .await
        .map_err(OrdersApiError::Database)?;

    Ok(Json(order.into_response(items)))
}
