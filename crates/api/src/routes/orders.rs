//! Order endpoints and the shared application state.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use common::{CustomerId, IdempotencyKey, MenuItemId, OrderId, RestaurantId};
use domain::{Order, OrderStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use checkout::{CreateOrderRequest, OrderLine};

use crate::error::ApiError;
use crate::{Backend, Decrementer, Orders, Payments};

/// Shared state handed to every handler.
pub struct AppState<R: Backend> {
    pub orders: Arc<Orders<R>>,
    pub payments: Arc<Payments<R>>,
    pub decrementer: Arc<Decrementer<R>>,
    pub store: Arc<R>,
}

impl<R: Backend> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            payments: self.payments.clone(),
            decrementer: self.decrementer.clone(),
            store: self.store.clone(),
        }
    }
}

pub fn router<R: Backend>() -> Router<AppState<R>> {
    Router::new()
        .route("/orders", post(create_order::<R>))
        .route("/orders/{id}", get(get_order::<R>))
        .route("/orders/{id}/status", post(update_order_status::<R>))
}

#[derive(Debug, Deserialize)]
pub struct OrderLineBody {
    pub menu_item_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub idempotency_key: Option<String>,
    pub items: Vec<OrderLineBody>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub menu_item_id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub quantity: u32,
    pub line_total: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().as_uuid(),
            customer_id: order.customer_id().as_uuid(),
            restaurant_id: order.restaurant_id().as_uuid(),
            status: order.status().to_string(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    menu_item_id: item.menu_item_id.as_uuid(),
                    name: item.name.clone(),
                    unit_price: item.unit_price.minor(),
                    quantity: item.quantity,
                    line_total: item.line_total().minor(),
                })
                .collect(),
            total_amount: order.total_amount().minor(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

async fn create_order<R: Backend>(
    State(state): State<AppState<R>>,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let request = CreateOrderRequest {
        customer_id: CustomerId::from_uuid(body.customer_id),
        restaurant_id: RestaurantId::from_uuid(body.restaurant_id),
        idempotency_key: body.idempotency_key.map(IdempotencyKey::new),
        lines: body
            .items
            .iter()
            .map(|line| OrderLine {
                menu_item_id: MenuItemId::from_uuid(line.menu_item_id),
                quantity: line.quantity,
            })
            .collect(),
    };

    let outcome = state.orders.create_order(request).await?;
    // Replays return 200 so clients can tell them from fresh creates.
    let status = if outcome.is_replay() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let order = outcome.into_inner();
    Ok((status, Json(OrderResponse::from(&order))))
}

async fn get_order<R: Backend>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get_order(OrderId::from_uuid(id)).await?;
    Ok(Json(OrderResponse::from(&order)))
}

async fn update_order_status<R: Backend>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<OrderResponse>, ApiError> {
    let status = OrderStatus::from_str(&body.status).map_err(ApiError::BadRequest)?;
    let order = state
        .orders
        .update_order_status(OrderId::from_uuid(id), status)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}
