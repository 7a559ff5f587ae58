//! Payment endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use common::{IdempotencyKey, Money, OrderId, PaymentId};
use domain::Payment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::orders::AppState;
use crate::Backend;

pub fn router<R: Backend>() -> Router<AppState<R>> {
    Router::new()
        .route("/payments", post(request_payment::<R>))
        .route("/payments/{id}", get(get_payment::<R>))
        .route("/payments/{id}/refund", post(refund_payment::<R>))
        .route("/orders/{id}/payment", get(get_order_payment::<R>))
}

#[derive(Debug, Deserialize)]
pub struct RequestPaymentBody {
    pub order_id: Uuid,
    /// Amount in minor units; must match the order's stored total.
    pub amount: i64,
    pub idempotency_key: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: i64,
    pub status: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id().as_uuid(),
            order_id: payment.order_id().as_uuid(),
            amount: payment.amount().minor(),
            status: payment.status().to_string(),
            transaction_id: payment.transaction_id().map(str::to_string),
            created_at: payment.created_at(),
            updated_at: payment.updated_at(),
        }
    }
}

async fn request_payment<R: Backend>(
    State(state): State<AppState<R>>,
    Json(body): Json<RequestPaymentBody>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let outcome = state
        .payments
        .request_payment(
            OrderId::from_uuid(body.order_id),
            Money::from_minor(body.amount),
            IdempotencyKey::new(body.idempotency_key),
        )
        .await?;
    // Replays return 200 so clients can tell them from fresh charges.
    let status = if outcome.is_replay() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let payment = outcome.into_inner();
    Ok((status, Json(PaymentResponse::from(&payment))))
}

async fn get_payment<R: Backend>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state.payments.get_payment(PaymentId::from_uuid(id)).await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

async fn refund_payment<R: Backend>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .payments
        .refund_payment(PaymentId::from_uuid(id))
        .await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

async fn get_order_payment<R: Backend>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .payments
        .find_payment_by_order(OrderId::from_uuid(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no payment for order {id}")))?;
    Ok(Json(PaymentResponse::from(&payment)))
}
