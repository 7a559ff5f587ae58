//! Menu item endpoints: catalog seeding and direct stock operations.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use common::{MenuItemId, Money, RestaurantId};
use domain::MenuItem;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use checkout::CheckoutError;
use inventory::StockDecrementer;

use crate::error::ApiError;
use crate::routes::orders::AppState;
use crate::Backend;

pub fn router<R: Backend>() -> Router<AppState<R>> {
    Router::new()
        .route("/menu-items", post(create_menu_item::<R>))
        .route("/menu-items/{id}", get(get_menu_item::<R>))
        .route(
            "/menu-items/{id}/decrease-stock",
            post(decrease_stock::<R>),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateMenuItemBody {
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: u32,
}

#[derive(Debug, Deserialize)]
pub struct DecreaseStockBody {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct MenuItemResponse {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: u32,
    pub is_available: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&MenuItem> for MenuItemResponse {
    fn from(item: &MenuItem) -> Self {
        Self {
            id: item.id().as_uuid(),
            restaurant_id: item.restaurant_id().as_uuid(),
            name: item.name().to_string(),
            description: item.description().map(str::to_string),
            price: item.price().minor(),
            stock: item.stock(),
            is_available: item.is_available(),
            version: item.version(),
            created_at: item.created_at(),
        }
    }
}

async fn create_menu_item<R: Backend>(
    State(state): State<AppState<R>>,
    Json(body): Json<CreateMenuItemBody>,
) -> Result<(StatusCode, Json<MenuItemResponse>), ApiError> {
    if body.price < 0 {
        return Err(ApiError::BadRequest("price must not be negative".to_string()));
    }

    let mut item = MenuItem::new(
        RestaurantId::from_uuid(body.restaurant_id),
        body.name,
        Money::from_minor(body.price),
        body.stock,
    );
    if let Some(description) = body.description {
        item.set_description(description);
    }

    let response = MenuItemResponse::from(&item);
    state.store.insert_menu_item(item).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_menu_item<R: Backend>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let item = state.store.get_menu_item(MenuItemId::from_uuid(id)).await?;
    Ok(Json(MenuItemResponse::from(&item)))
}

/// Decrements stock through the configured strategy, outside any order.
async fn decrease_stock<R: Backend>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(body): Json<DecreaseStockBody>,
) -> Result<Json<MenuItemResponse>, ApiError> {
    let item_id = MenuItemId::from_uuid(id);
    state
        .decrementer
        .decrease_stock(item_id, body.quantity)
        .await
        .map_err(CheckoutError::from)?;

    let item = state.store.get_menu_item(item_id).await?;
    Ok(Json(MenuItemResponse::from(&item)))
}
