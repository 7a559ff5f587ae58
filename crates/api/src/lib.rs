//! HTTP API wiring: routes, shared state, and default composition.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use common::MenuItemId;
use inventory::{
    DistributedLockDecrementer, ExclusiveRowDecrementer, InMemoryLockService, StockDecrementer,
    StockStrategy,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, MenuItemRepository, OrderRepository, PaymentRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use checkout::{
    ChannelNotificationDispatcher, CircuitBreaker, GatewayTimeouts, MockGateway, OrderService,
    PaymentOrchestrator, RetryPolicy,
};

pub use config::Config;
pub use error::ApiError;
pub use routes::orders::AppState;

/// Everything the handlers need from a storage backend.
pub trait Backend:
    MenuItemRepository + OrderRepository + PaymentRepository + Send + Sync + 'static
{
}

impl<T> Backend for T where
    T: MenuItemRepository + OrderRepository + PaymentRepository + Send + Sync + 'static
{
}

/// Order service wired into the application state.
pub type Orders<R> = OrderService<R, Decrementer<R>, ChannelNotificationDispatcher>;

/// Payment orchestrator wired into the application state.
pub type Payments<R> = PaymentOrchestrator<R, MockGateway, ChannelNotificationDispatcher>;

/// The stock decrement strategy selected at wiring time.
pub enum Decrementer<R> {
    Exclusive(ExclusiveRowDecrementer<R>),
    Locked(DistributedLockDecrementer<R, InMemoryLockService>),
}

impl<R: MenuItemRepository> Decrementer<R> {
    pub fn from_strategy(strategy: StockStrategy, store: Arc<R>) -> Self {
        match strategy {
            StockStrategy::ExclusiveRow => {
                Decrementer::Exclusive(ExclusiveRowDecrementer::new(store))
            }
            StockStrategy::DistributedLock => Decrementer::Locked(
                DistributedLockDecrementer::new(store, Arc::new(InMemoryLockService::new())),
            ),
        }
    }
}

#[async_trait]
impl<R: MenuItemRepository> StockDecrementer for Decrementer<R> {
    async fn decrease_stock(&self, id: MenuItemId, quantity: u32) -> inventory::Result<()> {
        match self {
            Decrementer::Exclusive(d) => d.decrease_stock(id, quantity).await,
            Decrementer::Locked(d) => d.decrease_stock(id, quantity).await,
        }
    }
}

/// Builds the full router: business routes, health, metrics, CORS, and
/// request tracing.
pub fn create_app<R: Backend>(state: AppState<R>, metrics_handle: PrometheusHandle) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::orders::router())
        .merge(routes::payments::router())
        .merge(routes::menu::router())
        .route("/health", axum::routing::get(routes::health::health))
        .with_state(state)
        .merge(routes::metrics::metrics_router(metrics_handle))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Builds the default state over a shared backend: the configured stock
/// strategy, the mock gateway behind the default breaker, retry, and
/// deadline settings, and a drain task that logs dispatched notifications.
pub fn create_default_state<R: Backend>(store: Arc<R>, strategy: StockStrategy) -> AppState<R> {
    let decrementer = Arc::new(Decrementer::from_strategy(strategy, store.clone()));

    let (dispatcher, mut rx) = ChannelNotificationDispatcher::pair();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            tracing::info!(order_id = %event.order_id(), ?event, "notification delivered");
        }
    });
    let notifier = Arc::new(dispatcher);

    let orders = Arc::new(OrderService::new(
        store.clone(),
        decrementer.clone(),
        notifier.clone(),
    ));
    let payments = Arc::new(PaymentOrchestrator::new(
        store.clone(),
        Arc::new(MockGateway::new()),
        notifier,
        Arc::new(CircuitBreaker::default()),
        RetryPolicy::default(),
        GatewayTimeouts::default(),
    ));

    AppState {
        orders,
        payments,
        decrementer,
        store,
    }
}

/// Default state over the in-memory backend.
pub fn create_in_memory_state(strategy: StockStrategy) -> AppState<InMemoryStore> {
    create_default_state(Arc::new(InMemoryStore::new()), strategy)
}
