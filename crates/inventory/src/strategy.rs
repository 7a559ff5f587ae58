//! Stock decrement strategies.

use std::sync::Arc;

use async_trait::async_trait;
use common::MenuItemId;
use domain::DomainError;
use store::{MenuItemRepository, UnsafeStockAccess};

use crate::lock::DistributedLock;
use crate::{InventoryError, Result};

/// Builds the lock key guarding a menu item's stock counter.
pub fn stock_lock_key(id: MenuItemId) -> String {
    format!("lock:menu:stock:{id}")
}

/// A strategy for decrementing a menu item's stock under contention.
///
/// All implementations observe the same contract: the decrement is
/// all-or-nothing, stock never goes negative, and on success the counter
/// drops by exactly `quantity`.
#[async_trait]
pub trait StockDecrementer: Send + Sync {
    async fn decrease_stock(&self, id: MenuItemId, quantity: u32) -> Result<()>;
}

/// Selects which sanctioned strategy serves production traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockStrategy {
    /// Row-level lock inside the store transaction.
    #[default]
    ExclusiveRow,

    /// Named lock held around a plain guarded decrement.
    DistributedLock,
}

impl std::str::FromStr for StockStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "exclusive-row" => Ok(StockStrategy::ExclusiveRow),
            "distributed-lock" => Ok(StockStrategy::DistributedLock),
            other => Err(format!("unknown stock strategy: {other}")),
        }
    }
}

/// Delegates to the store's row-locked read-modify-write.
///
/// Contention is per item: concurrent decrements on the same item
/// serialize at the row, decrements on different items run in parallel.
pub struct ExclusiveRowDecrementer<R> {
    repo: Arc<R>,
}

impl<R> ExclusiveRowDecrementer<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<R> StockDecrementer for ExclusiveRowDecrementer<R>
where
    R: MenuItemRepository,
{
    async fn decrease_stock(&self, id: MenuItemId, quantity: u32) -> Result<()> {
        self.repo
            .decrement_stock_exclusive(id, quantity)
            .await
            .map_err(Into::into)
    }
}

/// Holds a named lock across a plain guarded decrement.
///
/// The lock scope strictly contains the store call: acquire, decrement,
/// release. Acquisition is bounded; a timeout leaves stock untouched and
/// surfaces as the retriable [`InventoryError::LockTimeout`].
pub struct DistributedLockDecrementer<R, L> {
    repo: Arc<R>,
    locks: Arc<L>,
}

impl<R, L> DistributedLockDecrementer<R, L> {
    pub fn new(repo: Arc<R>, locks: Arc<L>) -> Self {
        Self { repo, locks }
    }
}

#[async_trait]
impl<R, L> StockDecrementer for DistributedLockDecrementer<R, L>
where
    R: MenuItemRepository,
    L: DistributedLock,
{
    async fn decrease_stock(&self, id: MenuItemId, quantity: u32) -> Result<()> {
        let key = stock_lock_key(id);
        let token = self.locks.acquire(&key).await?;

        let result = self.repo.decrement_stock_plain(id, quantity).await;

        if let Err(e) = self.locks.release(&key, token).await {
            tracing::warn!(key, error = %e, "lock release failed");
        }

        result.map_err(Into::into)
    }
}

/// Unguarded read-then-write decrement.
///
/// Loses updates under contention; kept only so tests can show the
/// failure mode the sanctioned strategies prevent. Never wired into
/// production paths.
pub struct UnsafeDecrementer<R> {
    repo: Arc<R>,
}

impl<R> UnsafeDecrementer<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<R> StockDecrementer for UnsafeDecrementer<R>
where
    R: UnsafeStockAccess,
{
    async fn decrease_stock(&self, id: MenuItemId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity }.into());
        }

        let stock = self.repo.read_stock(id).await?;
        if stock < quantity {
            return Err(DomainError::InsufficientStock {
                available: stock,
                requested: quantity,
            }
            .into());
        }

        // The gap between the read above and the write below is exactly
        // where concurrent decrements overwrite each other.
        tokio::task::yield_now().await;

        self.repo.write_stock_unchecked(id, stock - quantity).await?;
        Ok(())
    }
}
