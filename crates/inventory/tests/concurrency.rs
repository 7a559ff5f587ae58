//! Concurrency properties of the stock decrement strategies.
//!
//! The same property suite runs against both sanctioned strategies; the
//! unguarded baseline is exercised separately to show the lost updates
//! the sanctioned strategies prevent.

use std::sync::Arc;

use common::{MenuItemId, Money, RestaurantId};
use domain::MenuItem;
use inventory::{
    DistributedLockDecrementer, ExclusiveRowDecrementer, InMemoryLockService, StockDecrementer,
    UnsafeDecrementer,
};
use store::{InMemoryStore, MenuItemRepository};

async fn seeded_store(stock: u32) -> (Arc<InMemoryStore>, MenuItemId) {
    let store = Arc::new(InMemoryStore::new());
    let item = MenuItem::new(
        RestaurantId::new(),
        "Fried Chicken",
        Money::from_minor(18000),
        stock,
    );
    let id = item.id();
    store.insert_menu_item(item).await.unwrap();
    (store, id)
}

/// Spawns `workers` concurrent decrements of `quantity` each and returns
/// how many succeeded.
async fn run_contention<S>(strategy: Arc<S>, id: MenuItemId, workers: u32, quantity: u32) -> u32
where
    S: StockDecrementer + 'static,
{
    let mut handles = Vec::new();
    for _ in 0..workers {
        let strategy = strategy.clone();
        handles.push(tokio::spawn(async move {
            strategy.decrease_stock(id, quantity).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }
    succeeded
}

/// Oversubscribed single-unit decrements: exactly `initial` succeed and
/// stock lands on zero.
async fn oversubscription_property<S>(strategy: Arc<S>, store: Arc<InMemoryStore>, id: MenuItemId)
where
    S: StockDecrementer + 'static,
{
    let succeeded = run_contention(strategy, id, 150, 1).await;

    assert_eq!(succeeded, 100);
    assert_eq!(store.get_menu_item(id).await.unwrap().stock(), 0);
}

/// Mixed quantities: final stock equals initial minus the sum of
/// successful decrements.
async fn accounting_property<S>(strategy: Arc<S>, store: Arc<InMemoryStore>, id: MenuItemId)
where
    S: StockDecrementer + 'static,
{
    let mut handles = Vec::new();
    for quantity in [1u32, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12] {
        let strategy = strategy.clone();
        handles.push(tokio::spawn(async move {
            strategy
                .decrease_stock(id, quantity)
                .await
                .map(|()| quantity)
        }));
    }

    let mut decremented = 0u32;
    for handle in handles {
        if let Ok(quantity) = handle.await.unwrap() {
            decremented += quantity;
        }
    }

    let final_stock = store.get_menu_item(id).await.unwrap().stock();
    assert!(decremented <= 50);
    assert_eq!(final_stock, 50 - decremented);
}

#[tokio::test(flavor = "multi_thread")]
async fn exclusive_row_never_oversells() {
    let (store, id) = seeded_store(100).await;
    let strategy = Arc::new(ExclusiveRowDecrementer::new(store.clone()));
    oversubscription_property(strategy, store, id).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn distributed_lock_never_oversells() {
    let (store, id) = seeded_store(100).await;
    let locks = Arc::new(InMemoryLockService::new());
    let strategy = Arc::new(DistributedLockDecrementer::new(store.clone(), locks));
    oversubscription_property(strategy, store, id).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn exclusive_row_accounts_for_every_success() {
    let (store, id) = seeded_store(50).await;
    let strategy = Arc::new(ExclusiveRowDecrementer::new(store.clone()));
    accounting_property(strategy, store, id).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn distributed_lock_accounts_for_every_success() {
    let (store, id) = seeded_store(50).await;
    let locks = Arc::new(InMemoryLockService::new());
    let strategy = Arc::new(DistributedLockDecrementer::new(store.clone(), locks));
    accounting_property(strategy, store, id).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn strategies_do_not_couple_distinct_items() {
    let store = Arc::new(InMemoryStore::new());
    let mut ids = Vec::new();
    for _ in 0..4 {
        let item = MenuItem::new(
            RestaurantId::new(),
            "Japchae",
            Money::from_minor(10000),
            30,
        );
        ids.push(item.id());
        store.insert_menu_item(item).await.unwrap();
    }

    let strategy = Arc::new(ExclusiveRowDecrementer::new(store.clone()));

    let mut handles = Vec::new();
    for &id in &ids {
        for _ in 0..30 {
            let strategy = strategy.clone();
            handles.push(tokio::spawn(
                async move { strategy.decrease_stock(id, 1).await },
            ));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for id in ids {
        assert_eq!(store.get_menu_item(id).await.unwrap().stock(), 0);
    }
}

/// The unguarded baseline drops concurrent decrements: across repeated
/// rounds, at least one round must end with more stock left than the
/// number of successful decrements accounts for.
#[tokio::test(flavor = "multi_thread")]
async fn unsafe_baseline_loses_updates_under_contention() {
    let mut lost_updates_observed = false;

    for _ in 0..20 {
        let (store, id) = seeded_store(100).await;
        let strategy = Arc::new(UnsafeDecrementer::new(store.clone()));

        let succeeded = run_contention(strategy, id, 100, 1).await;
        let final_stock = store.get_menu_item(id).await.unwrap().stock();

        // With no lost updates these would balance exactly.
        if final_stock + succeeded > 100 {
            lost_updates_observed = true;
            break;
        }
    }

    assert!(
        lost_updates_observed,
        "expected the unguarded read-then-write to drop at least one decrement"
    );
}
