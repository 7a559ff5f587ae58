use async_trait::async_trait;
use common::{CustomerId, IdempotencyKey, MenuItemId, Money, OrderId, PaymentId, RestaurantId};
use domain::{MenuItem, Order, OrderItem, OrderStatus, Payment, PaymentStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::repository::{MenuItemRepository, OrderRepository, PaymentRepository};
use crate::{Result, StoreError};

/// PostgreSQL-backed store implementation.
///
/// Exclusive decrements take a `SELECT … FOR UPDATE` row lock; plain
/// decrements rely on a single guarded `UPDATE`. Idempotency keys are
/// enforced by unique constraints, and constraint violations are mapped
/// to the typed duplicate errors carrying the winning row's id.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_menu_item(row: PgRow) -> Result<MenuItem> {
        Ok(MenuItem::restore(
            MenuItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            RestaurantId::from_uuid(row.try_get::<Uuid, _>("restaurant_id")?),
            row.try_get("name")?,
            row.try_get("description")?,
            Money::from_minor(row.try_get("price")?),
            row.try_get::<i64, _>("stock")? as u32,
            row.try_get("is_available")?,
            row.try_get::<i64, _>("version")? as u64,
            row.try_get("created_at")?,
        ))
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        Ok(Payment::restore(
            PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            Money::from_minor(row.try_get("amount")?),
            parse_status::<PaymentStatus>(row.try_get("status")?)?,
            row.try_get("transaction_id")?,
            IdempotencyKey::new(row.try_get::<String, _>("idempotency_key")?),
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }

    async fn load_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT menu_item_id, name, unit_price, quantity
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderItem::new(
                    MenuItemId::from_uuid(row.try_get::<Uuid, _>("menu_item_id")?),
                    row.try_get::<String, _>("name")?,
                    Money::from_minor(row.try_get("unit_price")?),
                    row.try_get::<i64, _>("quantity")? as u32,
                ))
            })
            .collect()
    }

    async fn restore_order(&self, row: PgRow) -> Result<Order> {
        let id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let items = self.load_order_items(id).await?;

        Ok(Order::restore(
            id,
            CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            RestaurantId::from_uuid(row.try_get::<Uuid, _>("restaurant_id")?),
            items,
            parse_status::<OrderStatus>(row.try_get("status")?)?,
            row.try_get::<Option<String>, _>("idempotency_key")?
                .map(IdempotencyKey::new),
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }
}

fn parse_status<T: std::str::FromStr<Err = String>>(value: String) -> Result<T> {
    value
        .parse()
        .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(e.into())))
}

#[async_trait]
impl MenuItemRepository for PostgresStore {
    async fn insert_menu_item(&self, item: MenuItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO menu_items (id, restaurant_id, name, description, price, stock, is_available, version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id().as_uuid())
        .bind(item.restaurant_id().as_uuid())
        .bind(item.name())
        .bind(item.description())
        .bind(item.price().minor())
        .bind(i64::from(item.stock()))
        .bind(item.is_available())
        .bind(item.version() as i64)
        .bind(item.created_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_menu_item(&self, id: MenuItemId) -> Result<MenuItem> {
        let row = sqlx::query(
            r#"
            SELECT id, restaurant_id, name, description, price, stock, is_available, version, created_at
            FROM menu_items
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("MenuItem", id))?;

        Self::row_to_menu_item(row)
    }

    async fn decrement_stock_exclusive(&self, id: MenuItemId, quantity: u32) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // The row lock is held until commit, so competing decrements on
        // the same item serialize here.
        let row = sqlx::query(
            r#"
            SELECT id, restaurant_id, name, description, price, stock, is_available, version, created_at
            FROM menu_items
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("MenuItem", id))?;

        let mut item = Self::row_to_menu_item(row)?;
        item.decrease_stock(quantity)?;

        sqlx::query("UPDATE menu_items SET stock = $2, version = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(i64::from(item.stock()))
            .bind(item.version() as i64)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn decrement_stock_plain(&self, id: MenuItemId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(domain::DomainError::InvalidQuantity { quantity }.into());
        }

        let result = sqlx::query(
            r#"
            UPDATE menu_items
            SET stock = stock - $2, version = version + 1
            WHERE id = $1 AND stock >= $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from insufficient stock.
            let available: Option<i64> =
                sqlx::query_scalar("SELECT stock FROM menu_items WHERE id = $1")
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await?;

            return match available {
                Some(stock) => Err(domain::DomainError::InsufficientStock {
                    available: stock as u32,
                    requested: quantity,
                }
                .into()),
                None => Err(StoreError::not_found("MenuItem", id)),
            };
        }

        Ok(())
    }

    async fn restore_stock(&self, id: MenuItemId, quantity: u32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE menu_items SET stock = stock + $2, version = version + 1 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("MenuItem", id));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn insert_order(&self, order: Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, restaurant_id, status, idempotency_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(order.restaurant_id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.idempotency_key().map(IdempotencyKey::as_str))
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_idempotency")
                && let Some(key) = order.idempotency_key()
            {
                drop(tx);
                let existing: Uuid =
                    sqlx::query_scalar("SELECT id FROM orders WHERE idempotency_key = $1")
                        .bind(key.as_str())
                        .fetch_one(&self.pool)
                        .await?;
                return Err(StoreError::DuplicateOrderKey {
                    existing: OrderId::from_uuid(existing),
                });
            }
            return Err(StoreError::Database(e));
        }

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, menu_item_id, name, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(position as i64)
            .bind(item.menu_item_id.as_uuid())
            .bind(&item.name)
            .bind(item.unit_price.minor())
            .bind(i64::from(item.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, restaurant_id, status, idempotency_key, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("Order", id))?;

        self.restore_order(row).await
    }

    async fn find_order_by_key(&self, key: &IdempotencyKey) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, restaurant_id, status, idempotency_key, created_at, updated_at
            FROM orders
            WHERE idempotency_key = $1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.restore_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn update_order_status(&self, id: OrderId, new_status: OrderStatus) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let current: String =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| StoreError::not_found("Order", id))?;

        let current = parse_status::<OrderStatus>(current)?;
        let next = current.transition_to(new_status)?;

        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.get_order(id).await
    }
}

#[async_trait]
impl PaymentRepository for PostgresStore {
    async fn insert_payment(&self, payment: Payment) -> Result<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, amount, status, transaction_id, idempotency_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(payment.id().as_uuid())
        .bind(payment.order_id().as_uuid())
        .bind(payment.amount().minor())
        .bind(payment.status().as_str())
        .bind(payment.transaction_id())
        .bind(payment.idempotency_key().as_str())
        .bind(payment.created_at())
        .bind(payment.updated_at())
        .execute(&self.pool)
        .await;

        if let Err(e) = inserted {
            if let sqlx::Error::Database(ref db_err) = e {
                match db_err.constraint() {
                    Some("unique_payment_idempotency") => {
                        let existing: Uuid = sqlx::query_scalar(
                            "SELECT id FROM payments WHERE idempotency_key = $1",
                        )
                        .bind(payment.idempotency_key().as_str())
                        .fetch_one(&self.pool)
                        .await?;
                        return Err(StoreError::DuplicatePaymentKey {
                            existing: PaymentId::from_uuid(existing),
                        });
                    }
                    Some("unique_payment_order") => {
                        let existing: Uuid =
                            sqlx::query_scalar("SELECT id FROM payments WHERE order_id = $1")
                                .bind(payment.order_id().as_uuid())
                                .fetch_one(&self.pool)
                                .await?;
                        return Err(StoreError::DuplicateOrderPayment {
                            existing: PaymentId::from_uuid(existing),
                        });
                    }
                    _ => {}
                }
            }
            return Err(StoreError::Database(e));
        }

        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Payment> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, amount, status, transaction_id, idempotency_key, created_at, updated_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("Payment", id))?;

        Self::row_to_payment(row)
    }

    async fn find_payment_by_key(&self, key: &IdempotencyKey) -> Result<Option<Payment>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, amount, status, transaction_id, idempotency_key, created_at, updated_at
            FROM payments
            WHERE idempotency_key = $1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_payment_by_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, amount, status, transaction_id, idempotency_key, created_at, updated_at
            FROM payments
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn mark_payment_success(&self, id: PaymentId, transaction_id: &str) -> Result<Payment> {
        self.settle(id, |payment| payment.mark_success(transaction_id))
            .await
    }

    async fn mark_payment_failed(&self, id: PaymentId) -> Result<Payment> {
        self.settle(id, Payment::mark_failed).await
    }

    async fn mark_payment_refunded(&self, id: PaymentId) -> Result<Payment> {
        self.settle(id, Payment::mark_refunded).await
    }
}

impl PostgresStore {
    /// Loads the payment under a row lock, applies the status mutation,
    /// and writes the result back in the same transaction.
    async fn settle<F>(&self, id: PaymentId, mutate: F) -> Result<Payment>
    where
        F: FnOnce(&mut Payment) -> std::result::Result<(), domain::DomainError> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, order_id, amount, status, transaction_id, idempotency_key, created_at, updated_at
            FROM payments
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("Payment", id))?;

        let mut payment = Self::row_to_payment(row)?;
        mutate(&mut payment)?;

        sqlx::query(
            "UPDATE payments SET status = $2, transaction_id = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(payment.status().as_str())
        .bind(payment.transaction_id())
        .bind(payment.updated_at())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(payment)
    }
}
