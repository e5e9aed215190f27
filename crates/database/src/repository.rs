use crate::DbError;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{Order, OrderUpsert, PriceCurrency};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use std::collections::HashSet;

/// Everything the jobs and the reporting API need from storage.
///
/// Implementations must make `apply_sync_batch` all-or-nothing and must never
/// touch `notification_sent` from it.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Returns the subset of `order_ids` that already exist.
    async fn existing_order_ids(&self, order_ids: &[String]) -> Result<HashSet<String>, DbError>;

    /// Inserts new orders and overwrites the synced fields of existing ones
    /// in a single transaction.
    async fn apply_sync_batch(&self, inserts: &[OrderUpsert], updates: &[OrderUpsert]) -> Result<(), DbError>;

    /// All orders, ordered by `index_number`.
    async fn list_orders(&self) -> Result<Vec<Order>, DbError>;

    /// Orders past their delivery date that no alert has gone out for yet.
    async fn unnotified_expired(&self) -> Result<Vec<Order>, DbError>;

    /// Sets `notification_sent = true` for one order, committed on its own.
    async fn mark_notified(&self, order_id: &str) -> Result<(), DbError>;

    /// Clears `notification_sent` for every expired order. Returns the number of rows touched.
    async fn reset_expired_notifications(&self) -> Result<u64, DbError>;

    /// Sum of one price column over all orders; zero when there are none.
    async fn total_price(&self, currency: PriceCurrency) -> Result<Decimal, DbError>;

    /// One price column summed per delivery date, oldest date first.
    async fn accumulated_price_by_date(&self, currency: PriceCurrency) -> Result<Vec<(NaiveDate, Decimal)>, DbError>;
}

/// The `DbRepository` is the Postgres-backed `OrderStore`. It encapsulates all
/// SQL touching the `orders` table.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for DbRepository {
    async fn existing_order_ids(&self, order_ids: &[String]) -> Result<HashSet<String>, DbError> {
        if order_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let existing: Vec<String> = sqlx::query_scalar("SELECT order_id FROM orders WHERE order_id = ANY($1)")
            .bind(order_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(existing.into_iter().collect())
    }

    async fn apply_sync_batch(&self, inserts: &[OrderUpsert], updates: &[OrderUpsert]) -> Result<(), DbError> {
        let mut tx: Transaction<Postgres> = self.pool.begin().await?;

        // A concurrent sync may have inserted the same key since we partitioned;
        // resolve that as last-writer-wins instead of failing the batch.
        for order in inserts {
            sqlx::query(
                r#"
                INSERT INTO orders (
                    order_id, index_number, delivery_date, price_foreign,
                    price_local, delivery_expired, notification_sent
                ) VALUES ($1, $2, $3, $4, $5, $6, FALSE)
                ON CONFLICT (order_id) DO UPDATE SET
                    index_number = EXCLUDED.index_number,
                    delivery_date = EXCLUDED.delivery_date,
                    price_foreign = EXCLUDED.price_foreign,
                    price_local = EXCLUDED.price_local,
                    delivery_expired = EXCLUDED.delivery_expired
                "#,
            )
            .bind(&order.order_id)
            .bind(order.index_number)
            .bind(order.delivery_date)
            .bind(order.price_foreign)
            .bind(order.price_local)
            .bind(order.delivery_expired)
            .execute(&mut *tx)
            .await?;
        }

        for order in updates {
            sqlx::query(
                r#"
                UPDATE orders SET
                    index_number = $2,
                    delivery_date = $3,
                    price_foreign = $4,
                    price_local = $5,
                    delivery_expired = $6
                WHERE order_id = $1
                "#,
            )
            .bind(&order.order_id)
            .bind(order.index_number)
            .bind(order.delivery_date)
            .bind(order.price_foreign)
            .bind(order.price_local)
            .bind(order.delivery_expired)
            .execute(&mut *tx)
            .await?;
        }

        // Deferred `index_number` uniqueness is checked here.
        tx.commit().await.map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Constraint(db.message().to_string()),
            other => other.into(),
        })?;
        tracing::debug!(inserted = inserts.len(), updated = updates.len(), "Committed sync batch.");
        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, DbError> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_id, index_number, delivery_date, price_foreign, price_local,
                   delivery_expired, notification_sent
            FROM orders
            ORDER BY index_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn unnotified_expired(&self) -> Result<Vec<Order>, DbError> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT order_id, index_number, delivery_date, price_foreign, price_local,
                   delivery_expired, notification_sent
            FROM orders
            WHERE delivery_expired AND NOT notification_sent
            ORDER BY index_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn mark_notified(&self, order_id: &str) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE orders SET notification_sent = TRUE WHERE order_id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn reset_expired_notifications(&self) -> Result<u64, DbError> {
        let result = sqlx::query("UPDATE orders SET notification_sent = FALSE WHERE delivery_expired")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn total_price(&self, currency: PriceCurrency) -> Result<Decimal, DbError> {
        // The column name comes from a closed enum, never from user input.
        let query = format!("SELECT COALESCE(SUM({}), 0) FROM orders", currency.column());
        let total: Decimal = sqlx::query_scalar(&query).fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn accumulated_price_by_date(&self, currency: PriceCurrency) -> Result<Vec<(NaiveDate, Decimal)>, DbError> {
        let query = format!(
            "SELECT delivery_date, SUM({}) AS total FROM orders GROUP BY delivery_date ORDER BY delivery_date ASC",
            currency.column()
        );
        let rows: Vec<(NaiveDate, Decimal)> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        Ok(rows)
    }
}
