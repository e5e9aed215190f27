use crate::repository::OrderStore;
use crate::DbError;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{Order, OrderUpsert, PriceCurrency};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

/// An `OrderStore` held entirely in memory.
///
/// Sync batches are applied to a copy of the table and swapped in only when
/// every row fits, so a failing batch leaves the previous state untouched,
/// exactly like a rolled-back transaction.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: Mutex<BTreeMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with fully-specified records.
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let orders = orders.into_iter().map(|o| (o.order_id.clone(), o)).collect();
        Self { orders: Mutex::new(orders) }
    }

    pub async fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.lock().await.get(order_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.orders.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.lock().await.is_empty()
    }
}

fn overwrite_synced_fields(target: &mut Order, source: &OrderUpsert) {
    target.index_number = source.index_number;
    target.delivery_date = source.delivery_date;
    target.price_foreign = source.price_foreign;
    target.price_local = source.price_local;
    target.delivery_expired = source.delivery_expired;
}

fn price_of(order: &Order, currency: PriceCurrency) -> Decimal {
    match currency {
        PriceCurrency::Foreign => order.price_foreign,
        PriceCurrency::Local => order.price_local,
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn existing_order_ids(&self, order_ids: &[String]) -> Result<HashSet<String>, DbError> {
        let orders = self.orders.lock().await;
        Ok(order_ids.iter().filter(|id| orders.contains_key(*id)).cloned().collect())
    }

    async fn apply_sync_batch(&self, inserts: &[OrderUpsert], updates: &[OrderUpsert]) -> Result<(), DbError> {
        let mut orders = self.orders.lock().await;
        let mut staged = orders.clone();

        for order in inserts {
            match staged.get_mut(&order.order_id) {
                Some(existing) => overwrite_synced_fields(existing, order),
                None => {
                    staged.insert(order.order_id.clone(), order.clone().into_new_order());
                }
            }
        }
        for order in updates {
            if let Some(existing) = staged.get_mut(&order.order_id) {
                overwrite_synced_fields(existing, order);
            }
        }

        let mut owners: HashMap<i32, &str> = HashMap::new();
        for order in staged.values() {
            if let Some(other) = owners.insert(order.index_number, &order.order_id) {
                return Err(DbError::Constraint(format!(
                    "index_number {} used by both '{}' and '{}'",
                    order.index_number, other, order.order_id
                )));
            }
        }

        *orders = staged;
        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, DbError> {
        let mut orders: Vec<Order> = self.orders.lock().await.values().cloned().collect();
        orders.sort_by_key(|o| o.index_number);
        Ok(orders)
    }

    async fn unnotified_expired(&self) -> Result<Vec<Order>, DbError> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .await
            .values()
            .filter(|o| o.delivery_expired && !o.notification_sent)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.index_number);
        Ok(orders)
    }

    async fn mark_notified(&self, order_id: &str) -> Result<(), DbError> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(order_id).ok_or(DbError::NotFound)?;
        order.notification_sent = true;
        Ok(())
    }

    async fn reset_expired_notifications(&self) -> Result<u64, DbError> {
        let mut orders = self.orders.lock().await;
        let mut touched = 0;
        for order in orders.values_mut().filter(|o| o.delivery_expired) {
            order.notification_sent = false;
            touched += 1;
        }
        Ok(touched)
    }

    async fn total_price(&self, currency: PriceCurrency) -> Result<Decimal, DbError> {
        let orders = self.orders.lock().await;
        Ok(orders.values().map(|o| price_of(o, currency)).sum())
    }

    async fn accumulated_price_by_date(&self, currency: PriceCurrency) -> Result<Vec<(NaiveDate, Decimal)>, DbError> {
        let orders = self.orders.lock().await;
        let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for order in orders.values() {
            *by_date.entry(order.delivery_date).or_default() += price_of(order, currency);
        }
        Ok(by_date.into_iter().collect())
    }
}
