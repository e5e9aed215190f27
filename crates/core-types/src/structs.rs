use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::enums::CanonicalField;

/// A persisted order, exactly as stored in the `orders` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub order_id: String,
    pub index_number: i32,
    pub delivery_date: NaiveDate,
    pub price_foreign: Decimal,
    pub price_local: Decimal,
    pub delivery_expired: bool,
    pub notification_sent: bool,
}

/// The fields a sync writes for one order. `notification_sent` is deliberately
/// absent: a sync never touches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpsert {
    pub order_id: String,
    pub index_number: i32,
    pub delivery_date: NaiveDate,
    pub price_foreign: Decimal,
    pub price_local: Decimal,
    pub delivery_expired: bool,
}

impl OrderUpsert {
    /// Builds the record inserted on the first sighting of an `order_id`.
    pub fn into_new_order(self) -> Order {
        Order {
            order_id: self.order_id,
            index_number: self.index_number,
            delivery_date: self.delivery_date,
            price_foreign: self.price_foreign,
            price_local: self.price_local,
            delivery_expired: self.delivery_expired,
            notification_sent: false,
        }
    }
}

/// One complete source row, keyed by canonical field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    values: BTreeMap<CanonicalField, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: CanonicalField, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Chainable form of `insert`, handy when building rows by hand.
    pub fn with(mut self, field: CanonicalField, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub inserted: usize,
    pub updated: usize,
}

/// An expired order included in an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueOrder {
    pub order_id: String,
    pub days_overdue: i64,
}

/// Outcome of one notifier run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifyResult {
    /// Orders flipped to `notification_sent = true`, most overdue first.
    pub notified: Vec<OverdueOrder>,
    /// Whether a message went out. False when there was nothing to report.
    pub message_sent: bool,
}
