use crate::error::EngineError;
use crate::parsing::{parse_delivery_date, parse_index_number, parse_price};
use api_client::{RateCache, TabularSource};
use chrono::{Local, NaiveDate};
use core_types::{CanonicalField, OrderUpsert, RawRow, SyncResult};
use database::OrderStore;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Mirrors the spreadsheet into the `orders` table.
///
/// Each run reads one rate snapshot from the shared `RateCache`, converts every
/// source row with it, and merges the batch into storage by `order_id` in a
/// single transaction. Running it again on unchanged input changes nothing.
pub struct OrderReconciler {
    source: Arc<dyn TabularSource>,
    rates: RateCache,
    store: Arc<dyn OrderStore>,
}

impl OrderReconciler {
    pub fn new(source: Arc<dyn TabularSource>, rates: RateCache, store: Arc<dyn OrderStore>) -> Self {
        Self { source, rates, store }
    }

    /// Runs one sync of `source_name`, judging expiry against today's local date.
    pub async fn synchronize(&self, source_name: &str) -> Result<SyncResult, EngineError> {
        self.synchronize_on(source_name, Local::now().date_naive()).await
    }

    /// Runs one sync of `source_name` as if today were `today`.
    pub async fn synchronize_on(&self, source_name: &str, today: NaiveDate) -> Result<SyncResult, EngineError> {
        // 1. Without a rate there is nothing to do; don't hit the source at all.
        let snapshot = self.rates.snapshot().await.map_err(EngineError::from_rate)?;
        let rows = self.source.fetch_rows(source_name).await.map_err(EngineError::from_source)?;

        if rows.is_empty() {
            tracing::info!(source = source_name, "Source returned no complete rows; nothing to sync.");
            return Ok(SyncResult::default());
        }

        // 2-3. Parse and derive. Any bad cell aborts the whole batch.
        let batch = dedupe_last_wins(transform_rows(&rows, snapshot.rate, today)?);

        // 4. Partition against what is already stored and apply atomically.
        let order_ids: Vec<String> = batch.iter().map(|o| o.order_id.clone()).collect();
        let existing = self.store.existing_order_ids(&order_ids).await?;
        let (updates, inserts): (Vec<OrderUpsert>, Vec<OrderUpsert>) =
            batch.into_iter().partition(|o| existing.contains(&o.order_id));

        self.store.apply_sync_batch(&inserts, &updates).await?;

        let result = SyncResult { inserted: inserts.len(), updated: updates.len() };
        tracing::info!(
            source = source_name,
            rate = %snapshot.rate,
            inserted = result.inserted,
            updated = result.updated,
            "Sync complete."
        );
        Ok(result)
    }
}

/// Converts source rows into upserts, pricing every row with the same `rate`.
pub fn transform_rows(rows: &[RawRow], rate: Decimal, today: NaiveDate) -> Result<Vec<OrderUpsert>, EngineError> {
    rows.iter().map(|row| transform_row(row, rate, today)).collect()
}

fn transform_row(row: &RawRow, rate: Decimal, today: NaiveDate) -> Result<OrderUpsert, EngineError> {
    let order_id = cell(row, CanonicalField::OrderId, "")?.to_string();

    let invalid = |field: CanonicalField, value: &str| EngineError::InvalidValue {
        field,
        order_id: order_id.clone(),
        value: value.to_string(),
    };

    let raw_date = cell(row, CanonicalField::DeliveryDate, &order_id)?;
    let delivery_date = parse_delivery_date(raw_date).ok_or_else(|| EngineError::DateParseFailed {
        order_id: order_id.clone(),
        value: raw_date.to_string(),
    })?;

    let raw_index = cell(row, CanonicalField::IndexNumber, &order_id)?;
    let index_number = parse_index_number(raw_index).ok_or_else(|| invalid(CanonicalField::IndexNumber, raw_index))?;

    let raw_price = cell(row, CanonicalField::PriceForeign, &order_id)?;
    let price_foreign = parse_price(raw_price).ok_or_else(|| invalid(CanonicalField::PriceForeign, raw_price))?;
    let price_local = price_foreign
        .checked_mul(rate)
        .ok_or_else(|| invalid(CanonicalField::PriceForeign, raw_price))?;

    Ok(OrderUpsert {
        order_id: order_id.clone(),
        index_number,
        delivery_date,
        price_foreign,
        price_local,
        delivery_expired: delivery_date < today,
    })
}

/// The source client only yields complete rows, so a missing field means the
/// row was built elsewhere without one.
fn cell<'a>(row: &'a RawRow, field: CanonicalField, order_id: &str) -> Result<&'a str, EngineError> {
    row.get(field).ok_or_else(|| EngineError::InvalidValue {
        field,
        order_id: order_id.to_string(),
        value: String::new(),
    })
}

/// Collapses repeated `order_id`s: the last occurrence's values win, at the
/// position of the first.
fn dedupe_last_wins(batch: Vec<OrderUpsert>) -> Vec<OrderUpsert> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(batch.len());
    let mut unique: Vec<OrderUpsert> = Vec::with_capacity(batch.len());
    for order in batch {
        match positions.get(&order.order_id) {
            Some(&index) => unique[index] = order,
            None => {
                positions.insert(order.order_id.clone(), unique.len());
                unique.push(order);
            }
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(index: &str, id: &str, price: &str, date: &str) -> RawRow {
        RawRow::new()
            .with(CanonicalField::IndexNumber, index)
            .with(CanonicalField::OrderId, id)
            .with(CanonicalField::PriceForeign, price)
            .with(CanonicalField::DeliveryDate, date)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    #[test]
    fn derives_local_price_and_expiry() {
        let rows = [row("1", "A", "675", "09.06.2024"), row("2", "B", "10.5", "2024-06-10")];

        let batch = transform_rows(&rows, dec!(91.3336), today()).unwrap();

        assert_eq!(batch[0].price_local, dec!(61650.18));
        assert!(batch[0].delivery_expired);
        assert_eq!(batch[1].price_local, dec!(959.0028));
        assert!(!batch[1].delivery_expired, "due today is not yet expired");
    }

    #[test]
    fn short_years_are_not_stored_as_antiquity() {
        let batch = transform_rows(&[row("1", "A", "1", "24-05-22")], dec!(90), today()).unwrap();

        assert_eq!(batch[0].delivery_date, NaiveDate::from_ymd_opt(2022, 5, 24).unwrap());
        assert!(batch[0].delivery_expired);
    }

    #[test]
    fn one_bad_date_fails_the_batch() {
        let rows = [row("1", "A", "1", "2024-06-01"), row("2", "B", "1", "next week")];

        let err = transform_rows(&rows, dec!(90), today()).unwrap_err();

        assert!(matches!(err, EngineError::DateParseFailed { order_id, value } if order_id == "B" && value == "next week"));
    }

    #[test]
    fn bad_price_is_invalid_value() {
        let err = transform_rows(&[row("1", "A", "n/a", "2024-06-01")], dec!(90), today()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidValue { field: CanonicalField::PriceForeign, .. }));
    }

    #[test]
    fn duplicate_ids_keep_last_values_at_first_position() {
        let batch = transform_rows(
            &[row("1", "A", "1", "2024-07-01"), row("2", "B", "2", "2024-07-01"), row("3", "A", "3", "2024-07-01")],
            dec!(2),
            today(),
        )
        .unwrap();

        let unique = dedupe_last_wins(batch);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].order_id, "A");
        assert_eq!(unique[0].index_number, 3);
        assert_eq!(unique[0].price_local, dec!(6));
        assert_eq!(unique[1].order_id, "B");
    }
}
