//! Runs against a live Postgres. `sqlx::test` creates a throwaway database per
//! test from `DATABASE_URL` and applies `./migrations` to it.
//!
//! `DATABASE_URL=postgres://… cargo test -p database -- --ignored`

use chrono::NaiveDate;
use core_types::{OrderUpsert, PriceCurrency};
use database::{DbError, DbRepository, OrderStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn upsert(order_id: &str, index_number: i32, price_foreign: Decimal) -> OrderUpsert {
    OrderUpsert {
        order_id: order_id.to_string(),
        index_number,
        delivery_date: date(2024, 5, 1),
        price_foreign,
        price_local: price_foreign * dec!(91.3336),
        delivery_expired: true,
    }
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn index_clash_rolls_back_the_whole_batch(pool: PgPool) {
    let repo = DbRepository::new(pool);
    repo.apply_sync_batch(&[upsert("A", 1, dec!(10)), upsert("B", 2, dec!(20))], &[]).await.unwrap();
    let before = repo.list_orders().await.unwrap();

    let err = repo
        .apply_sync_batch(&[upsert("C", 1, dec!(30))], &[upsert("B", 2, dec!(99))])
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Constraint(_)));
    assert_eq!(repo.list_orders().await.unwrap(), before);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn index_numbers_can_be_swapped_in_one_batch(pool: PgPool) {
    let repo = DbRepository::new(pool);
    repo.apply_sync_batch(&[upsert("A", 1, dec!(1)), upsert("B", 2, dec!(1))], &[]).await.unwrap();

    repo.apply_sync_batch(&[], &[upsert("A", 2, dec!(1)), upsert("B", 1, dec!(1))]).await.unwrap();

    let ids: Vec<_> = repo.list_orders().await.unwrap().into_iter().map(|o| o.order_id).collect();
    assert_eq!(ids, vec!["B", "A"]);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn update_keeps_notification_flag_and_exact_prices(pool: PgPool) {
    let repo = DbRepository::new(pool);
    repo.apply_sync_batch(&[upsert("A", 1, dec!(10.5))], &[]).await.unwrap();
    repo.mark_notified("A").await.unwrap();

    repo.apply_sync_batch(&[], &[upsert("A", 7, dec!(675))]).await.unwrap();

    let orders = repo.list_orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].index_number, 7);
    assert_eq!(orders[0].price_local, dec!(61650.18));
    assert!(orders[0].notification_sent);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn insert_of_an_existing_key_overwrites_it(pool: PgPool) {
    let repo = DbRepository::new(pool);
    repo.apply_sync_batch(&[upsert("A", 1, dec!(1))], &[]).await.unwrap();
    repo.mark_notified("A").await.unwrap();

    // A concurrent sync partitioned "A" as new before the first one committed.
    repo.apply_sync_batch(&[upsert("A", 1, dec!(2))], &[]).await.unwrap();

    let orders = repo.list_orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].price_foreign, dec!(2));
    assert!(orders[0].notification_sent);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn aggregates_on_empty_table_are_zero_and_empty(pool: PgPool) {
    let repo = DbRepository::new(pool);

    assert_eq!(repo.total_price(PriceCurrency::Local).await.unwrap(), Decimal::ZERO);
    assert!(repo.accumulated_price_by_date(PriceCurrency::Foreign).await.unwrap().is_empty());
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn mark_and_reset_follow_expiry(pool: PgPool) {
    let repo = DbRepository::new(pool);
    let mut live = upsert("B", 2, dec!(1));
    live.delivery_expired = false;
    repo.apply_sync_batch(&[upsert("A", 1, dec!(1)), live], &[]).await.unwrap();

    let pending: Vec<_> = repo.unnotified_expired().await.unwrap().into_iter().map(|o| o.order_id).collect();
    assert_eq!(pending, vec!["A"]);
    repo.mark_notified("A").await.unwrap();
    repo.mark_notified("B").await.unwrap();
    assert!(matches!(repo.mark_notified("missing").await, Err(DbError::NotFound)));

    assert_eq!(repo.reset_expired_notifications().await.unwrap(), 1);
    let flags: Vec<_> = repo.list_orders().await.unwrap().into_iter().map(|o| o.notification_sent).collect();
    assert_eq!(flags, vec![false, true]);
}
