use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::NaiveDate;
use configuration::RateConfig;
use core_types::Order;
use database::MemoryOrderStore;
use rust_decimal_macros::dec;
use std::sync::Arc;
use web_server::handlers::{get_accumulated_price, get_orders, get_total_price};
use web_server::AppState;

fn order(order_id: &str, index_number: i32, day: u32, usd: rust_decimal::Decimal) -> Order {
    Order {
        order_id: order_id.to_string(),
        index_number,
        delivery_date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        price_foreign: usd,
        price_local: usd * dec!(90),
        delivery_expired: false,
        notification_sent: false,
    }
}

fn state(orders: Vec<Order>) -> Arc<AppState> {
    Arc::new(AppState::new(Arc::new(MemoryOrderStore::with_orders(orders)), &RateConfig::default()))
}

#[tokio::test]
async fn empty_table_reports_zero_and_empty_object() {
    let state = state(Vec::new());

    let total = get_total_price(Path("usd".to_string()), State(state.clone())).await.unwrap();
    assert_eq!(serde_json::to_value(&total.0).unwrap(), serde_json::json!({ "total": 0.0 }));

    let accumulated = get_accumulated_price(Path("rub".to_string()), State(state)).await.unwrap();
    assert_eq!(serde_json::to_string(&accumulated.0).unwrap(), "{}");
}

#[tokio::test]
async fn accumulated_prices_are_keyed_by_day_in_date_order() {
    let state = state(vec![
        order("A", 1, 24, dec!(10)),
        order("B", 2, 3, dec!(2.5)),
        order("C", 3, 24, dec!(5)),
    ]);

    let usd = get_accumulated_price(Path("USD".to_string()), State(state.clone())).await.unwrap();
    assert_eq!(serde_json::to_string(&usd.0).unwrap(), r#"{"03.05.2024":2.5,"24.05.2024":15.0}"#);

    let rub = get_total_price(Path("Rub".to_string()), State(state)).await.unwrap();
    assert_eq!(rub.0.total, dec!(1575));
}

#[tokio::test]
async fn orders_come_back_in_index_order() {
    let state = state(vec![order("Z", 2, 1, dec!(1)), order("Y", 1, 1, dec!(1))]);

    let orders = get_orders(State(state)).await.unwrap();

    let ids: Vec<_> = orders.0.iter().map(|o| o.order_id.as_str()).collect();
    assert_eq!(ids, vec!["Y", "Z"]);
}

#[tokio::test]
async fn unknown_currency_is_not_found() {
    let state = state(Vec::new());

    let err = get_total_price(Path("eur".to_string()), State(state)).await.unwrap_err();

    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}
