use crate::{error::AppError, AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use core_types::Order;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Per-date sums, serialized as a JSON object whose keys keep chronological order.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatedPrices(pub Vec<(NaiveDate, Decimal)>);

impl Serialize for AccumulatedPrices {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (date, amount) in &self.0 {
            let amount = amount
                .to_f64()
                .ok_or_else(|| S::Error::custom(format!("amount {amount} does not fit a float")))?;
            map.serialize_entry(&date.format("%d.%m.%Y").to_string(), &amount)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalPrice {
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

/// # GET /api/orders
/// Every stored order, ordered by `index_number`.
pub async fn get_orders(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state.store.list_orders().await?;
    Ok(Json(orders))
}

/// # GET /api/accumulated-price/:currency
pub async fn get_accumulated_price(
    Path(currency): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AccumulatedPrices>, AppError> {
    let currency = state.price_currency(&currency)?;
    let sums = state.store.accumulated_price_by_date(currency).await?;
    Ok(Json(AccumulatedPrices(sums)))
}

/// # GET /api/total-price/:currency
pub async fn get_total_price(
    Path(currency): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<TotalPrice>, AppError> {
    let currency = state.price_currency(&currency)?;
    let total = state.store.total_price(currency).await?;
    Ok(Json(TotalPrice { total }))
}
