use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The canonical order fields a source column can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    OrderId,
    IndexNumber,
    PriceForeign,
    DeliveryDate,
}

impl CanonicalField {
    /// Every field a complete row must carry.
    pub const ALL: [CanonicalField; 4] = [
        CanonicalField::IndexNumber,
        CanonicalField::OrderId,
        CanonicalField::PriceForeign,
        CanonicalField::DeliveryDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::OrderId => "order_id",
            CanonicalField::IndexNumber => "index_number",
            CanonicalField::PriceForeign => "price_foreign",
            CanonicalField::DeliveryDate => "delivery_date",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order_id" => Ok(CanonicalField::OrderId),
            "index_number" => Ok(CanonicalField::IndexNumber),
            "price_foreign" => Ok(CanonicalField::PriceForeign),
            "delivery_date" => Ok(CanonicalField::DeliveryDate),
            other => Err(CoreError::InvalidInput("canonical field".to_string(), other.to_string())),
        }
    }
}

/// Selects which of the two stored price columns a report aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceCurrency {
    /// The source currency the spreadsheet is priced in.
    Foreign,
    /// The converted currency.
    Local,
}

impl PriceCurrency {
    /// The `orders` column holding prices in this currency.
    pub fn column(&self) -> &'static str {
        match self {
            PriceCurrency::Foreign => "price_foreign",
            PriceCurrency::Local => "price_local",
        }
    }
}
