//! Parsing of the free-text cells a spreadsheet hands us.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Date-only layouts, tried in order. Dotted and dashed dates are day-first;
/// slashed dates are month-first unless the first number cannot be a month.
/// Every two-digit-year layout comes before its four-digit twin because `%Y`
/// also accepts `22`.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d.%m.%y",
    "%d.%m.%Y",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%d/%m/%y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%d-%m-%y",
    "%d-%m-%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Layouts carrying a time component; only the date part is kept.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d.%m.%y %H:%M",
    "%d.%m.%Y %H:%M",
];

/// Years below this can only come from a short year matched by `%Y`.
const MIN_YEAR: i32 = 1000;

/// Parses a delivery date written in any of the common layouts.
pub fn parse_delivery_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let plausible = |date: &NaiveDate| date.year() >= MIN_YEAR;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok().filter(plausible))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok().map(|dt| dt.date()).filter(plausible))
        })
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
                .filter(plausible)
        })
}

/// Parses a price, ignoring grouping spaces and accepting `,` as the decimal separator.
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    Decimal::from_str(&cleaned).ok()
}

/// Parses the sheet's row number. Whole-number floats such as `3.0` are accepted.
pub fn parse_index_number(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    raw.parse::<i32>().ok().or_else(|| {
        let value = Decimal::from_str(raw).ok()?;
        if value.fract().is_zero() { value.to_i32() } else { None }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_common_date_layouts() {
        assert_eq!(parse_delivery_date("2024-01-31"), Some(date(2024, 1, 31)));
        assert_eq!(parse_delivery_date("24.05.2022"), Some(date(2022, 5, 24)));
        assert_eq!(parse_delivery_date("05.06.2022"), Some(date(2022, 6, 5)));
        assert_eq!(parse_delivery_date("24.05.22"), Some(date(2022, 5, 24)));
        assert_eq!(parse_delivery_date("05/06/2022"), Some(date(2022, 5, 6)));
        assert_eq!(parse_delivery_date("25/06/2022"), Some(date(2022, 6, 25)));
        assert_eq!(parse_delivery_date("2022/06/25"), Some(date(2022, 6, 25)));
        assert_eq!(parse_delivery_date("3 March 2024"), Some(date(2024, 3, 3)));
        assert_eq!(parse_delivery_date("March 3, 2024"), Some(date(2024, 3, 3)));
        assert_eq!(parse_delivery_date(" 2024-03-03T10:15:00 "), Some(date(2024, 3, 3)));
        assert_eq!(parse_delivery_date("2024-03-03T23:15:00+03:00"), Some(date(2024, 3, 3)));
    }

    #[test]
    fn two_digit_years_land_in_this_century() {
        assert_eq!(parse_delivery_date("05/06/22"), Some(date(2022, 5, 6)));
        assert_eq!(parse_delivery_date("25/06/22"), Some(date(2022, 6, 25)));
        assert_eq!(parse_delivery_date("24-05-22"), Some(date(2022, 5, 24)));
        assert_eq!(parse_delivery_date("24-05-2022"), Some(date(2022, 5, 24)));
        assert_eq!(parse_delivery_date("24.05.22 10:00"), Some(date(2022, 5, 24)));
        assert_eq!(parse_delivery_date("24.05.2022 10:00"), Some(date(2022, 5, 24)));
    }

    #[test]
    fn short_year_in_year_first_layout_is_rejected() {
        assert_eq!(parse_delivery_date("0999-01-01"), None);
        assert_eq!(parse_delivery_date("0022-05-24"), None);
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_delivery_date("soon"), None);
        assert_eq!(parse_delivery_date("31.02.2024"), None);
        assert_eq!(parse_delivery_date(""), None);
    }

    #[test]
    fn parses_prices_with_locale_separators() {
        assert_eq!(parse_price("675"), Some(dec!(675)));
        assert_eq!(parse_price("1 234,50"), Some(dec!(1234.50)));
        assert_eq!(parse_price("12.5"), Some(dec!(12.5)));
        assert_eq!(parse_price("$12"), None);
    }

    #[test]
    fn parses_index_numbers() {
        assert_eq!(parse_index_number("7"), Some(7));
        assert_eq!(parse_index_number("7.0"), Some(7));
        assert_eq!(parse_index_number("7.5"), None);
        assert_eq!(parse_index_number("seven"), None);
    }
}
