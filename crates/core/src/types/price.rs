//! Locale-tolerant price parsing using decimal arithmetic.
//!
//! Upstream product records carry prices as JSON numbers, plain strings
//! (`"5"`), or Danish-formatted strings (`"10,50"`, `"1.234,50 kr."`).
//! Everything is coerced to a [`Decimal`]; anything unparsable is zero.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ISO 4217 currency codes used by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    DKK,
    EUR,
    SEK,
    NOK,
}

impl CurrencyCode {
    /// The ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DKK => "DKK",
            Self::EUR => "EUR",
            Self::SEK => "SEK",
            Self::NOK => "NOK",
        }
    }
}

/// Coerce a loosely-typed JSON price to a decimal.
///
/// Numbers are used as-is, strings go through [`parse_price_str`], and every
/// other JSON type is zero.
#[must_use]
pub fn parse_price(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => {
            let raw = n.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .unwrap_or(Decimal::ZERO)
        }
        Value::String(s) => parse_price_str(s),
        _ => Decimal::ZERO,
    }
}

/// Parse a price string that may use a decimal comma.
///
/// When both `,` and `.` appear, whichever comes last is the decimal
/// separator and the other is a thousands separator. A lone `,` is a decimal
/// comma unless it appears more than once.
#[must_use]
pub fn parse_price_str(raw: &str) -> Decimal {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    // Currency suffixes like "kr." leave a dangling separator behind
    let cleaned = cleaned.trim_end_matches(['.', ',']);

    if cleaned.is_empty() {
        return Decimal::ZERO;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if cleaned.matches(',').count() == 1 => cleaned.replace(',', "."),
        (Some(_), None) => cleaned.replace(',', ""),
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned.to_owned(),
    };

    Decimal::from_str(&normalized).unwrap_or(Decimal::ZERO)
}
