use std::str::FromStr;

use anyhow::{anyhow, Context};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::Result;

/// Parse a European-formatted amount string into cents.
/// Format examples: "1.234,56" -> 123456, "-588,74" -> -58874, "10,00" -> 1000.
///
/// Thousands separators must be stripped before the decimal comma is swapped;
/// parsing "1.234,56" any other way silently corrupts the value.
pub fn parse_european_amount(s: &str) -> Result<i64> {
    let clean = s.replace('.', "").replace(',', ".");

    let value =
        Decimal::from_str(&clean).with_context(|| format!("invalid amount: {s:?}"))?;

    (value * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| anyhow!("amount out of range: {s:?}"))
}
