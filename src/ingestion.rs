use crate::error::{DistributionError, Result};
use crate::schema::RawRow;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parses a monetary cell into whole currency units.
///
/// Accepts surrounding whitespace, a leading sign, an optional `$` and `,` thousands
/// separators. Fractional amounts are rounded to the nearest unit, halves away from zero.
pub fn parse_value(text: &str) -> Option<i64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '$' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let decimal = Decimal::from_str(&cleaned).ok()?;
    round_to_units(decimal)
}

pub fn round_to_units(value: Decimal) -> Option<i64> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

pub(crate) fn invalid_value_reason(value: &str) -> String {
    format!("value '{}' is not a number", value.trim())
}

/// Builds a [`RawRow`] from text cells. `line` is only used for error reporting.
pub fn parse_row(line: usize, code: &str, name: &str, value: &str) -> Result<RawRow> {
    let parsed = parse_value(value).ok_or_else(|| DistributionError::InvalidRow {
        line,
        code: code.to_string(),
        reason: invalid_value_reason(value),
    })?;

    Ok(RawRow::new(code.trim(), name.trim(), parsed))
}
