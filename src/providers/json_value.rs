//! Lenient conversions for JSON fields that arrive as numbers or strings.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

/// Reads a decimal from a JSON number or numeric string. Scientific notation
/// such as `1.5e-7` is accepted.
pub fn value_to_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)).ok()
}

/// Reads a non-negative integer from a JSON number or numeric string.
pub fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
