// Canonical cell text -> typed field value.

use crate::date::{self, DEFAULT_PATTERN};
use crate::value::{FieldValue, ValueType};

/// Convert canonical text to a value of `value_type`.
///
/// Returns `Ok(None)` for blank text on any non-text type; the caller leaves
/// the field at its current value. Errors carry a human-readable reason.
pub fn coerce(raw: &str, value_type: &ValueType, pattern: Option<&str>) -> Result<Option<FieldValue>, String> {
    let value = match value_type {
        ValueType::Text => FieldValue::Text(raw.to_string()),
        _ if raw.trim().is_empty() => return Ok(None),
        // Numeric cells serialize integral values as "3.0": widen, then truncate.
        ValueType::Integer => FieldValue::Integer(parse_widened(raw, 32)? as i32),
        ValueType::Long => FieldValue::Long(parse_widened(raw, 64)? as i64),
        ValueType::Boolean => FieldValue::Boolean(raw.eq_ignore_ascii_case("true")),
        ValueType::Date => FieldValue::Date(coerce_date(raw, pattern)?),
        ValueType::Enumeration(enum_type) => match enum_type.from_canonical(raw) {
            Some(member) => FieldValue::Enum(member),
            None => return Err(format!("no member of {} matches", enum_type.name)),
        },
        ValueType::Double => FieldValue::Double(raw.trim().parse().map_err(|e| format!("{e}"))?),
        ValueType::Float => FieldValue::Float(raw.trim().parse().map_err(|e| format!("{e}"))?),
        ValueType::Byte => FieldValue::Byte(raw.trim().parse().map_err(|e| format!("{e}"))?),
    };
    Ok(Some(value))
}

/// Parse as `f64` and truncate, rejecting anything a signed `bits`-wide
/// integer cannot hold exactly.
fn parse_widened(raw: &str, bits: i32) -> Result<f64, String> {
    let n = raw.trim().parse::<f64>().map_err(|e| format!("{e}"))?;
    if !n.is_finite() {
        return Err("not a finite number".to_string());
    }
    let n = n.trunc();
    let bound = 2f64.powi(bits - 1);
    if n < -bound || n >= bound {
        return Err(format!("out of range for a {bits}-bit integer"));
    }
    Ok(n)
}

fn coerce_date(raw: &str, pattern: Option<&str>) -> Result<chrono::NaiveDateTime, String> {
    let pattern = pattern.unwrap_or(DEFAULT_PATTERN);
    match date::parse_date(raw, pattern) {
        Ok(dt) => Ok(dt),
        // Text in the default pattern is accepted as well.
        Err(_) if pattern != DEFAULT_PATTERN => date::parse_date(raw, DEFAULT_PATTERN)
            .map_err(|_| format!("does not match pattern '{pattern}'")),
        Err(e) => Err(format!("does not match pattern '{pattern}': {e}")),
    }
}
