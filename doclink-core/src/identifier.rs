//! Coercion of framework-supplied identifiers into engine keys.

use bson::Bson;

use crate::error::{ConnectorError, ConnectorResult};

/// Normalizes a value that purports to be a record identifier into an engine key.
///
/// Integers are returned unchanged, strings made only of ASCII digits are parsed, and
/// doubles are accepted when they hold an integral value. Anything else fails with
/// [`ConnectorError::InvalidIdentifier`].
pub fn coerce_id(value: &Bson) -> ConnectorResult<i64> {
    match value {
        Bson::Int32(id) => Ok(i64::from(*id)),
        Bson::Int64(id) => Ok(*id),
        Bson::Double(id) if is_integral(*id) => Ok(*id as i64),
        Bson::String(id) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => id
            .parse::<i64>()
            .map_err(|_| invalid(value)),
        _ => Err(invalid(value)),
    }
}

// i64::MAX as f64 rounds up to 2^63, hence the strict upper bound.
fn is_integral(value: f64) -> bool {
    value.is_finite()
        && value.fract() == 0.0
        && value >= i64::MIN as f64
        && value < i64::MAX as f64
}

fn invalid(value: &Bson) -> ConnectorError {
    ConnectorError::InvalidIdentifier(match value {
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    })
}
