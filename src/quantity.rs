//! Coercion of untyped quantity values
//!
//! Quantities reach the engine as JSON values of whatever type the caller
//! sent. Numbers and numeric strings are accepted; everything else fails
//! here, before any arithmetic sees it.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("not a number")]
    NotNumeric,
    #[error("not a whole number")]
    NotWhole,
    #[error("not greater than zero")]
    NotPositive,
    #[error("out of range")]
    OutOfRange,
}

fn numeric(value: &Value) -> Result<f64, QuantityError> {
    let number = match value {
        Value::Number(n) => n.as_f64().ok_or(QuantityError::NotNumeric)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| QuantityError::NotNumeric)?,
        _ => return Err(QuantityError::NotNumeric),
    };
    if number.is_finite() {
        Ok(number)
    } else {
        Err(QuantityError::NotNumeric)
    }
}

/// Real-valued amount of ore per component; strictly positive
pub fn amount(value: &Value) -> Result<f64, QuantityError> {
    let number = numeric(value)?;
    if number <= 0.0 {
        return Err(QuantityError::NotPositive);
    }
    Ok(number)
}

/// Whole number of components per block; strictly positive
pub fn count(value: &Value) -> Result<u32, QuantityError> {
    if let Some(n) = value.as_i64() {
        if n <= 0 {
            return Err(QuantityError::NotPositive);
        }
        return u32::try_from(n).map_err(|_| QuantityError::OutOfRange);
    }

    let number = numeric(value)?;
    if number <= 0.0 {
        return Err(QuantityError::NotPositive);
    }
    if number.fract() != 0.0 {
        return Err(QuantityError::NotWhole);
    }
    if number > f64::from(u32::MAX) {
        return Err(QuantityError::OutOfRange);
    }
    Ok(number as u32)
}

/// The value as it was received, for error messages
pub fn describe(value: &Value) -> String {
    value.to_string()
}
