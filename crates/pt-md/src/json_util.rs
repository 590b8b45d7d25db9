//! Shared JSON field helpers used by all venue parsers.
//!
//! Venues encode prices as decimal strings (`"30000.5"`) and sometimes as
//! native numbers. Prices are kept as the venue's exact text, but the text
//! must parse as a finite number.

use pt_core::DecodeError;
use serde_json::Value;

/// Required string field.
#[inline]
pub fn str_field<'a>(v: &'a Value, key: &'static str) -> Result<&'a str, DecodeError> {
    v.get(key)
        .ok_or(DecodeError::MissingField(key))?
        .as_str()
        .ok_or(DecodeError::InvalidField(key))
}

/// Render a string-or-number price field as text, checking it is a number.
#[inline]
pub fn decimal_text(v: Option<&Value>) -> Option<String> {
    let v = v?;
    if let Some(s) = v.as_str() {
        let parsed: f64 = fast_float2::parse(s).ok()?;
        parsed.is_finite().then(|| s.to_string())
    } else if v.is_number() {
        Some(v.to_string())
    } else {
        None
    }
}

/// Required price field.
#[inline]
pub fn price_field(v: &Value, key: &'static str) -> Result<String, DecodeError> {
    match v.get(key) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(key)),
        Some(field) => decimal_text(Some(field)).ok_or(DecodeError::InvalidField(key)),
    }
}

/// Optional price field: absent or empty is `None`, malformed is an error.
#[inline]
pub fn opt_price_field(v: &Value, key: &'static str) -> Result<Option<String>, DecodeError> {
    match v.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(field) => decimal_text(Some(field)).map(Some).ok_or(DecodeError::InvalidField(key)),
    }
}

/// Exchange timestamp passed through verbatim (string or integer).
#[inline]
pub fn timestamp_field(v: &Value, key: &'static str) -> Result<String, DecodeError> {
    match v.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(DecodeError::InvalidField(key)),
        None => Err(DecodeError::MissingField(key)),
    }
}

/// Loose text rendering for codes and messages (`"0"` and `0` both → `0`).
pub fn text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// First element of a `data` array, or `data` itself when it is an object.
pub fn first_data(v: &Value) -> Result<&Value, DecodeError> {
    match v.get("data") {
        Some(Value::Array(items)) => items.first().ok_or(DecodeError::UnexpectedShape),
        Some(obj @ Value::Object(_)) => Ok(obj),
        Some(_) => Err(DecodeError::UnexpectedShape),
        None => Err(DecodeError::MissingField("data")),
    }
}
