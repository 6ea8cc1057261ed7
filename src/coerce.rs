//! Field coercion: raw text to a typed scalar, or null.
//!
//! Coercion never fails. A value that cannot be converted to its column's
//! kind becomes `None` and the rest of the record is kept. Numeric values are
//! trimmed before parsing; text values are passed through verbatim.

use crate::schema::{FieldKind, FieldValue};

/// Coerce `raw` to `kind`, returning `None` when the conversion fails.
///
/// ```
/// use taxibeam::coerce::coerce;
/// use taxibeam::schema::{FieldKind, FieldValue};
///
/// assert_eq!(coerce(" 42 ", FieldKind::Integer), Some(FieldValue::Integer(42)));
/// assert_eq!(coerce("abc", FieldKind::Decimal), None);
/// assert_eq!(coerce("", FieldKind::Text), Some(FieldValue::Text(String::new())));
/// ```
#[must_use]
pub fn coerce(raw: &str, kind: FieldKind) -> Option<FieldValue> {
    match kind {
        FieldKind::Text => Some(FieldValue::Text(coerce_text(raw))),
        FieldKind::Integer => coerce_integer(raw).map(FieldValue::Integer),
        FieldKind::Decimal => coerce_decimal(raw).map(FieldValue::Decimal),
    }
}

/// Text coercion is the identity.
#[must_use]
pub fn coerce_text(raw: &str) -> String {
    raw.to_string()
}

/// Strict signed integer parse of the trimmed value.
///
/// Fractional input (`"2.5"`), empty input and overflow all yield `None`.
#[must_use]
pub fn coerce_integer(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// Strict decimal parse of the trimmed value.
///
/// Non-finite results (`NaN`, `inf`) yield `None`: warehouse rows are JSON and
/// cannot carry them.
#[must_use]
pub fn coerce_decimal(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
