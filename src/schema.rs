//! The fixed trip schema and the typed record it produces.
//!
//! Input columns are positional: column *i* of a CSV line always maps to
//! [`TRIP_SCHEMA`]`[i]`. Every field of a [`TripRecord`] is independently
//! nullable because coercion degrades to `None` instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Number of columns every input line must carry.
pub const FIELD_COUNT: usize = 19;

/// Target scalar kind of a schema column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
}

impl FieldKind {
    /// Column type used when creating or checking the warehouse table.
    #[must_use]
    pub const fn warehouse_type(self) -> &'static str {
        match self {
            Self::Text => "STRING",
            Self::Integer => "INTEGER",
            Self::Decimal => "FLOAT",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
        };
        f.write_str(name)
    }
}

/// One column of the trip schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn spec(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

/// Positional schema of a trip line.
pub const TRIP_SCHEMA: [FieldSpec; FIELD_COUNT] = [
    spec("vendor_id", FieldKind::Text),
    spec("pickup_datetime", FieldKind::Text),
    spec("dropoff_datetime", FieldKind::Text),
    spec("passenger_count", FieldKind::Integer),
    spec("trip_distance", FieldKind::Integer),
    spec("rate_code", FieldKind::Text),
    spec("store_and_fwd_flag", FieldKind::Integer),
    spec("payment_type", FieldKind::Text),
    spec("fare_amount", FieldKind::Decimal),
    spec("extra", FieldKind::Decimal),
    spec("mta_tax", FieldKind::Decimal),
    spec("tip_amount", FieldKind::Decimal),
    spec("tolls_amount", FieldKind::Decimal),
    spec("imp_surcharge", FieldKind::Decimal),
    spec("total_amount", FieldKind::Decimal),
    spec("pickup_location_id", FieldKind::Integer),
    spec("dropoff_location_id", FieldKind::Integer),
    spec("data_file_year", FieldKind::Integer),
    spec("data_file_month", FieldKind::Integer),
];

/// Positions of the two timestamp columns that carry a `" UTC"` suffix.
pub const TIMESTAMP_FIELDS: [usize; 2] = [1, 2];

/// Schema as `(column, warehouse type)` pairs.
#[must_use]
pub fn warehouse_schema() -> Vec<(String, String)> {
    TRIP_SCHEMA
        .iter()
        .map(|f| (f.name.to_string(), f.kind.warehouse_type().to_string()))
        .collect()
}

/// A successfully coerced scalar.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
}

impl FieldValue {
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::Integer(_) => FieldKind::Integer,
            Self::Decimal(_) => FieldKind::Decimal,
        }
    }
}

/// A typed taxi trip, one per input line.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub vendor_id: Option<String>,
    pub pickup_datetime: Option<String>,
    pub dropoff_datetime: Option<String>,
    pub passenger_count: Option<i64>,
    pub trip_distance: Option<i64>,
    pub rate_code: Option<String>,
    pub store_and_fwd_flag: Option<i64>,
    pub payment_type: Option<String>,
    pub fare_amount: Option<f64>,
    pub extra: Option<f64>,
    pub mta_tax: Option<f64>,
    pub tip_amount: Option<f64>,
    pub tolls_amount: Option<f64>,
    pub imp_surcharge: Option<f64>,
    pub total_amount: Option<f64>,
    pub pickup_location_id: Option<i64>,
    pub dropoff_location_id: Option<i64>,
    pub data_file_year: Option<i64>,
    pub data_file_month: Option<i64>,
}

/// Raised when positional values do not line up with [`TRIP_SCHEMA`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    #[error("expected 19 values, got {0}")]
    Arity(usize),
    #[error("field `{field}` expects {expected}, got {actual}")]
    KindMismatch {
        field: &'static str,
        expected: FieldKind,
        actual: FieldKind,
    },
}

struct Cursor {
    values: std::vec::IntoIter<Option<FieldValue>>,
    pos: usize,
}

impl Cursor {
    fn take(&mut self, want: FieldKind) -> Result<Option<FieldValue>, AssemblyError> {
        let spec = TRIP_SCHEMA[self.pos];
        self.pos += 1;
        debug_assert_eq!(spec.kind, want);
        let value = self.values.next().flatten();
        match &value {
            Some(v) if v.kind() != spec.kind => Err(AssemblyError::KindMismatch {
                field: spec.name,
                expected: spec.kind,
                actual: v.kind(),
            }),
            _ => Ok(value),
        }
    }

    fn text(&mut self) -> Result<Option<String>, AssemblyError> {
        Ok(match self.take(FieldKind::Text)? {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        })
    }

    fn integer(&mut self) -> Result<Option<i64>, AssemblyError> {
        Ok(match self.take(FieldKind::Integer)? {
            Some(FieldValue::Integer(i)) => Some(i),
            _ => None,
        })
    }

    fn decimal(&mut self) -> Result<Option<f64>, AssemblyError> {
        Ok(match self.take(FieldKind::Decimal)? {
            Some(FieldValue::Decimal(d)) => Some(d),
            _ => None,
        })
    }
}

impl TripRecord {
    /// Assemble a record from coerced values in schema order.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] if `values` does not hold exactly
    /// [`FIELD_COUNT`] entries or a value's kind disagrees with its column.
    pub fn from_values(values: Vec<Option<FieldValue>>) -> Result<Self, AssemblyError> {
        if values.len() != FIELD_COUNT {
            return Err(AssemblyError::Arity(values.len()));
        }
        let mut c = Cursor {
            values: values.into_iter(),
            pos: 0,
        };
        Ok(Self {
            vendor_id: c.text()?,
            pickup_datetime: c.text()?,
            dropoff_datetime: c.text()?,
            passenger_count: c.integer()?,
            trip_distance: c.integer()?,
            rate_code: c.text()?,
            store_and_fwd_flag: c.integer()?,
            payment_type: c.text()?,
            fare_amount: c.decimal()?,
            extra: c.decimal()?,
            mta_tax: c.decimal()?,
            tip_amount: c.decimal()?,
            tolls_amount: c.decimal()?,
            imp_surcharge: c.decimal()?,
            total_amount: c.decimal()?,
            pickup_location_id: c.integer()?,
            dropoff_location_id: c.integer()?,
            data_file_year: c.integer()?,
            data_file_month: c.integer()?,
        })
    }

    /// Number of null fields in this record.
    #[must_use]
    pub fn null_count(&self) -> usize {
        let texts = [
            &self.vendor_id,
            &self.pickup_datetime,
            &self.dropoff_datetime,
            &self.rate_code,
            &self.payment_type,
        ];
        let integers = [
            self.passenger_count,
            self.trip_distance,
            self.store_and_fwd_flag,
            self.pickup_location_id,
            self.dropoff_location_id,
            self.data_file_year,
            self.data_file_month,
        ];
        let decimals = [
            self.fare_amount,
            self.extra,
            self.mta_tax,
            self.tip_amount,
            self.tolls_amount,
            self.imp_surcharge,
            self.total_amount,
        ];
        texts.iter().filter(|v| v.is_none()).count()
            + integers.iter().filter(|v| v.is_none()).count()
            + decimals.iter().filter(|v| v.is_none()).count()
    }

    /// Warehouse row: a JSON object keyed by column name, nulls included.
    #[must_use]
    pub fn to_row(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct of options always serializes to an object.
            _ => Map::new(),
        }
    }
}
