use crate::common::Value;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::schema::PropertyType;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A value conversion between two property representations.
pub type Converter = fn(&Value) -> StrataResult<Value>;

/// Closed table of value conversions indexed by `(from, to)` type pair.
///
/// The differ consults [`supports`](ConversionTable::supports) to decide
/// whether a declared type change is reconcilable at all; the executor calls
/// [`convert`](ConversionTable::convert) per stored value while re-encoding a
/// column. Conversions are total for numeric widenings and partial for
/// parses: a lossy or failed parse is a `ConversionFailed` error, which
/// aborts the whole migration.
pub struct ConversionTable {
    table: HashMap<(PropertyType, PropertyType), Converter>,
}

impl ConversionTable {
    fn new() -> Self {
        let mut table: HashMap<(PropertyType, PropertyType), Converter> = HashMap::new();

        table.insert((PropertyType::Int, PropertyType::Double), int_to_double);
        table.insert((PropertyType::Int, PropertyType::Float), int_to_float);
        table.insert((PropertyType::Int, PropertyType::String), int_to_string);
        table.insert((PropertyType::Float, PropertyType::Double), float_to_double);
        table.insert((PropertyType::Double, PropertyType::Float), double_to_float);
        table.insert((PropertyType::Bool, PropertyType::Int), bool_to_int);
        table.insert((PropertyType::String, PropertyType::Int), string_to_int);
        table.insert((PropertyType::String, PropertyType::Double), string_to_double);

        ConversionTable { table }
    }

    /// Returns true when a conversion is registered for the pair.
    pub fn supports(&self, from: PropertyType, to: PropertyType) -> bool {
        self.table.contains_key(&(from, to))
    }

    /// Converts one value. `Null` passes through unchanged; the optionality
    /// of the column is unaffected by a type change.
    pub fn convert(&self, from: PropertyType, to: PropertyType, value: &Value) -> StrataResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        let converter = self.table.get(&(from, to)).ok_or_else(|| {
            StrataError::new(
                &format!("No conversion registered from {} to {}", from, to),
                ErrorKind::IncompatibleTypeChange,
            )
        })?;

        converter(value)
    }
}

/// Returns the process-wide conversion table.
pub fn conversions() -> &'static ConversionTable {
    static CONVERSIONS: Lazy<ConversionTable> = Lazy::new(ConversionTable::new);
    &CONVERSIONS
}

fn expect_int(value: &Value) -> StrataResult<i64> {
    value.as_i64().ok_or_else(|| {
        StrataError::new(
            &format!("Expected int value, found {}", value.type_name()),
            ErrorKind::ConversionFailed,
        )
    })
}

fn int_to_double(value: &Value) -> StrataResult<Value> {
    Ok(Value::Double(expect_int(value)? as f64))
}

fn int_to_float(value: &Value) -> StrataResult<Value> {
    Ok(Value::Float(expect_int(value)? as f32))
}

fn int_to_string(value: &Value) -> StrataResult<Value> {
    Ok(Value::String(expect_int(value)?.to_string()))
}

fn float_to_double(value: &Value) -> StrataResult<Value> {
    let v = value.as_f32().ok_or_else(|| {
        StrataError::new(
            &format!("Expected float value, found {}", value.type_name()),
            ErrorKind::ConversionFailed,
        )
    })?;
    Ok(Value::Double(v as f64))
}

fn double_to_float(value: &Value) -> StrataResult<Value> {
    let v = value.as_f64().ok_or_else(|| {
        StrataError::new(
            &format!("Expected double value, found {}", value.type_name()),
            ErrorKind::ConversionFailed,
        )
    })?;
    Ok(Value::Float(v as f32))
}

fn bool_to_int(value: &Value) -> StrataResult<Value> {
    let v = value.as_bool().ok_or_else(|| {
        StrataError::new(
            &format!("Expected bool value, found {}", value.type_name()),
            ErrorKind::ConversionFailed,
        )
    })?;
    Ok(Value::Int(v as i64))
}

fn expect_str(value: &Value) -> StrataResult<&str> {
    value.as_str().ok_or_else(|| {
        StrataError::new(
            &format!("Expected string value, found {}", value.type_name()),
            ErrorKind::ConversionFailed,
        )
    })
}

fn string_to_int(value: &Value) -> StrataResult<Value> {
    let s = expect_str(value)?;
    s.trim().parse::<i64>().map(Value::Int).map_err(|e| {
        StrataError::new(
            &format!("Cannot parse '{}' as int: {}", s, e),
            ErrorKind::ConversionFailed,
        )
    })
}

fn string_to_double(value: &Value) -> StrataResult<Value> {
    let s = expect_str(value)?;
    s.trim().parse::<f64>().map(Value::Double).map_err(|e| {
        StrataError::new(
            &format!("Cannot parse '{}' as double: {}", s, e),
            ErrorKind::ConversionFailed,
        )
    })
}
