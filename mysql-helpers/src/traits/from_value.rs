//! FromValue trait for typed access to result cells

use crate::error::{Error, Result};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// Trait for types that can be extracted from a [`Value`].
pub trait FromValue: Sized {
    /// Convert a database value to this type.
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: &'static str, value: &Value) -> Result<T> {
    match value {
        Value::Null => Err(Error::UnexpectedNull(expected.to_string())),
        other => Err(Error::TypeConversion {
            expected,
            actual: other.type_name().to_string(),
        }),
    }
}

macro_rules! impl_integer {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self> {
                    let out_of_range = |shown: String| Error::TypeConversion {
                        expected: stringify!($t),
                        actual: format!("{} out of range", shown),
                    };
                    match value {
                        Value::Int(v) => v.try_into().map_err(|_| out_of_range(v.to_string())),
                        Value::UInt(v) => v.try_into().map_err(|_| out_of_range(v.to_string())),
                        Value::Bool(v) => Ok(v.into()),
                        // COUNT/SUM over DECIMAL columns come back as decimals
                        // A whole value normalizes to scale 0, so the mantissa is the integer
                        Value::Decimal(d) if d.fract().is_zero() => d
                            .normalize()
                            .mantissa()
                            .try_into()
                            .map_err(|_| out_of_range(d.to_string())),
                        other => mismatch(stringify!($t), &other),
                    }
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Int(v) => Ok(v != 0),
            Value::UInt(v) => Ok(v != 0),
            other => mismatch("bool", &other),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            other => mismatch("f32", &other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Double(v) => Ok(v),
            Value::Float(v) => Ok(v.into()),
            Value::Int(v) => Ok(v as f64),
            Value::UInt(v) => Ok(v as f64),
            other => mismatch("f64", &other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Bytes(v) => String::from_utf8(v).map_err(|e| Error::TypeConversion {
                expected: "utf-8 string",
                actual: e.to_string(),
            }),
            Value::Decimal(v) => Ok(v.to_string()),
            other => mismatch("string", &other),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(v) => Ok(v),
            Value::Text(v) => Ok(v.into_bytes()),
            other => mismatch("bytes", &other),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(v) => Ok(v),
            Value::DateTime(v) => Ok(v.date()),
            other => mismatch("date", &other),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(v) => Ok(v),
            Value::Date(v) => Ok(v.and_time(NaiveTime::MIN)),
            other => mismatch("datetime", &other),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Time(v) => Ok(v),
            other => mismatch("time", &other),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(v) => Ok(v),
            Value::Int(v) => Ok(v.into()),
            Value::UInt(v) => Ok(v.into()),
            other => mismatch("decimal", &other),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Json(v) => Ok(v),
            Value::Text(s) => serde_json::from_str(&s).map_err(|e| Error::TypeConversion {
                expected: "json",
                actual: e.to_string(),
            }),
            other => mismatch("json", &other),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
