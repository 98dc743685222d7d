//! Value conversion between mysql-helpers and mysql_async

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::value::Value;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::{Column, Params, Value as MySqlValue};
use rust_decimal::Decimal;

/// MySQL's `binary` character set id. Byte columns with it are not text.
const BINARY_CHARSET: u16 = 63;

/// Convert a parameter list into driver params.
pub fn to_mysql_params(params: &[Value]) -> Result<Params> {
    if params.is_empty() {
        Ok(Params::Empty)
    } else {
        let values = params.iter().map(to_mysql_value).collect::<Result<_>>()?;
        Ok(Params::Positional(values))
    }
}

/// Convert a mysql-helpers value into a driver value.
///
/// Dates outside the wire format's unsigned year field are rejected.
pub fn to_mysql_value(value: &Value) -> Result<MySqlValue> {
    let value = match value {
        Value::Null => MySqlValue::NULL,
        Value::Bool(v) => MySqlValue::from(*v),
        Value::Int(v) => MySqlValue::Int(*v),
        Value::UInt(v) => MySqlValue::UInt(*v),
        Value::Float(v) => MySqlValue::Float(*v),
        Value::Double(v) => MySqlValue::Double(*v),
        Value::Text(v) => MySqlValue::from(v.as_str()),
        Value::Bytes(v) => MySqlValue::Bytes(v.clone()),
        Value::Date(v) => {
            MySqlValue::Date(wire_year(v.year(), v)?, v.month() as u8, v.day() as u8, 0, 0, 0, 0)
        }
        Value::DateTime(v) => MySqlValue::Date(
            wire_year(v.year(), v)?,
            v.month() as u8,
            v.day() as u8,
            v.hour() as u8,
            v.minute() as u8,
            v.second() as u8,
            v.and_utc().timestamp_subsec_micros(),
        ),
        Value::Time(v) => MySqlValue::Time(
            false,
            0,
            v.hour() as u8,
            v.minute() as u8,
            v.second() as u8,
            v.nanosecond() / 1000,
        ),
        Value::Decimal(v) => MySqlValue::from(v.to_string()),
        Value::Json(v) => MySqlValue::from(v.to_string()),
    };
    Ok(value)
}

fn wire_year(year: i32, shown: &impl std::fmt::Display) -> Result<u16> {
    u16::try_from(year).map_err(|_| Error::TypeConversion {
        expected: "date with year in 0..=65535",
        actual: shown.to_string(),
    })
}

/// Convert a driver cell into a value, guided by its column metadata.
pub fn from_mysql_value(value: MySqlValue, column: &Column) -> Value {
    match value {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Int(v) => Value::Int(v),
        MySqlValue::UInt(v) => Value::UInt(v),
        MySqlValue::Float(v) => Value::Float(v),
        MySqlValue::Double(v) => Value::Double(v),
        MySqlValue::Bytes(bytes) => from_bytes(bytes, column),
        MySqlValue::Date(year, month, day, hour, min, sec, micro) => {
            let date = NaiveDate::from_ymd_opt(year.into(), month.into(), day.into());
            let time = NaiveTime::from_hms_micro_opt(hour.into(), min.into(), sec.into(), micro);
            match (date, time, column.column_type()) {
                (Some(date), _, ColumnType::MYSQL_TYPE_DATE) => Value::Date(date),
                (Some(date), Some(time), _) => Value::DateTime(NaiveDateTime::new(date, time)),
                // Zero dates such as 0000-00-00 have no chrono form
                _ => Value::Text(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, min, sec
                )),
            }
        }
        MySqlValue::Time(is_neg, days, hours, mins, secs, micro) => {
            let in_clock_range = !is_neg && days == 0 && hours < 24;
            let time = NaiveTime::from_hms_micro_opt(hours.into(), mins.into(), secs.into(), micro);
            match time {
                Some(time) if in_clock_range => Value::Time(time),
                // TIME columns span -838:59:59..838:59:59
                _ => Value::Text(format!(
                    "{}{}:{:02}:{:02}",
                    if is_neg { "-" } else { "" },
                    days * 24 + u32::from(hours),
                    mins,
                    secs
                )),
            }
        }
    }
}

fn from_bytes(bytes: Vec<u8>, column: &Column) -> Value {
    match column.column_type() {
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
            match std::str::from_utf8(&bytes).ok().and_then(|s| Decimal::from_str(s).ok()) {
                Some(d) => Value::Decimal(d),
                None => text_or_bytes(bytes),
            }
        }
        ColumnType::MYSQL_TYPE_JSON => match serde_json::from_slice(&bytes) {
            Ok(json) => Value::Json(json),
            Err(_) => text_or_bytes(bytes),
        },
        _ if column.character_set() == BINARY_CHARSET => Value::Bytes(bytes),
        _ => text_or_bytes(bytes),
    }
}

fn text_or_bytes(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(s) => Value::Text(s),
        Err(e) => Value::Bytes(e.into_bytes()),
    }
}
