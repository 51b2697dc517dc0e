use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use config::shared::Coercion;
use serde_json::{Number, Value};

use crate::error::{ErrorKind, MartechError};
use crate::martech_error;
use crate::types::{is_truthy, value_to_cell};

/// Field that gets birth date sanitization instead of plain date reformatting.
pub const DOB_FIELD: &str = "dob";

/// Year given to birth dates before 1900.
const FALLBACK_BIRTH_YEAR: i32 = 1952;

/// Formats accepted for birth dates, tried in order.
const DOB_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d", "%Y-%m-%d %H:%M:%S%.f"];

/// Date-time formats accepted by the `date` coercion, tried in order.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Date formats accepted by the `date` coercion, tried in order. Month comes before day in
/// ambiguous numeric dates; the day-first form only matches when the day is above 12.
const DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d %b %Y",
    "%b %d %Y",
    "%B %d, %Y",
    "%d %B %Y",
];

/// Result of coercing a single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// The new value of the field.
    Value(Value),
    /// The coercion failed recoverably; the field keeps its original value.
    Kept(MartechError),
}

/// Applies `coercion` to the value of `field`.
pub fn coerce(field: &str, coercion: Coercion, value: &Value) -> Coerced {
    match coercion {
        Coercion::String => Coerced::Value(to_string(value)),
        Coercion::Int => match value {
            Value::Null => Coerced::Value(Value::Null),
            value => keep_on_error(field, value, to_int(value)),
        },
        Coercion::Float => match value {
            Value::Null => Coerced::Value(Value::Null),
            value => keep_on_error(field, value, to_float(value)),
        },
        Coercion::Date if field == DOB_FIELD => Coerced::Value(
            sanitize_dob(value)
                .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
        ),
        Coercion::Date => match value {
            Value::Null => Coerced::Value(Value::Null),
            Value::String(text) => keep_on_error(
                field,
                value,
                parse_date(text).map(|date| Value::String(date.format("%Y-%m-%d").to_string())),
            ),
            value => keep_on_error(field, value, None),
        },
        Coercion::MobileSanity => Coerced::Value(mobile_sanity(value)),
        Coercion::Reward => Coerced::Value(modify_reward(value)),
        Coercion::UnixEpoch => {
            if !is_truthy(value) {
                return Coerced::Value(value.clone());
            }
            keep_on_error(field, value, unix_epoch(value))
        }
    }
}

fn keep_on_error(field: &str, value: &Value, converted: Option<Value>) -> Coerced {
    match converted {
        Some(value) => Coerced::Value(value),
        None => Coerced::Kept(martech_error!(
            ErrorKind::ConversionError,
            "Field coercion failed, keeping the original value",
            format!("{field}: {value}")
        )),
    }
}

fn to_string(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(_) => value.clone(),
        other => Value::String(value_to_cell(other)),
    }
}

fn to_int(value: &Value) -> Option<Value> {
    let int = match value {
        Value::Bool(b) => i64::from(*b),
        Value::Number(number) => match number.as_i64() {
            Some(int) => int,
            None => truncate_float(number.as_f64()?)?,
        },
        Value::String(text) => parse_int_literal(text)?,
        _ => return None,
    };

    Some(Value::from(int))
}

fn to_float(value: &Value) -> Option<Value> {
    let float = match value {
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    Number::from_f64(float).map(Value::Number)
}

fn truncate_float(float: f64) -> Option<i64> {
    let truncated = float.trunc();
    if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64 {
        Some(truncated as i64)
    } else {
        None
    }
}

/// Parses an integer literal with optional sign and surrounding whitespace.
fn parse_int_literal(text: &str) -> Option<i64> {
    let text = text.trim();
    let digits = text.strip_prefix('+').unwrap_or(text);
    digits.replace('_', "").parse::<i64>().ok()
}

/// Parses date text in any accepted format, dropping time and offset.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }
    if let Ok(datetime) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%z") {
        return Some(datetime.date_naive());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|datetime| datetime.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        })
}

/// Sanitizes a birth date: a trailing `BC` marker is dropped together with the character before
/// it, years before 1900 become 1952, and absent or unparseable values give `None`.
pub fn sanitize_dob(value: &Value) -> Option<NaiveDate> {
    if !is_truthy(value) {
        return None;
    }

    let text = value_to_cell(value);
    let text = match text.strip_suffix("BC") {
        // The marker is written as ` BC`, its separator goes with it.
        Some(rest) => {
            let mut chars = rest.chars();
            chars.next_back();
            chars.as_str()
        }
        None => text.as_str(),
    };

    let date = DOB_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(text, format)
            .map(|datetime| datetime.date())
            .or_else(|_| NaiveDate::parse_from_str(text, format))
            .ok()
    })?;

    if date.year() < 1900 {
        return date.with_year(FALLBACK_BIRTH_YEAR);
    }

    Some(date)
}

fn mobile_sanity(value: &Value) -> Value {
    let digits = match value {
        Value::Bool(b) => i64::from(*b).to_string(),
        Value::Number(number) => match number.as_i64() {
            Some(int) => int.to_string(),
            None => match number.as_f64().and_then(truncate_float) {
                Some(int) => int.to_string(),
                None => return Value::Null,
            },
        },
        Value::String(text) => match parse_int_literal(text) {
            Some(int) => int.to_string(),
            None => return Value::Null,
        },
        _ => return Value::Null,
    };

    let chars: Vec<char> = digits.chars().collect();
    if chars.len() < 10 {
        return Value::Null;
    }

    Value::String(chars[chars.len() - 10..].iter().collect())
}

fn modify_reward(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::from(i64::from(*b) * 100),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return int.checked_mul(100).map(Value::from).unwrap_or(Value::Null);
            }
            number
                .as_f64()
                .and_then(|float| truncate_float(float * 100.0))
                .map(Value::from)
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn unix_epoch(value: &Value) -> Option<Value> {
    let Value::String(text) = value else {
        return None;
    };

    let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()?;
    let seconds = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp();

    Some(Value::String(format!("$D_{seconds}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn converted(field: &str, coercion: Coercion, value: Value) -> Value {
        match coerce(field, coercion, &value) {
            Coerced::Value(value) => value,
            Coerced::Kept(err) => panic!("coercion kept the value: {err}"),
        }
    }

    fn kept(field: &str, coercion: Coercion, value: Value) -> bool {
        matches!(coerce(field, coercion, &value), Coerced::Kept(_))
    }

    #[test]
    fn dob_is_sanitized() {
        assert_eq!(
            converted("dob", Coercion::Date, json!("1899-05-03")),
            json!("1952-05-03")
        );
        assert_eq!(
            converted("dob", Coercion::Date, json!("1990-07-14 10:20:30")),
            json!("1990-07-14")
        );
        assert_eq!(
            converted("dob", Coercion::Date, json!("1990-07-14 10:20:30.250")),
            json!("1990-07-14")
        );
        assert_eq!(
            converted("dob", Coercion::Date, json!("2020-13-45 BC")),
            Value::Null
        );
        assert_eq!(
            converted("dob", Coercion::Date, json!("1990-01-01 BC")),
            json!("1990-01-01")
        );
        assert_eq!(
            converted("dob", Coercion::Date, json!("1990-01-01BC")),
            Value::Null
        );
        assert_eq!(converted("dob", Coercion::Date, json!("")), Value::Null);
        assert_eq!(converted("dob", Coercion::Date, Value::Null), Value::Null);
    }

    #[test]
    fn dates_are_reformatted() {
        assert_eq!(
            converted("signup", Coercion::Date, json!("2023-04-05T10:00:00+05:30")),
            json!("2023-04-05")
        );
        assert_eq!(
            converted("signup", Coercion::Date, json!("04/05/2023")),
            json!("2023-04-05")
        );
        assert_eq!(
            converted("signup", Coercion::Date, json!("5 Apr 2023")),
            json!("2023-04-05")
        );
        assert!(kept("signup", Coercion::Date, json!("someday")));
    }

    #[test]
    fn dashed_numeric_dates_read_month_first() {
        assert_eq!(
            converted("signup", Coercion::Date, json!("05-04-2023")),
            json!("2023-05-04")
        );
        assert_eq!(
            converted("signup", Coercion::Date, json!("25-04-2023")),
            json!("2023-04-25")
        );
    }

    #[test]
    fn mobile_numbers_keep_last_ten_digits() {
        assert_eq!(
            converted("mobile", Coercion::MobileSanity, json!(919876543210_i64)),
            json!("9876543210")
        );
        assert_eq!(
            converted("mobile", Coercion::MobileSanity, json!("919876543210")),
            json!("9876543210")
        );
        assert_eq!(
            converted("mobile", Coercion::MobileSanity, json!(123)),
            Value::Null
        );
        assert_eq!(
            converted("mobile", Coercion::MobileSanity, json!("98765-43210")),
            Value::Null
        );
        assert_eq!(
            converted("mobile", Coercion::MobileSanity, Value::Null),
            Value::Null
        );
    }

    #[test]
    fn rewards_become_minor_units() {
        assert_eq!(
            converted("reward", Coercion::Reward, json!(12.3456)),
            json!(1234)
        );
        assert_eq!(converted("reward", Coercion::Reward, json!(7)), json!(700));
        assert_eq!(
            converted("reward", Coercion::Reward, json!("12.5")),
            Value::Null
        );
    }

    #[test]
    fn numeric_coercions_keep_unparseable_values() {
        assert_eq!(converted("age", Coercion::Int, json!("42")), json!(42));
        assert_eq!(converted("age", Coercion::Int, json!(42.9)), json!(42));
        assert_eq!(converted("age", Coercion::Int, Value::Null), Value::Null);
        assert!(kept("age", Coercion::Int, json!("forty")));
        assert!(kept("age", Coercion::Int, json!("4.5")));

        assert_eq!(converted("score", Coercion::Float, json!("4.5")), json!(4.5));
        assert_eq!(converted("score", Coercion::Float, json!(3)), json!(3.0));
        assert!(kept("score", Coercion::Float, json!("n/a")));
    }

    #[test]
    fn strings_stringify_but_null_stays_null() {
        assert_eq!(converted("id", Coercion::String, json!(101)), json!("101"));
        assert_eq!(converted("id", Coercion::String, json!(true)), json!("true"));
        assert_eq!(converted("id", Coercion::String, Value::Null), Value::Null);
    }

    #[test]
    fn unix_epoch_uses_utc_midnight() {
        assert_eq!(
            converted("anniversary", Coercion::UnixEpoch, json!("2020-01-01")),
            json!("$D_1577836800")
        );
        assert_eq!(
            converted("anniversary", Coercion::UnixEpoch, json!("")),
            json!("")
        );
        assert!(kept("anniversary", Coercion::UnixEpoch, json!("01-01-2020")));
    }
}
