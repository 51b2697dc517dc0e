use serde_json::{Map, Value};

use crate::bail;
use crate::error::{ErrorKind, MartechResult};
use crate::transform::TransformParams;
use crate::transform::coercion::sanitize_dob;
use crate::types::Record;

const DEFAULT_SIGNAL_COLUMN: &str = "v1__json";
const DEFAULT_SIGNAL_FIELD: &str = "last7days";
const GENDER_SIGNALS: [(&str, &str); 4] = [
    ("men", "gender_men_dp"),
    ("women", "gender_women_dp"),
    ("kids", "gender_kids_dp"),
    ("home", "gender_home_dp"),
];

const DEFAULT_DOB_FIELD: &str = "dob";
const DEFAULT_BIRTH_DATE_FIELD: &str = "birth_date";

fn param<'a>(params: &'a TransformParams, name: &str, default: &'a str) -> &'a str {
    params.get(name).and_then(Value::as_str).unwrap_or(default)
}

/// Replaces the record with gender affinity counts read from a JSON signal column.
///
/// Params: `data_col` (default `v1__json`) holds a JSON object, either as text or as an
/// object, and `signal_field` (default `last7days`) selects the window inside it. Missing
/// counts are 0.
pub fn get_gender_implicit_data(record: Record, params: &TransformParams) -> MartechResult<Record> {
    let column = param(params, "data_col", DEFAULT_SIGNAL_COLUMN);
    let signal_field = param(params, "signal_field", DEFAULT_SIGNAL_FIELD);

    let signals = match record.get(column) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text)? {
            Value::Object(data) => window(data, signal_field),
            _ => bail!(
                ErrorKind::InvalidData,
                "Signal column does not hold a JSON object",
                column
            ),
        },
        Some(Value::Object(data)) => window(data.clone(), signal_field),
        Some(_) => bail!(
            ErrorKind::InvalidData,
            "Signal column does not hold a JSON object",
            column
        ),
    };

    let mut profile = Map::with_capacity(GENDER_SIGNALS.len());
    for (signal, target) in GENDER_SIGNALS {
        let count = match signals.get(signal) {
            None | Some(Value::Null) => 0,
            Some(value) => signal_count(signal, value)?,
        };
        profile.insert(target.to_owned(), Value::from(count));
    }

    Ok(profile)
}

fn window(mut data: Map<String, Value>, signal_field: &str) -> Map<String, Value> {
    match data.remove(signal_field) {
        Some(Value::Object(window)) => window,
        _ => Map::new(),
    }
}

fn signal_count(signal: &str, value: &Value) -> MartechResult<i64> {
    let count = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.trunc() as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };

    match count {
        Some(count) => Ok(count),
        None => bail!(
            ErrorKind::ConversionError,
            "Gender signal is not an integer",
            format!("{signal}: {value}")
        ),
    }
}

/// Adds the month and day of the sanitized birth date, formatted like `May-03`.
///
/// Params: `field` (default `dob`) is read and `target` (default `birth_date`) is written.
/// An absent or unparseable birth date writes null.
pub fn get_birth_date(mut record: Record, params: &TransformParams) -> MartechResult<Record> {
    let field = param(params, "field", DEFAULT_DOB_FIELD);
    let target = param(params, "target", DEFAULT_BIRTH_DATE_FIELD);

    let birth_date = record
        .get(field)
        .and_then(sanitize_dob)
        .map(|date| Value::String(date.format("%b-%d").to_string()))
        .unwrap_or(Value::Null);
    record.insert(target.to_owned(), birth_date);

    Ok(record)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn gender_counts_come_from_the_signal_window() {
        let input = record(json!({
            "customer_id": 7,
            "v1__json": r#"{"last7days": {"men": 3, "women": "5", "kids": 1.0}}"#
        }));

        let output = get_gender_implicit_data(input, &Map::new()).unwrap();

        assert_eq!(
            Value::Object(output),
            json!({
                "gender_men_dp": 3,
                "gender_women_dp": 5,
                "gender_kids_dp": 1,
                "gender_home_dp": 0
            })
        );
    }

    #[test]
    fn gender_params_select_column_and_window() {
        let input = record(json!({"signals": {"last30days": {"home": 2}}}));
        let params = record(json!({"data_col": "signals", "signal_field": "last30days"}));

        let output = get_gender_implicit_data(input, &params).unwrap();

        assert_eq!(output["gender_home_dp"], json!(2));
        assert_eq!(output["gender_men_dp"], json!(0));
    }

    #[test]
    fn missing_signal_column_gives_zero_counts() {
        let output = get_gender_implicit_data(record(json!({"customer_id": 1})), &Map::new())
            .unwrap();

        assert!(output.values().all(|value| value == &json!(0)));
    }

    #[test]
    fn birth_date_uses_month_and_day() {
        let output =
            get_birth_date(record(json!({"dob": "1899-05-03 00:00:00"})), &Map::new()).unwrap();

        assert_eq!(output["birth_date"], json!("May-03"));
        assert_eq!(output["dob"], json!("1899-05-03 00:00:00"));

        let output = get_birth_date(record(json!({"dob": "unknown"})), &Map::new()).unwrap();
        assert_eq!(output["birth_date"], Value::Null);
    }
}
