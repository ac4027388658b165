//! Field deserializers that coerce scraped values instead of rejecting them.
//!
//! Every helper accepts any JSON value. Values that cannot be coerced become
//! `None`, so a bad cell drops one attribute rather than the whole record.

use crate::parse::{parse_float_lenient, parse_int_lenient};
use crate::records::RecordKey;
use crate::relation::{normalize_relation, Relation, RelationAliases};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(int_from_value(&value))
}

pub fn float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(float_from_value(&value))
}

pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

pub fn key<'de, D>(deserializer: D) -> Result<RecordKey, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    RecordKey::from_value(&value)
        .ok_or_else(|| serde::de::Error::custom("expected a non-empty string or number key"))
}

pub fn optional_key<'de, D>(deserializer: D) -> Result<Option<RecordKey>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(RecordKey::from_value(&value))
}

pub fn relation<'de, D>(deserializer: D) -> Result<Option<Relation>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => normalize_relation(&text, &RelationAliases::default()),
        _ => None,
    })
}

pub(crate) fn int_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite())
                .map(|float| float.trunc() as i64)
        }),
        Value::String(text) => parse_int_lenient(text),
        _ => None,
    }
}

pub(crate) fn float_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|float| float.is_finite()),
        Value::String(text) => parse_float_lenient(text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_coerce_from_display_strings() {
        assert_eq!(int_from_value(&json!("2,500")), Some(2500));
        assert_eq!(int_from_value(&json!(12.9)), Some(12));
        assert_eq!(int_from_value(&json!(true)), None);
        assert_eq!(float_from_value(&json!("1,000.25 t")), Some(1000.25));
        assert_eq!(float_from_value(&json!("")), None);
        assert_eq!(float_from_value(&json!(null)), None);
    }
}
