use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;
use std::str::FromStr;

pub const CURRENCY_SYMBOL: &str = "₹";

pub fn round2(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

/// Rounds up to a whole unit. Coin balances are integers.
pub fn ceil_whole(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(0, RoundingMode::Ceiling)
}

pub fn percent_of(amount: &BigDecimal, percent: &BigDecimal) -> BigDecimal {
    amount * percent / BigDecimal::from(100)
}

pub fn format_amount(amount: &BigDecimal) -> String {
    format!("{}{}", CURRENCY_SYMBOL, round2(amount))
}

fn from_json_value(value: Value) -> Result<BigDecimal, String> {
    match value {
        Value::Null => Ok(BigDecimal::zero()),
        Value::Number(number) => {
            BigDecimal::from_str(&number.to_string()).map_err(|err| err.to_string())
        }
        Value::String(raw) if raw.trim().is_empty() => Ok(BigDecimal::zero()),
        Value::String(raw) => BigDecimal::from_str(raw.trim()).map_err(|err| err.to_string()),
        other => Err(format!("expected an amount, got {}", other)),
    }
}

/// Reads a JSON number or numeric string. Missing and null amounts become 0.
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    from_json_value(value).map_err(serde::de::Error::custom)
}

pub fn deserialize_optional_amount<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => from_json_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Writes an amount as a plain JSON number, the shape the order API expects.
pub fn serialize_amount<S>(amount: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let rounded = round2(amount);
    match rounded.to_i64().filter(|_| rounded.is_integer()) {
        Some(whole) => serializer.serialize_i64(whole),
        None => serializer.serialize_f64(rounded.to_f64().unwrap_or(0.0)),
    }
}
