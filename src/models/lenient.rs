//! Serde helpers for payloads produced by OCR and generative services,
//! where fields are routinely missing, `null`, or of the wrong JSON type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::enums::{InteractionType, RiskLevel, Severity};

/// Treat an explicit `null` the same as a missing field.
pub fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize an array, skipping (and logging) items that fail to deserialize.
pub fn skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, v)| match serde_json::from_value(v) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(
                    index,
                    item_type = std::any::type_name::<T>(),
                    error = %e,
                    "Skipping malformed list item"
                );
                None
            }
        })
        .collect())
}

/// Accept a string, number or bool and keep its text; `null` becomes `None`.
pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Like [`opt_text`] but collapses absence to an empty string.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_text(deserializer)?.unwrap_or_default())
}

/// Accept a number or a numeric string; anything else is `None`.
pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Accept a bool or "true"/"false" text; anything else is `None`.
pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Non-negative count; strings and nulls degrade to zero.
pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_number(deserializer)?
        .filter(|n| *n >= 0.0)
        .map(|n| n as u32)
        .unwrap_or(0))
}

pub fn severity<'de, D>(deserializer: D) -> Result<Severity, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Severity::parse_lenient(&text(deserializer)?))
}

pub fn risk_level<'de, D>(deserializer: D) -> Result<RiskLevel, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(RiskLevel::parse_lenient(&text(deserializer)?))
}

/// Interaction type in any of the spellings services use; unknown types are rejected.
pub fn interaction_type<'de, D>(deserializer: D) -> Result<InteractionType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = text(deserializer)?;
    InteractionType::parse_lenient(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown interaction type: {raw}")))
}

/// Deserialize an optional nested object, treating a value of the wrong shape as absent.
pub fn opt_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .and_then(|v| serde_json::from_value(v).ok()))
}
