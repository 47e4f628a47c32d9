//! Text to typed drawing and back.
//!
//! Text is first read into a `serde_json::Value` by a reader that refuses
//! repeated object keys, so a uid that appears twice as a key in one
//! container can never be silently collapsed.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::schema::Drawing;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed JSON drawing: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed YAML drawing: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Drawing root must be an object")]
    NotAnObject,

    #[error("Drawing version must be a non-negative integer, found {found}")]
    InvalidVersion { found: String },
}

/// Parse a latest-version drawing from JSON text.
pub fn parse(text: &str) -> Result<Drawing, ParseError> {
    parse_value(read_json(text)?)
}

/// Parse a latest-version drawing from YAML text.
pub fn parse_yaml(text: &str) -> Result<Drawing, ParseError> {
    parse_value(read_yaml(text)?)
}

pub fn parse_value(value: Value) -> Result<Drawing, ParseError> {
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    Ok(serde_json::from_value(value)?)
}

pub fn serialize(drawing: &Drawing) -> Result<String, ParseError> {
    Ok(serde_json::to_string_pretty(drawing)?)
}

pub fn serialize_yaml(drawing: &Drawing) -> Result<String, ParseError> {
    Ok(serde_yaml::to_string(drawing)?)
}

/// Read JSON text without interpreting it, rejecting duplicate keys.
pub fn read_json(text: &str) -> Result<Value, ParseError> {
    let StrictValue(value) = serde_json::from_str(text)?;
    Ok(value)
}

/// Read YAML text without interpreting it, rejecting duplicate keys.
pub fn read_yaml(text: &str) -> Result<Value, ParseError> {
    let StrictValue(value) = serde_yaml::from_str(text)?;
    Ok(value)
}

struct StrictValue(Value);

impl<'de> Deserialize<'de> for StrictValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StrictVisitor).map(StrictValue)
    }
}

struct StrictVisitor;

impl<'de> Visitor<'de> for StrictVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON-compatible value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| E::custom(format!("non-finite number {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        StrictValue::deserialize(deserializer).map(|StrictValue(v)| v)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(StrictValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::new();
        while let Some(key) = access.next_key::<String>()? {
            if map.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate key `{key}`")));
            }
            let StrictValue(value) = access.next_value()?;
            map.insert(key, value);
        }
        Ok(Value::Object(map))
    }
}
