//! Untyped drawings of any version.
//!
//! Migration steps operate here: a legacy drawing may be missing fields the
//! typed schema requires, so it is only parsed into [`Drawing`] once it has
//! reached the latest version.

use serde_json::{Map, Value};

use crate::parse::{self, ParseError};
use crate::schema::Drawing;

pub type Object = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct RawDrawing {
    root: Object,
}

impl RawDrawing {
    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(ParseError::NotAnObject),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, ParseError> {
        Self::from_value(parse::read_json(text)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ParseError> {
        Self::from_value(parse::read_yaml(text)?)
    }

    pub fn from_drawing(drawing: &Drawing) -> Result<Self, ParseError> {
        Self::from_value(serde_json::to_value(drawing)?)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    pub fn into_drawing(self) -> Result<Drawing, ParseError> {
        parse::parse_value(self.into_value())
    }

    pub fn to_json_string(&self) -> Result<String, ParseError> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }

    pub fn root(&self) -> &Object {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Object {
        &mut self.root
    }

    /// Persisted version. A drawing without one predates versioning and is
    /// version 0. Negative and fractional versions are invalid.
    pub fn version(&self) -> Result<u64, ParseError> {
        match self.root.get("version") {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => n.as_u64().ok_or_else(|| ParseError::InvalidVersion {
                found: n.to_string(),
            }),
            Some(other) => Err(ParseError::InvalidVersion {
                found: other.to_string(),
            }),
        }
    }

    pub fn set_version(&mut self, version: u32) {
        self.root.insert("version".to_string(), Value::from(version));
    }

    /// Top-level object under `key`, created empty when absent or null.
    /// `None` when the slot holds something other than an object.
    pub fn object_mut(&mut self, key: &str) -> Option<&mut Object> {
        let slot = self.root.entry(key.to_string()).or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::Object(Map::new());
        }
        slot.as_object_mut()
    }

    pub fn metadata(&self) -> Option<&Object> {
        self.root.get("metadata").and_then(Value::as_object)
    }

    pub fn metadata_mut(&mut self) -> Option<&mut Object> {
        self.object_mut("metadata")
    }

    /// `(level key, level)` pairs in key order.
    pub fn levels(&self) -> Vec<(&str, &Object)> {
        self.root
            .get("levels")
            .and_then(Value::as_object)
            .map(|levels| {
                levels
                    .iter()
                    .filter_map(|(key, level)| level.as_object().map(|l| (key.as_str(), l)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Each level's entity container, keyed by level key.
    pub fn level_containers_mut(&mut self) -> Vec<(&str, &mut Object)> {
        let Some(levels) = self.root.get_mut("levels").and_then(Value::as_object_mut) else {
            return Vec::new();
        };
        levels
            .iter_mut()
            .filter_map(|(key, level)| {
                level
                    .get_mut("entities")
                    .and_then(Value::as_object_mut)
                    .map(|entities| (key.as_str(), entities))
            })
            .collect()
    }

    /// Every entity object on every level.
    pub fn level_entities_mut(&mut self) -> Vec<&mut Object> {
        self.level_containers_mut()
            .into_iter()
            .flat_map(|(_, entities)| entities.values_mut().filter_map(Value::as_object_mut))
            .collect()
    }

    pub fn shared_entities_mut(&mut self) -> Vec<&mut Object> {
        match self.root.get_mut("shared").and_then(Value::as_object_mut) {
            Some(shared) => shared.values_mut().filter_map(Value::as_object_mut).collect(),
            None => Vec::new(),
        }
    }

    /// Every entity object, levels first and then the shared pool.
    pub fn all_entities_mut(&mut self) -> Vec<&mut Object> {
        let Self { root } = self;
        let mut out = Vec::new();
        for (key, value) in root.iter_mut() {
            match key.as_str() {
                "levels" => {
                    let Some(levels) = value.as_object_mut() else {
                        continue;
                    };
                    for level in levels.values_mut() {
                        if let Some(entities) =
                            level.get_mut("entities").and_then(Value::as_object_mut)
                        {
                            out.extend(entities.values_mut().filter_map(Value::as_object_mut));
                        }
                    }
                }
                "shared" => {
                    if let Some(shared) = value.as_object_mut() {
                        out.extend(shared.values_mut().filter_map(Value::as_object_mut));
                    }
                }
                _ => {}
            }
        }
        out
    }
}

/// The `type` tag of an entity object.
pub fn entity_type(entity: &Object) -> Option<&str> {
    entity.get("type").and_then(Value::as_str)
}

pub fn entity_uid(entity: &Object) -> Option<&str> {
    entity.get("uid").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawDrawing {
        RawDrawing::from_value(value).unwrap()
    }

    #[test]
    fn missing_version_is_zero() {
        assert_eq!(raw(json!({})).version().unwrap(), 0);
        assert_eq!(raw(json!({ "version": 4 })).version().unwrap(), 4);
        assert_eq!(
            raw(json!({ "version": u64::MAX })).version().unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn non_integer_version_is_invalid() {
        assert!(raw(json!({ "version": "3" })).version().is_err());
        assert!(raw(json!({ "version": 2.5 })).version().is_err());
        assert!(raw(json!({ "version": -2 })).version().is_err());
    }

    #[test]
    fn object_mut_fills_null_but_keeps_other_values() {
        let mut d = raw(json!({ "shared": null, "levels": 3 }));
        d.object_mut("shared").unwrap().insert("r".into(), json!({}));
        assert_eq!(d.root()["shared"], json!({ "r": {} }));
        assert!(d.object_mut("levels").is_none());
    }

    #[test]
    fn entity_walkers_visit_levels_then_shared() {
        let mut d = raw(json!({
            "levels": {
                "g": { "entities": { "a": { "uid": "a", "type": "FITTING" } } },
                "l1": { "entities": { "b": { "uid": "b", "type": "PIPE" } } }
            },
            "shared": { "r": { "uid": "r", "type": "RISER" } }
        }));
        assert_eq!(d.level_entities_mut().len(), 2);
        assert_eq!(d.shared_entities_mut().len(), 1);

        let uids: Vec<String> = d
            .all_entities_mut()
            .iter()
            .filter_map(|e| entity_uid(e).map(str::to_string))
            .collect();
        assert_eq!(uids, vec!["a", "b", "r"]);
    }

    #[test]
    fn root_must_be_object() {
        assert!(matches!(
            RawDrawing::from_value(json!([1, 2])),
            Err(ParseError::NotAnObject)
        ));
    }
}
