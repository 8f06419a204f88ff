use crate::consts::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Runtime value of a single controller resource.
#[derive(Clone, PartialEq, Debug)]
pub struct ResourceValue {
    pub resource_id: ResourceId,
    pub value: Value,
}

/// Value payload, one variant per controller value type.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Boolean(bool),
    Integer {
        value: i32,
        min: i32,
        max: i32,
    },
    FloatingPoint {
        value: f64,
        min: f64,
        max: f64,
    },
    Enum {
        definition_type_id: u32,
        enum_value_id: u32,
        enum_name: String,
    },
    /// Timer value in milliseconds.
    Timer(u64),
    /// Day of week, 0 is Monday.
    Weekday(u8),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ValueKind {
    Boolean,
    Integer,
    FloatingPoint,
    Enum,
    Timer,
    Weekday,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer { .. } => ValueKind::Integer,
            Self::FloatingPoint { .. } => ValueKind::FloatingPoint,
            Self::Enum { .. } => ValueKind::Enum,
            Self::Timer(_) => ValueKind::Timer,
            Self::Weekday(_) => ValueKind::Weekday,
        }
    }
}

impl ResourceValue {
    pub fn new(resource_id: ResourceId, value: Value) -> Self {
        Self { resource_id, value }
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    /// Same resource, new payload.
    pub fn with_value(&self, value: Value) -> Self {
        Self {
            resource_id: self.resource_id,
            value,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct EnumValue {
    pub id: u32,
    pub name: String,
}

/// Enum type declared in the controller project.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct EnumDefinition {
    pub definition_type_id: u32,
    pub values: Vec<EnumValue>,
}

/// Enum values by definition type, built from the project.
#[derive(Default, Debug)]
pub struct EnumDictionary {
    definitions: HashMap<u32, Vec<EnumValue>>,
}

impl EnumDictionary {
    pub fn new(definitions: &[EnumDefinition]) -> Self {
        Self {
            definitions: definitions
                .iter()
                .map(|d| (d.definition_type_id, d.values.clone()))
                .collect(),
        }
    }

    pub fn values(&self, definition_type_id: u32) -> Option<&[EnumValue]> {
        self.definitions
            .get(&definition_type_id)
            .map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_lookup() {
        let dict = EnumDictionary::new(&[EnumDefinition {
            definition_type_id: 7,
            values: vec![
                EnumValue { id: 1, name: "Away".into() },
                EnumValue { id: 2, name: "Home".into() },
            ],
        }]);
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.values(7).map(|v| v.len()), Some(2));
        assert!(dict.values(8).is_none());
    }

    #[test]
    fn values_deserialize_from_yaml() {
        let value: Value = serde_yaml::from_str("integer: { value: 5, min: 0, max: 10 }").unwrap();
        assert_eq!(value.kind(), ValueKind::Integer);
        let value: Value = serde_yaml::from_str("boolean: true").unwrap();
        assert_eq!(value, Value::Boolean(true));
    }
}
