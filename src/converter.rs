//! Conversion between controller resource values and host states.
//!
//! Converters are resolved from a static table keyed by the resource
//! value kind and the channel item kind. Pairs missing from the table are
//! simply not convertible; callers log and skip them.

use crate::error::ConversionError;
use crate::types::{ItemKind, State};
use crate::value::{EnumValue, ResourceValue, Value, ValueKind};

/// Per-channel conversion parameters.
#[derive(Default, Debug, Clone, Copy)]
pub struct ConvertInfo<'a> {
    /// Invert boolean semantic (eg. normally closed contacts).
    pub inverted: bool,
    /// Integer level written for ON; resource maximum when not set.
    pub on_level: Option<i32>,
    /// Enum values of the resource definition, when known.
    pub enum_values: Option<&'a [EnumValue]>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Converter {
    BooleanSwitch,
    BooleanContact,
    IntegerNumber,
    IntegerSwitch,
    IntegerDimmer,
    FloatingPointNumber,
    EnumString,
    TimerNumber,
    WeekdayNumber,
}

const REGISTRY: &[(ValueKind, ItemKind, Converter)] = &[
    (ValueKind::Boolean, ItemKind::Switch, Converter::BooleanSwitch),
    (ValueKind::Boolean, ItemKind::Contact, Converter::BooleanContact),
    (ValueKind::Integer, ItemKind::Number, Converter::IntegerNumber),
    (ValueKind::Integer, ItemKind::Switch, Converter::IntegerSwitch),
    (ValueKind::Integer, ItemKind::Dimmer, Converter::IntegerDimmer),
    (ValueKind::FloatingPoint, ItemKind::Number, Converter::FloatingPointNumber),
    (ValueKind::Enum, ItemKind::String, Converter::EnumString),
    (ValueKind::Timer, ItemKind::Number, Converter::TimerNumber),
    (ValueKind::Weekday, ItemKind::Number, Converter::WeekdayNumber),
];

impl Converter {
    pub fn lookup(value: ValueKind, item: ItemKind) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(v, i, _)| *v == value && *i == item)
            .map(|(_, _, c)| *c)
    }

    /// All declared (value kind, item kind) pairs.
    pub fn supported() -> impl Iterator<Item = (ValueKind, ItemKind)> {
        REGISTRY.iter().map(|(v, i, _)| (*v, *i))
    }

    /// Resource value -> host state.
    pub fn to_state(
        self,
        resource: &ResourceValue,
        info: &ConvertInfo<'_>,
    ) -> Result<State, ConversionError> {
        let mismatch = || ConversionError::ValueMismatch(resource.resource_id);
        let state = match (self, &resource.value) {
            (Self::BooleanSwitch, Value::Boolean(v)) => State::OnOff(*v != info.inverted),
            (Self::BooleanContact, Value::Boolean(v)) => State::OpenClosed(*v != info.inverted),
            (Self::IntegerNumber, Value::Integer { value, .. }) => State::Decimal(*value as f64),
            (Self::IntegerSwitch, Value::Integer { value, min, .. }) => {
                State::OnOff((value > min) != info.inverted)
            }
            (Self::IntegerDimmer, Value::Integer { value, .. }) => {
                State::Percent((*value).clamp(0, 100) as u8)
            }
            (Self::FloatingPointNumber, Value::FloatingPoint { value, .. }) => {
                State::Decimal(*value)
            }
            (Self::EnumString, Value::Enum { enum_name, .. }) => State::Text(enum_name.clone()),
            (Self::TimerNumber, Value::Timer(ms)) => State::Decimal(*ms as f64),
            (Self::WeekdayNumber, Value::Weekday(day)) => State::Decimal(*day as f64),
            _ => return Err(mismatch()),
        };
        Ok(state)
    }

    /// Host state -> new resource value, based on the current one.
    pub fn to_value(
        self,
        state: &State,
        current: &ResourceValue,
        info: &ConvertInfo<'_>,
    ) -> Result<ResourceValue, ConversionError> {
        let unsupported = || ConversionError::UnsupportedState(state.to_string());
        let value = match (self, state, &current.value) {
            (Self::BooleanSwitch, State::OnOff(on), Value::Boolean(_)) => {
                Value::Boolean(*on != info.inverted)
            }
            (Self::BooleanContact, State::OpenClosed(open), Value::Boolean(_)) => {
                Value::Boolean(*open != info.inverted)
            }
            (Self::IntegerNumber, State::Decimal(d), Value::Integer { min, max, .. }) => {
                let value = d.round();
                check_range(value, *min as f64, *max as f64)?;
                Value::Integer {
                    value: value as i32,
                    min: *min,
                    max: *max,
                }
            }
            (Self::IntegerSwitch, State::OnOff(on), Value::Integer { min, max, .. }) => {
                let value = if *on != info.inverted {
                    let level = info.on_level.unwrap_or(*max);
                    check_range(level as f64, *min as f64, *max as f64)?;
                    level
                } else {
                    *min
                };
                Value::Integer {
                    value,
                    min: *min,
                    max: *max,
                }
            }
            (Self::IntegerDimmer, State::Percent(p), Value::Integer { min, max, .. }) => {
                Value::Integer {
                    value: (*p as i32).clamp(*min, *max),
                    min: *min,
                    max: *max,
                }
            }
            (Self::FloatingPointNumber, State::Decimal(d), Value::FloatingPoint { min, max, .. }) => {
                check_range(*d, *min, *max)?;
                Value::FloatingPoint {
                    value: *d,
                    min: *min,
                    max: *max,
                }
            }
            (
                Self::EnumString,
                State::Text(name),
                Value::Enum {
                    definition_type_id,
                    ..
                },
            ) => {
                let found = info
                    .enum_values
                    .and_then(|values| values.iter().find(|v| &v.name == name))
                    .ok_or_else(|| ConversionError::UnknownEnumValue {
                        definition: *definition_type_id,
                        name: name.clone(),
                    })?;
                Value::Enum {
                    definition_type_id: *definition_type_id,
                    enum_value_id: found.id,
                    enum_name: found.name.clone(),
                }
            }
            (Self::TimerNumber, State::Decimal(d), Value::Timer(_)) => {
                if *d < 0.0 {
                    return Err(unsupported());
                }
                Value::Timer(d.round() as u64)
            }
            (Self::WeekdayNumber, State::Decimal(d), Value::Weekday(_)) => {
                check_range(*d, 0.0, 6.0)?;
                Value::Weekday(*d as u8)
            }
            _ => return Err(unsupported()),
        };
        Ok(current.with_value(value))
    }
}

fn check_range(value: f64, min: f64, max: f64) -> Result<(), ConversionError> {
    if value < min || value > max {
        return Err(ConversionError::OutOfRange { value, min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: ValueKind, item: ItemKind) -> (Value, State) {
        match (kind, item) {
            (ValueKind::Boolean, ItemKind::Switch) => (Value::Boolean(false), State::OnOff(true)),
            (ValueKind::Boolean, ItemKind::Contact) => {
                (Value::Boolean(false), State::OpenClosed(true))
            }
            (ValueKind::Integer, ItemKind::Number) => (
                Value::Integer { value: 0, min: -10, max: 50 },
                State::Decimal(21.0),
            ),
            (ValueKind::Integer, ItemKind::Switch) => (
                Value::Integer { value: 0, min: 0, max: 100 },
                State::OnOff(true),
            ),
            (ValueKind::Integer, ItemKind::Dimmer) => (
                Value::Integer { value: 0, min: 0, max: 100 },
                State::Percent(35),
            ),
            (ValueKind::FloatingPoint, ItemKind::Number) => (
                Value::FloatingPoint { value: 0.0, min: -40.0, max: 80.0 },
                State::Decimal(22.5),
            ),
            (ValueKind::Enum, ItemKind::String) => (
                Value::Enum {
                    definition_type_id: 3,
                    enum_value_id: 1,
                    enum_name: "Away".into(),
                },
                State::Text("Home".into()),
            ),
            (ValueKind::Timer, ItemKind::Number) => (Value::Timer(0), State::Decimal(1500.0)),
            (ValueKind::Weekday, ItemKind::Number) => (Value::Weekday(0), State::Decimal(4.0)),
            other => panic!("no sample for {:?}", other),
        }
    }

    #[test]
    fn every_registered_pair_round_trips() {
        let enums = vec![
            EnumValue { id: 1, name: "Away".into() },
            EnumValue { id: 2, name: "Home".into() },
        ];
        for inverted in [false, true] {
            let info = ConvertInfo {
                inverted,
                on_level: None,
                enum_values: Some(&enums),
            };
            for (kind, item) in Converter::supported() {
                let converter = Converter::lookup(kind, item).unwrap();
                let (template, state) = sample(kind, item);
                let current = ResourceValue::new(100, template);
                let written = converter.to_value(&state, &current, &info).unwrap();
                assert_eq!(written.resource_id, 100);
                let read = converter.to_state(&written, &info).unwrap();
                assert_eq!(read, state, "{:?} <-> {:?} inverted={}", kind, item, inverted);
            }
        }
    }

    #[test]
    fn boolean_inversion() {
        let info = ConvertInfo {
            inverted: true,
            ..Default::default()
        };
        let value = ResourceValue::new(1, Value::Boolean(true));
        assert_eq!(
            Converter::BooleanSwitch.to_state(&value, &info),
            Ok(State::OnOff(false))
        );
        let written = Converter::BooleanSwitch
            .to_value(&State::OnOff(true), &value, &info)
            .unwrap();
        assert_eq!(written.value, Value::Boolean(false));
    }

    #[test]
    fn integer_switch_uses_on_level() {
        let info = ConvertInfo {
            on_level: Some(60),
            ..Default::default()
        };
        let current = ResourceValue::new(5, Value::Integer { value: 0, min: 0, max: 100 });
        let on = Converter::IntegerSwitch
            .to_value(&State::OnOff(true), &current, &info)
            .unwrap();
        assert_eq!(on.value, Value::Integer { value: 60, min: 0, max: 100 });
        let off = Converter::IntegerSwitch
            .to_value(&State::OnOff(false), &current, &info)
            .unwrap();
        assert_eq!(off.value, Value::Integer { value: 0, min: 0, max: 100 });
    }

    #[test]
    fn rejects_out_of_range_and_unknown_pairs() {
        let current = ResourceValue::new(5, Value::Integer { value: 0, min: 0, max: 10 });
        let err = Converter::IntegerNumber
            .to_value(&State::Decimal(11.0), &current, &ConvertInfo::default())
            .unwrap_err();
        assert!(matches!(err, ConversionError::OutOfRange { .. }));

        assert_eq!(Converter::lookup(ValueKind::Timer, ItemKind::Switch), None);

        let enum_value = ResourceValue::new(
            6,
            Value::Enum {
                definition_type_id: 9,
                enum_value_id: 1,
                enum_name: "A".into(),
            },
        );
        let err = Converter::EnumString
            .to_value(&State::Text("B".into()), &enum_value, &ConvertInfo::default())
            .unwrap_err();
        assert!(matches!(err, ConversionError::UnknownEnumValue { definition: 9, .. }));
    }
}
