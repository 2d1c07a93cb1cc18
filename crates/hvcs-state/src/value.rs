use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{StateError, StateResult};

/// A JSON-shaped structured value.
///
/// Numbers are split into `Integer` and `Float` so that integers survive
/// round-trips exactly. Maps are ordered, which makes the encoding
/// deterministic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum StateValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<StateValue>),
    Map(BTreeMap<String, StateValue>),
}

impl StateValue {
    /// Canonical encoding: compact JSON with sorted map keys.
    pub fn to_bytes(&self) -> StateResult<Vec<u8>> {
        self.check_finite()?;
        serde_json::to_vec(self).map_err(|e| StateError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> StateResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StateError::Serialization(e.to_string()))
    }

    /// Parse JSON text.
    pub fn from_json(text: &str) -> StateResult<Self> {
        Self::from_bytes(text.as_bytes())
    }

    pub fn to_json_pretty(&self) -> StateResult<String> {
        self.check_finite()?;
        serde_json::to_string_pretty(self).map_err(|e| StateError::Serialization(e.to_string()))
    }

    /// JSON has no NaN or infinity.
    fn check_finite(&self) -> StateResult<()> {
        match self {
            Self::Float(f) if !f.is_finite() => Err(StateError::Serialization(format!(
                "non-finite float {f} cannot be encoded"
            ))),
            Self::List(items) => items.iter().try_for_each(Self::check_finite),
            Self::Map(map) => map.values().try_for_each(Self::check_finite),
            _ => Ok(()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Map lookup. `None` for non-maps.
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl TryFrom<Value> for StateValue {
    type Error = StateError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().ok_or_else(|| {
                    StateError::Serialization(format!("unrepresentable number {n}"))
                })?),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<StateResult<_>>()?,
            ),
            Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| -> StateResult<(String, StateValue)> { Ok((k, Self::try_from(v)?)) })
                    .collect::<StateResult<_>>()?,
            ),
        })
    }
}

impl From<StateValue> for Value {
    /// Non-finite floats become `null`; [`StateValue::to_bytes`] rejects them
    /// before this point.
    fn from(value: StateValue) -> Self {
        match value {
            StateValue::Null => Value::Null,
            StateValue::Bool(b) => Value::Bool(b),
            StateValue::Integer(i) => Value::Number(i.into()),
            StateValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
            StateValue::String(s) => Value::String(s),
            StateValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            StateValue::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for StateValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for StateValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<StateValue>> for StateValue {
    fn from(items: Vec<StateValue>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, StateValue>> for StateValue {
    fn from(map: BTreeMap<String, StateValue>) -> Self {
        Self::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StateValue {
        let mut inner = BTreeMap::new();
        inner.insert("depth".to_string(), StateValue::Integer(3));
        inner.insert("ratio".to_string(), StateValue::Float(0.5));
        let mut map = BTreeMap::new();
        map.insert("zeta".to_string(), StateValue::Null);
        map.insert("alpha".to_string(), StateValue::Map(inner));
        map.insert(
            "tags".to_string(),
            StateValue::List(vec!["a".into(), true.into(), 7i64.into()]),
        );
        StateValue::Map(map)
    }

    #[test]
    fn roundtrip_is_byte_stable() {
        let bytes = sample().to_bytes().unwrap();
        let back = StateValue::from_bytes(&bytes).unwrap();
        assert_eq!(back, sample());
        assert_eq!(back.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn keys_are_sorted_in_encoding() {
        let text = String::from_utf8(sample().to_bytes().unwrap()).unwrap();
        assert!(text.find("alpha").unwrap() < text.find("tags").unwrap());
        assert!(text.find("tags").unwrap() < text.find("zeta").unwrap());
    }

    #[test]
    fn integers_and_floats_stay_distinct() {
        assert_eq!(StateValue::from_json("1").unwrap(), StateValue::Integer(1));
        assert_eq!(StateValue::from_json("1.0").unwrap(), StateValue::Float(1.0));
        let float = StateValue::Float(2.0);
        assert_eq!(StateValue::from_bytes(&float.to_bytes().unwrap()).unwrap(), float);
    }

    #[test]
    fn non_finite_floats_rejected() {
        let nested = StateValue::List(vec![StateValue::Float(f64::NAN)]);
        assert!(matches!(nested.to_bytes(), Err(StateError::Serialization(_))));
        assert!(StateValue::Float(f64::INFINITY).to_bytes().is_err());
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        assert!(matches!(
            StateValue::from_json("{\"unterminated\": "),
            Err(StateError::Serialization(_))
        ));
    }

    #[test]
    fn accessors() {
        let value = sample();
        assert_eq!(value.get("alpha").and_then(|v| v.get("depth")).and_then(StateValue::as_i64), Some(3));
        assert!(value.get("zeta").unwrap().is_null());
        assert_eq!(StateValue::from("x").as_str(), Some("x"));
        assert!(StateValue::Integer(1).get("x").is_none());
    }
}
