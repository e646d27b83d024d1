//! Calculator inputs and the "could not score" result type.
//!
//! Callers hand calculators a plain key/value map. Values are read leniently
//! (numeric strings count as numbers, `"yes"` counts as a flag) but a value
//! that is absent, `null`, non-finite or of the wrong shape is simply missing.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Input Values
// ============================================================================

/// A single input value as supplied by a caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Null,
}

impl InputValue {
    /// Interpret a raw `key=value` right-hand side.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "null" => return InputValue::Null,
            "true" => return InputValue::Flag(true),
            "false" => return InputValue::Flag(false),
            _ => {}
        }
        match trimmed.parse::<f64>() {
            Ok(v) => InputValue::Number(v),
            Err(_) => InputValue::Text(trimmed.to_string()),
        }
    }
}

impl From<f64> for InputValue {
    fn from(v: f64) -> Self {
        InputValue::Number(v)
    }
}

impl From<bool> for InputValue {
    fn from(v: bool) -> Self {
        InputValue::Flag(v)
    }
}

impl From<&str> for InputValue {
    fn from(v: &str) -> Self {
        InputValue::Text(v.to_string())
    }
}

/// Key/value inputs for one calculator invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inputs(BTreeMap<String, InputValue>);

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<InputValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<InputValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<InputValue> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&InputValue> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Finite number under `key`, if any.
    pub fn number(&self, key: &str) -> Option<f64> {
        let value = match self.0.get(key)? {
            InputValue::Number(v) => *v,
            InputValue::Text(s) => s.trim().parse::<f64>().ok()?,
            InputValue::Flag(_) | InputValue::Null => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Boolean under `key`. Accepts 0/1 and yes/no spellings.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            InputValue::Flag(b) => Some(*b),
            InputValue::Number(v) if *v == 1.0 => Some(true),
            InputValue::Number(v) if *v == 0.0 => Some(false),
            InputValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(true),
                "false" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Optional flag: absent means `false`.
    pub fn flag_or_false(&self, key: &str) -> bool {
        self.flag(key).unwrap_or(false)
    }

    /// Non-empty text under `key`.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            InputValue::Text(s) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }
}

impl<K: Into<String>, V: Into<InputValue>> FromIterator<(K, V)> for Inputs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Inputs(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ============================================================================
// Unscored Results
// ============================================================================

/// Inputs a calculator needed but did not receive.
///
/// Alternatives are reported as a single `"a|b"` entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingFields {
    pub needs: Vec<String>,
}

/// Why a calculator returned no score.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Unscored {
    /// Required inputs are missing or non-finite. The caller can retry with more data.
    #[error("missing inputs: {}", .0.needs.join(", "))]
    Needs(MissingFields),

    /// Inputs are present but outside the formula's domain (zero denominator and the like).
    #[error("undefined: {reason}")]
    Undefined { reason: String },
}

impl Unscored {
    pub fn needs<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Unscored::Needs(MissingFields {
            needs: fields.into_iter().map(Into::into).collect(),
        })
    }

    pub fn undefined(reason: impl Into<String>) -> Self {
        Unscored::Undefined {
            reason: reason.into(),
        }
    }

    /// Missing keys, empty for `Undefined`.
    pub fn missing(&self) -> &[String] {
        match self {
            Unscored::Needs(fields) => &fields.needs,
            Unscored::Undefined { .. } => &[],
        }
    }
}

/// `Needs` serializes as `{"needs": [...]}` and `Undefined` as `null`.
impl Serialize for Unscored {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Unscored::Needs(fields) => fields.serialize(serializer),
            Unscored::Undefined { .. } => serializer.serialize_none(),
        }
    }
}

/// Result of a typed calculator.
pub type Scored<T> = std::result::Result<T, Unscored>;

// ============================================================================
// Requirement Collection
// ============================================================================

/// Collects required inputs, remembering every one that is missing.
///
/// Accessors return a placeholder (`NaN`, `false`, `""`) for a missing key.
/// Placeholders never reach a score: [`Requirements::finish`] fails first.
pub struct Requirements<'a> {
    inputs: &'a Inputs,
    missing: Vec<String>,
}

impl<'a> Requirements<'a> {
    pub fn new(inputs: &'a Inputs) -> Self {
        Self {
            inputs,
            missing: Vec::new(),
        }
    }

    pub fn number(&mut self, key: &str) -> f64 {
        self.inputs.number(key).unwrap_or_else(|| {
            self.missing.push(key.to_string());
            f64::NAN
        })
    }

    pub fn flag(&mut self, key: &str) -> bool {
        self.inputs.flag(key).unwrap_or_else(|| {
            self.missing.push(key.to_string());
            false
        })
    }

    pub fn text(&mut self, key: &str) -> &'a str {
        match self.inputs.text(key) {
            Some(value) => value,
            None => {
                self.missing.push(key.to_string());
                ""
            }
        }
    }

    /// Record a missing requirement that is not a plain key, such as an alternative.
    pub fn note_missing(&mut self, requirement: impl Into<String>) {
        self.missing.push(requirement.into());
    }

    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn finish(self) -> Scored<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(Unscored::Needs(MissingFields {
                needs: self.missing,
            }))
        }
    }
}

impl fmt::Display for MissingFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.needs.join(", "))
    }
}
