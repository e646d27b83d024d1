//! Calculator registry.
//!
//! The registry maps a stable string id to a calculator's declared inputs and
//! entry point. It is built explicitly with [`RegistryBuilder`]: every
//! calculator module contributes its definitions, later registrations replace
//! earlier ones with the same id, and all declared range tables are validated
//! when [`RegistryBuilder::build`] runs. After that the registry is read-only.

use crate::inputs::{Inputs, MissingFields, Scored, Unscored};
use crate::ranges::{round_to, RangeTable};
use crate::{calculators, Error, Result};
use once_cell::sync::OnceCell;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Cached built-in registry, built on first use
static BUILTIN_REGISTRY: OnceCell<Registry> = OnceCell::new();

/// Get a reference to the registry holding every built-in calculator
///
/// The registry is built (and its tables validated) once per process.
pub fn builtin_registry() -> Result<&'static Registry> {
    BUILTIN_REGISTRY.get_or_try_init(|| RegistryBuilder::new().with_builtins().build())
}

// ============================================================================
// Calculator Ids
// ============================================================================

/// Ids of the calculators shipped with the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatorId {
    ApacheIi,
    Sofa,
    SofaSurrogate,
    KdigoAki,
    Caprini,
    WellsPe,
    Perc,
    Map,
    ShockIndex,
    ModifiedShockIndex,
    StrokeVolume,
    CardiacOutput,
    Svr,
    PfRatio,
    AaGradient,
    VentMechanics,
    Rsbi,
    DkaSeverity,
    ArdsBerlin,
    SepsisBundle,
    ShockIndexClass,
}

impl CalculatorId {
    pub const ALL: [CalculatorId; 21] = [
        CalculatorId::ApacheIi,
        CalculatorId::Sofa,
        CalculatorId::SofaSurrogate,
        CalculatorId::KdigoAki,
        CalculatorId::Caprini,
        CalculatorId::WellsPe,
        CalculatorId::Perc,
        CalculatorId::Map,
        CalculatorId::ShockIndex,
        CalculatorId::ModifiedShockIndex,
        CalculatorId::StrokeVolume,
        CalculatorId::CardiacOutput,
        CalculatorId::Svr,
        CalculatorId::PfRatio,
        CalculatorId::AaGradient,
        CalculatorId::VentMechanics,
        CalculatorId::Rsbi,
        CalculatorId::DkaSeverity,
        CalculatorId::ArdsBerlin,
        CalculatorId::SepsisBundle,
        CalculatorId::ShockIndexClass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CalculatorId::ApacheIi => "apache_ii",
            CalculatorId::Sofa => "sofa",
            CalculatorId::SofaSurrogate => "sofa_surrogate",
            CalculatorId::KdigoAki => "kdigo_aki",
            CalculatorId::Caprini => "caprini",
            CalculatorId::WellsPe => "wells_pe",
            CalculatorId::Perc => "perc",
            CalculatorId::Map => "map",
            CalculatorId::ShockIndex => "shock_index",
            CalculatorId::ModifiedShockIndex => "modified_shock_index",
            CalculatorId::StrokeVolume => "stroke_volume",
            CalculatorId::CardiacOutput => "cardiac_output",
            CalculatorId::Svr => "svr",
            CalculatorId::PfRatio => "pf_ratio",
            CalculatorId::AaGradient => "aa_gradient",
            CalculatorId::VentMechanics => "vent_mechanics",
            CalculatorId::Rsbi => "rsbi",
            CalculatorId::DkaSeverity => "dka_severity",
            CalculatorId::ArdsBerlin => "ards_berlin",
            CalculatorId::SepsisBundle => "sepsis_bundle",
            CalculatorId::ShockIndexClass => "shock_index_class",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CalculatorId::ApacheIi => "APACHE II",
            CalculatorId::Sofa => "SOFA",
            CalculatorId::SofaSurrogate => "SOFA (partial data)",
            CalculatorId::KdigoAki => "KDIGO AKI stage",
            CalculatorId::Caprini => "Caprini VTE risk",
            CalculatorId::WellsPe => "Wells score for PE",
            CalculatorId::Perc => "PERC rule",
            CalculatorId::Map => "Mean arterial pressure",
            CalculatorId::ShockIndex => "Shock index",
            CalculatorId::ModifiedShockIndex => "Modified shock index",
            CalculatorId::StrokeVolume => "Stroke volume (LVOT VTI)",
            CalculatorId::CardiacOutput => "Cardiac output",
            CalculatorId::Svr => "Systemic vascular resistance",
            CalculatorId::PfRatio => "PaO2/FiO2 ratio",
            CalculatorId::AaGradient => "A-a oxygen gradient",
            CalculatorId::VentMechanics => "Ventilator mechanics",
            CalculatorId::Rsbi => "Rapid shallow breathing index",
            CalculatorId::DkaSeverity => "DKA severity",
            CalculatorId::ArdsBerlin => "ARDS (Berlin definition)",
            CalculatorId::SepsisBundle => "Sepsis bundle triggers",
            CalculatorId::ShockIndexClass => "Shock index class",
        }
    }
}

impl fmt::Display for CalculatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalculatorId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CalculatorId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| Error::UnknownCalculator(s.to_string()))
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// Declared input of a calculator. Informational: calculators re-check their
/// own inputs when they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct InputSpec {
    pub key: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

impl InputSpec {
    pub const fn required(key: &'static str, unit: &'static str) -> Self {
        Self {
            key,
            required: true,
            unit: Some(unit),
        }
    }

    pub const fn optional(key: &'static str, unit: &'static str) -> Self {
        Self {
            key,
            required: false,
            unit: Some(unit),
        }
    }

    /// Required unitless value (flag, enum text, count).
    pub const fn required_plain(key: &'static str) -> Self {
        Self {
            key,
            required: true,
            unit: None,
        }
    }

    pub const fn optional_plain(key: &'static str) -> Self {
        Self {
            key,
            required: false,
            unit: None,
        }
    }
}

/// Which field of a scored result is the headline value of the envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Headline {
    pub field: &'static str,
    pub unit: Option<&'static str>,
    pub precision: u32,
}

/// Entry point of a calculator
pub type RunFn = fn(&Inputs) -> Outcome;

/// A registered calculator.
#[derive(Clone)]
pub struct CalculatorDefinition {
    pub id: String,
    pub label: String,
    pub inputs: Vec<InputSpec>,
    pub headline: Headline,
    pub tables: &'static [&'static RangeTable],
    pub run: RunFn,
}

impl CalculatorDefinition {
    /// Definition for a built-in calculator, labelled from its id.
    pub fn builtin(id: CalculatorId, run: RunFn) -> Self {
        Self::custom(id.as_str(), id.label(), run)
    }

    /// Definition for a calculator outside the built-in set.
    pub fn custom(id: &str, label: &str, run: RunFn) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            inputs: Vec::new(),
            headline: Headline {
                field: "total",
                unit: None,
                precision: 0,
            },
            tables: &[],
            run,
        }
    }

    pub fn inputs(mut self, inputs: Vec<InputSpec>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn headline(mut self, field: &'static str, unit: Option<&'static str>, precision: u32) -> Self {
        self.headline = Headline {
            field,
            unit,
            precision,
        };
        self
    }

    pub fn tables(mut self, tables: &'static [&'static RangeTable]) -> Self {
        self.tables = tables;
        self
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.inputs.iter().filter(|spec| spec.required).map(|spec| spec.key)
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Other("Calculator has empty id".into()));
        }
        for table in self.tables {
            table.validate()?;
        }
        Ok(())
    }
}

impl fmt::Debug for CalculatorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculatorDefinition")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("inputs", &self.inputs)
            .field("headline", &self.headline)
            .field("tables", &self.tables.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of invoking a calculator through the registry.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The calculator's own result object
    Scored(serde_json::Value),
    /// Required inputs missing
    Needs(MissingFields),
    /// Inputs outside the formula's domain; serialized as `null`
    Undefined { reason: String },
}

impl Outcome {
    pub fn from_scored<T: Serialize>(result: Scored<T>) -> Self {
        match result {
            Ok(value) => match serde_json::to_value(&value) {
                Ok(json) => Outcome::Scored(json),
                Err(e) => Outcome::Undefined {
                    reason: format!("result could not be represented: {}", e),
                },
            },
            Err(unscored) => unscored.into(),
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, Outcome::Scored(_))
    }

    pub fn needs(&self) -> Option<&[String]> {
        match self {
            Outcome::Needs(fields) => Some(&fields.needs),
            _ => None,
        }
    }

    /// Top-level numeric field of a scored result.
    pub fn number(&self, field: &str) -> Option<f64> {
        match self {
            Outcome::Scored(json) => json.get(field).and_then(serde_json::Value::as_f64),
            _ => None,
        }
    }
}

impl From<Unscored> for Outcome {
    fn from(unscored: Unscored) -> Self {
        match unscored {
            Unscored::Needs(fields) => Outcome::Needs(fields),
            Unscored::Undefined { reason } => Outcome::Undefined { reason },
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Outcome::Scored(json) => json.serialize(serializer),
            Outcome::Needs(fields) => fields.serialize(serializer),
            Outcome::Undefined { .. } => serializer.serialize_none(),
        }
    }
}

/// Uniform result shape for integrations that do not know each calculator's
/// object. `detail` carries the full raw result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope {
    pub id: String,
    pub label: String,
    pub value: Option<f64>,
    pub unit: Option<&'static str>,
    pub precision: u32,
    pub notes: Vec<String>,
    pub detail: serde_json::Value,
}

impl Envelope {
    pub fn from_outcome(definition: &CalculatorDefinition, outcome: &Outcome) -> Self {
        let headline = definition.headline;
        let mut notes = Vec::new();

        let value = match outcome {
            Outcome::Scored(json) => {
                // Band, stage and class strings are surfaced as notes
                if let Some(fields) = json.as_object() {
                    for (key, field) in fields {
                        if let Some(text) = field.as_str() {
                            notes.push(format!("{}: {}", key, text));
                        }
                    }
                }
                json.get(headline.field)
                    .and_then(serde_json::Value::as_f64)
                    .map(|v| round_to(v, headline.precision))
            }
            Outcome::Needs(fields) => {
                notes.push(format!("missing: {}", fields));
                None
            }
            Outcome::Undefined { reason } => {
                notes.push(reason.clone());
                None
            }
        };

        Envelope {
            id: definition.id.clone(),
            label: definition.label.clone(),
            value,
            unit: headline.unit,
            precision: headline.precision,
            notes,
            detail: serde_json::to_value(outcome).unwrap_or(serde_json::Value::Null),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Collects definitions before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    definitions: BTreeMap<String, CalculatorDefinition>,
    replaced: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every calculator shipped with the crate.
    pub fn with_builtins(mut self) -> Self {
        for definition in calculators::definitions() {
            self = self.register(definition);
        }
        self
    }

    /// Add a definition. A definition already registered under the same id
    /// is replaced (last writer wins) and the id is recorded in
    /// [`RegistryBuilder::replaced`].
    pub fn register(mut self, definition: CalculatorDefinition) -> Self {
        let id = definition.id.clone();
        if self.definitions.insert(id.clone(), definition).is_some() {
            tracing::debug!("Replacing calculator definition '{}'", id);
            self.replaced.push(id);
        }
        self
    }

    /// Ids that were registered more than once, in replacement order.
    pub fn replaced(&self) -> &[String] {
        &self.replaced
    }

    /// Validate every definition and its tables, then freeze.
    pub fn build(self) -> Result<Registry> {
        for definition in self.definitions.values() {
            definition.validate()?;
        }
        tracing::debug!("Built calculator registry with {} definitions", self.definitions.len());
        Ok(Registry {
            definitions: self.definitions,
        })
    }
}

/// Read-only set of calculators keyed by id.
#[derive(Debug)]
pub struct Registry {
    definitions: BTreeMap<String, CalculatorDefinition>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry with every built-in calculator.
    pub fn with_builtins() -> Result<Self> {
        RegistryBuilder::new().with_builtins().build()
    }

    pub fn get(&self, id: &str) -> Result<&CalculatorDefinition> {
        self.definitions
            .get(id)
            .ok_or_else(|| Error::UnknownCalculator(id.to_string()))
    }

    /// Look up and invoke a calculator.
    pub fn run(&self, id: &str, inputs: &Inputs) -> Result<Outcome> {
        let definition = self.get(id)?;
        Ok((definition.run)(inputs))
    }

    /// Invoke a calculator and adapt its outcome into an [`Envelope`].
    pub fn envelope(&self, id: &str, inputs: &Inputs) -> Result<Envelope> {
        let definition = self.get(id)?;
        let outcome = (definition.run)(inputs);
        Ok(Envelope::from_outcome(definition, &outcome))
    }

    /// Definitions in id order
    pub fn definitions(&self) -> impl Iterator<Item = &CalculatorDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
