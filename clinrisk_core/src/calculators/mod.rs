//! Built-in scoring calculators.
//!
//! Every calculator is a pure function of its inputs. Scores built from
//! banded tables return `Scored<T>`; closed-form formulas return `Option<f64>`
//! from their typed helpers and are wrapped for the registry.

pub mod apache_ii;
pub mod caprini;
pub mod composite;
pub mod hemodynamics;
pub mod kdigo;
pub mod pulmonary_embolism;
pub mod sofa;
pub mod ventilation;

use crate::registry::CalculatorDefinition;

/// Definitions contributed by every calculator module, in registration order.
pub fn definitions() -> Vec<CalculatorDefinition> {
    let mut definitions = Vec::new();
    definitions.extend(apache_ii::definitions());
    definitions.extend(sofa::definitions());
    definitions.extend(kdigo::definitions());
    definitions.extend(caprini::definitions());
    definitions.extend(pulmonary_embolism::definitions());
    definitions.extend(hemodynamics::definitions());
    definitions.extend(ventilation::definitions());
    definitions.extend(composite::definitions());
    definitions
}
