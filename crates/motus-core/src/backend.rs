//! Sound backend contract.
//!
//! The routing engine never inspects a backend's signal chain. For each patch node it
//! asks a [`Backend`] to instantiate an opaque [`Unit`], described by a [`UnitSpec`],
//! and afterwards talks to that unit only through its named
//! [`ParameterBinding`]s and, for modulator templates, its [`Modulator`].
//!
//! Units are owned by the engine. [`Unit::dispose`] is called exactly once, when the
//! engine swaps patches or shuts down; backends release their resources there.

use thiserror::Error;

use crate::modulation::Modulator;
use crate::param::ParameterBinding;

/// Errors a backend may report while instantiating a unit.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    /// The backend has no implementation for this template.
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    /// The backend failed to build a unit for one node.
    #[error("failed to instantiate node '{node}': {reason}")]
    Instantiation {
        /// Node id.
        node: String,
        /// Backend-specific reason.
        reason: String,
    },
}

/// Initial value of one parameter handed to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitParam {
    /// Parameter name as declared by the template.
    pub name: &'static str,
    /// Control value (selects as option index, booleans as 0/1).
    pub value: f64,
    /// Default ramp duration for the parameter's binding.
    pub slew_ms: f64,
}

/// Everything a backend needs to build one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSpec<'a> {
    /// Patch node id.
    pub node_id: &'a str,
    /// Template type key (`"filter"`, `"lfo"`, ...).
    pub template: &'a str,
    /// Whether the template is a modulator (`lfo`, `env`).
    pub modulator: bool,
    /// Initial parameter values in template declaration order.
    pub params: Vec<UnitParam>,
}

/// One instantiated backend unit.
pub trait Unit {
    /// Binding for a named parameter.
    fn binding(&self, param: &str) -> Option<&dyn ParameterBinding>;

    /// Mutable binding for a named parameter.
    fn binding_mut(&mut self, param: &str) -> Option<&mut dyn ParameterBinding>;

    /// Modulator output for modulator templates.
    fn modulator(&self) -> Option<&dyn Modulator> {
        None
    }

    /// Mutable modulator, used to advance and trigger it.
    fn modulator_mut(&mut self) -> Option<&mut dyn Modulator> {
        None
    }

    /// Progress ramps (and modulators) to `now_ms`.
    fn advance(&mut self, now_ms: f64);

    /// Release backend resources. Called once per unit.
    fn dispose(&mut self);
}

/// Factory for backend units.
pub trait Backend {
    /// Build a unit for one node.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the template is unsupported or the backend
    /// cannot build the unit; the engine skips that node.
    fn instantiate(&mut self, spec: &UnitSpec<'_>) -> Result<Box<dyn Unit>, BackendError>;
}
