//! In-process simulated backend.
//!
//! [`SimBackend`] builds [`SimUnit`]s whose parameters are [`SlewedBinding`]s and
//! whose modulator templates run a real [`Lfo`] or [`AdsrEnvelope`]. Nothing is
//! rendered; the backend exists so patches can be evaluated offline (CLI `run`)
//! and so tests can observe every backend mutation and disposal.
//!
//! A shared [`SimLedger`] counts unit instantiations and disposals so tests can
//! check that every unit is released exactly once.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use motus_core::{
    AdsrEnvelope, Backend, BackendError, Lfo, LfoWaveform, Modulator, ParameterBinding,
    SlewedBinding, Unit, UnitSpec,
};

use crate::TemplateRegistry;
use crate::template::NodeTemplate;

#[derive(Debug, Default)]
struct LedgerState {
    instantiated: usize,
    disposed: usize,
    repeated_disposals: usize,
    live: Vec<String>,
}

/// Shared record of unit lifecycles for one backend.
#[derive(Debug, Clone, Default)]
pub struct SimLedger {
    state: Rc<RefCell<LedgerState>>,
}

impl SimLedger {
    /// Units created so far.
    pub fn instantiated(&self) -> usize {
        self.state.borrow().instantiated
    }

    /// Units disposed so far.
    pub fn disposed(&self) -> usize {
        self.state.borrow().disposed
    }

    /// `dispose` calls on an already disposed unit.
    pub fn repeated_disposals(&self) -> usize {
        self.state.borrow().repeated_disposals
    }

    /// Node ids of units that are instantiated and not yet disposed.
    pub fn live(&self) -> Vec<String> {
        self.state.borrow().live.clone()
    }

    fn created(&self, node: &str) {
        let mut state = self.state.borrow_mut();
        state.instantiated += 1;
        state.live.push(node.to_string());
    }

    fn released(&self, node: &str) {
        let mut state = self.state.borrow_mut();
        state.disposed += 1;
        if let Some(pos) = state.live.iter().position(|n| n == node) {
            state.live.remove(pos);
        }
    }

    fn released_again(&self) {
        self.state.borrow_mut().repeated_disposals += 1;
    }
}

/// Modulation producer owned by a modulator unit.
#[derive(Debug, Clone)]
pub enum SimModulator {
    /// `lfo` template.
    Lfo(Lfo),
    /// `env` template.
    Env(AdsrEnvelope),
}

impl SimModulator {
    fn as_dyn(&self) -> &dyn Modulator {
        match self {
            SimModulator::Lfo(lfo) => lfo,
            SimModulator::Env(env) => env,
        }
    }

    fn as_dyn_mut(&mut self) -> &mut dyn Modulator {
        match self {
            SimModulator::Lfo(lfo) => lfo,
            SimModulator::Env(env) => env,
        }
    }
}

/// One simulated node.
#[derive(Debug)]
pub struct SimUnit {
    node_id: String,
    template: &'static str,
    bindings: Vec<(&'static str, SlewedBinding)>,
    modulator: Option<SimModulator>,
    ledger: SimLedger,
    disposed: bool,
}

impl SimUnit {
    fn new(spec: &UnitSpec<'_>, template: NodeTemplate, ledger: SimLedger) -> Self {
        let bindings = spec
            .params
            .iter()
            .map(|p| (p.name, SlewedBinding::new(p.value, p.slew_ms)))
            .collect();
        Self {
            node_id: spec.node_id.to_string(),
            template: template.id(),
            bindings,
            modulator: None,
            ledger,
            disposed: false,
        }
    }

    fn lfo(spec: &UnitSpec<'_>, template: NodeTemplate, ledger: SimLedger) -> Self {
        let mut unit = Self::new(spec, template, ledger);
        unit.modulator = Some(SimModulator::Lfo(Lfo::default()));
        unit.sync_modulator();
        unit
    }

    fn env(spec: &UnitSpec<'_>, template: NodeTemplate, ledger: SimLedger) -> Self {
        let mut unit = Self::new(spec, template, ledger);
        let mut env = AdsrEnvelope::new();
        // Fires on the first tick; `loop` keeps it cycling.
        env.trigger();
        unit.modulator = Some(SimModulator::Env(env));
        unit.sync_modulator();
        unit
    }

    fn plain(spec: &UnitSpec<'_>, template: NodeTemplate, ledger: SimLedger) -> Self {
        Self::new(spec, template, ledger)
    }

    /// Node id this unit was built for.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Template type key.
    pub fn template(&self) -> &'static str {
        self.template
    }

    /// Names of the unit's bindings.
    pub fn param_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.bindings.iter().map(|(name, _)| *name)
    }

    /// Whether `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn current(&self, name: &str) -> Option<f64> {
        self.bindings
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, b)| b.current())
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.current(name).map(|v| v >= 0.5)
    }

    /// Push the current (ramped) parameter values into the modulator.
    fn sync_modulator(&mut self) {
        let rate = self.current("rate");
        let depth = self.current("depth");
        let wave = self.current("wave");
        let bipolar = self.flag("bipolar");
        let attack = self.current("attack");
        let decay = self.current("decay");
        let sustain = self.current("sustain");
        let release = self.current("release");
        let looping = self.flag("loop");

        match &mut self.modulator {
            Some(SimModulator::Lfo(lfo)) => {
                if let Some(rate) = rate {
                    lfo.set_rate(rate);
                }
                if let Some(depth) = depth {
                    lfo.set_depth(depth);
                }
                if let Some(wave) = wave {
                    lfo.set_waveform(LfoWaveform::from_index(wave.max(0.0).round() as usize));
                }
                if let Some(bipolar) = bipolar {
                    lfo.set_bipolar(bipolar);
                }
            }
            Some(SimModulator::Env(env)) => {
                if let Some(ms) = attack {
                    env.set_attack_ms(ms);
                }
                if let Some(ms) = decay {
                    env.set_decay_ms(ms);
                }
                if let Some(level) = sustain {
                    env.set_sustain(level);
                }
                if let Some(ms) = release {
                    env.set_release_ms(ms);
                }
                if let Some(looping) = looping {
                    env.set_looping(looping);
                }
            }
            None => {}
        }
    }
}

impl Unit for SimUnit {
    fn binding(&self, param: &str) -> Option<&dyn ParameterBinding> {
        self.bindings
            .iter()
            .find(|(name, _)| *name == param)
            .map(|(_, b)| b as &dyn ParameterBinding)
    }

    fn binding_mut(&mut self, param: &str) -> Option<&mut dyn ParameterBinding> {
        self.bindings
            .iter_mut()
            .find(|(name, _)| *name == param)
            .map(|(_, b)| b as &mut dyn ParameterBinding)
    }

    fn modulator(&self) -> Option<&dyn Modulator> {
        self.modulator.as_ref().map(SimModulator::as_dyn)
    }

    fn modulator_mut(&mut self) -> Option<&mut dyn Modulator> {
        self.modulator.as_mut().map(SimModulator::as_dyn_mut)
    }

    fn advance(&mut self, now_ms: f64) {
        if self.disposed {
            return;
        }
        for (_, binding) in &mut self.bindings {
            binding.advance(now_ms);
        }
        self.sync_modulator();
        if let Some(modulator) = &mut self.modulator {
            modulator.as_dyn_mut().advance(now_ms);
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            self.ledger.released_again();
            return;
        }
        self.disposed = true;
        self.ledger.released(&self.node_id);
    }
}

/// Factory function type for building simulated units.
pub(crate) type UnitFactory = fn(&UnitSpec<'_>, NodeTemplate, SimLedger) -> SimUnit;

pub(crate) fn factory_for(template: NodeTemplate) -> UnitFactory {
    match template {
        NodeTemplate::Lfo => SimUnit::lfo,
        NodeTemplate::Env => SimUnit::env,
        _ => SimUnit::plain,
    }
}

/// Simulated backend.
///
/// # Example
///
/// ```rust
/// use motus_core::{Backend, UnitParam, UnitSpec};
/// use motus_registry::SimBackend;
///
/// let mut backend = SimBackend::new();
/// let spec = UnitSpec {
///     node_id: "n1",
///     template: "gain",
///     modulator: false,
///     params: vec![UnitParam { name: "level", value: 0.5, slew_ms: 0.0 }],
/// };
/// let mut unit = backend.instantiate(&spec).unwrap();
/// assert_eq!(unit.binding("level").unwrap().base(), 0.5);
///
/// unit.dispose();
/// assert_eq!(backend.ledger().disposed(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SimBackend {
    registry: TemplateRegistry,
    ledger: SimLedger,
    failing_nodes: HashSet<String>,
}

impl SimBackend {
    /// Create a backend for all built-in templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make instantiation fail for one node id.
    ///
    /// Builder pattern: used by tests to exercise per-node failure handling.
    pub fn with_failing_node(mut self, node_id: impl Into<String>) -> Self {
        self.failing_nodes.insert(node_id.into());
        self
    }

    /// Lifecycle ledger shared with every unit this backend builds.
    pub fn ledger(&self) -> SimLedger {
        self.ledger.clone()
    }
}

impl Backend for SimBackend {
    fn instantiate(&mut self, spec: &UnitSpec<'_>) -> Result<Box<dyn Unit>, BackendError> {
        let entry = self
            .registry
            .entry(spec.template)
            .ok_or_else(|| BackendError::UnknownTemplate(spec.template.to_string()))?;
        if self.failing_nodes.contains(spec.node_id) {
            return Err(BackendError::Instantiation {
                node: spec.node_id.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        let unit = (entry.factory)(spec, entry.descriptor.template, self.ledger.clone());
        self.ledger.created(spec.node_id);
        Ok(Box::new(unit))
    }
}
