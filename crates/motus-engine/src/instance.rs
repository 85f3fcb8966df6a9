//! A live, instantiated patch.
//!
//! [`EngineInstance`] owns the backend units built from one patch, the runtime
//! state of every source, and the per-route conditioning state. Its lifecycle is
//! explicit:
//!
//! - [`apply_patch`](EngineInstance::apply_patch) disposes everything built from
//!   the previous patch, then instantiates the new one node by node
//! - [`push_metrics`](EngineInstance::push_metrics) conditions a sensor frame into
//!   source state as soon as it arrives (last value wins)
//! - [`tick`](EngineInstance::tick) advances every unit and modulator, re-conditions
//!   every source at the tick time, then runs the routing pass
//! - [`dispose`](EngineInstance::dispose) releases every unit exactly once; it also
//!   runs on drop
//!
//! Unknown templates, failed instantiations and unresolved routes are skipped and
//! logged; the engine itself never fails.

use std::collections::HashMap;

use motus_core::{
    Backend, ParameterBinding, PipeState, SensorFrame, Unit, UnitParam, UnitSpec,
    evaluate_pipe,
};
use motus_patch::{Note, Patch, Source, SourceKind, default_sources};
use motus_registry::TemplateRegistry;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::routing::{PassContext, TargetInfo, fold_routes};

/// One instantiated node.
struct LiveUnit {
    node_id: String,
    template: String,
    unit: Box<dyn Unit>,
}

/// Result of [`EngineInstance::apply_patch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Nodes that now have a live unit.
    pub instantiated: Vec<String>,
    /// `(node_id, reason)` for nodes that were skipped.
    pub skipped: Vec<(String, String)>,
}

/// Result of one [`EngineInstance::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Routes folded into a target.
    pub routes_applied: usize,
    /// Routes whose source or target did not resolve.
    pub routes_skipped: usize,
    /// Targets written through their binding.
    pub targets_written: usize,
}

/// An instantiated patch driven by ticks.
pub struct EngineInstance<B: Backend> {
    backend: B,
    config: EngineConfig,
    registry: TemplateRegistry,
    patch: Patch,
    units: Vec<LiveUnit>,
    source_states: HashMap<String, PipeState>,
    route_states: HashMap<String, PipeState>,
    /// Last finite raw reading per sensor-backed source.
    readings: HashMap<String, f64>,
    metrics: SensorFrame,
    now_ms: f64,
    pending_notes: Vec<Note>,
    disposed: bool,
}

impl<B: Backend> std::fmt::Debug for EngineInstance<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineInstance")
            .field("config", &self.config)
            .field("units", &self.units.iter().map(|u| &u.node_id).collect::<Vec<_>>())
            .field("routes", &self.patch.routes.len())
            .field("now_ms", &self.now_ms)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> EngineInstance<B> {
    /// Create an empty engine over `backend`.
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self {
            backend,
            config: config.sanitized(),
            registry: TemplateRegistry::new(),
            patch: Patch::new(),
            units: Vec::new(),
            source_states: HashMap::new(),
            route_states: HashMap::new(),
            readings: HashMap::new(),
            metrics: SensorFrame::new(),
            now_ms: 0.0,
            pending_notes: Vec::new(),
            disposed: false,
        }
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The patch currently instantiated.
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// Time of the last tick or sensor frame.
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Node ids with a live unit, in patch order.
    pub fn live_nodes(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|u| u.node_id.as_str())
    }

    /// Live unit for a node.
    pub fn unit(&self, node_id: &str) -> Option<&dyn Unit> {
        self.units
            .iter()
            .find(|u| u.node_id == node_id)
            .map(|u| u.unit.as_ref())
    }

    /// Binding of one node parameter.
    pub fn binding(&self, node_id: &str, param: &str) -> Option<&dyn ParameterBinding> {
        self.unit(node_id)?.binding(param)
    }

    /// Runtime state of a source.
    pub fn source_state(&self, id: &str) -> Option<&PipeState> {
        self.source_states.get(id)
    }

    /// Every source with runtime state, sorted by id.
    pub fn source_states(&self) -> Vec<(&str, &PipeState)> {
        let mut states: Vec<_> = self
            .source_states
            .iter()
            .map(|(id, state)| (id.as_str(), state))
            .collect();
        states.sort_by(|a, b| a.0.cmp(b.0));
        states
    }

    /// Take the notes produced since the last call.
    pub fn take_notes(&mut self) -> Vec<Note> {
        std::mem::take(&mut self.pending_notes)
    }

    /// Replace the live graph with `patch`.
    ///
    /// Every unit of the previous patch is disposed before any new unit is built.
    /// Nodes whose template is unknown or whose instantiation fails are skipped;
    /// the rest of the patch still comes up. Does nothing once disposed.
    pub fn apply_patch(&mut self, patch: &Patch) -> ApplyReport {
        let mut report = ApplyReport::default();
        if self.disposed {
            warn!("apply_patch on a disposed engine ignored");
            return report;
        }
        self.release_units();
        self.source_states.clear();
        self.route_states.clear();
        self.readings.clear();
        self.patch = patch.clone();

        for node in &patch.nodes {
            let Some(descriptor) = self.registry.get(&node.template) else {
                debug!(node = %node.id, template = %node.template, "unknown template, node skipped");
                report
                    .skipped
                    .push((node.id.clone(), format!("unknown template '{}'", node.template)));
                continue;
            };
            let params = descriptor
                .params
                .iter()
                .map(|desc| {
                    let stored = node.param(desc.name);
                    let base = stored.map_or_else(|| desc.default_base(), |p| desc.normalize(&p.base));
                    UnitParam {
                        name: desc.name,
                        value: desc.control_value(&base),
                        slew_ms: stored.map_or(desc.slew_ms, |p| p.slew_ms),
                    }
                })
                .collect();
            let spec = UnitSpec {
                node_id: &node.id,
                template: descriptor.id,
                modulator: descriptor.modulator,
                params,
            };
            match self.backend.instantiate(&spec) {
                Ok(unit) => {
                    self.units.push(LiveUnit {
                        node_id: node.id.clone(),
                        template: node.template.clone(),
                        unit,
                    });
                    report.instantiated.push(node.id.clone());
                }
                Err(err) => {
                    warn!(node = %node.id, error = %err, "instantiation failed, node skipped");
                    report.skipped.push((node.id.clone(), err.to_string()));
                }
            }
        }

        if !self.metrics.is_empty() {
            self.ingest(self.now_ms);
        }
        debug!(
            units = self.units.len(),
            skipped = report.skipped.len(),
            routes = patch.routes.len(),
            "patch applied"
        );
        report
    }

    /// Condition a sensor frame into every sensor-backed source.
    ///
    /// Sources whose metric is absent from the frame keep their last reading.
    pub fn push_metrics(&mut self, frame: SensorFrame, now_ms: f64) {
        if self.disposed {
            return;
        }
        self.metrics = frame;
        if now_ms.is_finite() {
            self.now_ms = self.now_ms.max(now_ms);
        }
        self.ingest(now_ms);
    }

    fn sensor_sources(&self) -> impl Iterator<Item = &Source> {
        let patch_sources = self.patch.sources.iter().filter(|s| s.kind == SourceKind::Imu);
        let defaults = default_sources()
            .iter()
            .filter(|d| self.patch.source(&d.id).is_none());
        defaults.chain(patch_sources)
    }

    fn ingest(&mut self, now_ms: f64) {
        let fresh: Vec<(String, f64)> = self
            .sensor_sources()
            .filter_map(|source| {
                let raw = self.metrics.metric(&source.metric)?;
                raw.is_finite().then(|| (source.id.clone(), raw))
            })
            .collect();
        self.readings.extend(fresh);
        self.evaluate_sensor_sources(now_ms);
    }

    /// Re-run the pipe of every sensor-backed source on its last reading, so
    /// smoothing keeps moving between samples.
    fn evaluate_sensor_sources(&mut self, now_ms: f64) {
        let updates: Vec<(String, PipeState)> = self
            .sensor_sources()
            .filter_map(|source| {
                let raw = *self.readings.get(&source.id)?;
                let prev = self.source_states.get(&source.id);
                Some((source.id.clone(), evaluate_pipe(raw, &source.pipe, prev, now_ms)))
            })
            .collect();
        self.source_states.extend(updates);
    }

    /// Restart a modulator node (envelope attack, LFO phase). Returns whether the
    /// node has a live modulator.
    pub fn trigger(&mut self, node_id: &str) -> bool {
        let Some(modulator) = self
            .units
            .iter_mut()
            .find(|u| u.node_id == node_id)
            .and_then(|u| u.unit.modulator_mut())
        else {
            return false;
        };
        modulator.trigger();
        true
    }

    /// Run one tick at `now_ms`.
    ///
    /// Every unit (and so every modulator) advances and every source is
    /// re-conditioned before any route is read.
    pub fn tick(&mut self, now_ms: f64) -> TickReport {
        if self.disposed {
            return TickReport::default();
        }
        let now_ms = if now_ms.is_finite() { now_ms } else { self.now_ms };
        self.now_ms = now_ms;

        for live in &mut self.units {
            live.unit.advance(now_ms);
        }
        self.evaluate_sensor_sources(now_ms);
        self.evaluate_modulator_sources(now_ms);
        self.apply_routes(now_ms)
    }

    fn evaluate_modulator_sources(&mut self, now_ms: f64) {
        for source in &self.patch.sources {
            let Some(node_id) = source.backing_node() else {
                continue;
            };
            let Some(raw) = self
                .units
                .iter()
                .find(|u| u.node_id == node_id)
                .and_then(|u| u.unit.modulator())
                .map(|m| m.value())
            else {
                continue;
            };
            let prev = self.source_states.get(&source.id);
            let state = evaluate_pipe(raw, &source.pipe, prev, now_ms);
            self.source_states.insert(source.id.clone(), state);
        }
    }

    fn apply_routes(&mut self, now_ms: f64) -> TickReport {
        let Self {
            config,
            registry,
            patch,
            units,
            source_states,
            route_states,
            pending_notes,
            ..
        } = self;

        let ctx = PassContext {
            now_ms,
            freq_note_threshold: config.freq_note_threshold,
        };
        let slew_floor = config.default_binding_slew_ms;
        let units_ref: &Vec<LiveUnit> = units;

        let source = |src: &str| -> Option<f64> {
            if let Some(state) = source_states.get(src) {
                return Some(state.normalized);
            }
            units_ref
                .iter()
                .find(|u| u.node_id == src)
                .and_then(|u| u.unit.modulator())
                .map(|m| m.unipolar_value())
        };
        let target = |node_id: &str, param: &str| -> Option<TargetInfo> {
            let live = units_ref.iter().find(|u| u.node_id == node_id)?;
            let desc = registry.param(&live.template, param)?;
            let binding = live.unit.binding(param)?;
            Some(TargetInfo {
                base: binding.base(),
                slew_floor_ms: binding.default_slew_ms().max(slew_floor),
                frequency_like: desc.is_frequency_like(),
                domain: (desc.min, desc.max),
            })
        };
        let outcome = fold_routes(&patch.routes, ctx, route_states, source, target);

        for excursion in &outcome.excursions {
            pending_notes.push(Note::new(
                now_ms,
                format!(
                    "{} via {}: {:.1} Hz is {:.1} Hz from base {:.1} Hz",
                    excursion.target,
                    excursion.route,
                    excursion.mapped,
                    excursion.mapped - excursion.base,
                    excursion.base
                ),
            ));
        }

        let mut written = 0;
        for value in &outcome.targets {
            let binding = units
                .iter_mut()
                .find(|u| u.node_id == value.node_id)
                .and_then(|u| u.unit.binding_mut(value.param));
            if let Some(binding) = binding {
                binding.apply(value.value, value.slew_ms);
                written += 1;
            }
        }

        let routes_skipped = outcome.skipped;
        if routes_skipped > 0 {
            debug!(skipped = routes_skipped, "unresolved routes skipped");
        }
        TickReport {
            routes_applied: patch.routes.len() - routes_skipped,
            routes_skipped,
            targets_written: written,
        }
    }

    fn release_units(&mut self) {
        for mut live in self.units.drain(..) {
            live.unit.dispose();
        }
    }

    /// Release every backend unit. Later calls (and drop) do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let count = self.units.len();
        self.release_units();
        self.source_states.clear();
        self.route_states.clear();
        self.readings.clear();
        self.disposed = true;
        debug!(units = count, "engine disposed");
    }
}

impl<B: Backend> Drop for EngineInstance<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
