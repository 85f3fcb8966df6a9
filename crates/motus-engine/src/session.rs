//! Store and engine wired together.
//!
//! A [`Session`] subscribes to its own [`PatchStore`]. Every patch change marks
//! the engine dirty; the next tick disposes the live graph and instantiates the
//! store's current patch before evaluating, so edits made between ticks are
//! picked up atomically.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use motus_core::{Backend, SensorFrame};
use motus_patch::{Change, PatchError, PatchStore, Readout, SanitizeReport, SubscriptionId};
use motus_registry::TemplateRegistry;
use tracing::debug;

use crate::config::EngineConfig;
use crate::instance::{EngineInstance, TickReport};
use crate::scheduler::TickSource;

/// A patch store driving an engine instance.
///
/// ```rust
/// use motus_core::SensorFrame;
/// use motus_engine::{EngineConfig, FixedStep, Session};
/// use motus_patch::get_factory_patch;
/// use motus_registry::{SimBackend, TemplateRegistry};
///
/// let registry = TemplateRegistry::new();
/// let mut session = Session::new(SimBackend::new(), EngineConfig::default());
/// session.store_mut().set_patch(get_factory_patch("tilt_filter", &registry).unwrap());
/// session.push_metrics(SensorFrame::from_pairs([("pitch", 30.0)]), 0.0);
///
/// let ticks = session.run(&mut FixedStep::new(0.0, 16.0).limit(10));
/// assert_eq!(ticks, 10);
/// assert!(session.store().ui().readouts.contains_key("pitch"));
/// ```
pub struct Session<B: Backend> {
    registry: TemplateRegistry,
    store: PatchStore,
    engine: EngineInstance<B>,
    dirty: Rc<Cell<bool>>,
    subscription: Option<SubscriptionId>,
}

impl<B: Backend> std::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("engine", &self.engine)
            .field("dirty", &self.dirty.get())
            .finish_non_exhaustive()
    }
}

impl<B: Backend> Session<B> {
    /// Create a session with an empty patch.
    pub fn new(backend: B, config: EngineConfig) -> Self {
        let config = config.sanitized();
        let mut store = PatchStore::with_note_capacity(config.note_log_capacity);
        let dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&dirty);
        let subscription = store.subscribe(move |change, _| {
            if change == Change::Patch {
                flag.set(true);
            }
        });
        Self {
            registry: TemplateRegistry::new(),
            store,
            engine: EngineInstance::new(backend, config),
            dirty,
            subscription: Some(subscription),
        }
    }

    /// Template registry used for imports and edits.
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// The store.
    pub fn store(&self) -> &PatchStore {
        &self.store
    }

    /// Mutable store; patch edits take effect on the next tick.
    pub fn store_mut(&mut self) -> &mut PatchStore {
        &mut self.store
    }

    /// The engine.
    pub fn engine(&self) -> &EngineInstance<B> {
        &self.engine
    }

    /// Whether the next tick will re-instantiate the patch.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Import a document into the store.
    ///
    /// # Errors
    ///
    /// See [`PatchStore::import_json`].
    pub fn import_json(&mut self, text: &str) -> Result<SanitizeReport, PatchError> {
        self.store.import_json(text, &self.registry)
    }

    /// Feed a sensor frame to the engine and record it in the store.
    pub fn push_metrics(&mut self, frame: SensorFrame, now_ms: f64) {
        self.engine.push_metrics(frame.clone(), now_ms);
        self.store.set_imu(frame);
    }

    fn sync(&mut self) {
        if !self.dirty.replace(false) {
            return;
        }
        let report = self.engine.apply_patch(self.store.patch());
        debug!(
            instantiated = report.instantiated.len(),
            skipped = report.skipped.len(),
            "session reapplied patch"
        );
    }

    /// Restart a modulator node of the current patch.
    pub fn trigger(&mut self, node_id: &str) -> bool {
        self.sync();
        self.engine.trigger(node_id)
    }

    /// Reapply if dirty, run one engine tick, then publish notes and readouts.
    pub fn tick(&mut self, now_ms: f64) -> TickReport {
        if self.engine.is_disposed() {
            return TickReport::default();
        }
        self.sync();
        let report = self.engine.tick(now_ms);

        for note in self.engine.take_notes() {
            self.store.append_note_log(note);
        }
        let readouts: BTreeMap<String, Readout> = self
            .engine
            .source_states()
            .into_iter()
            .map(|(id, state)| {
                let readout = Readout {
                    value: state.value,
                    normalized: state.normalized,
                };
                (id.to_owned(), readout)
            })
            .collect();
        // Rebuilt, not merged: sources dropped by a patch swap lose their readout.
        if self.store.ui().readouts != readouts {
            self.store.update_ui_state(|ui| ui.readouts = readouts);
        }
        report
    }

    /// Tick until `ticks` is exhausted. Returns the number of ticks run.
    pub fn run(&mut self, ticks: &mut impl TickSource) -> u64 {
        let mut count = 0;
        while let Some(now) = ticks.next_tick() {
            if self.engine.is_disposed() {
                break;
            }
            self.tick(now);
            count += 1;
        }
        count
    }

    /// Dispose the engine and stop listening to the store.
    pub fn dispose(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.store.unsubscribe(id);
        }
        self.engine.dispose();
    }
}
