//! The patch store: the single source of truth for the live patch.
//!
//! [`PatchStore`] owns the canonical [`Patch`] plus a small side-state (selection,
//! UI state, diagnostic note log, last sensor frame). Every mutation installs its
//! result whole and then synchronously notifies each subscriber with a [`Change`]
//! and a shared view of the new state, so a subscriber never sees a half-applied
//! update.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use motus_core::SensorFrame;
use motus_registry::TemplateRegistry;
use tracing::{debug, warn};

use crate::error::PatchError;
use crate::model::Patch;
use crate::sanitize::{SanitizeReport, sanitize_str};

/// Default number of note-log entries kept.
pub const DEFAULT_NOTE_LOG_CAPACITY: usize = 30;

/// Kind of state a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    /// The patch document was replaced.
    Patch,
    /// The selection changed.
    Selection,
    /// UI state changed (import error, readouts).
    Ui,
    /// A note was appended to the note log.
    NoteLog,
    /// A new sensor frame arrived.
    Imu,
}

/// Currently selected entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Selected node id.
    pub node: Option<String>,
    /// Selected route id.
    pub route: Option<String>,
    /// Selected source id.
    pub source: Option<String>,
}

/// Live reading of one source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Readout {
    /// Conditioned value before normalization.
    pub value: f64,
    /// Published 0..1 value.
    pub normalized: f64,
}

/// Auxiliary UI state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    /// Message of the last failed import, cleared by the next successful one.
    pub import_error: Option<String>,
    /// Latest readout per source id.
    pub readouts: BTreeMap<String, Readout>,
}

/// One diagnostic note-log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Tick time the note was written at.
    pub at_ms: f64,
    /// Human-readable message.
    pub message: String,
}

impl Note {
    /// Create a note.
    pub fn new(at_ms: f64, message: impl Into<String>) -> Self {
        Self {
            at_ms,
            message: message.into(),
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>9.1} ms] {}", self.at_ms, self.message)
    }
}

/// Everything the store holds.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    /// The live patch.
    pub patch: Patch,
    /// Selection.
    pub selection: Selection,
    /// UI state.
    pub ui: UiState,
    /// Most recent notes, oldest first.
    pub note_log: VecDeque<Note>,
    /// Last sensor frame.
    pub imu: SensorFrame,
}

/// Handle returned by [`PatchStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(Change, &StoreState)>;

/// Owner of the canonical patch and its side-state.
pub struct PatchStore {
    state: StoreState,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    note_capacity: usize,
}

impl Default for PatchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PatchStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchStore")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .field("note_capacity", &self.note_capacity)
            .finish()
    }
}

impl PatchStore {
    /// Empty store with the default note-log capacity.
    pub fn new() -> Self {
        Self::with_note_capacity(DEFAULT_NOTE_LOG_CAPACITY)
    }

    /// Empty store keeping at most `capacity` notes (at least one).
    pub fn with_note_capacity(capacity: usize) -> Self {
        Self {
            state: StoreState::default(),
            subscribers: Vec::new(),
            next_subscription: 0,
            note_capacity: capacity.max(1),
        }
    }

    /// Store holding `patch`.
    pub fn with_patch(patch: Patch) -> Self {
        let mut store = Self::new();
        store.state.patch = patch;
        store
    }

    /// Current state.
    pub fn state(&self) -> &StoreState {
        &self.state
    }

    /// Current patch.
    pub fn patch(&self) -> &Patch {
        &self.state.patch
    }

    /// Current selection.
    pub fn selection(&self) -> &Selection {
        &self.state.selection
    }

    /// Current UI state.
    pub fn ui(&self) -> &UiState {
        &self.state.ui
    }

    /// Note log, oldest first.
    pub fn note_log(&self) -> &VecDeque<Note> {
        &self.state.note_log
    }

    /// Last sensor frame.
    pub fn imu(&self) -> &SensorFrame {
        &self.state.imu
    }

    /// Register a change listener. It is called after every mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(Change, &StoreState) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self, change: Change) {
        for (_, listener) in &mut self.subscribers {
            listener(change, &self.state);
        }
    }

    /// Replace the whole patch.
    pub fn set_patch(&mut self, patch: Patch) {
        self.state.patch = patch;
        self.notify(Change::Patch);
    }

    /// Apply `updater` to a copy of the patch and install the result.
    ///
    /// Returning `None` leaves the store untouched and notifies nobody. Returns
    /// whether a new patch was installed.
    pub fn update_patch(&mut self, updater: impl FnOnce(Patch) -> Option<Patch>) -> bool {
        match updater(self.state.patch.clone()) {
            Some(patch) => {
                self.set_patch(patch);
                true
            }
            None => false,
        }
    }

    /// Run a fallible edit on a copy of the patch, installing it only on success.
    ///
    /// # Errors
    ///
    /// Whatever `edit` returns; the live patch is then unchanged.
    pub fn try_edit<T>(&mut self, edit: impl FnOnce(&mut Patch) -> Result<T, PatchError>) -> Result<T, PatchError> {
        let mut draft = self.state.patch.clone();
        let out = edit(&mut draft)?;
        self.set_patch(draft);
        Ok(out)
    }

    /// Mutate the selection.
    pub fn update_selection(&mut self, update: impl FnOnce(&mut Selection)) {
        update(&mut self.state.selection);
        self.notify(Change::Selection);
    }

    /// Mutate UI state.
    pub fn update_ui_state(&mut self, update: impl FnOnce(&mut UiState)) {
        update(&mut self.state.ui);
        self.notify(Change::Ui);
    }

    /// Append a note, dropping the oldest beyond capacity.
    pub fn append_note_log(&mut self, note: Note) {
        while self.state.note_log.len() >= self.note_capacity {
            self.state.note_log.pop_front();
        }
        self.state.note_log.push_back(note);
        self.notify(Change::NoteLog);
    }

    /// Record the latest sensor frame.
    pub fn set_imu(&mut self, frame: SensorFrame) {
        self.state.imu = frame;
        self.notify(Change::Imu);
    }

    /// Import a patch document, passing it through the sanitizer.
    ///
    /// On success the patch is replaced and any previous import error cleared. On
    /// failure the live patch is kept and `ui.import_error` records the message.
    ///
    /// # Errors
    ///
    /// [`PatchError::Json`] for a syntax error, [`PatchError::NotAnObject`] when the
    /// top-level value is not an object.
    pub fn import_json(&mut self, text: &str, registry: &TemplateRegistry) -> Result<SanitizeReport, PatchError> {
        match sanitize_str(text, registry) {
            Ok((patch, report)) => {
                debug!(
                    nodes = patch.nodes.len(),
                    routes = patch.routes.len(),
                    repairs = report.len(),
                    "patch imported"
                );
                self.set_patch(patch);
                if self.state.ui.import_error.is_some() {
                    self.update_ui_state(|ui| ui.import_error = None);
                }
                Ok(report)
            }
            Err(err) => {
                warn!(error = %err, "patch import rejected, keeping previous patch");
                let message = err.to_string();
                self.update_ui_state(|ui| ui.import_error = Some(message));
                Err(err)
            }
        }
    }

    /// Serialize the live patch.
    ///
    /// # Errors
    ///
    /// [`PatchError::Json`] if serialization fails.
    pub fn export_json(&self) -> Result<String, PatchError> {
        self.state.patch.to_json()
    }
}
