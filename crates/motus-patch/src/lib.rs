//! Patch documents for motus modulation graphs.
//!
//! This crate holds the patch data model and everything that writes to it: the
//! sanitizer that turns untrusted JSON into a well-formed patch, the editing
//! operations, and the [`PatchStore`] that owns the live patch and notifies
//! subscribers of changes.
//!
//! # Features
//!
//! - **Model**: nodes, edges, sources, routes, serialized as camelCase JSON
//! - **Sanitizer**: total, idempotent repair of arbitrary documents with a [`SanitizeReport`]
//! - **Editing**: cascading removals, duplicate-route merge, route reordering
//! - **Store**: atomic replace/update with typed change notifications and a bounded note log
//! - **Factory Patches**: built-in patches for common setups
//!
//! # Example
//!
//! ```rust
//! use motus_patch::{PatchStore, Route};
//! use motus_registry::TemplateRegistry;
//!
//! let registry = TemplateRegistry::new();
//! let mut store = PatchStore::new();
//!
//! store
//!     .try_edit(|patch| {
//!         let filter = patch.add_node(&registry, "filter")?;
//!         patch.connect(&filter, "out")?;
//!         let route = Route::new("", "pitch", format!("{filter}.cutoff")).with_range(200.0, 8000.0);
//!         patch.upsert_route(&registry, route)
//!     })
//!     .unwrap();
//!
//! let json = store.export_json().unwrap();
//! assert!(store.import_json(&json, &registry).unwrap().is_clean());
//! ```

mod edit;
mod error;
mod model;
mod sanitize;
mod store;

/// Built-in sensor sources.
pub mod sources;

/// Factory patches bundled with the library.
pub mod factory_patches;

pub use edit::RouteUpsert;
pub use error::PatchError;
pub use factory_patches::{
    FACTORY_PATCH_NAMES, factory_patch_description, factory_patch_json, factory_patch_names,
    factory_patches, get_factory_patch, is_factory_patch,
};
pub use model::{
    DEFAULT_RANGE, DEFAULT_ROUTE_SLEW_MS, Edge, Node, Op, ParamValue, Patch, Position, Route,
    Source, SourceKind, parse_target,
};
pub use sanitize::{Entity, Repair, SanitizeReport, sanitize, sanitize_str};
pub use sources::{DEFAULT_SOURCE_IDS, default_source, default_sources, is_default_source};
pub use store::{
    Change, DEFAULT_NOTE_LOG_CAPACITY, Note, PatchStore, Readout, Selection, StoreState,
    SubscriptionId, UiState,
};

/// Re-export commonly used types from motus-registry
pub use motus_registry::{SINK_ID, TemplateRegistry};
