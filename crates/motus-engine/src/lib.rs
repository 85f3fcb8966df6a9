//! Tick-driven routing engine for motus patches.
//!
//! An [`EngineInstance`] instantiates a patch on a [`Backend`](motus_core::Backend),
//! conditions incoming sensor frames into source values, and once per tick folds
//! every route into its target parameter. A [`Session`] ties an engine to a
//! [`PatchStore`](motus_patch::PatchStore) so that store edits are picked up on
//! the next tick.
//!
//! # Features
//!
//! - **Lifecycle**: apply replaces the whole graph; dispose releases each unit exactly once
//! - **Routing**: per-route polarity, dead-zone, curve, smoothing and range, combined
//!   in stored order with `add`, `multiply`, `ring` or `crossfade`
//! - **Tick Sources**: [`FixedStep`] for deterministic runs, [`IntervalTicks`] for
//!   wall-clock cadence
//! - **Diagnostics**: large frequency excursions become note-log entries
//!
//! # Example
//!
//! ```rust
//! use motus_core::SensorFrame;
//! use motus_engine::{EngineConfig, EngineInstance};
//! use motus_patch::{Patch, Route, Source};
//! use motus_registry::{SimBackend, TemplateRegistry};
//!
//! let registry = TemplateRegistry::new();
//! let mut patch = Patch::new();
//! let osc = patch.add_node(&registry, "osc").unwrap();
//! patch.add_source(&registry, &Source::imu("s", "x", "X")).unwrap();
//! patch
//!     .upsert_route(&registry, Route::new("", "s", format!("{osc}.detune")).with_range(0.0, 1000.0))
//!     .unwrap();
//!
//! let mut engine = EngineInstance::new(SimBackend::new(), EngineConfig::default());
//! engine.apply_patch(&patch);
//! engine.push_metrics(SensorFrame::from_pairs([("x", 0.5)]), 0.0);
//! engine.tick(0.0);
//!
//! let detune = engine.binding(&osc, "detune").unwrap();
//! assert!((detune.last_value() - 750.0).abs() < 1e-9);
//! ```

mod config;
mod instance;
mod session;

pub mod routing;
pub mod scheduler;

pub use config::EngineConfig;
pub use instance::{ApplyReport, EngineInstance, TickReport};
pub use routing::{
    FrequencyExcursion, PassContext, RouteValue, RoutingOutcome, TargetInfo, TargetValue,
    combine, fold_routes, map_route,
};
pub use scheduler::{FixedStep, IntervalTicks, TickSource};
pub use session::Session;
