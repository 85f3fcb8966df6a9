//! Motus Core - control-rate primitives for modulation routing
//!
//! This crate provides the leaf building blocks of the motus routing engine. Everything
//! here runs at control rate (once per scheduler tick, typically display refresh), not
//! at audio rate: values are `f64` and time is expressed in milliseconds.
//!
//! # Core Abstractions
//!
//! ## Parameters
//!
//! - [`ParamDescriptor`] - Declared domain of one template parameter ([`ParamKind`], range, options)
//! - [`ParamBase`] - A parameter's settable rest value (number, flag, or enum choice)
//! - [`ParameterBinding`] - Object-safe "set with optional ramp time" contract
//! - [`SlewedBinding`] - Binding with a linear ramp primitive
//! - [`SetterBinding`] - Binding without a ramp primitive (immediate external setter)
//!
//! ## Modulators
//!
//! - [`Modulator`] - Object-safe trait for tick-driven modulation producers
//! - [`Lfo`] - Control-rate low-frequency oscillator (5 waveforms)
//! - [`AdsrEnvelope`] - Triggerable attack-decay-sustain-release envelope
//!
//! ## Signal Conditioning
//!
//! - [`Pipe`] - Per-source conditioning configuration
//! - [`evaluate_pipe`] - Pure offset/scale → clamp → dead-zone → invert → curve → smooth → hysteresis
//! - [`Curve`] - Response curve shared by pipes and routes
//!
//! ## Backend Contract
//!
//! - [`Backend`] - Instantiates one opaque [`Unit`] per patch node from a [`UnitSpec`]
//! - [`Unit`] - Exposes named bindings and, for modulator templates, a [`Modulator`]
//!
//! ## Sensor Input
//!
//! - [`SensorFrame`] - One sample of externally supplied numeric metrics, with dotted-path lookup
//!
//! # Example
//!
//! ```rust
//! use motus_core::{Pipe, evaluate_pipe};
//!
//! let pipe = Pipe::default();
//! let state = evaluate_pipe(0.5, &pipe, None, 0.0);
//! assert!((state.normalized - 0.75).abs() < 1e-12);
//! ```
//!
//! # Design Principles
//!
//! - **Total**: no operation panics on hostile numeric input; non-finite values never
//!   escape into a binding
//! - **Pure where possible**: the pipeline is a function of its inputs and timestamp
//! - **Object-safe traits**: bindings and modulators are driven through `dyn` seams

pub mod backend;
pub mod envelope;
pub mod lfo;
pub mod math;
pub mod modulation;
pub mod param;
pub mod param_info;
pub mod pipe;
pub mod sensor;

pub use backend::{Backend, BackendError, Unit, UnitParam, UnitSpec};
pub use envelope::{AdsrEnvelope, EnvelopeState};
pub use lfo::{Lfo, LfoWaveform};
pub use math::{clamp_bounds, clamp01, finite_or, lerp};
pub use modulation::Modulator;
pub use param::{LinearRamp, ParameterBinding, SetterBinding, SlewedBinding};
pub use param_info::{ParamBase, ParamDefault, ParamDescriptor, ParamKind, is_frequency_name};
pub use pipe::{Curve, Pipe, PipeState, condition, evaluate_pipe};
pub use sensor::SensorFrame;
