//! Parameter bindings: the seam between the routing engine and a sound backend.
//!
//! A [`ParameterBinding`] wraps one backend-controllable value and exposes a single
//! "set with optional ramp time" contract. The routing engine only ever talks to
//! bindings, so it never needs to know how a backend represents its parameters.
//!
//! Two implementations are provided:
//!
//! - [`SlewedBinding`] - the backend has a ramp primitive; values move linearly
//!   over the requested slew time ([`LinearRamp`])
//! - [`SetterBinding`] - the backend only offers an immediate setter; the slew
//!   time is ignored and the setter is called once per `apply`
//!
//! Both record their rest value ([`base`](ParameterBinding::base)), the last commanded
//! value, and how many backend mutations they have issued.
//!
//! ## Usage
//!
//! ```rust
//! use motus_core::{ParameterBinding, SlewedBinding};
//!
//! let mut cutoff = SlewedBinding::new(1000.0, 20.0);
//! cutoff.apply(2000.0, 100.0); // ramp to 2 kHz over 100 ms
//!
//! cutoff.advance(50.0);
//! assert!((cutoff.current() - 1500.0).abs() < 1e-9);
//! assert_eq!(cutoff.last_value(), 2000.0);
//! ```

use std::fmt;

/// Object-safe contract for one controllable backend parameter.
pub trait ParameterBinding {
    /// Request the backend move to `value` over `slew_ms` milliseconds (0 ⇒ immediate).
    ///
    /// Every call is exactly one backend mutation.
    fn apply(&mut self, value: f64, slew_ms: f64);

    /// Record `value` as the authoritative rest state and apply it with the
    /// binding's default slew.
    fn set_base(&mut self, value: f64);

    /// The recorded rest value the combination engine ramps away from and back to.
    fn base(&self) -> f64;

    /// The last value commanded through [`apply`](Self::apply) or [`set_base`](Self::set_base).
    fn last_value(&self) -> f64;

    /// Ramp duration used when no route asks for a longer one.
    fn default_slew_ms(&self) -> f64;

    /// Number of backend mutation calls issued so far.
    fn mutation_count(&self) -> u64;

    /// Progress any in-flight ramp to `now_ms`. Bindings without a ramp ignore this.
    fn advance(&mut self, _now_ms: f64) {}
}

/// A linear ramp over wall time.
///
/// Control-rate counterpart of a sample-counted linear smoother: the ramp is
/// anchored at the time of the last [`set_target`](Self::set_target) and sampled
/// by [`advance`](Self::advance) at arbitrary timestamps.
#[derive(Debug, Clone)]
pub struct LinearRamp {
    current: f64,
    start: f64,
    target: f64,
    /// Time of the most recent `advance`, used as the start of new ramps.
    now_ms: f64,
    start_ms: f64,
    duration_ms: f64,
}

impl LinearRamp {
    /// Create a settled ramp at `initial`.
    pub fn new(initial: f64) -> Self {
        Self {
            current: initial,
            start: initial,
            target: initial,
            now_ms: 0.0,
            start_ms: 0.0,
            duration_ms: 0.0,
        }
    }

    /// Start a ramp from the current value to `target` over `duration_ms`.
    pub fn set_target(&mut self, target: f64, duration_ms: f64) {
        if !duration_ms.is_finite() || duration_ms <= 0.0 {
            self.set_immediate(target);
            return;
        }
        self.start = self.current;
        self.target = target;
        self.start_ms = self.now_ms;
        self.duration_ms = duration_ms;
    }

    /// Jump to `value` with no ramp.
    pub fn set_immediate(&mut self, value: f64) {
        self.current = value;
        self.start = value;
        self.target = value;
        self.duration_ms = 0.0;
    }

    /// Sample the ramp at `now_ms` and return the current value.
    ///
    /// Timestamps that move backwards are ignored.
    pub fn advance(&mut self, now_ms: f64) -> f64 {
        if now_ms.is_finite() && now_ms > self.now_ms {
            self.now_ms = now_ms;
        }
        if self.duration_ms > 0.0 {
            let t = (self.now_ms - self.start_ms) / self.duration_ms;
            if t >= 1.0 {
                self.current = self.target;
                self.duration_ms = 0.0;
            } else {
                self.current = self.start + (self.target - self.start) * t.max(0.0);
            }
        }
        self.current
    }

    /// Current value without advancing.
    #[inline]
    pub fn get(&self) -> f64 {
        self.current
    }

    /// Target value.
    #[inline]
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Check if the ramp has reached its target.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.duration_ms == 0.0
    }
}

impl Default for LinearRamp {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Binding backed by a ramp primitive.
#[derive(Debug, Clone)]
pub struct SlewedBinding {
    ramp: LinearRamp,
    base: f64,
    last: f64,
    default_slew_ms: f64,
    mutations: u64,
}

impl SlewedBinding {
    /// Create a binding resting at `base` with a default slew.
    ///
    /// Creation is not a backend mutation; the backend unit starts at `base`.
    pub fn new(base: f64, default_slew_ms: f64) -> Self {
        Self {
            ramp: LinearRamp::new(base),
            base,
            last: base,
            default_slew_ms: default_slew_ms.max(0.0),
            mutations: 0,
        }
    }

    /// Current (possibly mid-ramp) value.
    pub fn current(&self) -> f64 {
        self.ramp.get()
    }

    /// Returns `true` when no ramp is in flight.
    pub fn is_settled(&self) -> bool {
        self.ramp.is_settled()
    }
}

impl ParameterBinding for SlewedBinding {
    fn apply(&mut self, value: f64, slew_ms: f64) {
        if !value.is_finite() {
            return;
        }
        self.ramp.set_target(value, slew_ms);
        self.last = value;
        self.mutations += 1;
    }

    fn set_base(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.base = value;
        self.apply(value, self.default_slew_ms);
    }

    fn base(&self) -> f64 {
        self.base
    }

    fn last_value(&self) -> f64 {
        self.last
    }

    fn default_slew_ms(&self) -> f64 {
        self.default_slew_ms
    }

    fn mutation_count(&self) -> u64 {
        self.mutations
    }

    fn advance(&mut self, now_ms: f64) {
        self.ramp.advance(now_ms);
    }
}

/// Binding for backends with no ramp primitive: every `apply` calls the setter
/// immediately and the slew time is ignored.
pub struct SetterBinding {
    setter: Box<dyn FnMut(f64)>,
    base: f64,
    last: f64,
    default_slew_ms: f64,
    mutations: u64,
}

impl SetterBinding {
    /// Wrap an external setter. The binding starts resting at `base`.
    pub fn new(base: f64, setter: impl FnMut(f64) + 'static) -> Self {
        Self {
            setter: Box::new(setter),
            base,
            last: base,
            default_slew_ms: 0.0,
            mutations: 0,
        }
    }
}

impl fmt::Debug for SetterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetterBinding")
            .field("base", &self.base)
            .field("last", &self.last)
            .field("mutations", &self.mutations)
            .finish_non_exhaustive()
    }
}

impl ParameterBinding for SetterBinding {
    fn apply(&mut self, value: f64, _slew_ms: f64) {
        if !value.is_finite() {
            return;
        }
        (self.setter)(value);
        self.last = value;
        self.mutations += 1;
    }

    fn set_base(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.base = value;
        self.apply(value, 0.0);
    }

    fn base(&self) -> f64 {
        self.base
    }

    fn last_value(&self) -> f64 {
        self.last
    }

    fn default_slew_ms(&self) -> f64 {
        self.default_slew_ms
    }

    fn mutation_count(&self) -> u64 {
        self.mutations
    }
}
