//! Modulator abstraction for tick-driven modulation producers.
//!
//! A modulator is a backend unit whose output is read by the routing engine rather
//! than heard: LFOs and envelope generators. The engine advances every modulator
//! once per tick, before any route is evaluated, then reads [`Modulator::value`].
//!
//! Bipolar sources (LFO, -1 to 1) and unipolar sources (envelope, 0 to 1) are
//! reconciled by [`Modulator::unipolar_value`] so that routes fed directly from a
//! modulator node always receive a 0..1 value.

/// Trait for anything that can generate modulation signals at control rate.
///
/// # Example
///
/// ```rust
/// use motus_core::{Lfo, Modulator};
///
/// let mut lfo = Lfo::new(2.0);
/// let value = lfo.advance(125.0);
/// assert!((-1.0..=1.0).contains(&value));
/// assert!((0.0..=1.0).contains(&lfo.unipolar_value()));
/// ```
pub trait Modulator {
    /// Advance to `now_ms` and return the new output.
    fn advance(&mut self, now_ms: f64) -> f64;

    /// Current output without advancing.
    fn value(&self) -> f64;

    /// Check if this source is bipolar (-1 to 1) or unipolar (0 to 1).
    fn is_bipolar(&self) -> bool;

    /// Restart the modulator (envelope attack, LFO phase reset).
    fn trigger(&mut self) {}

    /// Reset to the initial state.
    fn reset(&mut self);

    /// Current output mapped to 0..1 regardless of polarity.
    fn unipolar_value(&self) -> f64 {
        let value = self.value();
        let unit = if self.is_bipolar() {
            (value + 1.0) * 0.5
        } else {
            value
        };
        crate::clamp01(unit)
    }
}
