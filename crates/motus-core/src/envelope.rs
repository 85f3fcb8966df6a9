//! ADSR envelope generator driven by wall time.
//!
//! Segments are linear in time so that an envelope sampled at display-refresh
//! cadence still reaches its peak and sustain exactly on schedule. The envelope
//! is the `env` template's modulator: [`Modulator::trigger`] starts a one-shot
//! cycle (attack, decay, then release once decay completes), while
//! [`gate_on`](AdsrEnvelope::gate_on)/[`gate_off`](AdsrEnvelope::gate_off) hold the
//! sustain stage for as long as the gate is open.

use crate::modulation::Modulator;

/// ADSR envelope states
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeState {
    /// Envelope is inactive: output is zero.
    #[default]
    Idle,
    /// Attack phase: output ramps up toward peak level.
    Attack,
    /// Decay phase: output falls from peak toward sustain level.
    Decay,
    /// Sustain phase: output holds at sustain level while gate is held.
    Sustain,
    /// Release phase: output decays to zero after gate release.
    Release,
}

/// ADSR envelope generator.
///
/// # Example
///
/// ```rust
/// use motus_core::{AdsrEnvelope, EnvelopeState, Modulator};
///
/// let mut env = AdsrEnvelope::new();
/// env.set_attack_ms(100.0);
/// env.advance(0.0);
/// env.trigger();
///
/// let level = env.advance(50.0);
/// assert!((level - 0.5).abs() < 1e-9);
/// assert_eq!(env.state(), EnvelopeState::Attack);
/// ```
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    state: EnvelopeState,
    level: f64,
    attack_ms: f64,
    decay_ms: f64,
    sustain: f64,
    release_ms: f64,
    /// Restart automatically when a one-shot cycle finishes
    looping: bool,
    /// Gate held open by `gate_on`; a triggered one-shot releases after decay
    gated: bool,
    /// Level when the current segment started (release starts from wherever it was)
    segment_start_level: f64,
    segment_start_ms: f64,
    last_ms: Option<f64>,
    pending_trigger: bool,
}

impl Default for AdsrEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

impl AdsrEnvelope {
    /// Create a new envelope with default settings.
    ///
    /// Default values:
    /// - Attack: 10ms
    /// - Decay: 200ms
    /// - Sustain: 0.6
    /// - Release: 400ms
    pub fn new() -> Self {
        Self {
            state: EnvelopeState::Idle,
            level: 0.0,
            attack_ms: 10.0,
            decay_ms: 200.0,
            sustain: 0.6,
            release_ms: 400.0,
            looping: false,
            gated: false,
            segment_start_level: 0.0,
            segment_start_ms: 0.0,
            last_ms: None,
            pending_trigger: false,
        }
    }

    /// Set attack time in milliseconds.
    pub fn set_attack_ms(&mut self, ms: f64) {
        self.attack_ms = sanitize_ms(ms);
    }

    /// Set decay time in milliseconds.
    pub fn set_decay_ms(&mut self, ms: f64) {
        self.decay_ms = sanitize_ms(ms);
    }

    /// Set sustain level (0.0 to 1.0).
    pub fn set_sustain(&mut self, level: f64) {
        self.sustain = crate::clamp01(level);
    }

    /// Set release time in milliseconds.
    pub fn set_release_ms(&mut self, ms: f64) {
        self.release_ms = sanitize_ms(ms);
    }

    /// Enable or disable automatic retriggering.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Open the gate: attack, decay, then hold at sustain.
    pub fn gate_on(&mut self) {
        self.gated = true;
        self.start_attack();
    }

    /// Start the attack now if the envelope has a clock, otherwise on the next advance.
    fn start_attack(&mut self) {
        match self.last_ms {
            Some(now) => self.enter(EnvelopeState::Attack, now),
            None => self.pending_trigger = true,
        }
    }

    /// Close the gate: release from the current level.
    pub fn gate_off(&mut self) {
        self.gated = false;
        if self.state != EnvelopeState::Idle {
            let now = self.last_ms.unwrap_or(0.0);
            self.enter(EnvelopeState::Release, now);
        }
    }

    /// Get current state.
    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Get current level without advancing.
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Check if envelope is active (not idle).
    pub fn is_active(&self) -> bool {
        self.state != EnvelopeState::Idle
    }

    fn enter(&mut self, state: EnvelopeState, at_ms: f64) {
        self.state = state;
        self.segment_start_level = self.level;
        self.segment_start_ms = at_ms;
    }

    /// Walk the segment state machine forward to `now_ms`.
    ///
    /// Loops because a long gap between ticks can cross several segment boundaries.
    fn step(&mut self, now_ms: f64) {
        for _ in 0..8 {
            let elapsed = now_ms - self.segment_start_ms;
            match self.state {
                EnvelopeState::Idle => {
                    self.level = 0.0;
                    return;
                }
                EnvelopeState::Attack => {
                    if elapsed >= self.attack_ms {
                        self.level = 1.0;
                        let at = self.segment_start_ms + self.attack_ms;
                        self.enter(EnvelopeState::Decay, at);
                    } else {
                        let t = elapsed / self.attack_ms;
                        self.level =
                            self.segment_start_level + (1.0 - self.segment_start_level) * t;
                        return;
                    }
                }
                EnvelopeState::Decay => {
                    if elapsed >= self.decay_ms {
                        self.level = self.sustain;
                        let at = self.segment_start_ms + self.decay_ms;
                        if self.gated {
                            self.enter(EnvelopeState::Sustain, at);
                        } else {
                            self.enter(EnvelopeState::Release, at);
                        }
                    } else {
                        let t = elapsed / self.decay_ms;
                        self.level = 1.0 + (self.sustain - 1.0) * t;
                        return;
                    }
                }
                EnvelopeState::Sustain => {
                    self.level = self.sustain;
                    return;
                }
                EnvelopeState::Release => {
                    if elapsed >= self.release_ms {
                        self.level = 0.0;
                        let at = self.segment_start_ms + self.release_ms;
                        if self.looping {
                            self.enter(EnvelopeState::Attack, at);
                        } else {
                            self.enter(EnvelopeState::Idle, at);
                            return;
                        }
                    } else {
                        let t = elapsed / self.release_ms;
                        self.level = self.segment_start_level * (1.0 - t);
                        return;
                    }
                }
            }
        }
    }
}

fn sanitize_ms(ms: f64) -> f64 {
    if ms.is_finite() { ms.max(0.1) } else { 0.1 }
}

impl Modulator for AdsrEnvelope {
    fn advance(&mut self, now_ms: f64) -> f64 {
        if !now_ms.is_finite() {
            return self.level;
        }
        let now_ms = self.last_ms.map_or(now_ms, |last| last.max(now_ms));
        self.last_ms = Some(now_ms);
        if self.pending_trigger {
            self.pending_trigger = false;
            self.enter(EnvelopeState::Attack, now_ms);
        }
        self.step(now_ms);
        self.level
    }

    fn value(&self) -> f64 {
        self.level
    }

    fn is_bipolar(&self) -> bool {
        false
    }

    fn trigger(&mut self) {
        self.gated = false;
        self.start_attack();
    }

    fn reset(&mut self) {
        self.state = EnvelopeState::Idle;
        self.level = 0.0;
        self.gated = false;
        self.pending_trigger = false;
        self.segment_start_level = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AdsrEnvelope {
        let mut env = AdsrEnvelope::new();
        env.set_attack_ms(10.0);
        env.set_decay_ms(100.0);
        env.set_sustain(0.5);
        env.set_release_ms(200.0);
        env
    }

    #[test]
    fn test_envelope_idle_state() {
        let mut env = AdsrEnvelope::new();
        assert_eq!(env.state(), EnvelopeState::Idle);
        for step in 0..10 {
            assert_eq!(env.advance(f64::from(step) * 16.0), 0.0);
        }
    }

    #[test]
    fn test_trigger_runs_one_shot_cycle() {
        let mut env = configured();
        env.advance(0.0);
        env.trigger();
        env.advance(0.0);
        assert_eq!(env.state(), EnvelopeState::Attack);

        env.advance(10.0);
        assert_eq!(env.state(), EnvelopeState::Decay);
        assert!((env.level() - 1.0).abs() < 1e-9);

        env.advance(60.0);
        assert!((env.level() - 0.75).abs() < 1e-9, "halfway through decay");

        env.advance(110.0);
        assert_eq!(env.state(), EnvelopeState::Release);

        env.advance(500.0);
        assert_eq!(env.state(), EnvelopeState::Idle);
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_gate_holds_sustain() {
        let mut env = configured();
        env.gate_on();
        env.advance(0.0);
        env.advance(1000.0);
        assert_eq!(env.state(), EnvelopeState::Sustain);
        assert!((env.level() - 0.5).abs() < 1e-9);

        env.gate_off();
        env.advance(1100.0);
        assert!((env.level() - 0.25).abs() < 1e-9, "halfway through release");
    }

    #[test]
    fn test_looping_retriggers() {
        let mut env = configured();
        env.set_looping(true);
        env.advance(0.0);
        env.trigger();
        env.advance(0.0);
        env.advance(315.0); // attack 10 + decay 100 + release 200 = 310
        assert_eq!(env.state(), EnvelopeState::Attack);
        assert!(env.level() > 0.0);
    }

    #[test]
    fn test_large_gap_crosses_segments() {
        let mut env = configured();
        env.advance(0.0);
        env.trigger();
        env.advance(0.0);
        env.advance(10_000.0);
        assert_eq!(env.state(), EnvelopeState::Idle);
    }
}
