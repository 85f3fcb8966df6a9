//! Control-rate Low Frequency Oscillator.
//!
//! Phase accumulates from elapsed wall time between ticks rather than from a
//! per-sample increment, so the LFO runs correctly at any scheduler cadence.

use std::f64::consts::TAU;

use crate::modulation::Modulator;

/// LFO waveform type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LfoWaveform {
    #[default]
    Sine,
    Triangle,
    Saw,
    Square,
    SampleAndHold,
}

impl LfoWaveform {
    /// Names as used by the `lfo` template's `wave` option list.
    pub const NAMES: &'static [&'static str] = &["sine", "triangle", "saw", "square", "random"];

    /// Waveform for a `wave` option index. Out-of-range indices give `Sine`.
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Self::Triangle,
            2 => Self::Saw,
            3 => Self::Square,
            4 => Self::SampleAndHold,
            _ => Self::Sine,
        }
    }
}

/// Low Frequency Oscillator for generating modulation signals.
///
/// # Waveforms
///
/// - **Sine**: Smooth, natural modulation
/// - **Triangle**: Linear ramps, harder corners than sine
/// - **Saw**: Rising ramp, abrupt reset
/// - **Square**: Binary on/off modulation
/// - **SampleAndHold**: Random stepped values, new value each cycle
///
/// # Example
///
/// ```rust
/// use motus_core::{Lfo, LfoWaveform, Modulator};
///
/// let mut lfo = Lfo::new(1.0); // 1 Hz
/// lfo.set_waveform(LfoWaveform::Saw);
/// lfo.advance(0.0);
/// let value = lfo.advance(250.0); // a quarter cycle later
/// assert!((value - -0.5).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct Lfo {
    /// Current phase position [0.0, 1.0)
    phase: f64,
    rate_hz: f64,
    /// Output scale (0.0 to 1.0)
    depth: f64,
    waveform: LfoWaveform,
    /// Output -1..1 when set, otherwise 0..1
    bipolar: bool,
    /// Time of the previous advance, `None` before the first tick
    last_ms: Option<f64>,
    /// For Sample & Hold: current held value
    sh_value: f64,
    /// Cycle counter seeding the Sample & Hold hash
    cycles: u64,
    value: f64,
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Lfo {
    /// Create a new LFO with the given rate in Hz.
    pub fn new(rate_hz: f64) -> Self {
        let mut lfo = Self {
            phase: 0.0,
            rate_hz: 0.0,
            depth: 1.0,
            waveform: LfoWaveform::Sine,
            bipolar: true,
            last_ms: None,
            sh_value: 0.0,
            cycles: 0,
            value: 0.0,
        };
        lfo.set_rate(rate_hz);
        lfo
    }

    /// Set rate in Hz. Negative or non-finite rates stop the LFO.
    pub fn set_rate(&mut self, rate_hz: f64) {
        self.rate_hz = if rate_hz.is_finite() {
            rate_hz.max(0.0)
        } else {
            0.0
        };
    }

    /// Current rate in Hz.
    pub fn rate(&self) -> f64 {
        self.rate_hz
    }

    /// Set output depth (clamped to 0..1).
    pub fn set_depth(&mut self, depth: f64) {
        self.depth = crate::clamp01(depth);
    }

    /// Set waveform
    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.waveform = waveform;
    }

    /// Get current waveform
    pub fn waveform(&self) -> LfoWaveform {
        self.waveform
    }

    /// Select bipolar (-1..1) or unipolar (0..1) output.
    pub fn set_bipolar(&mut self, bipolar: bool) {
        self.bipolar = bipolar;
    }

    /// Sync phase to a specific value (0.0 - 1.0)
    pub fn set_phase(&mut self, phase: f64) {
        self.phase = phase.clamp(0.0, 1.0) % 1.0;
    }

    /// Get current phase (0.0 - 1.0)
    pub fn phase(&self) -> f64 {
        self.phase
    }

    fn shape(&mut self, wrapped: bool) -> f64 {
        match self.waveform {
            LfoWaveform::Sine => (self.phase * TAU).sin(),
            LfoWaveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
            LfoWaveform::Saw => 2.0 * self.phase - 1.0,
            LfoWaveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoWaveform::SampleAndHold => {
                if wrapped {
                    let x = ((self.cycles as f64) * 12.9898 + 78.233).sin() * 43758.5453;
                    self.sh_value = (x - x.floor()) * 2.0 - 1.0;
                }
                self.sh_value
            }
        }
    }
}

impl Modulator for Lfo {
    fn advance(&mut self, now_ms: f64) -> f64 {
        let mut wrapped = false;
        if let Some(last) = self.last_ms {
            let dt = now_ms - last;
            if dt.is_finite() && dt > 0.0 {
                let next = self.phase + self.rate_hz * dt / 1000.0;
                if next >= 1.0 {
                    wrapped = true;
                    self.cycles = self.cycles.wrapping_add(next.floor() as u64);
                }
                self.phase = next.fract();
            }
        }
        if now_ms.is_finite() {
            self.last_ms = Some(self.last_ms.map_or(now_ms, |last| last.max(now_ms)));
        }
        let shaped = self.shape(wrapped) * self.depth;
        self.value = if self.bipolar {
            shaped
        } else {
            (shaped + 1.0) * 0.5
        };
        self.value
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn is_bipolar(&self) -> bool {
        self.bipolar
    }

    fn trigger(&mut self) {
        self.phase = 0.0;
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.last_ms = None;
        self.sh_value = 0.0;
        self.cycles = 0;
        self.value = 0.0;
    }
}
