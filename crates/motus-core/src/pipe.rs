//! Per-source signal conditioning ("pipe").
//!
//! A [`Pipe`] turns a raw source reading (a sensor metric or a modulator output)
//! into a normalized 0..1 control value. [`evaluate_pipe`] is a pure function of
//! the raw value, the configuration, the previous runtime state, and the current
//! timestamp. Steps, in fixed order:
//!
//! 1. `scaled = (raw + offset) * scale`
//! 2. clamp `scaled` into `[min, max]` when both bounds are finite and `max > min`
//! 3. dead-zone: `|scaled| < dead` forces `scaled = 0`
//! 4. `invert` negates `scaled`
//! 5. normalize into 0..1 against `[min, max]` (span 1 if degenerate), apply [`Curve`]
//! 6. exponential-style smoothing toward the curved value over `smooth_ms`
//! 7. hysteresis: changes smaller than `hyst` leave the published value unchanged
//!
//! Steps 6 and 7 are shared with route-level conditioning through [`condition`].

use serde::{Deserialize, Serialize};

use crate::math::{clamp01, finite_or};

/// Response curve applied to a 0..1 value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    /// Identity.
    #[default]
    Lin,
    /// Square: concentrates resolution at the high end.
    Exp,
    /// Square root: concentrates resolution at the low end.
    Log,
}

impl Curve {
    /// All curves in document order.
    pub const ALL: [Curve; 3] = [Curve::Lin, Curve::Exp, Curve::Log];

    /// Apply the curve to `x`, clamping the input to 0..1 first.
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        let x = clamp01(x);
        match self {
            Curve::Lin => x,
            Curve::Exp => x * x,
            Curve::Log => x.sqrt(),
        }
    }

    /// Name as used in patch documents.
    pub const fn name(self) -> &'static str {
        match self {
            Curve::Lin => "lin",
            Curve::Exp => "exp",
            Curve::Log => "log",
        }
    }

    /// Parse a document name. Unknown names return `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Signal conditioning configuration owned by one source.
///
/// Every field has a fixed default, so a document may omit any of them.
///
/// # JSON Format
///
/// ```json
/// { "offset": 0, "scale": 1, "min": -1, "max": 1, "dead": 0,
///   "invert": false, "curve": "lin", "smoothMs": 0, "hyst": 0, "bipolar": false }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Pipe {
    /// Added to the raw value before scaling.
    pub offset: f64,
    /// Multiplier applied after the offset.
    pub scale: f64,
    /// Lower bound of the expected scaled range.
    pub min: f64,
    /// Upper bound of the expected scaled range.
    pub max: f64,
    /// Dead-zone half width around zero.
    pub dead: f64,
    /// Negate the scaled value.
    pub invert: bool,
    /// Response curve applied after normalization.
    pub curve: Curve,
    /// Smoothing time constant in milliseconds (0 = none).
    pub smooth_ms: f64,
    /// Minimum change of the published value.
    pub hyst: f64,
    /// Default polarity for routes created from this source.
    pub bipolar: bool,
}

impl Default for Pipe {
    fn default() -> Self {
        Self {
            offset: 0.0,
            scale: 1.0,
            min: -1.0,
            max: 1.0,
            dead: 0.0,
            invert: false,
            curve: Curve::Lin,
            smooth_ms: 0.0,
            hyst: 0.0,
            bipolar: false,
        }
    }
}

impl Pipe {
    /// Pipe with a custom expected range and otherwise default settings.
    pub fn with_range(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            ..Self::default()
        }
    }

    /// Sets the scale factor.
    ///
    /// Builder pattern: call after a constructor.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the smoothing time.
    ///
    /// Builder pattern: call after a constructor.
    pub fn with_smoothing(mut self, smooth_ms: f64) -> Self {
        self.smooth_ms = smooth_ms;
        self
    }
}

/// Runtime state produced by one pipe evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PipeState {
    /// Pre-normalization scaled value, for readouts.
    pub value: f64,
    /// Published normalized output in `[0, 1]`.
    pub normalized: f64,
    /// Internal smoother position; hysteresis may hold `normalized` behind it.
    pub smoothed: f64,
    /// Timestamp of this evaluation in milliseconds.
    pub at: f64,
}

/// Run the full conditioning pipeline.
///
/// Pure: identical inputs (including `prev` and `now_ms`) always yield identical output.
/// A non-finite `raw` reading is ignored and the previous state is returned unchanged
/// (or a zeroed state at `now_ms` when there is none).
///
/// # Example
///
/// ```rust
/// use motus_core::{Pipe, evaluate_pipe};
///
/// let pipe = Pipe { invert: true, ..Pipe::default() };
/// let state = evaluate_pipe(0.5, &pipe, None, 0.0);
/// assert_eq!(state.value, -0.5);
/// assert!((state.normalized - 0.25).abs() < 1e-12);
/// ```
pub fn evaluate_pipe(raw: f64, pipe: &Pipe, prev: Option<&PipeState>, now_ms: f64) -> PipeState {
    if !raw.is_finite() {
        return prev.copied().unwrap_or(PipeState {
            at: finite_or(now_ms, 0.0),
            ..PipeState::default()
        });
    }

    let offset = finite_or(pipe.offset, 0.0);
    let scale = finite_or(pipe.scale, 1.0);
    let mut scaled = finite_or((raw + offset) * scale, 0.0);

    let bounded = pipe.min.is_finite() && pipe.max.is_finite() && pipe.max > pipe.min;
    if bounded {
        scaled = scaled.clamp(pipe.min, pipe.max);
    }

    if scaled.abs() < finite_or(pipe.dead, 0.0) {
        scaled = 0.0;
    }

    if pipe.invert {
        scaled = -scaled;
    }

    let (lo, span) = if bounded {
        (pipe.min, pipe.max - pipe.min)
    } else {
        (finite_or(pipe.min, 0.0), 1.0)
    };
    let normalized = pipe.curve.apply((scaled - lo) / span);

    let (published, smoothed) = condition(normalized, pipe.smooth_ms, pipe.hyst, prev, now_ms);

    PipeState {
        value: scaled,
        normalized: published,
        smoothed,
        at: finite_or(now_ms, prev.map_or(0.0, |p| p.at)),
    }
}

/// Smoothing and hysteresis (pipe steps 6–7) on an already normalized candidate.
///
/// Returns `(published, smoothed)`. With no previous state the candidate is
/// published directly. The smoother moves `elapsed / smooth_ms` of the remaining
/// distance, saturating at the full jump when `smooth_ms` is 0 or has fully elapsed.
pub fn condition(
    candidate: f64,
    smooth_ms: f64,
    hyst: f64,
    prev: Option<&PipeState>,
    now_ms: f64,
) -> (f64, f64) {
    let candidate = clamp01(candidate);
    let Some(prev) = prev else {
        return (candidate, candidate);
    };

    let smooth_ms = finite_or(smooth_ms, 0.0);
    let elapsed = finite_or(now_ms - prev.at, 0.0).max(0.0);
    let alpha = if smooth_ms <= 0.0 || elapsed >= smooth_ms {
        1.0
    } else {
        elapsed / smooth_ms
    };
    let smoothed = clamp01(prev.smoothed + (candidate - prev.smoothed) * alpha);

    let hyst = finite_or(hyst, 0.0).max(0.0);
    let published = if (smoothed - prev.normalized).abs() < hyst {
        prev.normalized
    } else {
        smoothed
    };
    (published, smoothed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn default_pipe_maps_half_to_three_quarters() {
        let state = evaluate_pipe(0.5, &Pipe::default(), None, 0.0);
        assert_eq!(state.value, 0.5);
        assert!((state.normalized - 0.75).abs() < EPS);
    }

    #[test]
    fn invert_flips_around_zero() {
        let pipe = Pipe {
            invert: true,
            ..Pipe::default()
        };
        let state = evaluate_pipe(0.5, &pipe, None, 0.0);
        assert_eq!(state.value, -0.5);
        assert!((state.normalized - 0.25).abs() < EPS);
    }

    #[test]
    fn offset_and_scale_then_clamp() {
        let pipe = Pipe {
            offset: 1.0,
            scale: 2.0,
            ..Pipe::default()
        };
        // (0.5 + 1) * 2 = 3, clamped to 1
        let state = evaluate_pipe(0.5, &pipe, None, 0.0);
        assert_eq!(state.value, 1.0);
        assert_eq!(state.normalized, 1.0);
    }

    #[test]
    fn dead_zone_zeroes_small_values() {
        let pipe = Pipe {
            dead: 0.2,
            ..Pipe::default()
        };
        let state = evaluate_pipe(0.1, &pipe, None, 0.0);
        assert_eq!(state.value, 0.0);
        assert!((state.normalized - 0.5).abs() < EPS);

        let state = evaluate_pipe(0.3, &pipe, None, 0.0);
        assert_eq!(state.value, 0.3);
    }

    #[test]
    fn curves_shape_normalized_value() {
        let exp = Pipe {
            curve: Curve::Exp,
            ..Pipe::default()
        };
        let log = Pipe {
            curve: Curve::Log,
            ..Pipe::default()
        };
        // raw 0 normalizes to 0.5
        assert!((evaluate_pipe(0.0, &exp, None, 0.0).normalized - 0.25).abs() < EPS);
        assert!((evaluate_pipe(0.0, &log, None, 0.0).normalized - 0.5f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn degenerate_range_uses_unit_span() {
        let pipe = Pipe::with_range(2.0, 2.0);
        let state = evaluate_pipe(2.5, &pipe, None, 0.0);
        assert!((state.normalized - 0.5).abs() < EPS);
        assert!((0.0..=1.0).contains(&evaluate_pipe(1e9, &pipe, None, 0.0).normalized));
    }

    #[test]
    fn zero_scale_stays_in_range() {
        let pipe = Pipe::default().with_scale(0.0);
        let state = evaluate_pipe(123.0, &pipe, None, 0.0);
        assert_eq!(state.value, 0.0);
        assert!((state.normalized - 0.5).abs() < EPS);
    }

    #[test]
    fn smoothing_moves_fraction_of_distance() {
        let pipe = Pipe::default().with_smoothing(100.0);
        let first = evaluate_pipe(-1.0, &pipe, None, 0.0);
        assert_eq!(first.normalized, 0.0);

        let second = evaluate_pipe(1.0, &pipe, Some(&first), 25.0);
        assert!((second.normalized - 0.25).abs() < EPS);

        let settled = evaluate_pipe(1.0, &pipe, Some(&second), 500.0);
        assert_eq!(settled.normalized, 1.0, "saturates once smoothMs has elapsed");
    }

    #[test]
    fn hysteresis_holds_small_changes() {
        let pipe = Pipe {
            hyst: 0.1,
            ..Pipe::default()
        };
        let first = evaluate_pipe(0.0, &pipe, None, 0.0);
        let small = evaluate_pipe(0.1, &pipe, Some(&first), 16.0);
        assert_eq!(small.normalized, first.normalized);

        let large = evaluate_pipe(0.5, &pipe, Some(&small), 32.0);
        assert!((large.normalized - 0.75).abs() < EPS);
    }

    #[test]
    fn repeated_evaluation_is_idempotent() {
        let pipe = Pipe {
            smooth_ms: 50.0,
            hyst: 0.02,
            ..Pipe::default()
        };
        let prev = evaluate_pipe(0.2, &pipe, None, 0.0);
        let a = evaluate_pipe(0.9, &pipe, Some(&prev), 20.0);
        let b = evaluate_pipe(0.9, &pipe, Some(&prev), 20.0);
        assert_eq!(a, b);

        let again = evaluate_pipe(0.9, &pipe, Some(&a), 20.0);
        assert_eq!(again.normalized, a.normalized, "zero elapsed time does not move");
    }

    #[test]
    fn non_finite_raw_keeps_previous_state() {
        let prev = evaluate_pipe(0.5, &Pipe::default(), None, 0.0);
        let next = evaluate_pipe(f64::NAN, &Pipe::default(), Some(&prev), 16.0);
        assert_eq!(next, prev);
    }

    #[test]
    fn pipe_json_defaults_fill_missing_fields() {
        let pipe: Pipe = serde_json::from_str(r#"{"scale": 2, "smoothMs": 40}"#).unwrap();
        assert_eq!(pipe.scale, 2.0);
        assert_eq!(pipe.smooth_ms, 40.0);
        assert_eq!(pipe.min, -1.0);
        assert_eq!(pipe.curve, Curve::Lin);
    }

    #[test]
    fn curve_names() {
        assert_eq!(Curve::from_name("exp"), Some(Curve::Exp));
        assert_eq!(Curve::from_name("cubic"), None);
        assert_eq!(serde_json::to_string(&Curve::Log).unwrap(), "\"log\"");
    }
}
