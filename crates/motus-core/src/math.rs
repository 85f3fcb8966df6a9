//! Control-rate math helpers.
//!
//! Small guards used at every stage of the pipeline and the combination engine so
//! that no NaN or infinity reaches a parameter binding.

/// Clamp a value into `[0, 1]`. Non-finite input maps to `0.0`.
///
/// # Example
///
/// ```rust
/// use motus_core::clamp01;
///
/// assert_eq!(clamp01(1.5), 1.0);
/// assert_eq!(clamp01(-0.2), 0.0);
/// assert_eq!(clamp01(f64::NAN), 0.0);
/// ```
#[inline]
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Return `value` when finite, otherwise `fallback`.
#[inline]
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

/// Linear interpolation from `a` to `b` by `t`.
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Clamp into `[lo, hi]` only when both bounds are finite and ordered.
///
/// Returns `value` unchanged otherwise.
#[inline]
pub fn clamp_bounds(value: f64, lo: f64, hi: f64) -> f64 {
    if lo.is_finite() && hi.is_finite() && hi >= lo {
        value.clamp(lo, hi)
    } else {
        value
    }
}
