//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables for an [`EngineInstance`](crate::EngineInstance) and its session.
///
/// Deserializes from camelCase JSON; every field is optional.
///
/// ```rust
/// use motus_engine::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "tickIntervalMs": 10 }"#).unwrap();
/// assert_eq!(config.tick_interval_ms, 10.0);
/// assert_eq!(config.note_log_capacity, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Scheduler cadence in milliseconds (display-refresh rate by default).
    pub tick_interval_ms: f64,
    /// A frequency-like target whose mapped value strays further than this from
    /// its base gets a note-log entry.
    pub freq_note_threshold: f64,
    /// Note-log entries kept by the session's store.
    pub note_log_capacity: usize,
    /// Minimum ramp time for every target, on top of each binding's own default.
    pub default_binding_slew_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16.0,
            freq_note_threshold: 1000.0,
            note_log_capacity: 30,
            default_binding_slew_ms: 0.0,
        }
    }
}

impl EngineConfig {
    /// Parse from JSON and sanitize.
    ///
    /// # Errors
    ///
    /// Returns the parser error for malformed JSON or mistyped fields.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Replace out-of-domain values with defaults.
    ///
    /// The interval must be positive and finite; the threshold and slew floor
    /// non-negative and finite; the note log holds at least one entry.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let positive = |v: f64, d: f64| if v.is_finite() && v > 0.0 { v } else { d };
        let non_negative = |v: f64, d: f64| if v.is_finite() && v >= 0.0 { v } else { d };
        Self {
            tick_interval_ms: positive(self.tick_interval_ms, defaults.tick_interval_ms),
            freq_note_threshold: non_negative(self.freq_note_threshold, defaults.freq_note_threshold),
            note_log_capacity: self.note_log_capacity.max(1),
            default_binding_slew_ms: non_negative(
                self.default_binding_slew_ms,
                defaults.default_binding_slew_ms,
            ),
        }
    }
}
