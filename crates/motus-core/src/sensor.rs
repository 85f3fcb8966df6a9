//! Externally supplied sensor samples.
//!
//! The engine never acquires sensor data itself; callers hand it already-extracted
//! numeric metrics once per sample. Metrics may be nested, and sources address them
//! with a dotted path (`"accel.x"`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One sample of named numeric metrics.
///
/// # Example
///
/// ```rust
/// use motus_core::SensorFrame;
///
/// let frame: SensorFrame = serde_json::from_str(
///     r#"{"pitch": 12.5, "accel": {"x": -0.2}, "still": true}"#,
/// ).unwrap();
///
/// assert_eq!(frame.metric("pitch"), Some(12.5));
/// assert_eq!(frame.metric("accel.x"), Some(-0.2));
/// assert_eq!(frame.metric("still"), Some(1.0));
/// assert_eq!(frame.metric("accel.y"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorFrame {
    metrics: Map<String, Value>,
}

impl SensorFrame {
    /// Empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a flat frame from `(name, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut frame = Self::new();
        for (name, value) in pairs {
            frame.insert(name, value);
        }
        frame
    }

    /// Set a top-level metric. Non-finite values are stored as null and read back as missing.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let value = serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.metrics.insert(name.into(), value);
    }

    /// Look up a metric by dotted path.
    ///
    /// Numbers are returned as-is, booleans as 0/1, numeric strings parsed.
    /// Anything else (missing, object, array, non-finite) is `None`.
    pub fn metric(&self, path: &str) -> Option<f64> {
        if path.is_empty() {
            return None;
        }
        // A literal key containing dots wins over path traversal.
        if let Some(value) = self.metrics.get(path) {
            return numeric(value);
        }
        let mut segments = path.split('.');
        let mut current = self.metrics.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        numeric(current)
    }

    /// Whether the frame holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Top-level metric names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }
}

impl From<Map<String, Value>> for SensorFrame {
    fn from(metrics: Map<String, Value>) -> Self {
        Self { metrics }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
