//! Parameter schema for node templates.
//!
//! Each template parameter is described by a [`ParamDescriptor`]: its [`ParamKind`],
//! declared domain (min/max or enumerated options), default value, and default slew.
//! The descriptor is the single authority used by the sanitizer to repair values,
//! by patch editing to validate them, and by the engine to convert a stored
//! [`ParamBase`] into the numeric control value a binding accepts.
//!
//! # Kinds
//!
//! | Kind | Stored as | Control value |
//! |---|---|---|
//! | `linear`, `frequency`, `time` | number | clamped number |
//! | `integer` | number | rounded, then clamped |
//! | `boolean` | bool | `0.0` / `1.0` |
//! | `select` | string | index into `options` |
//!
//! # Example
//!
//! ```rust
//! use motus_core::{ParamBase, ParamDescriptor};
//!
//! let cutoff = ParamDescriptor::frequency("cutoff", 20.0, 20000.0, 1200.0).with_slew(40.0);
//! assert_eq!(cutoff.normalize(&ParamBase::Number(50000.0)), ParamBase::Number(20000.0));
//!
//! let mode = ParamDescriptor::select("mode", &["lowpass", "highpass"], "lowpass");
//! assert_eq!(mode.normalize(&ParamBase::from("notch")), ParamBase::from("lowpass"));
//! assert_eq!(mode.control_value(&ParamBase::from("highpass")), 1.0);
//! ```

use serde::{Deserialize, Serialize};

/// Declared type of a template parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Continuous value with linear response.
    #[default]
    Linear,
    /// Frequency in Hz.
    Frequency,
    /// Duration in milliseconds.
    Time,
    /// Whole number; stored values are rounded before clamping.
    Integer,
    /// On/off flag.
    Boolean,
    /// One of a fixed list of string options.
    Select,
}

impl ParamKind {
    /// Returns `true` for kinds whose stored base is a number.
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Linear | Self::Frequency | Self::Time | Self::Integer
        )
    }

    /// Lowercase name as used in patch documents.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Frequency => "frequency",
            Self::Time => "time",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Select => "select",
        }
    }
}

/// Compile-time default value of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    /// Default for numeric kinds.
    Number(f64),
    /// Default for boolean parameters.
    Flag(bool),
    /// Default option for select parameters.
    Choice(&'static str),
}

/// A parameter's settable rest value as stored in a patch.
///
/// Serialized untagged, so a patch document holds plain JSON scalars:
/// `true`, `440.0`, or `"sine"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamBase {
    /// Boolean value.
    Flag(bool),
    /// Numeric value.
    Number(f64),
    /// Enumerated option.
    Text(String),
}

impl ParamBase {
    /// Returns the numeric value, if this base is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string value, if this base is an option name.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for ParamBase {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ParamBase {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for ParamBase {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<ParamDefault> for ParamBase {
    fn from(value: ParamDefault) -> Self {
        match value {
            ParamDefault::Number(n) => Self::Number(n),
            ParamDefault::Flag(b) => Self::Flag(b),
            ParamDefault::Choice(s) => Self::Text(s.to_string()),
        }
    }
}

/// Describes one parameter declared by a node template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescriptor {
    /// Parameter name, unique within its template (e.g. `"cutoff"`).
    pub name: &'static str,
    /// Declared kind.
    pub kind: ParamKind,
    /// Minimum value (numeric kinds; `0` for boolean and select).
    pub min: f64,
    /// Maximum value (numeric kinds; `1` for boolean, last index for select).
    pub max: f64,
    /// Default value assigned by the editor and used as the sanitizer fallback.
    pub default: ParamDefault,
    /// Enumerated options (select kind only).
    pub options: &'static [&'static str],
    /// Default ramp duration in milliseconds.
    pub slew_ms: f64,
}

impl ParamDescriptor {
    const fn numeric(name: &'static str, kind: ParamKind, min: f64, max: f64, default: f64) -> Self {
        Self {
            name,
            kind,
            min,
            max,
            default: ParamDefault::Number(default),
            options: &[],
            slew_ms: 0.0,
        }
    }

    /// Continuous parameter with a linear response.
    pub const fn linear(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self::numeric(name, ParamKind::Linear, min, max, default)
    }

    /// Frequency parameter in Hz.
    pub const fn frequency(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self::numeric(name, ParamKind::Frequency, min, max, default)
    }

    /// Time parameter in milliseconds.
    pub const fn time_ms(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self::numeric(name, ParamKind::Time, min, max, default)
    }

    /// Whole-number parameter.
    pub const fn integer(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self::numeric(name, ParamKind::Integer, min, max, default)
    }

    /// On/off parameter.
    pub const fn boolean(name: &'static str, default: bool) -> Self {
        Self {
            name,
            kind: ParamKind::Boolean,
            min: 0.0,
            max: 1.0,
            default: ParamDefault::Flag(default),
            options: &[],
            slew_ms: 0.0,
        }
    }

    /// Enumerated parameter. `default` should be one of `options`.
    pub const fn select(
        name: &'static str,
        options: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        let last = if options.is_empty() { 0 } else { options.len() - 1 };
        Self {
            name,
            kind: ParamKind::Select,
            min: 0.0,
            max: last as f64,
            default: ParamDefault::Choice(default),
            options,
            slew_ms: 0.0,
        }
    }

    /// Sets the default ramp duration.
    ///
    /// Builder pattern: call after a factory method.
    pub const fn with_slew(mut self, slew_ms: f64) -> Self {
        self.slew_ms = slew_ms;
        self
    }

    /// The default value as a stored base.
    pub fn default_base(&self) -> ParamBase {
        self.default.into()
    }

    /// Clamps a numeric value into the declared domain.
    ///
    /// Integer kinds round first. Non-finite input yields the default control value.
    pub fn clamp(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.control_value(&self.default_base());
        }
        let value = match self.kind {
            ParamKind::Integer | ParamKind::Select => value.round(),
            ParamKind::Boolean => {
                if value >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            _ => value,
        };
        if self.max >= self.min {
            value.clamp(self.min, self.max)
        } else {
            value
        }
    }

    /// Validates a stored base against this descriptor, repairing it if needed.
    ///
    /// - numeric kinds clamp to `[min, max]` (integers round first); strings that
    ///   parse as numbers are accepted, anything else falls back to the default
    /// - boolean coerces numbers (non-zero) and common strings (`"on"`, `"true"`, ...)
    /// - select keeps only enumerated options, otherwise the default
    pub fn normalize(&self, base: &ParamBase) -> ParamBase {
        match self.kind {
            ParamKind::Linear | ParamKind::Frequency | ParamKind::Time | ParamKind::Integer => {
                let raw = match base {
                    ParamBase::Number(n) => Some(*n),
                    ParamBase::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
                    ParamBase::Text(s) => s.trim().parse::<f64>().ok(),
                };
                match raw {
                    Some(n) if n.is_finite() => ParamBase::Number(self.clamp(n)),
                    _ => self.default_base(),
                }
            }
            ParamKind::Boolean => match base {
                ParamBase::Flag(b) => ParamBase::Flag(*b),
                ParamBase::Number(n) if n.is_finite() => ParamBase::Flag(*n != 0.0),
                ParamBase::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "on" | "yes" | "1" => ParamBase::Flag(true),
                    "false" | "off" | "no" | "0" => ParamBase::Flag(false),
                    _ => self.default_base(),
                },
                ParamBase::Number(_) => self.default_base(),
            },
            ParamKind::Select => match base {
                ParamBase::Text(s) if self.options.contains(&s.as_str()) => base.clone(),
                _ => self.default_base(),
            },
        }
    }

    /// Converts a stored base into the numeric control value a binding accepts.
    pub fn control_value(&self, base: &ParamBase) -> f64 {
        match (self.kind, base) {
            (ParamKind::Select, ParamBase::Text(s)) => self
                .options
                .iter()
                .position(|o| *o == s.as_str())
                .unwrap_or(0) as f64,
            (_, ParamBase::Number(n)) if n.is_finite() => *n,
            (_, ParamBase::Flag(b)) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => match self.default {
                ParamDefault::Number(n) => n,
                ParamDefault::Flag(b) => {
                    if b {
                        1.0
                    } else {
                        0.0
                    }
                }
                ParamDefault::Choice(c) => {
                    self.options.iter().position(|o| *o == c).unwrap_or(0) as f64
                }
            },
        }
    }

    /// Option name for a select control value, if in range.
    pub fn option_at(&self, control: f64) -> Option<&'static str> {
        if !control.is_finite() || control < 0.0 {
            return None;
        }
        self.options.get(control.round() as usize).copied()
    }

    /// Returns `true` for parameters that carry a frequency in Hz.
    ///
    /// Matches the declared kind as well as names such as `freq`, `frequency`,
    /// or `cutoff` so templates with linear-declared pitches are covered.
    pub fn is_frequency_like(&self) -> bool {
        self.kind == ParamKind::Frequency || is_frequency_name(self.name)
    }
}

/// Returns `true` if a parameter name looks like a frequency.
pub fn is_frequency_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("freq") || lower.contains("cutoff") || lower == "pitch"
}
