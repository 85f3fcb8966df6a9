//! Built-in node templates.
//!
//! [`NodeTemplate`] is a closed set: every template a patch may reference is a
//! variant here, carrying its parameter schema and whether it produces modulation.

use motus_core::{LfoWaveform, ParamDescriptor};

/// Category of node template for organization and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateCategory {
    /// Sound generators (oscillator, noise)
    Source,
    /// Spectral shaping (filters)
    Filter,
    /// Level and placement (gain, pan)
    Utility,
    /// Delay and reverb
    TimeBased,
    /// Control-rate modulation producers (LFO, envelope)
    Modulator,
}

impl TemplateCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            TemplateCategory::Source => "Source",
            TemplateCategory::Filter => "Filter",
            TemplateCategory::Utility => "Utility",
            TemplateCategory::TimeBased => "Time-Based",
            TemplateCategory::Modulator => "Modulator",
        }
    }
}

/// A synthesis-module template a patch node can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTemplate {
    /// Oscillator
    Osc,
    /// Noise generator
    Noise,
    /// Multimode resonant filter
    Filter,
    /// Gain stage with mute
    Gain,
    /// Stereo panner
    Pan,
    /// Feedback delay
    Delay,
    /// Algorithmic reverb
    Reverb,
    /// Low-frequency oscillator (modulator)
    Lfo,
    /// ADSR envelope (modulator)
    Env,
}

const OSC_WAVES: &[&str] = &["sine", "triangle", "sawtooth", "square"];
const NOISE_COLORS: &[&str] = &["white", "pink", "brown"];
const FILTER_MODES: &[&str] = &["lowpass", "highpass", "bandpass", "notch"];

const OSC_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::frequency("frequency", 20.0, 20000.0, 220.0).with_slew(20.0),
    ParamDescriptor::linear("detune", -1200.0, 1200.0, 0.0).with_slew(20.0),
    ParamDescriptor::select("waveform", OSC_WAVES, "sine"),
    ParamDescriptor::linear("level", 0.0, 1.0, 0.5).with_slew(20.0),
];

const NOISE_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::select("color", NOISE_COLORS, "white"),
    ParamDescriptor::linear("level", 0.0, 1.0, 0.3).with_slew(20.0),
];

const FILTER_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::frequency("cutoff", 20.0, 20000.0, 1200.0).with_slew(30.0),
    ParamDescriptor::linear("resonance", 0.1, 20.0, 1.0).with_slew(30.0),
    ParamDescriptor::select("mode", FILTER_MODES, "lowpass"),
];

const GAIN_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::linear("level", 0.0, 2.0, 1.0).with_slew(20.0),
    ParamDescriptor::boolean("mute", false),
];

const PAN_PARAMS: &[ParamDescriptor] =
    &[ParamDescriptor::linear("position", -1.0, 1.0, 0.0).with_slew(20.0)];

const DELAY_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::time_ms("time", 1.0, 2000.0, 250.0).with_slew(50.0),
    ParamDescriptor::linear("feedback", 0.0, 0.95, 0.35).with_slew(30.0),
    ParamDescriptor::linear("mix", 0.0, 1.0, 0.3).with_slew(30.0),
];

const REVERB_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::time_ms("decay", 100.0, 10000.0, 2000.0).with_slew(100.0),
    ParamDescriptor::linear("mix", 0.0, 1.0, 0.25).with_slew(30.0),
];

const LFO_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::frequency("rate", 0.01, 20.0, 1.0),
    ParamDescriptor::linear("depth", 0.0, 1.0, 1.0),
    ParamDescriptor::select("wave", LfoWaveform::NAMES, "sine"),
    ParamDescriptor::boolean("bipolar", true),
];

const ENV_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::time_ms("attack", 0.0, 5000.0, 10.0),
    ParamDescriptor::time_ms("decay", 0.0, 5000.0, 200.0),
    ParamDescriptor::linear("sustain", 0.0, 1.0, 0.6),
    ParamDescriptor::time_ms("release", 0.0, 10000.0, 400.0),
    ParamDescriptor::boolean("loop", false),
];

impl NodeTemplate {
    /// Every template, in registration order.
    pub const ALL: [NodeTemplate; 9] = [
        NodeTemplate::Osc,
        NodeTemplate::Noise,
        NodeTemplate::Filter,
        NodeTemplate::Gain,
        NodeTemplate::Pan,
        NodeTemplate::Delay,
        NodeTemplate::Reverb,
        NodeTemplate::Lfo,
        NodeTemplate::Env,
    ];

    /// Type key used in patch documents.
    pub const fn id(self) -> &'static str {
        match self {
            NodeTemplate::Osc => "osc",
            NodeTemplate::Noise => "noise",
            NodeTemplate::Filter => "filter",
            NodeTemplate::Gain => "gain",
            NodeTemplate::Pan => "pan",
            NodeTemplate::Delay => "delay",
            NodeTemplate::Reverb => "reverb",
            NodeTemplate::Lfo => "lfo",
            NodeTemplate::Env => "env",
        }
    }

    /// Look up a template by type key.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            NodeTemplate::Osc => "Oscillator",
            NodeTemplate::Noise => "Noise",
            NodeTemplate::Filter => "Filter",
            NodeTemplate::Gain => "Gain",
            NodeTemplate::Pan => "Pan",
            NodeTemplate::Delay => "Delay",
            NodeTemplate::Reverb => "Reverb",
            NodeTemplate::Lfo => "LFO",
            NodeTemplate::Env => "Envelope",
        }
    }

    /// Brief description.
    pub const fn description(self) -> &'static str {
        match self {
            NodeTemplate::Osc => "Periodic oscillator with selectable waveform",
            NodeTemplate::Noise => "White, pink, or brown noise source",
            NodeTemplate::Filter => "Resonant multimode filter",
            NodeTemplate::Gain => "Gain stage with mute",
            NodeTemplate::Pan => "Equal-power stereo panner",
            NodeTemplate::Delay => "Feedback delay line",
            NodeTemplate::Reverb => "Algorithmic room reverb",
            NodeTemplate::Lfo => "Control-rate low-frequency oscillator",
            NodeTemplate::Env => "Triggerable ADSR envelope",
        }
    }

    /// Category for organization.
    pub const fn category(self) -> TemplateCategory {
        match self {
            NodeTemplate::Osc | NodeTemplate::Noise => TemplateCategory::Source,
            NodeTemplate::Filter => TemplateCategory::Filter,
            NodeTemplate::Gain | NodeTemplate::Pan => TemplateCategory::Utility,
            NodeTemplate::Delay | NodeTemplate::Reverb => TemplateCategory::TimeBased,
            NodeTemplate::Lfo | NodeTemplate::Env => TemplateCategory::Modulator,
        }
    }

    /// Declared parameters, in display order.
    pub const fn params(self) -> &'static [ParamDescriptor] {
        match self {
            NodeTemplate::Osc => OSC_PARAMS,
            NodeTemplate::Noise => NOISE_PARAMS,
            NodeTemplate::Filter => FILTER_PARAMS,
            NodeTemplate::Gain => GAIN_PARAMS,
            NodeTemplate::Pan => PAN_PARAMS,
            NodeTemplate::Delay => DELAY_PARAMS,
            NodeTemplate::Reverb => REVERB_PARAMS,
            NodeTemplate::Lfo => LFO_PARAMS,
            NodeTemplate::Env => ENV_PARAMS,
        }
    }

    /// Descriptor for a named parameter.
    pub fn param(self, name: &str) -> Option<&'static ParamDescriptor> {
        self.params().iter().find(|p| p.name == name)
    }

    /// Returns `true` if nodes of this template produce a modulation signal.
    pub const fn is_modulator(self) -> bool {
        matches!(self, NodeTemplate::Lfo | NodeTemplate::Env)
    }
}

impl std::fmt::Display for NodeTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motus_core::{ParamDefault, ParamKind};

    #[test]
    fn ids_round_trip() {
        for template in NodeTemplate::ALL {
            assert_eq!(NodeTemplate::from_id(template.id()), Some(template));
        }
        assert_eq!(NodeTemplate::from_id("granular"), None);
        assert_eq!(NodeTemplate::from_id("Osc"), None, "type keys are case-sensitive");
    }

    #[test]
    fn param_names_unique_within_template() {
        for template in NodeTemplate::ALL {
            let params = template.params();
            for (i, p) in params.iter().enumerate() {
                assert!(
                    params[i + 1..].iter().all(|q| q.name != p.name),
                    "{} declares '{}' twice",
                    template,
                    p.name
                );
            }
        }
    }

    #[test]
    fn defaults_lie_in_declared_domain() {
        for template in NodeTemplate::ALL {
            for p in template.params() {
                match p.default {
                    ParamDefault::Number(n) => assert!(
                        (p.min..=p.max).contains(&n),
                        "{}.{} default {} outside [{}, {}]",
                        template,
                        p.name,
                        n,
                        p.min,
                        p.max
                    ),
                    ParamDefault::Choice(c) => {
                        assert_eq!(p.kind, ParamKind::Select);
                        assert!(p.options.contains(&c), "{}.{}", template, p.name);
                    }
                    ParamDefault::Flag(_) => assert_eq!(p.kind, ParamKind::Boolean),
                }
            }
        }
    }

    #[test]
    fn only_lfo_and_env_modulate() {
        let modulators: Vec<_> = NodeTemplate::ALL
            .into_iter()
            .filter(|t| t.is_modulator())
            .collect();
        assert_eq!(modulators, vec![NodeTemplate::Lfo, NodeTemplate::Env]);
    }

    #[test]
    fn frequency_like_params() {
        let cutoff = NodeTemplate::Filter.param("cutoff").unwrap();
        assert!(cutoff.is_frequency_like());
        let mix = NodeTemplate::Reverb.param("mix").unwrap();
        assert!(!mix.is_frequency_like());
    }
}
