//! Factory patches bundled with the motus library.
//!
//! Built-in patch documents that are always available without external files.
//! They are stored as JSON and pass through the sanitizer on load, the same path
//! a user-supplied document takes.

use motus_registry::TemplateRegistry;

use crate::error::PatchError;
use crate::model::Patch;
use crate::sanitize::sanitize_str;

/// Array of factory patch names for external access.
pub static FACTORY_PATCH_NAMES: &[&str] = &["init", "tilt_filter", "lfo_wobble", "motion_swell"];

/// `(name, description, json)` for each factory patch.
static FACTORY_PATCHES_JSON: &[(&str, &str, &str)] = &[
    ("init", "Sine oscillator into a gain stage, no modulation", INIT_PATCH),
    (
        "tilt_filter",
        "Device pitch sweeps a lowpass cutoff, roll pans the voice",
        TILT_FILTER_PATCH,
    ),
    (
        "lfo_wobble",
        "LFO vibrato on an oscillator plus an LFO tremolo source",
        LFO_WOBBLE_PATCH,
    ),
    (
        "motion_swell",
        "Motion energy crossfades filtered noise into a long reverb",
        MOTION_SWELL_PATCH,
    ),
];

const INIT_PATCH: &str = r#"{
  "nodes": [
    { "id": "n1", "type": "osc", "position": { "x": 80, "y": 80 },
      "params": { "frequency": { "base": 220, "slewMs": 20 }, "waveform": { "base": "sine", "slewMs": 0 } } },
    { "id": "n2", "type": "gain", "position": { "x": 300, "y": 80 },
      "params": { "level": { "base": 0.8, "slewMs": 20 } } }
  ],
  "edges": [["n1", "n2"], ["n2", "out"]],
  "sources": [],
  "routes": []
}"#;

const TILT_FILTER_PATCH: &str = r#"{
  "nodes": [
    { "id": "n1", "type": "osc", "position": { "x": 80, "y": 80 },
      "params": { "waveform": { "base": "sawtooth", "slewMs": 0 }, "frequency": { "base": 110, "slewMs": 20 } } },
    { "id": "n2", "type": "filter", "position": { "x": 300, "y": 80 },
      "params": { "cutoff": { "base": 800, "slewMs": 30 }, "resonance": { "base": 4, "slewMs": 30 } } },
    { "id": "n3", "type": "pan", "position": { "x": 520, "y": 80 } }
  ],
  "edges": [["n1", "n2"], ["n2", "n3"], ["n3", "out"]],
  "sources": [],
  "routes": [
    { "id": "r1", "src": "pitch", "target": "n2.cutoff", "amount": 1, "range": [200, 8000],
      "curve": "exp", "op": "add", "bipolar": false, "slewMs": 40, "smoothMs": 60 },
    { "id": "r2", "src": "roll", "target": "n3.position", "amount": 1, "range": [-1, 1],
      "curve": "lin", "op": "add", "bipolar": false, "slewMs": 30, "hyst": 0.01 }
  ]
}"#;

const LFO_WOBBLE_PATCH: &str = r#"{
  "nodes": [
    { "id": "n1", "type": "lfo", "position": { "x": 80, "y": 80 },
      "params": { "rate": { "base": 5, "slewMs": 0 }, "wave": { "base": "sine", "slewMs": 0 } } },
    { "id": "n2", "type": "lfo", "position": { "x": 80, "y": 240 },
      "params": { "rate": { "base": 0.5, "slewMs": 0 }, "wave": { "base": "triangle", "slewMs": 0 } } },
    { "id": "n3", "type": "osc", "position": { "x": 300, "y": 80 } },
    { "id": "n4", "type": "gain", "position": { "x": 520, "y": 80 } }
  ],
  "edges": [["n3", "n4"], ["n4", "out"]],
  "sources": [
    { "id": "src1", "kind": "lfo", "metric": "n2", "label": "Tremolo LFO",
      "pipe": { "min": 0, "max": 1, "smoothMs": 10 } }
  ],
  "routes": [
    { "id": "r1", "src": "n1", "target": "n3.frequency", "amount": 1, "range": [210, 230],
      "curve": "lin", "op": "add", "bipolar": false, "slewMs": 10 },
    { "id": "r2", "src": "src1", "target": "n4.level", "amount": 0.6, "range": [0, 1],
      "curve": "lin", "op": "multiply", "bipolar": false, "slewMs": 20 }
  ]
}"#;

const MOTION_SWELL_PATCH: &str = r#"{
  "nodes": [
    { "id": "n1", "type": "noise", "position": { "x": 80, "y": 80 },
      "params": { "color": { "base": "pink", "slewMs": 0 }, "level": { "base": 0.4, "slewMs": 20 } } },
    { "id": "n2", "type": "filter", "position": { "x": 300, "y": 80 },
      "params": { "cutoff": { "base": 2400, "slewMs": 30 }, "mode": { "base": "bandpass", "slewMs": 0 } } },
    { "id": "n3", "type": "reverb", "position": { "x": 520, "y": 80 },
      "params": { "decay": { "base": 6000, "slewMs": 100 } } }
  ],
  "edges": [["n1", "n2"], ["n2", "n3"], ["n3", "out"]],
  "sources": [],
  "routes": [
    { "id": "r1", "src": "energy", "target": "n3.mix", "amount": 0.8, "range": [0.1, 0.9],
      "curve": "log", "op": "crossfade", "bipolar": false, "slewMs": 120, "smoothMs": 200 },
    { "id": "r2", "src": "yaw", "target": "n2.cutoff", "amount": 1, "range": [400, 6000],
      "curve": "exp", "op": "add", "bipolar": false, "slewMs": 60, "dead": 0.02 }
  ]
}"#;

/// Load every factory patch.
///
/// Patches that fail to load are skipped.
pub fn factory_patches(registry: &TemplateRegistry) -> Vec<(&'static str, Patch)> {
    FACTORY_PATCHES_JSON
        .iter()
        .filter_map(|(name, _, json)| {
            sanitize_str(json, registry)
                .ok()
                .map(|(patch, _)| (*name, patch))
        })
        .collect()
}

/// Load a factory patch by name (case-insensitive).
///
/// # Errors
///
/// [`PatchError::UnknownFactoryPatch`] if no factory patch has this name.
pub fn get_factory_patch(name: &str, registry: &TemplateRegistry) -> Result<Patch, PatchError> {
    let json = factory_patch_json(name).ok_or_else(|| PatchError::UnknownFactoryPatch(name.to_string()))?;
    let (patch, _) = sanitize_str(json, registry)?;
    Ok(patch)
}

/// Raw JSON of a factory patch (case-insensitive).
pub fn factory_patch_json(name: &str) -> Option<&'static str> {
    FACTORY_PATCHES_JSON
        .iter()
        .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, _, json)| *json)
}

/// One-line description of a factory patch.
pub fn factory_patch_description(name: &str) -> Option<&'static str> {
    FACTORY_PATCHES_JSON
        .iter()
        .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, description, _)| *description)
}

/// Get the names of all factory patches.
pub fn factory_patch_names() -> Vec<&'static str> {
    FACTORY_PATCHES_JSON.iter().map(|(name, _, _)| *name).collect()
}

/// Check if a name is a factory patch (case-insensitive).
pub fn is_factory_patch(name: &str) -> bool {
    FACTORY_PATCH_NAMES.iter().any(|n| n.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Op, SourceKind};

    #[test]
    fn test_factory_patches_load() {
        let registry = TemplateRegistry::new();
        let patches = factory_patches(&registry);
        assert_eq!(patches.len(), FACTORY_PATCH_NAMES.len());
        let names: Vec<_> = patches.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, FACTORY_PATCH_NAMES);
    }

    #[test]
    fn test_factory_patches_are_clean() {
        let registry = TemplateRegistry::new();
        for name in FACTORY_PATCH_NAMES {
            let json = factory_patch_json(name).unwrap();
            let (_, report) = sanitize_str(json, &registry).unwrap();
            assert!(report.is_clean(), "{name} needed repairs: {:?}", report.repairs);
        }
    }

    #[test]
    fn test_get_factory_patch() {
        let registry = TemplateRegistry::new();
        assert!(get_factory_patch("tilt_filter", &registry).is_ok());
        assert!(get_factory_patch("TILT_FILTER", &registry).is_ok());
        assert!(matches!(
            get_factory_patch("nonexistent", &registry),
            Err(PatchError::UnknownFactoryPatch(_))
        ));
    }

    #[test]
    fn test_factory_patch_names() {
        let names = factory_patch_names();
        assert!(names.contains(&"init"));
        assert!(is_factory_patch("Motion_Swell"));
        assert!(!is_factory_patch("my_patch"));
        for name in names {
            assert!(factory_patch_description(name).is_some());
        }
    }

    #[test]
    fn test_init_patch_has_no_modulation() {
        let patch = get_factory_patch("init", &TemplateRegistry::new()).unwrap();
        assert_eq!(patch.nodes.len(), 2);
        assert!(patch.routes.is_empty());
        assert!(patch.has_edge("n2", "out"));
    }

    #[test]
    fn test_lfo_wobble_structure() {
        let patch = get_factory_patch("lfo_wobble", &TemplateRegistry::new()).unwrap();
        let source = patch.source("src1").unwrap();
        assert_eq!(source.kind, SourceKind::Lfo);
        assert_eq!(source.backing_node(), Some("n2"));
        assert_eq!(patch.route("r1").unwrap().src, "n1");
        assert_eq!(patch.route("r2").unwrap().op, Op::Multiply);
    }

    #[test]
    fn test_motion_swell_uses_crossfade() {
        let patch = get_factory_patch("motion_swell", &TemplateRegistry::new()).unwrap();
        let swell = patch.find_route("energy", "n3.mix").unwrap();
        assert_eq!(swell.op, Op::Crossfade);
        assert_eq!(swell.range, [0.1, 0.9]);
    }
}
