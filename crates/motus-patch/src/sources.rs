//! Built-in sensor sources.
//!
//! These are always available to routes without being stored in a patch. Angles
//! are in degrees, accelerations in g, and `energy` is a derived 0..1 motion scalar.

use std::sync::LazyLock;

use motus_core::Pipe;

use crate::model::Source;

/// Ids of the default sources, in display order.
pub const DEFAULT_SOURCE_IDS: &[&str] = &["pitch", "roll", "yaw", "ax", "ay", "az", "energy"];

static DEFAULT_SOURCES: LazyLock<Vec<Source>> = LazyLock::new(|| {
    let angle = |range: f64| Pipe::with_range(-range, range);
    let accel = Pipe::with_range(-2.0, 2.0);
    vec![
        Source::imu("pitch", "pitch", "Pitch").with_pipe(angle(90.0)),
        Source::imu("roll", "roll", "Roll").with_pipe(angle(90.0)),
        Source::imu("yaw", "yaw", "Yaw").with_pipe(angle(180.0)),
        Source::imu("ax", "ax", "Accel X").with_pipe(accel.clone()),
        Source::imu("ay", "ay", "Accel Y").with_pipe(accel.clone()),
        Source::imu("az", "az", "Accel Z").with_pipe(accel),
        Source::imu("energy", "energy", "Motion Energy").with_pipe(Pipe::with_range(0.0, 1.0)),
    ]
});

/// The default source set.
pub fn default_sources() -> &'static [Source] {
    &DEFAULT_SOURCES
}

/// Default source by id.
pub fn default_source(id: &str) -> Option<&'static Source> {
    DEFAULT_SOURCES.iter().find(|s| s.id == id)
}

/// Returns `true` if `id` names a default source.
pub fn is_default_source(id: &str) -> bool {
    DEFAULT_SOURCE_IDS.contains(&id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use motus_core::evaluate_pipe;

    #[test]
    fn ids_match_table() {
        let ids: Vec<_> = default_sources().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, DEFAULT_SOURCE_IDS);
    }

    #[test]
    fn level_pitch_is_centered() {
        let pitch = default_source("pitch").unwrap();
        let state = evaluate_pipe(0.0, &pitch.pipe, None, 0.0);
        assert!((state.normalized - 0.5).abs() < 1e-12);

        let state = evaluate_pipe(45.0, &pitch.pipe, None, 0.0);
        assert!((state.normalized - 0.75).abs() < 1e-12);
    }

    #[test]
    fn energy_is_unipolar() {
        let energy = default_source("energy").unwrap();
        assert_eq!(evaluate_pipe(0.0, &energy.pipe, None, 0.0).normalized, 0.0);
        assert_eq!(evaluate_pipe(1.0, &energy.pipe, None, 0.0).normalized, 1.0);
    }

    #[test]
    fn unknown_is_not_default() {
        assert!(is_default_source("roll"));
        assert!(!is_default_source("out"));
        assert!(default_source("nope").is_none());
    }
}
