//! Property-based tests for motus-engine.
//!
//! Feeds random sensor frames through the factory patches and checks that every
//! write is finite, inside its parameter's domain, and reproducible.

use motus_core::SensorFrame;
use motus_engine::{EngineConfig, EngineInstance};
use motus_patch::{DEFAULT_SOURCE_IDS, FACTORY_PATCH_NAMES, Patch, TemplateRegistry, get_factory_patch};
use motus_registry::SimBackend;
use proptest::prelude::*;

/// Reading for one metric: mostly plausible, sometimes wild or non-finite.
fn reading() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -200.0f64..200.0,
        1 => -1.0e9f64..1.0e9,
        1 => prop_oneof![Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)],
    ]
}

fn frame() -> impl Strategy<Value = SensorFrame> {
    prop::collection::vec(
        (prop::sample::select(DEFAULT_SOURCE_IDS), reading()),
        0..DEFAULT_SOURCE_IDS.len(),
    )
    .prop_map(SensorFrame::from_pairs)
}

fn factory_patch() -> impl Strategy<Value = Patch> {
    prop::sample::select(FACTORY_PATCH_NAMES).prop_map(|name| {
        get_factory_patch(name, &TemplateRegistry::new()).expect("factory patch loads")
    })
}

/// Every route target's `last_value`, in route order.
fn route_targets(engine: &EngineInstance<SimBackend>) -> Vec<f64> {
    engine
        .patch()
        .routes
        .iter()
        .filter_map(|route| {
            let (node, param) = route.target_parts()?;
            engine.binding(node, param).map(|b| b.last_value())
        })
        .collect()
}

fn run(patch: &Patch, frames: &[(SensorFrame, f64)]) -> Vec<Vec<f64>> {
    let mut engine = EngineInstance::new(SimBackend::new(), EngineConfig::default());
    engine.apply_patch(patch);
    let mut now = 0.0;
    frames
        .iter()
        .map(|(frame, step)| {
            now += step;
            engine.push_metrics(frame.clone(), now);
            engine.tick(now);
            route_targets(&engine)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Whatever the sensors report, every value written stays finite and inside
    /// the target parameter's declared domain.
    #[test]
    fn writes_stay_in_domain(
        patch in factory_patch(),
        frames in prop::collection::vec((frame(), 0.0f64..50.0), 1..30),
    ) {
        let registry = TemplateRegistry::new();
        let mut engine = EngineInstance::new(SimBackend::new(), EngineConfig::default());
        engine.apply_patch(&patch);
        let mut now = 0.0;
        for (frame, step) in &frames {
            now += step;
            engine.push_metrics(frame.clone(), now);
            engine.tick(now);
            for route in &patch.routes {
                let Some((node, param)) = route.target_parts() else { continue };
                let Some(binding) = engine.binding(node, param) else { continue };
                let template = &patch.node(node).unwrap().template;
                let desc = registry.param(template, param).unwrap();
                let value = binding.last_value();
                prop_assert!(value.is_finite(), "{}: {}", route.target, value);
                prop_assert!(
                    (desc.min..=desc.max).contains(&value),
                    "{} = {} outside [{}, {}]", route.target, value, desc.min, desc.max
                );
            }
        }
    }

    /// Two engines fed the same frames at the same times write the same values.
    #[test]
    fn evaluation_is_deterministic(
        patch in factory_patch(),
        frames in prop::collection::vec((frame(), 0.0f64..50.0), 1..20),
    ) {
        prop_assert_eq!(run(&patch, &frames), run(&patch, &frames));
    }
}
