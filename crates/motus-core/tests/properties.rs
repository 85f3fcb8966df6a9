//! Property-based tests for motus-core control primitives.
//!
//! Tests pipeline range, dead-zone, hysteresis and purity, plus binding finiteness,
//! using proptest for randomized input generation.

use motus_core::{
    Curve, Modulator, ParameterBinding, Pipe, PipeState, SlewedBinding, evaluate_pipe, Lfo,
    LfoWaveform,
};
use proptest::prelude::*;

fn curve_strategy() -> impl Strategy<Value = Curve> {
    prop_oneof![Just(Curve::Lin), Just(Curve::Exp), Just(Curve::Log)]
}

prop_compose! {
    fn pipe_strategy()(
        offset in -10.0f64..10.0,
        scale in prop_oneof![Just(0.0f64), -100.0f64..100.0],
        min in -100.0f64..100.0,
        width in prop_oneof![Just(0.0f64), -5.0f64..200.0],
        dead in 0.0f64..2.0,
        invert in any::<bool>(),
        curve in curve_strategy(),
        smooth_ms in prop_oneof![Just(0.0f64), 0.0f64..500.0],
        hyst in 0.0f64..0.5,
    ) -> Pipe {
        Pipe {
            offset,
            scale,
            min,
            max: min + width,
            dead,
            invert,
            curve,
            smooth_ms,
            hyst,
            bipolar: false,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// For any finite raw reading and any pipe (including `min == max` and
    /// `scale == 0`), the published value stays inside [0, 1].
    #[test]
    fn normalized_stays_in_unit_range(
        pipe in pipe_strategy(),
        raws in prop::collection::vec(-1.0e6f64..1.0e6, 1..20),
        step_ms in 0.0f64..100.0,
    ) {
        let mut prev: Option<PipeState> = None;
        for (i, raw) in raws.iter().enumerate() {
            let state = evaluate_pipe(*raw, &pipe, prev.as_ref(), i as f64 * step_ms);
            prop_assert!(
                (0.0..=1.0).contains(&state.normalized),
                "normalized {} out of range for raw {} with {:?}",
                state.normalized, raw, pipe
            );
            prop_assert!(state.value.is_finite());
            prev = Some(state);
        }
    }

    /// Readings whose scaled magnitude is inside the dead zone publish a zero value.
    #[test]
    fn dead_zone_forces_zero(
        dead in 0.0f64..1.0,
        fraction in -0.999f64..0.999,
        invert in any::<bool>(),
    ) {
        let pipe = Pipe { dead, invert, ..Pipe::default() };
        let raw = dead * fraction;
        let state = evaluate_pipe(raw, &pipe, None, 0.0);
        prop_assert_eq!(state.value, 0.0);
        prop_assert!((state.normalized - 0.5).abs() < 1e-12);
    }

    /// Consecutive readings closer together than `hyst` leave the published value unchanged.
    #[test]
    fn hysteresis_holds_output(
        hyst in 0.01f64..1.0,
        first in -1.0f64..1.0,
        fraction in -0.99f64..0.99,
        dt in 0.0f64..50.0,
    ) {
        let pipe = Pipe { hyst, ..Pipe::default() };
        let a = evaluate_pipe(first, &pipe, None, 0.0);
        let b = evaluate_pipe(first + hyst * fraction, &pipe, Some(&a), dt);
        prop_assert_eq!(a.normalized, b.normalized);
    }

    /// The pipeline is a pure function of its inputs.
    #[test]
    fn evaluation_is_repeatable(
        pipe in pipe_strategy(),
        prev_raw in -10.0f64..10.0,
        raw in -10.0f64..10.0,
        dt in 0.0f64..1000.0,
    ) {
        let prev = evaluate_pipe(prev_raw, &pipe, None, 0.0);
        let a = evaluate_pipe(raw, &pipe, Some(&prev), dt);
        let b = evaluate_pipe(raw, &pipe, Some(&prev), dt);
        prop_assert_eq!(a, b);
    }

    /// A slewed binding never reports a non-finite value, whatever it is asked to do.
    #[test]
    fn binding_stays_finite(
        base in -1000.0f64..1000.0,
        targets in prop::collection::vec(prop_oneof![
            -1.0e9f64..1.0e9,
            Just(f64::NAN),
            Just(f64::INFINITY),
        ], 1..30),
        slew in prop_oneof![Just(f64::NAN), 0.0f64..200.0],
    ) {
        let mut binding = SlewedBinding::new(base, 10.0);
        for (i, target) in targets.iter().enumerate() {
            binding.apply(*target, slew);
            binding.advance(i as f64 * 16.0);
            prop_assert!(binding.current().is_finite());
            prop_assert!(binding.last_value().is_finite());
        }
    }

    /// LFO output stays within its depth for any rate and tick pattern.
    #[test]
    fn lfo_output_bounded(
        rate in 0.0f64..50.0,
        depth in 0.0f64..1.0,
        wave in 0usize..5,
        steps in prop::collection::vec(0.0f64..200.0, 1..50),
    ) {
        let mut lfo = Lfo::new(rate);
        lfo.set_depth(depth);
        lfo.set_waveform(LfoWaveform::from_index(wave));
        let mut now = 0.0;
        for step in steps {
            now += step;
            let value = lfo.advance(now);
            prop_assert!(value.abs() <= depth + 1e-12);
            prop_assert!((0.0..=1.0).contains(&lfo.unipolar_value()));
        }
    }
}
