//! The routing / combination pass.
//!
//! Once per tick every route reads its source's published 0..1 value, maps it
//! through its own polarity, curve and range, and folds the result into an
//! accumulator for its target parameter. Routes sharing a target fold in stored
//! order: `multiply`, `ring` and `crossfade` see the accumulator left by earlier
//! routes, so reordering routes changes the result.
//!
//! [`fold_routes`] does the folding and returns one [`TargetValue`] per touched
//! target in first-appearance order. Applying those values to bindings is left to
//! the caller, which keeps this module free of backend types.

use std::collections::HashMap;

use motus_core::{PipeState, clamp_bounds, clamp01, condition, finite_or, lerp};
use motus_patch::{Op, Route};

/// What the fold needs to know about one target parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetInfo {
    /// The binding's recorded rest value.
    pub base: f64,
    /// Lowest ramp time for the target.
    pub slew_floor_ms: f64,
    /// Whether the parameter carries a frequency.
    pub frequency_like: bool,
    /// Declared `[min, max]` of the parameter.
    pub domain: (f64, f64),
}

/// Final value for one target after all its routes are folded.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetValue<'r> {
    /// `"nodeId.param"`.
    pub target: &'r str,
    /// Node id part.
    pub node_id: &'r str,
    /// Parameter part.
    pub param: &'r str,
    /// Value to apply.
    pub value: f64,
    /// Ramp duration: the longest slew any route asked for, floored by the target.
    pub slew_ms: f64,
}

/// A frequency-like target pushed far from its base.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyExcursion {
    /// Route id.
    pub route: String,
    /// Route target.
    pub target: String,
    /// Binding base.
    pub base: f64,
    /// Route's mapped value.
    pub mapped: f64,
}

/// A route's contribution before combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteValue {
    /// Operator input: the source value in the route's polarity, after the dead-zone.
    pub input: f64,
    /// Curved value interpolated into the route's range.
    pub mapped: f64,
}

/// Map a source's 0..1 value through one route.
///
/// Applies polarity, the route dead-zone, re-normalization, the route curve,
/// smoothing and hysteresis (against `prev`), and the range. Returns the value and
/// the route's new conditioning state.
pub fn map_route(route: &Route, normalized: f64, prev: Option<&PipeState>, now_ms: f64) -> (RouteValue, PipeState) {
    let unit = clamp01(finite_or(normalized, 0.0));
    let mut input = if route.bipolar { unit * 2.0 - 1.0 } else { unit };
    if input.abs() < finite_or(route.dead, 0.0) {
        input = 0.0;
    }

    let renormalized = if route.bipolar { (input + 1.0) * 0.5 } else { input };
    let curved = route.curve.apply(renormalized);
    let (published, smoothed) = condition(curved, route.smooth_ms, route.hyst, prev, now_ms);

    let [lo, hi] = route.range;
    let mapped = finite_or(lerp(lo, hi, published), lo);
    let state = PipeState {
        value: input,
        normalized: published,
        smoothed,
        at: now_ms,
    };
    (RouteValue { input, mapped }, state)
}

/// Fold one route into `acc`.
///
/// `acc` starts at `base` for the first route on a target. A non-finite result
/// leaves `acc` unchanged.
pub fn combine(op: Op, acc: f64, base: f64, value: RouteValue, amount: f64) -> f64 {
    let RouteValue { input, mapped } = value;
    let next = match op {
        Op::Add => acc + (mapped - base) * amount,
        Op::Multiply => acc * (1.0 + input * amount),
        Op::Ring => acc + base * input * amount,
        Op::Crossfade => base * (1.0 - amount) + mapped * amount,
    };
    if next.is_finite() { next } else { acc }
}

struct Accumulator<'r> {
    target: &'r str,
    node_id: &'r str,
    param: &'r str,
    info: TargetInfo,
    acc: f64,
    slew_ms: f64,
}

/// Inputs of one routing pass besides the routes themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassContext {
    /// Tick time.
    pub now_ms: f64,
    /// See [`EngineConfig::freq_note_threshold`](crate::EngineConfig::freq_note_threshold).
    pub freq_note_threshold: f64,
}

/// Output of [`fold_routes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingOutcome<'r> {
    /// One entry per touched target, in first-appearance order.
    pub targets: Vec<TargetValue<'r>>,
    /// Frequency-like excursions worth a note.
    pub excursions: Vec<FrequencyExcursion>,
    /// Routes skipped because their source or target did not resolve.
    pub skipped: usize,
}

/// Fold every route into per-target values.
///
/// `source` returns a source's published 0..1 value; `target` describes a
/// `(node_id, param)` pair. Either returning `None` skips the route. `states` holds
/// per-route conditioning state keyed by route id and is updated in place.
pub fn fold_routes<'r>(
    routes: &'r [Route],
    ctx: PassContext,
    states: &mut HashMap<String, PipeState>,
    mut source: impl FnMut(&str) -> Option<f64>,
    mut target: impl FnMut(&str, &str) -> Option<TargetInfo>,
) -> RoutingOutcome<'r> {
    let mut outcome = RoutingOutcome::default();
    let mut accumulators: Vec<Accumulator<'r>> = Vec::new();
    let mut index: HashMap<&'r str, usize> = HashMap::new();

    for route in routes {
        let Some((node_id, param)) = route.target_parts() else {
            outcome.skipped += 1;
            continue;
        };
        let Some(normalized) = source(&route.src) else {
            outcome.skipped += 1;
            continue;
        };
        let slot = match index.get(route.target.as_str()) {
            Some(&slot) => slot,
            None => {
                let Some(info) = target(node_id, param) else {
                    outcome.skipped += 1;
                    continue;
                };
                accumulators.push(Accumulator {
                    target: &route.target,
                    node_id,
                    param,
                    info,
                    acc: info.base,
                    slew_ms: info.slew_floor_ms.max(0.0),
                });
                index.insert(&route.target, accumulators.len() - 1);
                accumulators.len() - 1
            }
        };

        let (value, state) = map_route(route, normalized, states.get(&route.id), ctx.now_ms);
        states.insert(route.id.clone(), state);

        let slot = &mut accumulators[slot];
        let base = slot.info.base;
        slot.acc = combine(route.op, slot.acc, base, value, route.amount);
        slot.acc = clamp_bounds(slot.acc, route.range[0], route.range[1]);
        slot.slew_ms = slot.slew_ms.max(finite_or(route.slew_ms, 0.0));

        if slot.info.frequency_like && (value.mapped - base).abs() > ctx.freq_note_threshold {
            outcome.excursions.push(FrequencyExcursion {
                route: route.id.clone(),
                target: route.target.clone(),
                base,
                mapped: value.mapped,
            });
        }
    }

    outcome.targets = accumulators
        .into_iter()
        .map(|a| {
            let (lo, hi) = a.info.domain;
            TargetValue {
                target: a.target,
                node_id: a.node_id,
                param: a.param,
                value: clamp_bounds(a.acc, lo, hi),
                slew_ms: a.slew_ms,
            }
        })
        .collect();
    outcome
}
