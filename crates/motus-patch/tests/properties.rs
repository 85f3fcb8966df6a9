//! Property-based tests for the patch sanitizer.
//!
//! Generates messy patch documents (unknown templates, colliding ids, wrong types,
//! dangling references) and checks totality, consistency and idempotence.

use std::collections::HashSet;

use motus_patch::{Patch, SINK_ID, SourceKind, TemplateRegistry, sanitize};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

/// Scalars of every JSON type. Numbers are multiples of 0.5 so they survive a
/// JSON round trip exactly.
fn scalar() -> impl Strategy<Value = Value> {
    let plain = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-40i32..40).prop_map(|n| json!(f64::from(n) / 2.0)),
        (0i32..40_000).prop_map(|n| json!(n)),
        Just(json!([1, 2])),
        Just(json!({})),
    ];
    let words = prop_oneof![
        Just(json!("abc")),
        Just(json!("3")),
        Just(json!("on")),
        Just(json!("sawtooth")),
        Just(json!("exp")),
        Just(json!("multiply")),
    ];
    prop_oneof![3 => plain, 1 => words]
}

fn id_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!("n1")),
        Just(json!("n2")),
        Just(json!("n3")),
        Just(json!("src1")),
        Just(json!("pitch")),
        Just(json!("out")),
        Just(json!("  ")),
        Just(json!(7)),
        Just(json!("lfoA")),
    ]
}

fn template() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!("osc")),
        Just(json!("filter")),
        Just(json!("gain")),
        Just(json!("lfo")),
        Just(json!("env")),
        Just(json!("theremin")),
        Just(Value::Null),
    ]
}

fn param_name() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("frequency"),
        Just("cutoff"),
        Just("level"),
        Just("waveform"),
        Just("mute"),
        Just("rate"),
        Just("wave"),
        Just("attack"),
        Just("bogus"),
    ]
}

fn param_entry() -> impl Strategy<Value = Value> {
    prop_oneof![
        scalar(),
        (scalar(), scalar()).prop_map(|(base, slew)| json!({ "base": base, "slewMs": slew })),
    ]
}

fn object(fields: Vec<(&'static str, Value)>) -> Value {
    let map: Map<String, Value> = fields
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    Value::Object(map)
}

fn node() -> impl Strategy<Value = Value> {
    (
        id_value(),
        template(),
        prop::collection::vec((param_name(), param_entry()), 0..4),
        prop_oneof![
            Just(Value::Null),
            (scalar(), scalar()).prop_map(|(x, y)| json!({ "x": x, "y": y })),
        ],
    )
        .prop_map(|(id, ty, params, position)| {
            let params: Map<String, Value> =
                params.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
            object(vec![
                ("id", id),
                ("type", ty),
                ("params", Value::Object(params)),
                ("position", position),
            ])
        })
}

fn edge() -> impl Strategy<Value = Value> {
    prop_oneof![
        (id_value(), id_value()).prop_map(|(a, b)| json!([a, b])),
        (id_value(), id_value()).prop_map(|(a, b)| json!({ "from": a, "to": b })),
        scalar(),
    ]
}

fn pipe() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        scalar(),
        (scalar(), scalar(), scalar(), scalar(), scalar(), scalar()).prop_map(
            |(offset, scale, min, max, dead, hyst)| object(vec![
                ("offset", offset),
                ("scale", scale),
                ("min", min),
                ("max", max),
                ("dead", dead),
                ("hyst", hyst),
            ])
        ),
    ]
}

fn source() -> impl Strategy<Value = Value> {
    (
        id_value(),
        prop_oneof![
            Just(json!("imu")),
            Just(json!("lfo")),
            Just(json!("env")),
            Just(json!("laser")),
            Just(Value::Null),
        ],
        prop_oneof![id_value(), Just(json!("gyro.x"))],
        pipe(),
    )
        .prop_map(|(id, kind, metric, pipe)| {
            object(vec![("id", id), ("kind", kind), ("metric", metric), ("pipe", pipe)])
        })
}

fn target() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!("n1.cutoff")),
        Just(json!("n1.level")),
        Just(json!("n2.frequency")),
        Just(json!("n2.level")),
        Just(json!("n3.rate")),
        Just(json!("n1.")),
        Just(json!("cutoff")),
        Just(json!(4)),
    ]
}

fn route() -> impl Strategy<Value = Value> {
    (
        (id_value(), id_value(), target()),
        (scalar(), scalar(), scalar(), scalar()),
        (scalar(), scalar(), scalar()),
        prop_oneof![
            Just(Value::Null),
            scalar(),
            (scalar(), scalar()).prop_map(|(a, b)| json!([a, b])),
        ],
    )
        .prop_map(|((id, src, target), (amount, curve, op, bipolar), (slew, dead, hyst), range)| {
            object(vec![
                ("id", id),
                ("src", src),
                ("target", target),
                ("amount", amount),
                ("curve", curve),
                ("op", op),
                ("bipolar", bipolar),
                ("slewMs", slew),
                ("dead", dead),
                ("hyst", hyst),
                ("range", range),
            ])
        })
}

fn document() -> impl Strategy<Value = Value> {
    (
        prop::collection::vec(node(), 0..5),
        prop::collection::vec(edge(), 0..5),
        prop::collection::vec(source(), 0..4),
        prop::collection::vec(route(), 0..6),
        any::<bool>(),
    )
        .prop_map(|(nodes, edges, sources, routes, mangle)| {
            let mut doc = json!({
                "nodes": nodes,
                "edges": edges,
                "sources": sources,
                "routes": routes,
            });
            if mangle {
                doc["edges"] = json!("not a list");
            }
            doc
        })
}

fn assert_consistent(patch: &Patch, registry: &TemplateRegistry) -> Result<(), TestCaseError> {
    let mut seen = HashSet::new();
    for node in &patch.nodes {
        prop_assert!(seen.insert(node.id.as_str()), "duplicate node id {}", node.id);
        prop_assert!(registry.contains(&node.template));
        prop_assert!(node.id != SINK_ID);
        prop_assert!(node.position.x.is_finite() && node.position.y.is_finite());
    }
    for source in &patch.sources {
        prop_assert!(seen.insert(source.id.as_str()), "source id {} collides", source.id);
        if source.kind != SourceKind::Imu {
            let backing = patch.node(&source.metric);
            prop_assert!(backing.is_some_and(|n| registry.is_modulator(&n.template)));
        }
    }

    let mut edges = HashSet::new();
    for edge in &patch.edges {
        prop_assert!(patch.node(edge.from()).is_some());
        prop_assert!(edge.to() == SINK_ID || patch.node(edge.to()).is_some());
        prop_assert!(edge.from() != edge.to());
        prop_assert!(edges.insert(edge.clone()), "duplicate edge {:?}", edge);
    }

    let mut route_ids = HashSet::new();
    let mut pairs = HashSet::new();
    for route in &patch.routes {
        prop_assert!(route_ids.insert(route.id.as_str()));
        prop_assert!(pairs.insert((route.src.as_str(), route.target.as_str())));
        let (node_id, param) = route.target_parts().unwrap();
        let node = patch.node(node_id).unwrap();
        prop_assert!(registry.param(&node.template, param).is_some());
        prop_assert!(
            patch.resolve_source(&route.src).is_some()
                || patch
                    .node(&route.src)
                    .is_some_and(|n| registry.is_modulator(&n.template))
        );
        prop_assert!(route.range[0] <= route.range[1]);
        for n in [route.amount, route.slew_ms, route.dead, route.smooth_ms, route.hyst] {
            prop_assert!(n.is_finite() && n >= 0.0);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(400))]

    /// Any object document sanitizes without error into a patch with no dangling references.
    #[test]
    fn sanitizer_is_total(doc in document()) {
        let registry = TemplateRegistry::new();
        let (patch, _) = sanitize(&doc, &registry).unwrap();
        assert_consistent(&patch, &registry)?;
    }

    /// Sanitizing a sanitized patch changes nothing and reports nothing.
    #[test]
    fn sanitizer_is_idempotent(doc in document()) {
        let registry = TemplateRegistry::new();
        let (first, _) = sanitize(&doc, &registry).unwrap();
        let reparsed = serde_json::to_value(&first).unwrap();
        let (second, report) = sanitize(&reparsed, &registry).unwrap();
        prop_assert_eq!(&second, &first);
        prop_assert!(report.is_clean(), "second pass repaired: {:?}", report.repairs);
    }

    /// Repeated `(src, target)` routes collapse into the first one, carrying the last fields.
    #[test]
    fn duplicate_routes_merge(amounts in prop::collection::vec(0u8..20, 1..6)) {
        let registry = TemplateRegistry::new();
        let routes: Vec<Value> = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| json!({
                "id": format!("r{}", i + 1),
                "src": "pitch",
                "target": "n1.cutoff",
                "amount": f64::from(*a) / 4.0,
            }))
            .collect();
        let doc = json!({
            "nodes": [{ "id": "n1", "type": "filter", "position": { "x": 0, "y": 0 } }],
            "routes": routes,
        });
        let (patch, report) = sanitize(&doc, &registry).unwrap();
        prop_assert_eq!(patch.routes.len(), 1);
        prop_assert_eq!(patch.routes[0].id.as_str(), "r1");
        let last = f64::from(*amounts.last().unwrap()) / 4.0;
        prop_assert_eq!(patch.routes[0].amount, last);
        prop_assert_eq!(report.len(), amounts.len() - 1);
    }
}

#[test]
fn non_object_documents_fail() {
    let registry = TemplateRegistry::new();
    for doc in [json!(null), json!([]), json!("patch"), json!(3)] {
        assert!(sanitize(&doc, &registry).is_err(), "{doc} should be rejected");
    }
}
