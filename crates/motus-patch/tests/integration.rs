//! Integration tests for motus-patch.
//!
//! Tests import of damaged documents, editing through the store, and factory
//! patches surviving an export/import cycle.

use std::cell::RefCell;
use std::rc::Rc;

use motus_core::{Curve, ParamBase};
use motus_patch::{
    Change, Entity, Note, Op, PatchStore, Repair, Route, RouteUpsert, Source, SourceKind,
    TemplateRegistry, factory_patch_names, get_factory_patch, sanitize_str,
};

const DAMAGED: &str = r#"{
  "nodes": [
    { "id": "f", "type": "filter", "position": { "x": 10, "y": 20 },
      "params": { "cutoff": { "base": 99999, "slewMs": -5 }, "mode": "wah", "drive": 3 } },
    { "id": "f", "type": "gain" },
    { "type": "kazoo" },
    { "id": "lfo", "type": "lfo", "position": { "x": 0, "y": 200 } }
  ],
  "edges": [["f", "out"], ["f", "out"], ["f", "ghost"], ["lfo", "lfo"]],
  "sources": [
    { "id": "tilt", "kind": "imu", "metric": "orientation.beta", "pipe": { "min": -45, "max": 45, "hyst": "lots" } },
    { "kind": "env", "metric": "lfo" },
    { "id": "orphan", "kind": "lfo", "metric": "nowhere" }
  ],
  "routes": [
    { "id": "r1", "src": "tilt", "target": "f.cutoff", "range": [8000, 200], "curve": "sqrt" },
    { "id": "r2", "src": "lfo", "target": "n1.level", "op": "ring", "amount": -1 },
    { "id": "r3", "src": "tilt", "target": "f.cutoff", "amount": 0.5, "curve": "exp" },
    { "src": "ghost", "target": "f.cutoff" },
    { "src": "pitch", "target": "f.resonance.extra" }
  ]
}"#;

#[test]
fn damaged_document_is_repaired() {
    let registry = TemplateRegistry::new();
    let (patch, report) = sanitize_str(DAMAGED, &registry).unwrap();

    let ids: Vec<_> = patch.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["f", "n1", "lfo"]);

    let filter = patch.node("f").unwrap();
    assert_eq!(filter.params["cutoff"].base, ParamBase::Number(20000.0));
    assert_eq!(filter.params["cutoff"].slew_ms, 30.0);
    assert_eq!(filter.params["mode"].base, ParamBase::from("lowpass"));
    assert!(!filter.params.contains_key("drive"));

    assert_eq!(patch.edges.len(), 1);
    assert!(patch.has_edge("f", "out"));

    assert_eq!(patch.sources.len(), 2);
    let tilt = patch.source("tilt").unwrap();
    assert_eq!(tilt.pipe.min, -45.0);
    assert_eq!(tilt.pipe.hyst, 0.0);
    let env = &patch.sources[1];
    assert_eq!(env.kind, SourceKind::Lfo, "kind follows the backing node");

    assert_eq!(patch.routes.len(), 2);
    let cutoff = patch.route("r1").unwrap();
    assert_eq!(cutoff.amount, 0.5);
    assert_eq!(cutoff.curve, Curve::Exp);
    assert_eq!(cutoff.range, [0.0, 1.0], "later duplicate carries its own range");
    let ring = patch.route("r2").unwrap();
    assert_eq!(ring.op, Op::Ring);
    assert_eq!(ring.amount, 0.0);

    assert!(report.repairs.iter().any(|r| matches!(
        r,
        Repair::ReassignedId { entity: Entity::Node, to, .. } if to == "n1"
    )));
    assert!(report
        .repairs
        .iter()
        .any(|r| matches!(r, Repair::MergedRoute { into, .. } if into == "r1")));
    assert!(report
        .repairs
        .iter()
        .any(|r| matches!(r, Repair::DroppedSource { .. })));
    assert_eq!(
        report
            .repairs
            .iter()
            .filter(|r| matches!(r, Repair::DroppedRoute { .. }))
            .count(),
        2
    );
}

#[test]
fn repaired_document_is_stable() {
    let registry = TemplateRegistry::new();
    let (patch, _) = sanitize_str(DAMAGED, &registry).unwrap();
    let (again, report) = sanitize_str(&patch.to_json().unwrap(), &registry).unwrap();
    assert_eq!(again, patch);
    assert!(report.is_clean(), "{:?}", report.repairs);
}

#[test]
fn store_editing_session() {
    let registry = TemplateRegistry::new();
    let mut store = PatchStore::new();
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);
    store.subscribe(move |change, _| sink.borrow_mut().push(change));

    let (osc, lfo) = store
        .try_edit(|patch| {
            let osc = patch.add_node(&registry, "osc")?;
            let lfo = patch.add_node(&registry, "lfo")?;
            patch.connect(&osc, "out")?;
            Ok((osc, lfo))
        })
        .unwrap();

    let src = store
        .try_edit(|patch| patch.add_modulator_source(&registry, &lfo))
        .unwrap();
    let created = store
        .try_edit(|patch| {
            let route = patch
                .default_route(&src, &format!("{osc}.frequency"))
                .with_range(200.0, 240.0);
            patch.upsert_route(&registry, route)
        })
        .unwrap();
    assert!(matches!(created, RouteUpsert::Created(_)));

    let updated = store
        .try_edit(|patch| {
            let route = Route::new("", &src, format!("{osc}.frequency")).with_amount(0.25);
            patch.upsert_route(&registry, route)
        })
        .unwrap();
    assert_eq!(updated.id(), created.id());
    assert_eq!(store.patch().routes.len(), 1);

    store.append_note_log(Note::new(0.0, "edited"));
    assert_eq!(
        *changes.borrow(),
        vec![Change::Patch, Change::Patch, Change::Patch, Change::Patch, Change::NoteLog]
    );

    store.try_edit(|patch| patch.remove_node(&lfo)).unwrap();
    assert!(store.patch().sources.is_empty());
    assert!(store.patch().routes.is_empty());
    assert_eq!(store.patch().nodes.len(), 1);
}

#[test]
fn user_source_template_is_not_aliased() {
    let registry = TemplateRegistry::new();
    let mut store = PatchStore::new();
    let template = Source::imu("", "motion.x", "Sway");
    let first = store
        .try_edit(|patch| patch.add_source(&registry, &template))
        .unwrap();
    store
        .try_edit(|patch| {
            let id = patch.add_source(&registry, &template)?;
            if let Some(s) = patch.sources.iter_mut().find(|s| s.id == id) {
                s.pipe.invert = true;
            }
            Ok(id)
        })
        .unwrap();
    assert!(!store.patch().source(&first).unwrap().pipe.invert);
}

#[test]
fn route_order_survives_round_trip() {
    let registry = TemplateRegistry::new();
    let mut store = PatchStore::new();
    store
        .try_edit(|patch| {
            let gain = patch.add_node(&registry, "gain")?;
            let level = format!("{gain}.level");
            for (src, op) in [("pitch", Op::Multiply), ("roll", Op::Ring), ("yaw", Op::Crossfade)] {
                patch.upsert_route(&registry, Route::new("", src, &level).with_op(op))?;
            }
            let last = patch.routes[2].id.clone();
            patch.move_route(&last, 0)
        })
        .unwrap();

    let json = store.export_json().unwrap();
    let mut copy = PatchStore::new();
    copy.import_json(&json, &registry).unwrap();
    let ops: Vec<_> = copy.patch().routes.iter().map(|r| r.op).collect();
    assert_eq!(ops, vec![Op::Crossfade, Op::Multiply, Op::Ring]);
}

#[test]
fn factory_patches_round_trip() {
    let registry = TemplateRegistry::new();
    for name in factory_patch_names() {
        let patch = get_factory_patch(name, &registry).unwrap();
        let mut store = PatchStore::with_patch(patch.clone());
        let json = store.export_json().unwrap();
        let report = store.import_json(&json, &registry).unwrap();
        assert!(report.is_clean(), "{name}: {:?}", report.repairs);
        assert_eq!(store.patch(), &patch, "{name}");
    }
}
