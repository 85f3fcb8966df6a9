//! Patch sanitizer.
//!
//! Turns an arbitrary parsed JSON document into a well-formed [`Patch`]. The pass is
//! total: every malformed entry is dropped or repaired field by field, and only a
//! top-level value that is not an object is rejected. Every repair is recorded in a
//! [`SanitizeReport`].
//!
//! Sanitizing is idempotent: feeding a sanitized patch back in (after a JSON round
//! trip) produces the same patch and an empty report.
//!
//! Order of work:
//!
//! 1. nodes: known templates only, unique ids, params clamped to their descriptors,
//!    positions on a fallback grid when missing
//! 2. edges: known endpoints (the sink `"out"` allowed downstream), no duplicates or self-edges
//! 3. sources: unique ids, kind fixed up, pipes merged against defaults field by field;
//!    modulator sources without a backing modulator node are dropped
//! 4. routes: resolvable target and src, unique ids, numbers made finite and
//!    non-negative, range ordered, enums restricted; a repeated `(src, target)`
//!    updates the earlier route in place

use std::collections::HashSet;
use std::fmt;

use motus_core::{Curve, ParamBase, ParamDescriptor, Pipe};
use motus_registry::{SINK_ID, TemplateRegistry};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PatchError;
use crate::model::{
    DEFAULT_RANGE, DEFAULT_ROUTE_SLEW_MS, Edge, Node, Op, ParamValue, Patch, Position, Route,
    Source, SourceKind, parse_target,
};
use crate::sources::{DEFAULT_SOURCE_IDS, default_source, is_default_source};

/// Kind of patch entity whose id was reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// A node.
    Node,
    /// A patch-local source.
    Source,
    /// A route.
    Route,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Node => "node",
            Entity::Source => "source",
            Entity::Route => "route",
        })
    }
}

/// One change the sanitizer made to the input document.
#[derive(Debug, Clone, PartialEq)]
pub enum Repair {
    /// A top-level collection was present but not an array.
    IgnoredSection {
        /// `"nodes"`, `"edges"`, `"sources"` or `"routes"`.
        section: &'static str,
    },
    /// A missing or colliding id was replaced.
    ReassignedId {
        /// Entity kind.
        entity: Entity,
        /// Index in the input array.
        index: usize,
        /// Original id, if any.
        from: Option<String>,
        /// New id.
        to: String,
    },
    /// A node was dropped.
    DroppedNode {
        /// Index in the input `nodes` array.
        index: usize,
        /// Why.
        reason: String,
    },
    /// A parameter not declared by the node's template was dropped.
    DroppedParam {
        /// Node id.
        node: String,
        /// Parameter name.
        param: String,
    },
    /// A parameter value or slew was replaced.
    RepairedParam {
        /// Node id.
        node: String,
        /// Parameter name.
        param: String,
        /// What was wrong.
        reason: &'static str,
    },
    /// A node position was missing or non-finite.
    DefaultedPosition {
        /// Node id.
        node: String,
    },
    /// An edge was dropped.
    DroppedEdge {
        /// Index in the input `edges` array.
        index: usize,
        /// Why.
        reason: String,
    },
    /// A source was dropped.
    DroppedSource {
        /// Index in the input `sources` array.
        index: usize,
        /// Why.
        reason: String,
    },
    /// A source field fell back to its default.
    RepairedSource {
        /// Source id.
        source: String,
        /// Field name (`pipe.*` for pipe fields).
        field: &'static str,
    },
    /// A route was dropped.
    DroppedRoute {
        /// Index in the input `routes` array.
        index: usize,
        /// Why.
        reason: String,
    },
    /// A route repeated an earlier `(src, target)` pair and updated it.
    MergedRoute {
        /// Index in the input `routes` array.
        index: usize,
        /// Id of the route that was updated.
        into: String,
    },
    /// A route field fell back to its default or was clamped.
    RepairedRoute {
        /// Route id.
        route: String,
        /// Field name.
        field: &'static str,
    },
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repair::IgnoredSection { section } => {
                write!(f, "ignored '{section}': not an array")
            }
            Repair::ReassignedId {
                entity,
                index,
                from,
                to,
            } => match from {
                Some(from) => write!(f, "{entity} #{index}: id '{from}' reassigned to '{to}'"),
                None => write!(f, "{entity} #{index}: assigned id '{to}'"),
            },
            Repair::DroppedNode { index, reason } => write!(f, "dropped node #{index}: {reason}"),
            Repair::DroppedParam { node, param } => {
                write!(f, "node '{node}': dropped undeclared param '{param}'")
            }
            Repair::RepairedParam {
                node,
                param,
                reason,
            } => write!(f, "node '{node}': param '{param}' {reason}"),
            Repair::DefaultedPosition { node } => {
                write!(f, "node '{node}': position moved to fallback grid")
            }
            Repair::DroppedEdge { index, reason } => write!(f, "dropped edge #{index}: {reason}"),
            Repair::DroppedSource { index, reason } => {
                write!(f, "dropped source #{index}: {reason}")
            }
            Repair::RepairedSource { source, field } => {
                write!(f, "source '{source}': '{field}' reset to default")
            }
            Repair::DroppedRoute { index, reason } => {
                write!(f, "dropped route #{index}: {reason}")
            }
            Repair::MergedRoute { index, into } => {
                write!(f, "route #{index} duplicates '{into}' and was merged into it")
            }
            Repair::RepairedRoute { route, field } => {
                write!(f, "route '{route}': '{field}' repaired")
            }
        }
    }
}

/// Everything the sanitizer changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizeReport {
    /// Repairs in the order they were made.
    pub repairs: Vec<Repair>,
}

impl SanitizeReport {
    /// Returns `true` if the document was already well-formed.
    pub fn is_clean(&self) -> bool {
        self.repairs.is_empty()
    }

    /// Number of repairs.
    pub fn len(&self) -> usize {
        self.repairs.len()
    }

    /// Returns `true` if there are no repairs.
    pub fn is_empty(&self) -> bool {
        self.repairs.is_empty()
    }

    fn push(&mut self, repair: Repair) {
        debug!(%repair, "sanitizer repair");
        self.repairs.push(repair);
    }
}

/// Sanitize a parsed document.
///
/// # Errors
///
/// Returns [`PatchError::NotAnObject`] if `doc` is not a JSON object. Every other
/// problem is repaired and recorded in the report.
///
/// # Example
///
/// ```rust
/// use motus_patch::sanitize;
/// use motus_registry::TemplateRegistry;
/// use serde_json::json;
///
/// let registry = TemplateRegistry::new();
/// let doc = json!({
///     "nodes": [
///         { "id": "f", "type": "filter", "params": { "cutoff": { "base": 99999 } } },
///         { "id": "x", "type": "theremin" }
///     ],
///     "routes": [{ "src": "pitch", "target": "f.cutoff", "range": [8000, 200] }]
/// });
///
/// let (patch, report) = sanitize(&doc, &registry).unwrap();
/// assert_eq!(patch.nodes.len(), 1);
/// assert_eq!(patch.nodes[0].params["cutoff"].base.as_f64(), Some(20000.0));
/// assert_eq!(patch.routes[0].range, [200.0, 8000.0]);
/// assert!(!report.is_clean());
/// ```
pub fn sanitize(
    doc: &Value,
    registry: &TemplateRegistry,
) -> Result<(Patch, SanitizeReport), PatchError> {
    let Some(root) = doc.as_object() else {
        return Err(PatchError::NotAnObject {
            found: PatchError::json_type_name(doc),
        });
    };

    let mut report = SanitizeReport::default();
    let mut patch = Patch::new();

    sanitize_nodes(section(root, "nodes", &mut report), registry, &mut patch, &mut report);
    sanitize_edges(section(root, "edges", &mut report), &mut patch, &mut report);
    sanitize_sources(section(root, "sources", &mut report), registry, &mut patch, &mut report);
    sanitize_routes(section(root, "routes", &mut report), registry, &mut patch, &mut report);

    if !report.is_clean() {
        debug!(repairs = report.len(), "patch sanitized with repairs");
    }
    Ok((patch, report))
}

/// Parse JSON text and sanitize it.
///
/// # Errors
///
/// Returns [`PatchError::Json`] on a syntax error and [`PatchError::NotAnObject`]
/// for a non-object document.
pub fn sanitize_str(
    text: &str,
    registry: &TemplateRegistry,
) -> Result<(Patch, SanitizeReport), PatchError> {
    let doc: Value = serde_json::from_str(text)?;
    sanitize(&doc, registry)
}

fn section<'a>(root: &'a Map<String, Value>, name: &'static str, report: &mut SanitizeReport) -> &'a [Value] {
    match root.get(name) {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(_) => {
            report.push(Repair::IgnoredSection { section: name });
            &[]
        }
    }
}

// --- id allocation ---

/// Hands out unique ids within one namespace.
///
/// Ids explicitly declared anywhere in the input are never handed out as fresh ids,
/// so an entry without an id cannot steal the id a later entry declares.
struct IdAllocator {
    taken: HashSet<String>,
    declared: HashSet<String>,
}

impl IdAllocator {
    fn new<'a>(reserved: impl IntoIterator<Item = &'a str>, items: &[Value]) -> Self {
        Self {
            taken: reserved.into_iter().map(str::to_string).collect(),
            declared: items
                .iter()
                .filter_map(|item| item.as_object().and_then(|o| id_of(o.get("id"))))
                .collect(),
        }
    }

    /// Claim `wanted` if free, otherwise a fresh `{prefix}{k}`. Returns whether the id changed.
    fn claim(&mut self, wanted: Option<&str>, prefix: &str) -> (String, bool) {
        if let Some(id) = wanted
            && !self.taken.contains(id)
        {
            self.taken.insert(id.to_string());
            return (id.to_string(), false);
        }
        let mut k = 1usize;
        loop {
            let candidate = format!("{prefix}{k}");
            if !self.taken.contains(&candidate) && !self.declared.contains(&candidate) {
                self.taken.insert(candidate.clone());
                return (candidate, true);
            }
            k += 1;
        }
    }
}

/// Fresh id with `prefix` not present in `taken`.
pub(crate) fn fresh_id<'a>(prefix: &str, taken: impl IntoIterator<Item = &'a str>) -> String {
    let mut allocator = IdAllocator {
        taken: taken.into_iter().map(str::to_string).collect(),
        declared: HashSet::new(),
    };
    allocator.claim(None, prefix).0
}

// --- scalar coercion ---

fn id_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Some(true),
            "false" | "off" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn text(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str)
}

/// Outcome of reading one optional field.
enum Field<T> {
    Missing,
    Valid(T),
    Invalid,
}

impl<T> Field<T> {
    /// Value or `default`; the flag is `true` when an invalid value was replaced.
    fn or(self, default: T) -> (T, bool) {
        match self {
            Field::Missing => (default, false),
            Field::Valid(v) => (v, false),
            Field::Invalid => (default, true),
        }
    }
}

fn read<T>(obj: &Map<String, Value>, key: &str, parse: impl Fn(&Value) -> Option<T>) -> Field<T> {
    match obj.get(key) {
        None | Some(Value::Null) => Field::Missing,
        Some(v) => parse(v).map_or(Field::Invalid, Field::Valid),
    }
}

/// Finite number clamped to `>= 0`. Negative values count as repaired.
fn read_non_negative(obj: &Map<String, Value>, key: &str, default: f64) -> (f64, bool) {
    match read(obj, key, number) {
        Field::Valid(n) if n < 0.0 => (0.0, true),
        field => field.or(default),
    }
}

fn param_base(value: &Value) -> Option<ParamBase> {
    match value {
        Value::Bool(b) => Some(ParamBase::Flag(*b)),
        Value::Number(n) => n.as_f64().map(ParamBase::Number),
        Value::String(s) => Some(ParamBase::Text(s.clone())),
        _ => None,
    }
}

// --- nodes ---

fn sanitize_nodes(
    items: &[Value],
    registry: &TemplateRegistry,
    patch: &mut Patch,
    report: &mut SanitizeReport,
) {
    let reserved = DEFAULT_SOURCE_IDS.iter().copied().chain([SINK_ID]);
    let mut ids = IdAllocator::new(reserved, items);

    for (index, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            report.push(Repair::DroppedNode {
                index,
                reason: "not an object".into(),
            });
            continue;
        };
        let Some(template_id) = text(obj.get("type")) else {
            report.push(Repair::DroppedNode {
                index,
                reason: "missing type".into(),
            });
            continue;
        };
        let Some(template) = registry.get(template_id) else {
            report.push(Repair::DroppedNode {
                index,
                reason: format!("unknown template '{template_id}'"),
            });
            continue;
        };

        let wanted = id_of(obj.get("id"));
        let (id, changed) = ids.claim(wanted.as_deref(), "n");
        if changed {
            report.push(Repair::ReassignedId {
                entity: Entity::Node,
                index,
                from: wanted,
                to: id.clone(),
            });
        }

        let position = match obj.get("position").and_then(Value::as_object) {
            Some(p) => match (p.get("x").and_then(number), p.get("y").and_then(number)) {
                (Some(x), Some(y)) => Some(Position { x, y }),
                _ => None,
            },
            None => None,
        };
        let position = position.unwrap_or_else(|| {
            report.push(Repair::DefaultedPosition { node: id.clone() });
            Position::fallback(patch.nodes.len())
        });

        let params = sanitize_params(&id, template.params, obj.get("params"), report);
        patch.nodes.push(Node {
            id,
            template: template.id.to_string(),
            position,
            params,
        });
    }
}

fn sanitize_params(
    node: &str,
    declared: &'static [ParamDescriptor],
    raw: Option<&Value>,
    report: &mut SanitizeReport,
) -> std::collections::BTreeMap<String, ParamValue> {
    let empty = Map::new();
    let raw = raw.and_then(Value::as_object).unwrap_or(&empty);

    for name in raw.keys() {
        if !declared.iter().any(|d| d.name == name.as_str()) {
            report.push(Repair::DroppedParam {
                node: node.to_string(),
                param: name.clone(),
            });
        }
    }

    let mut params = std::collections::BTreeMap::new();
    for desc in declared {
        let value = match raw.get(desc.name) {
            None | Some(Value::Null) => ParamValue::new(desc.default_base(), desc.slew_ms),
            Some(entry) => {
                let (base, slew) = match entry.as_object() {
                    Some(obj) => (obj.get("base"), obj.get("slewMs")),
                    None => (Some(entry), None),
                };
                let base = match base.and_then(param_base) {
                    Some(given) => {
                        let normalized = desc.normalize(&given);
                        if normalized != given {
                            report.push(Repair::RepairedParam {
                                node: node.to_string(),
                                param: desc.name.to_string(),
                                reason: "value outside declared domain",
                            });
                        }
                        normalized
                    }
                    None => {
                        report.push(Repair::RepairedParam {
                            node: node.to_string(),
                            param: desc.name.to_string(),
                            reason: "value missing, using default",
                        });
                        desc.default_base()
                    }
                };
                let slew_ms = match slew {
                    None | Some(Value::Null) => desc.slew_ms,
                    Some(v) => match number(v) {
                        Some(ms) if ms >= 0.0 => ms,
                        _ => {
                            report.push(Repair::RepairedParam {
                                node: node.to_string(),
                                param: desc.name.to_string(),
                                reason: "slew reset to default",
                            });
                            desc.slew_ms
                        }
                    },
                };
                ParamValue { base, slew_ms }
            }
        };
        params.insert(desc.name.to_string(), value);
    }
    params
}

// --- edges ---

fn edge_endpoints(item: &Value) -> Option<(String, String)> {
    match item {
        Value::Array(pair) if pair.len() == 2 => Some((id_of(pair.first())?, id_of(pair.get(1))?)),
        Value::Object(obj) => Some((id_of(obj.get("from"))?, id_of(obj.get("to"))?)),
        _ => None,
    }
}

fn sanitize_edges(items: &[Value], patch: &mut Patch, report: &mut SanitizeReport) {
    let mut seen: HashSet<Edge> = HashSet::new();
    for (index, item) in items.iter().enumerate() {
        let reject = |reason: String, report: &mut SanitizeReport| {
            report.push(Repair::DroppedEdge { index, reason });
        };
        let Some((from, to)) = edge_endpoints(item) else {
            reject("not a [from, to] pair".into(), report);
            continue;
        };
        if patch.node(&from).is_none() {
            reject(format!("unknown node '{from}'"), report);
            continue;
        }
        if to != SINK_ID && patch.node(&to).is_none() {
            reject(format!("unknown node '{to}'"), report);
            continue;
        }
        if from == to {
            reject(format!("self-edge on '{from}'"), report);
            continue;
        }
        let edge = Edge(from, to);
        if !seen.insert(edge.clone()) {
            reject(format!("duplicate {} -> {}", edge.from(), edge.to()), report);
            continue;
        }
        patch.edges.push(edge);
    }
}

// --- sources ---

fn sanitize_pipe(raw: Option<&Value>, source: &str, report: &mut SanitizeReport) -> Pipe {
    let defaults = Pipe::default();
    let Some(obj) = raw.and_then(Value::as_object) else {
        if raw.is_some_and(|v| !v.is_null()) {
            report.push(Repair::RepairedSource {
                source: source.to_string(),
                field: "pipe",
            });
        }
        return defaults;
    };

    let mut repaired: Vec<&'static str> = Vec::new();
    let mut note = |field: &'static str, bad: bool| {
        if bad {
            repaired.push(field);
        }
    };

    let (offset, bad) = read(obj, "offset", number).or(defaults.offset);
    note("pipe.offset", bad);
    let (scale, bad) = read(obj, "scale", number).or(defaults.scale);
    note("pipe.scale", bad);
    let (min, bad) = read(obj, "min", number).or(defaults.min);
    note("pipe.min", bad);
    let (max, bad) = read(obj, "max", number).or(defaults.max);
    note("pipe.max", bad);
    let (dead, bad) = read_non_negative(obj, "dead", defaults.dead);
    note("pipe.dead", bad);
    let (invert, bad) = read(obj, "invert", flag).or(defaults.invert);
    note("pipe.invert", bad);
    let (curve, bad) = read(obj, "curve", |v| v.as_str().and_then(Curve::from_name)).or(defaults.curve);
    note("pipe.curve", bad);
    let (smooth_ms, bad) = read_non_negative(obj, "smoothMs", defaults.smooth_ms);
    note("pipe.smoothMs", bad);
    let (hyst, bad) = read_non_negative(obj, "hyst", defaults.hyst);
    note("pipe.hyst", bad);
    let (bipolar, bad) = read(obj, "bipolar", flag).or(defaults.bipolar);
    note("pipe.bipolar", bad);

    for field in repaired {
        report.push(Repair::RepairedSource {
            source: source.to_string(),
            field,
        });
    }

    Pipe {
        offset,
        scale,
        min,
        max,
        dead,
        invert,
        curve,
        smooth_ms,
        hyst,
        bipolar,
    }
}

fn sanitize_sources(
    items: &[Value],
    registry: &TemplateRegistry,
    patch: &mut Patch,
    report: &mut SanitizeReport,
) {
    let node_ids: Vec<String> = patch.nodes.iter().map(|n| n.id.clone()).collect();
    let reserved = DEFAULT_SOURCE_IDS
        .iter()
        .copied()
        .chain([SINK_ID])
        .chain(node_ids.iter().map(String::as_str));
    let mut ids = IdAllocator::new(reserved, items);

    for (index, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            report.push(Repair::DroppedSource {
                index,
                reason: "not an object".into(),
            });
            continue;
        };

        let (mut kind, kind_repaired) = read(obj, "kind", |v| v.as_str().and_then(SourceKind::from_name))
            .or(SourceKind::Imu);
        let metric = id_of(obj.get("metric"));

        if kind.is_modulator() {
            let backing = metric
                .as_deref()
                .and_then(|m| patch.node(m))
                .filter(|n| registry.is_modulator(&n.template));
            let Some(node) = backing else {
                report.push(Repair::DroppedSource {
                    index,
                    reason: format!(
                        "{} source has no modulator node '{}'",
                        kind.name(),
                        metric.as_deref().unwrap_or("")
                    ),
                });
                continue;
            };
            if let Some(actual) = SourceKind::for_template(&node.template) {
                kind = actual;
            }
        }

        let wanted = id_of(obj.get("id"));
        let (id, changed) = ids.claim(wanted.as_deref(), "src");
        if changed {
            report.push(Repair::ReassignedId {
                entity: Entity::Source,
                index,
                from: wanted,
                to: id.clone(),
            });
        }
        let declared_kind = text(obj.get("kind"));
        if kind_repaired || declared_kind.is_some_and(|k| k != kind.name()) {
            report.push(Repair::RepairedSource {
                source: id.clone(),
                field: "kind",
            });
        }

        let metric = match metric {
            Some(m) => m,
            None => {
                report.push(Repair::RepairedSource {
                    source: id.clone(),
                    field: "metric",
                });
                id.clone()
            }
        };
        let label = text(obj.get("label")).map_or_else(|| id.clone(), str::to_string);
        let pipe = sanitize_pipe(obj.get("pipe"), &id, report);

        patch.sources.push(Source {
            id,
            kind,
            metric,
            label,
            pipe,
        });
    }
}

// --- routes ---

fn sanitize_routes(
    items: &[Value],
    registry: &TemplateRegistry,
    patch: &mut Patch,
    report: &mut SanitizeReport,
) {
    let mut ids = IdAllocator::new(std::iter::empty(), items);
    let mut routes: Vec<Route> = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let reject = |reason: String, report: &mut SanitizeReport| {
            report.push(Repair::DroppedRoute { index, reason });
        };
        let Some(obj) = item.as_object() else {
            reject("not an object".into(), report);
            continue;
        };

        let Some(target) = text(obj.get("target")) else {
            reject("missing target".into(), report);
            continue;
        };
        let Some((node_id, param)) = parse_target(target) else {
            reject(format!("target '{target}' is not 'nodeId.param'"), report);
            continue;
        };
        let Some(node) = patch.node(node_id) else {
            reject(format!("target node '{node_id}' not found"), report);
            continue;
        };
        if registry.param(&node.template, param).is_none() {
            reject(
                format!("'{}' has no parameter '{param}'", node.template),
                report,
            );
            continue;
        }

        let Some(src) = id_of(obj.get("src")) else {
            reject("missing src".into(), report);
            continue;
        };
        let src_pipe_bipolar = match patch.resolve_source(&src) {
            Some(source) => Some(source.pipe.bipolar),
            None => patch
                .node(&src)
                .filter(|n| registry.is_modulator(&n.template))
                .map(|_| false),
        };
        let Some(default_bipolar) = src_pipe_bipolar else {
            reject(format!("unknown source '{src}'"), report);
            continue;
        };

        let mut repaired: Vec<&'static str> = Vec::new();
        let mut note = |field: &'static str, bad: bool| {
            if bad {
                repaired.push(field);
            }
        };

        let (amount, bad) = read_non_negative(obj, "amount", 1.0);
        note("amount", bad);
        let (range, bad) = read_range(obj);
        note("range", bad);
        let (curve, bad) = read(obj, "curve", |v| v.as_str().and_then(Curve::from_name)).or(Curve::Lin);
        note("curve", bad);
        let (op, bad) = read(obj, "op", |v| v.as_str().and_then(Op::from_name)).or(Op::Add);
        note("op", bad);
        let (bipolar, bad) = read(obj, "bipolar", flag).or(default_bipolar);
        note("bipolar", bad);
        let (slew_ms, bad) = read_non_negative(obj, "slewMs", DEFAULT_ROUTE_SLEW_MS);
        note("slewMs", bad);
        let (dead, bad) = read_non_negative(obj, "dead", 0.0);
        note("dead", bad);
        let (smooth_ms, bad) = read_non_negative(obj, "smoothMs", 0.0);
        note("smoothMs", bad);
        let (hyst, bad) = read_non_negative(obj, "hyst", 0.0);
        note("hyst", bad);

        let target = target.to_string();
        let mut route = Route {
            id: String::new(),
            src,
            target,
            amount,
            range,
            curve,
            op,
            bipolar,
            slew_ms,
            dead,
            smooth_ms,
            hyst,
        };

        let existing = routes
            .iter()
            .position(|r| r.src == route.src && r.target == route.target);
        let route_id = if let Some(pos) = existing {
            route.id = routes[pos].id.clone();
            report.push(Repair::MergedRoute {
                index,
                into: route.id.clone(),
            });
            let id = route.id.clone();
            routes[pos] = route;
            id
        } else {
            let wanted = id_of(obj.get("id"));
            let (id, changed) = ids.claim(wanted.as_deref(), "r");
            if changed {
                report.push(Repair::ReassignedId {
                    entity: Entity::Route,
                    index,
                    from: wanted,
                    to: id.clone(),
                });
            }
            route.id = id.clone();
            routes.push(route);
            id
        };

        for field in repaired {
            report.push(Repair::RepairedRoute {
                route: route_id.clone(),
                field,
            });
        }
    }

    patch.routes = routes;
}

fn read_range(obj: &Map<String, Value>) -> ([f64; 2], bool) {
    match obj.get("range") {
        None | Some(Value::Null) => (DEFAULT_RANGE, false),
        Some(Value::Array(pair)) if pair.len() == 2 => {
            match (pair.first().and_then(number), pair.get(1).and_then(number)) {
                (Some(lo), Some(hi)) if lo <= hi => ([lo, hi], false),
                (Some(lo), Some(hi)) => ([hi, lo], true),
                _ => (DEFAULT_RANGE, true),
            }
        }
        Some(_) => (DEFAULT_RANGE, true),
    }
}

/// Returns `true` if `id` can serve as a route `src` in `patch`.
pub(crate) fn is_known_src(patch: &Patch, registry: &TemplateRegistry, id: &str) -> bool {
    is_default_source(id)
        || patch.source(id).is_some()
        || patch
            .node(id)
            .is_some_and(|n| registry.is_modulator(&n.template))
}

/// Default polarity for a new route from `src`.
pub(crate) fn default_polarity(patch: &Patch, src: &str) -> bool {
    patch
        .source(src)
        .or_else(|| default_source(src))
        .is_some_and(|s| s.pipe.bipolar)
}
