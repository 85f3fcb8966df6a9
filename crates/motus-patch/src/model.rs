//! Patch document types.
//!
//! A [`Patch`] is the unit of serialization, replacement and validation:
//! nodes, the edges between them, patch-local modulation sources, and routes.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "n1", "type": "filter", "position": { "x": 80, "y": 80 },
//!       "params": { "cutoff": { "base": 1200, "slewMs": 30 } } }
//!   ],
//!   "edges": [["n1", "out"]],
//!   "sources": [
//!     { "id": "src1", "kind": "lfo", "metric": "n2", "label": "LFO n2", "pipe": {} }
//!   ],
//!   "routes": [
//!     { "id": "r1", "src": "pitch", "target": "n1.cutoff", "amount": 1,
//!       "range": [200, 8000], "curve": "exp", "op": "add", "bipolar": false,
//!       "slewMs": 30, "dead": 0, "smoothMs": 0, "hyst": 0 }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use motus_core::{Curve, ParamBase, Pipe};
use serde::{Deserialize, Serialize};

use crate::sources::default_source;

/// 2-D editor position. Preserved but never interpreted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Staggered grid slot for the `index`-th node without a usable position.
    pub fn fallback(index: usize) -> Self {
        Self {
            x: 80.0 + (index % 4) as f64 * 220.0,
            y: 80.0 + (index / 4) as f64 * 160.0,
        }
    }
}

/// One parameter's settable rest value and ramp time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamValue {
    /// Rest value, in the template's declared domain.
    pub base: ParamBase,
    /// Ramp duration applied whenever the value changes.
    pub slew_ms: f64,
}

impl ParamValue {
    /// Create a parameter value.
    pub fn new(base: impl Into<ParamBase>, slew_ms: f64) -> Self {
        Self {
            base: base.into(),
            slew_ms,
        }
    }
}

/// An instance of a node template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node id.
    pub id: String,
    /// Template type key.
    #[serde(rename = "type")]
    pub template: String,
    /// Editor position.
    pub position: Position,
    /// Parameter name to value.
    pub params: BTreeMap<String, ParamValue>,
}

impl Node {
    /// Stored value of a parameter.
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }
}

/// Directed connection `(from, to)`, serialized as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge(pub String, pub String);

impl Edge {
    /// Create an edge.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self(from.into(), to.into())
    }

    /// Upstream node id.
    pub fn from(&self) -> &str {
        &self.0
    }

    /// Downstream node id (or the sink).
    pub fn to(&self) -> &str {
        &self.1
    }

    /// Returns `true` if either endpoint is `node_id`.
    pub fn touches(&self, node_id: &str) -> bool {
        self.0 == node_id || self.1 == node_id
    }
}

/// Where a source reads its raw value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A named metric of the external sensor stream.
    #[default]
    Imu,
    /// The live output of an `lfo` node.
    Lfo,
    /// The live output of an `env` node.
    Env,
}

impl SourceKind {
    /// Name as used in patch documents.
    pub const fn name(self) -> &'static str {
        match self {
            SourceKind::Imu => "imu",
            SourceKind::Lfo => "lfo",
            SourceKind::Env => "env",
        }
    }

    /// Parse a document name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "imu" => Some(SourceKind::Imu),
            "lfo" => Some(SourceKind::Lfo),
            "env" => Some(SourceKind::Env),
            _ => None,
        }
    }

    /// Kind of source backed by a node of `template`, if it is a modulator template.
    pub fn for_template(template: &str) -> Option<Self> {
        match template {
            "lfo" => Some(SourceKind::Lfo),
            "env" => Some(SourceKind::Env),
            _ => None,
        }
    }

    /// Returns `true` for sources backed by a modulator node.
    pub const fn is_modulator(self) -> bool {
        matches!(self, SourceKind::Lfo | SourceKind::Env)
    }
}

/// A named modulation producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Unique source id.
    pub id: String,
    /// Where the raw value comes from.
    pub kind: SourceKind,
    /// Sensor metric path (`imu`) or backing node id (`lfo`, `env`).
    pub metric: String,
    /// Display label.
    pub label: String,
    /// Conditioning applied to every reading.
    pub pipe: Pipe,
}

impl Source {
    /// Sensor source reading `metric`.
    pub fn imu(id: impl Into<String>, metric: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: SourceKind::Imu,
            metric: metric.into(),
            label: label.into(),
            pipe: Pipe::default(),
        }
    }

    /// Sets the pipe.
    ///
    /// Builder pattern: call after a constructor.
    pub fn with_pipe(mut self, pipe: Pipe) -> Self {
        self.pipe = pipe;
        self
    }

    /// Backing node id for modulator sources.
    pub fn backing_node(&self) -> Option<&str> {
        self.kind.is_modulator().then_some(self.metric.as_str())
    }
}

/// Combination operator folding a route into its target's accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// `acc += (mapped - base) * amount`
    #[default]
    Add,
    /// `acc *= 1 + input * amount`
    Multiply,
    /// `acc += base * input * amount`
    Ring,
    /// `acc = base * (1 - amount) + mapped * amount`
    Crossfade,
}

impl Op {
    /// All operators in document order.
    pub const ALL: [Op; 4] = [Op::Add, Op::Multiply, Op::Ring, Op::Crossfade];

    /// Name as used in patch documents.
    pub const fn name(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Multiply => "multiply",
            Op::Ring => "ring",
            Op::Crossfade => "crossfade",
        }
    }

    /// Parse a document name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

/// Default route range.
pub const DEFAULT_RANGE: [f64; 2] = [0.0, 1.0];
/// Default route slew in milliseconds.
pub const DEFAULT_ROUTE_SLEW_MS: f64 = 30.0;

/// Connection from a source to one target parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Unique route id.
    pub id: String,
    /// Source id, or the id of a modulator node.
    pub src: String,
    /// `"nodeId.paramName"`.
    pub target: String,
    /// Operator strength.
    pub amount: f64,
    /// Output range `[min, max]` the curved value is mapped into.
    pub range: [f64; 2],
    /// Response curve applied to the 0..1 input.
    pub curve: Curve,
    /// Combination operator.
    pub op: Op,
    /// Treat the source as -1..1 instead of 0..1.
    pub bipolar: bool,
    /// Requested ramp time for the target.
    pub slew_ms: f64,
    /// Dead-zone on the operator input.
    pub dead: f64,
    /// Per-route smoothing time.
    pub smooth_ms: f64,
    /// Per-route hysteresis on the curved value.
    pub hyst: f64,
}

impl Route {
    /// Route with default settings.
    pub fn new(id: impl Into<String>, src: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            src: src.into(),
            target: target.into(),
            amount: 1.0,
            range: DEFAULT_RANGE,
            curve: Curve::Lin,
            op: Op::Add,
            bipolar: false,
            slew_ms: DEFAULT_ROUTE_SLEW_MS,
            dead: 0.0,
            smooth_ms: 0.0,
            hyst: 0.0,
        }
    }

    /// Sets amount.
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    /// Sets the output range.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = [min, max];
        self
    }

    /// Sets the operator.
    pub fn with_op(mut self, op: Op) -> Self {
        self.op = op;
        self
    }

    /// Sets the response curve.
    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    /// Sets polarity.
    pub fn with_bipolar(mut self, bipolar: bool) -> Self {
        self.bipolar = bipolar;
        self
    }

    /// Sets the requested slew.
    pub fn with_slew(mut self, slew_ms: f64) -> Self {
        self.slew_ms = slew_ms;
        self
    }

    /// `(node_id, param)` parts of the target.
    pub fn target_parts(&self) -> Option<(&str, &str)> {
        parse_target(&self.target)
    }

    /// Node id part of the target.
    pub fn target_node(&self) -> Option<&str> {
        self.target_parts().map(|(node, _)| node)
    }

    /// Lower bound of the output range.
    pub fn range_min(&self) -> f64 {
        self.range[0]
    }

    /// Upper bound of the output range.
    pub fn range_max(&self) -> f64 {
        self.range[1]
    }
}

/// Split `"nodeId.param"` at the last dot. Both parts must be non-empty.
pub fn parse_target(target: &str) -> Option<(&str, &str)> {
    let (node, param) = target.rsplit_once('.')?;
    (!node.is_empty() && !param.is_empty()).then_some((node, param))
}

/// The aggregate patch document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Patch {
    /// Template instances.
    pub nodes: Vec<Node>,
    /// Audio connections.
    pub edges: Vec<Edge>,
    /// Patch-local sources (the default sources are implicit).
    pub sources: Vec<Source>,
    /// Routes, in evaluation order.
    pub routes: Vec<Route>,
}

impl Patch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Mutable node by id.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Patch-local source by id.
    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Patch-local or default source by id. Patch sources shadow defaults.
    pub fn resolve_source(&self, id: &str) -> Option<&Source> {
        self.source(id).or_else(|| default_source(id))
    }

    /// Route by id.
    pub fn route(&self, id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == id)
    }

    /// Route for a `(src, target)` pair.
    pub fn find_route(&self, src: &str, target: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.src == src && r.target == target)
    }

    /// Routes landing on one node.
    pub fn routes_to_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Route> + 'a {
        self.routes
            .iter()
            .filter(move |r| r.target_node() == Some(node_id))
    }

    /// Returns `true` if an edge `(from, to)` exists.
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| e.from() == from && e.to() == to)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Json`](crate::PatchError::Json) if serialization fails.
    pub fn to_json(&self) -> Result<String, crate::PatchError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
