//! Editing operations on a [`Patch`].
//!
//! Every operation validates against the [`TemplateRegistry`] and keeps the patch
//! internally consistent: removals cascade, ids stay unique, and values are
//! clamped into their declared domains. Rejected edits leave the patch unchanged.

use motus_core::{ParamBase, Pipe};
use motus_registry::{SINK_ID, TemplateRegistry};
use tracing::debug;

use crate::error::PatchError;
use crate::model::{Edge, Node, ParamValue, Patch, Position, Route, Source, SourceKind};
use crate::sanitize::{default_polarity, fresh_id, is_known_src};
use crate::sources::DEFAULT_SOURCE_IDS;

/// Result of [`Patch::upsert_route`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteUpsert {
    /// A new route was appended with this id.
    Created(String),
    /// The existing route for the same `(src, target)` was updated in place.
    Updated(String),
}

impl RouteUpsert {
    /// Id of the affected route.
    pub fn id(&self) -> &str {
        match self {
            RouteUpsert::Created(id) | RouteUpsert::Updated(id) => id,
        }
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<f64, PatchError> {
    if !value.is_finite() {
        return Err(PatchError::invalid_value(field, "must be finite"));
    }
    if value < 0.0 {
        return Err(PatchError::invalid_value(field, "must not be negative"));
    }
    Ok(value)
}

impl Patch {
    /// Ids that nodes and sources must not reuse.
    fn taken_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .map(|n| n.id.as_str())
            .chain(self.sources.iter().map(|s| s.id.as_str()))
            .chain(DEFAULT_SOURCE_IDS.iter().copied())
            .chain([SINK_ID])
    }

    /// Add a node of `template` with default parameters. Returns its id.
    ///
    /// # Errors
    ///
    /// [`PatchError::UnknownTemplate`] if the template is not registered.
    pub fn add_node(&mut self, registry: &TemplateRegistry, template: &str) -> Result<String, PatchError> {
        let descriptor = registry
            .get(template)
            .ok_or_else(|| PatchError::UnknownTemplate(template.to_string()))?;
        let id = fresh_id("n", self.taken_ids());
        let params = descriptor
            .params
            .iter()
            .map(|p| (p.name.to_string(), ParamValue::new(p.default_base(), p.slew_ms)))
            .collect();
        self.nodes.push(Node {
            id: id.clone(),
            template: descriptor.id.to_string(),
            position: Position::fallback(self.nodes.len()),
            params,
        });
        debug!(node = %id, template, "node added");
        Ok(id)
    }

    /// Remove a node and everything that references it.
    ///
    /// Cascades to edges touching the node, sources backed by it, and routes that
    /// target it, read from it directly, or read from a removed source.
    ///
    /// # Errors
    ///
    /// [`PatchError::UnknownNode`] if no node has this id.
    pub fn remove_node(&mut self, id: &str) -> Result<Node, PatchError> {
        let pos = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| PatchError::UnknownNode(id.to_string()))?;
        let node = self.nodes.remove(pos);

        self.edges.retain(|e| !e.touches(id));

        let removed_sources: Vec<String> = self
            .sources
            .iter()
            .filter(|s| s.backing_node() == Some(id))
            .map(|s| s.id.clone())
            .collect();
        self.sources.retain(|s| s.backing_node() != Some(id));

        self.routes.retain(|r| {
            r.target_node() != Some(id) && r.src != id && !removed_sources.contains(&r.src)
        });
        debug!(node = %id, sources = removed_sources.len(), "node removed");
        Ok(node)
    }

    /// Set a parameter's base value, clamped into its declared domain.
    ///
    /// Returns the value actually stored.
    ///
    /// # Errors
    ///
    /// [`PatchError::UnknownNode`] or [`PatchError::UnknownParam`].
    pub fn set_param(
        &mut self,
        registry: &TemplateRegistry,
        node_id: &str,
        param: &str,
        value: impl Into<ParamBase>,
    ) -> Result<ParamBase, PatchError> {
        let node = self
            .node_mut(node_id)
            .ok_or_else(|| PatchError::UnknownNode(node_id.to_string()))?;
        let desc = registry
            .param(&node.template, param)
            .ok_or_else(|| PatchError::unknown_param(node_id, param))?;
        let base = desc.normalize(&value.into());
        node.params
            .entry(param.to_string())
            .and_modify(|v| v.base = base.clone())
            .or_insert_with(|| ParamValue::new(base.clone(), desc.slew_ms));
        Ok(base)
    }

    /// Set a parameter's ramp time.
    ///
    /// # Errors
    ///
    /// [`PatchError::UnknownNode`], [`PatchError::UnknownParam`], or
    /// [`PatchError::InvalidValue`] for a negative or non-finite slew.
    pub fn set_param_slew(
        &mut self,
        registry: &TemplateRegistry,
        node_id: &str,
        param: &str,
        slew_ms: f64,
    ) -> Result<(), PatchError> {
        let slew_ms = check_non_negative("slewMs", slew_ms)?;
        let node = self
            .node_mut(node_id)
            .ok_or_else(|| PatchError::UnknownNode(node_id.to_string()))?;
        let desc = registry
            .param(&node.template, param)
            .ok_or_else(|| PatchError::unknown_param(node_id, param))?;
        node.params
            .entry(param.to_string())
            .or_insert_with(|| ParamValue::new(desc.default_base(), desc.slew_ms))
            .slew_ms = slew_ms;
        Ok(())
    }

    /// Connect `from` to `to` (a node or the sink `"out"`).
    ///
    /// # Errors
    ///
    /// [`PatchError::SelfEdge`], [`PatchError::UnknownNode`], or [`PatchError::DuplicateEdge`].
    pub fn connect(&mut self, from: &str, to: &str) -> Result<(), PatchError> {
        if from == to {
            return Err(PatchError::SelfEdge(from.to_string()));
        }
        if self.node(from).is_none() {
            return Err(PatchError::UnknownNode(from.to_string()));
        }
        if to != SINK_ID && self.node(to).is_none() {
            return Err(PatchError::UnknownNode(to.to_string()));
        }
        if self.has_edge(from, to) {
            return Err(PatchError::DuplicateEdge {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.edges.push(Edge::new(from, to));
        Ok(())
    }

    /// Remove the edge `(from, to)`. Returns whether it existed.
    pub fn disconnect(&mut self, from: &str, to: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| !(e.from() == from && e.to() == to));
        self.edges.len() != before
    }

    /// Add a source modelled on `template`. Returns the new source's id.
    ///
    /// The pipe is copied, so later edits never alias `template`'s settings. An empty
    /// or already used id is replaced with a fresh one.
    ///
    /// # Errors
    ///
    /// For `lfo`/`env` sources, [`PatchError::UnknownNode`] if the backing node does
    /// not exist and [`PatchError::NotAModulator`] if it is not a modulator.
    pub fn add_source(&mut self, registry: &TemplateRegistry, template: &Source) -> Result<String, PatchError> {
        let mut source = template.clone();
        if source.kind.is_modulator() {
            let node = self
                .node(&source.metric)
                .ok_or_else(|| PatchError::UnknownNode(source.metric.clone()))?;
            if !registry.is_modulator(&node.template) {
                return Err(PatchError::NotAModulator(node.id.clone()));
            }
            if let Some(kind) = SourceKind::for_template(&node.template) {
                source.kind = kind;
            }
        }
        if source.id.is_empty() || self.taken_ids().any(|id| id == source.id) {
            source.id = fresh_id("src", self.taken_ids());
        }
        if source.label.is_empty() {
            source.label.clone_from(&source.id);
        }
        let id = source.id.clone();
        self.sources.push(source);
        Ok(id)
    }

    /// Add a source reading the live output of modulator node `node_id`.
    ///
    /// # Errors
    ///
    /// [`PatchError::UnknownNode`] or [`PatchError::NotAModulator`].
    pub fn add_modulator_source(&mut self, registry: &TemplateRegistry, node_id: &str) -> Result<String, PatchError> {
        let node = self
            .node(node_id)
            .ok_or_else(|| PatchError::UnknownNode(node_id.to_string()))?;
        let kind = SourceKind::for_template(&node.template)
            .filter(|_| registry.is_modulator(&node.template))
            .ok_or_else(|| PatchError::NotAModulator(node_id.to_string()))?;
        let pipe = match kind {
            SourceKind::Env => Pipe::with_range(0.0, 1.0),
            _ => Pipe::default(),
        };
        let source = Source {
            id: String::new(),
            kind,
            metric: node_id.to_string(),
            label: format!("{} {node_id}", kind.name().to_ascii_uppercase()),
            pipe,
        };
        self.add_source(registry, &source)
    }

    /// Remove a patch source and every route reading from it.
    ///
    /// # Errors
    ///
    /// [`PatchError::UnknownSource`] if no patch source has this id (default
    /// sources cannot be removed).
    pub fn remove_source(&mut self, id: &str) -> Result<Source, PatchError> {
        let pos = self
            .sources
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| PatchError::UnknownSource(id.to_string()))?;
        let source = self.sources.remove(pos);
        self.routes.retain(|r| r.src != id);
        Ok(source)
    }

    /// Create a route, or update the existing route with the same `(src, target)`.
    ///
    /// On update the existing route keeps its id and its position in the route list.
    /// A reversed range is swapped.
    ///
    /// # Errors
    ///
    /// - [`PatchError::InvalidTarget`], [`PatchError::UnknownNode`] or
    ///   [`PatchError::UnknownParam`] for a bad target
    /// - [`PatchError::UnknownSource`] or [`PatchError::NotAModulator`] for a bad src
    /// - [`PatchError::InvalidValue`] for non-finite or negative numbers
    pub fn upsert_route(&mut self, registry: &TemplateRegistry, route: Route) -> Result<RouteUpsert, PatchError> {
        let mut route = route;
        let (node_id, param) = route
            .target_parts()
            .ok_or_else(|| PatchError::InvalidTarget(route.target.clone()))?;
        let node = self
            .node(node_id)
            .ok_or_else(|| PatchError::UnknownNode(node_id.to_string()))?;
        if registry.param(&node.template, param).is_none() {
            return Err(PatchError::unknown_param(node_id, param));
        }

        if !is_known_src(self, registry, &route.src) {
            return Err(match self.node(&route.src) {
                Some(_) => PatchError::NotAModulator(route.src.clone()),
                None => PatchError::UnknownSource(route.src.clone()),
            });
        }

        route.amount = check_non_negative("amount", route.amount)?;
        route.slew_ms = check_non_negative("slewMs", route.slew_ms)?;
        route.dead = check_non_negative("dead", route.dead)?;
        route.smooth_ms = check_non_negative("smoothMs", route.smooth_ms)?;
        route.hyst = check_non_negative("hyst", route.hyst)?;
        let [lo, hi] = route.range;
        if !lo.is_finite() || !hi.is_finite() {
            return Err(PatchError::invalid_value("range", "bounds must be finite"));
        }
        if lo > hi {
            route.range = [hi, lo];
        }

        if let Some(existing) = self
            .routes
            .iter_mut()
            .find(|r| r.src == route.src && r.target == route.target)
        {
            route.id.clone_from(&existing.id);
            *existing = route;
            return Ok(RouteUpsert::Updated(existing.id.clone()));
        }

        if route.id.is_empty() || self.route(&route.id).is_some() {
            route.id = fresh_id("r", self.routes.iter().map(|r| r.id.as_str()));
        }
        let id = route.id.clone();
        self.routes.push(route);
        Ok(RouteUpsert::Created(id))
    }

    /// Route from `src` to `target` with default settings and the source's default polarity.
    pub fn default_route(&self, src: &str, target: &str) -> Route {
        Route::new("", src, target).with_bipolar(default_polarity(self, src))
    }

    /// Remove a route.
    ///
    /// # Errors
    ///
    /// [`PatchError::UnknownRoute`] if no route has this id.
    pub fn remove_route(&mut self, id: &str) -> Result<Route, PatchError> {
        let pos = self
            .routes
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| PatchError::UnknownRoute(id.to_string()))?;
        Ok(self.routes.remove(pos))
    }

    /// Move a route to `index` in evaluation order (clamped to the list).
    ///
    /// # Errors
    ///
    /// [`PatchError::UnknownRoute`] if no route has this id.
    pub fn move_route(&mut self, id: &str, index: usize) -> Result<(), PatchError> {
        let pos = self
            .routes
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| PatchError::UnknownRoute(id.to_string()))?;
        let route = self.routes.remove(pos);
        let index = index.min(self.routes.len());
        self.routes.insert(index, route);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motus_core::Curve;

    use crate::model::Op;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::new()
    }

    fn filter_patch() -> (Patch, String) {
        let mut patch = Patch::new();
        let id = patch.add_node(&registry(), "filter").unwrap();
        (patch, id)
    }

    #[test]
    fn add_node_uses_template_defaults() {
        let (patch, id) = filter_patch();
        assert_eq!(id, "n1");
        let node = patch.node(&id).unwrap();
        assert_eq!(node.params["cutoff"].base, ParamBase::Number(1200.0));
        assert_eq!(node.params["cutoff"].slew_ms, 30.0);
        assert_eq!(node.params["mode"].base, ParamBase::from("lowpass"));
        assert_eq!(node.position, Position::fallback(0));
    }

    #[test]
    fn add_unknown_template_fails() {
        let mut patch = Patch::new();
        let err = patch.add_node(&registry(), "sitar").unwrap_err();
        assert!(matches!(err, PatchError::UnknownTemplate(ref t) if t == "sitar"));
        assert!(patch.nodes.is_empty());
    }

    #[test]
    fn set_param_clamps() {
        let (mut patch, id) = filter_patch();
        let stored = patch.set_param(&registry(), &id, "cutoff", 1.0e6).unwrap();
        assert_eq!(stored, ParamBase::Number(20000.0));
        assert!(matches!(
            patch.set_param(&registry(), &id, "drive", 1.0),
            Err(PatchError::UnknownParam { .. })
        ));
        assert!(matches!(
            patch.set_param_slew(&registry(), &id, "cutoff", -1.0),
            Err(PatchError::InvalidValue { .. })
        ));
    }

    #[test]
    fn connect_rules() {
        let reg = registry();
        let mut patch = Patch::new();
        let osc = patch.add_node(&reg, "osc").unwrap();
        let filter = patch.add_node(&reg, "filter").unwrap();

        patch.connect(&osc, &filter).unwrap();
        patch.connect(&filter, SINK_ID).unwrap();
        assert!(matches!(
            patch.connect(&osc, &filter),
            Err(PatchError::DuplicateEdge { .. })
        ));
        assert!(matches!(patch.connect(&osc, &osc), Err(PatchError::SelfEdge(_))));
        assert!(matches!(
            patch.connect(&osc, "ghost"),
            Err(PatchError::UnknownNode(_))
        ));
        assert!(patch.disconnect(&osc, &filter));
        assert!(!patch.disconnect(&osc, &filter));
    }

    #[test]
    fn add_source_copies_pipe() {
        let reg = registry();
        let mut patch = Patch::new();
        let template = Source::imu("", "gyro.z", "").with_pipe(Pipe::default().with_scale(3.0));
        let a = patch.add_source(&reg, &template).unwrap();
        let b = patch.add_source(&reg, &template).unwrap();
        assert_ne!(a, b);

        patch.sources[0].pipe.scale = 9.0;
        assert_eq!(patch.source(&b).unwrap().pipe.scale, 3.0);
        assert_eq!(template.pipe.scale, 3.0);
    }

    #[test]
    fn modulator_sources() {
        let reg = registry();
        let mut patch = Patch::new();
        let lfo = patch.add_node(&reg, "lfo").unwrap();
        let gain = patch.add_node(&reg, "gain").unwrap();

        let src = patch.add_modulator_source(&reg, &lfo).unwrap();
        let source = patch.source(&src).unwrap();
        assert_eq!(source.kind, SourceKind::Lfo);
        assert_eq!(source.metric, lfo);

        assert!(matches!(
            patch.add_modulator_source(&reg, &gain),
            Err(PatchError::NotAModulator(_))
        ));
    }

    #[test]
    fn remove_node_cascades() {
        let reg = registry();
        let mut patch = Patch::new();
        let lfo = patch.add_node(&reg, "lfo").unwrap();
        let osc = patch.add_node(&reg, "osc").unwrap();
        let gain = patch.add_node(&reg, "gain").unwrap();
        patch.connect(&lfo, &osc).unwrap();
        patch.connect(&osc, &gain).unwrap();
        let src = patch.add_modulator_source(&reg, &lfo).unwrap();

        let freq = format!("{osc}.frequency");
        let level = format!("{gain}.level");
        patch.upsert_route(&reg, Route::new("", &lfo, &freq)).unwrap();
        patch.upsert_route(&reg, Route::new("", &src, &level)).unwrap();
        patch.upsert_route(&reg, Route::new("", "pitch", &level)).unwrap();

        patch.remove_node(&lfo).unwrap();
        assert_eq!(patch.edges, vec![Edge::new(&osc, &gain)]);
        assert!(patch.sources.is_empty());
        assert_eq!(patch.routes.len(), 1);
        assert_eq!(patch.routes[0].src, "pitch");

        patch.remove_node(&gain).unwrap();
        assert!(patch.routes.is_empty());
        assert!(patch.edges.is_empty());
    }

    #[test]
    fn upsert_updates_in_place() {
        let reg = registry();
        let (mut patch, id) = filter_patch();
        let target = format!("{id}.cutoff");

        let first = patch
            .upsert_route(&reg, Route::new("", "pitch", &target).with_amount(0.5))
            .unwrap();
        patch
            .upsert_route(&reg, Route::new("", "roll", &target))
            .unwrap();
        let again = patch
            .upsert_route(
                &reg,
                Route::new("other", "pitch", &target)
                    .with_op(Op::Multiply)
                    .with_curve(Curve::Exp),
            )
            .unwrap();

        assert!(matches!(first, RouteUpsert::Created(_)));
        assert_eq!(again, RouteUpsert::Updated(first.id().to_string()));
        assert_eq!(patch.routes.len(), 2);
        assert_eq!(patch.routes[0].id, first.id());
        assert_eq!(patch.routes[0].op, Op::Multiply);
        assert_eq!(patch.routes[0].amount, 1.0);
    }

    #[test]
    fn upsert_validates() {
        let reg = registry();
        let mut patch = Patch::new();
        let filter = patch.add_node(&reg, "filter").unwrap();
        let gain = patch.add_node(&reg, "gain").unwrap();
        let cutoff = format!("{filter}.cutoff");

        let bad = [
            (Route::new("", "pitch", "cutoff"), "InvalidTarget"),
            (Route::new("", "pitch", "ghost.cutoff"), "UnknownNode"),
            (Route::new("", "pitch", format!("{filter}.drive")), "UnknownParam"),
            (Route::new("", "nobody", &cutoff), "UnknownSource"),
            (Route::new("", &gain, &cutoff), "NotAModulator"),
            (Route::new("", "pitch", &cutoff).with_amount(f64::NAN), "InvalidValue"),
            (
                Route::new("", "pitch", &cutoff).with_range(0.0, f64::INFINITY),
                "InvalidValue",
            ),
        ];
        for (route, expected) in bad {
            let err = patch.upsert_route(&reg, route).unwrap_err();
            assert!(format!("{err:?}").starts_with(expected), "{err:?}");
        }
        assert!(patch.routes.is_empty());

        let ok = patch
            .upsert_route(&reg, Route::new("", "pitch", &cutoff).with_range(8000.0, 200.0))
            .unwrap();
        assert_eq!(patch.route(ok.id()).unwrap().range, [200.0, 8000.0]);
    }

    #[test]
    fn move_and_remove_routes() {
        let reg = registry();
        let (mut patch, id) = filter_patch();
        let cutoff = format!("{id}.cutoff");
        let a = patch.upsert_route(&reg, Route::new("a", "pitch", &cutoff)).unwrap();
        let b = patch.upsert_route(&reg, Route::new("b", "roll", &cutoff)).unwrap();
        let c = patch.upsert_route(&reg, Route::new("c", "yaw", &cutoff)).unwrap();

        patch.move_route(c.id(), 0).unwrap();
        let order: Vec<_> = patch.routes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);

        patch.move_route(c.id(), 99).unwrap();
        let order: Vec<_> = patch.routes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);

        patch.remove_route(b.id()).unwrap();
        assert!(matches!(
            patch.remove_route(b.id()),
            Err(PatchError::UnknownRoute(_))
        ));
        assert_eq!(patch.routes.len(), 2);
        assert_eq!(a.id(), "a");
    }

    #[test]
    fn remove_source_cascades_routes() {
        let reg = registry();
        let (mut patch, id) = filter_patch();
        let src = patch
            .add_source(&reg, &Source::imu("tilt", "roll", "Tilt"))
            .unwrap();
        patch
            .upsert_route(&reg, Route::new("", &src, format!("{id}.cutoff")))
            .unwrap();
        patch.remove_source(&src).unwrap();
        assert!(patch.routes.is_empty());
        assert!(matches!(
            patch.remove_source("pitch"),
            Err(PatchError::UnknownSource(_))
        ));
    }
}
