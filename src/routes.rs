//! Route overlay plans.
//!
//! Features sharing a route id fold into one route; multiple parts become a
//! `MultiLineString`. Each route gets a base color (explicit `color` or a
//! stable palette pick from its id) plus darker hover and select variants,
//! derived once per id and reused on every later draw. Routes render as a
//! wide casing under a narrower state-colored line, with optional origin and
//! destination markers.

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_test;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::color::{normalize_hex_color, palette_color, shade};
use crate::geometry::{Geometry, LngLat};
use crate::icon::{COLOR_PROP, IconAtlas, IconSpec};
use crate::layer_set::{LayerRole, Namespace, OverlayPlan, SourceRole};
use crate::normalize::NormalizedFeature;
use crate::style::{Expr, Filter, LayerKind, LayerSpec, SourceData, SourceFeature};
use crate::surface::MarkerSpec;

/// Glyph placed at a route's first position.
pub const ORIGIN_GLYPH: &str = "origin";
/// Glyph placed at a route's last position.
pub const DESTINATION_GLYPH: &str = "flag";

/// Options for `draw_routes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDrawOptions {
    pub fit: bool,
    pub show_endpoints: bool,
}

impl Default for RouteDrawOptions {
    fn default() -> Self {
        Self { fit: true, show_endpoints: true }
    }
}

/// The three stroke tiers of one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteColors {
    pub base: String,
    pub hover: String,
    pub select: String,
}

/// Per-route color cache. The first derivation for an id wins.
///
/// Only ids that came with the input are cached; synthesized ids restart on
/// every draw and would hand one route's colors to an unrelated one.
#[derive(Debug, Clone, Default)]
pub struct RoutePalette {
    colors: BTreeMap<String, RouteColors>,
    hover_percent: f64,
    select_percent: f64,
}

impl RoutePalette {
    #[must_use]
    pub fn new(hover_percent: f64, select_percent: f64) -> Self {
        Self { colors: BTreeMap::new(), hover_percent, select_percent }
    }

    /// Colors for `route_id`, derived from `props` on first sight.
    pub fn colors_for(&mut self, route_id: &str, props: &Map<String, Value>) -> RouteColors {
        if let Some(colors) = self.colors.get(route_id) {
            return colors.clone();
        }
        let colors = self.derive(route_id, props);
        self.colors.insert(route_id.to_string(), colors.clone());
        colors
    }

    /// Colors for one draw only, never cached.
    #[must_use]
    pub fn derive(&self, route_id: &str, props: &Map<String, Value>) -> RouteColors {
        let fallback = palette_color(route_id);
        let base = match props.get(COLOR_PROP).and_then(Value::as_str) {
            Some(explicit) => normalize_hex_color(explicit, fallback),
            None => fallback.to_string(),
        };
        RouteColors { hover: shade(&base, self.hover_percent), select: shade(&base, self.select_percent), base }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// One route ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFeature {
    pub route_id: String,
    /// `LineString` or `MultiLineString`.
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
    pub colors: RouteColors,
}

impl RouteFeature {
    #[must_use]
    pub fn start(&self) -> Option<LngLat> {
        self.geometry.first_position()
    }

    #[must_use]
    pub fn end(&self) -> Option<LngLat> {
        self.geometry.last_position()
    }
}

fn parts(geometry: Geometry) -> Vec<Vec<LngLat>> {
    match geometry {
        Geometry::LineString(line) => vec![line],
        Geometry::MultiLineString(lines) => lines,
        _ => Vec::new(),
    }
}

/// Fold linear features into routes, in first-seen order.
///
/// Non-linear features are skipped with a diagnostic. Properties merge
/// right-biased, as places do.
pub fn collect(features: Vec<NormalizedFeature>, palette: &mut RoutePalette) -> Vec<RouteFeature> {
    let mut order: Vec<String> = Vec::new();
    let mut folded: BTreeMap<String, (Vec<Vec<LngLat>>, Map<String, Value>, bool)> = BTreeMap::new();
    for feature in features {
        let kind = feature.geometry_type();
        if !kind.is_linear() {
            debug!(id = %feature.id, geometry = kind.as_str(), "not a route geometry; skipping");
            continue;
        }
        let entry = folded.entry(feature.id.clone()).or_insert_with(|| {
            order.push(feature.id.clone());
            (Vec::new(), Map::new(), feature.synthetic_id)
        });
        entry.0.extend(parts(feature.geometry));
        for (k, v) in feature.properties {
            entry.1.insert(k, v);
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let (mut lines, properties, synthetic_id) = folded.remove(&id)?;
            let geometry = if lines.len() == 1 {
                Geometry::LineString(lines.remove(0))
            } else {
                Geometry::MultiLineString(lines)
            };
            let colors = if synthetic_id {
                palette.derive(&id, &properties)
            } else {
                palette.colors_for(&id, &properties)
            };
            Some(RouteFeature { route_id: id, geometry, properties, colors })
        })
        .collect()
}

/// Marker id for a route endpoint.
#[must_use]
pub fn marker_id(ns: Namespace, end: &str, route_id: &str) -> String {
    format!("{}-{end}-{route_id}", ns.prefix())
}

/// Build the full plan for a set of routes.
#[must_use]
pub fn plan(ns: Namespace, routes: &[RouteFeature], options: &RouteDrawOptions, atlas: &IconAtlas) -> OverlayPlan {
    let mut plan = OverlayPlan::default();
    let mut data = SourceData::default();

    for route in routes {
        let mut props = route.properties.clone();
        props.insert("entityId".into(), Value::String(route.route_id.clone()));
        props.insert("colorBase".into(), Value::String(route.colors.base.clone()));
        props.insert("colorHover".into(), Value::String(route.colors.hover.clone()));
        props.insert("colorSelect".into(), Value::String(route.colors.select.clone()));
        plan.bounds.union(&route.geometry.bounds());
        data.features.push(SourceFeature { id: route.route_id.clone(), geometry: route.geometry.clone(), properties: props });
        plan.entities.insert(route.route_id.clone(), route.properties.clone());

        if options.show_endpoints {
            let endpoints = [("start", ORIGIN_GLYPH, route.start()), ("end", DESTINATION_GLYPH, route.end())];
            for (end, glyph, position) in endpoints {
                let Some(position) = position else { continue };
                let spec = IconSpec::new(glyph, route.colors.base.clone());
                let image = atlas.keys(&spec).base;
                plan.push_icon(spec);
                plan.markers.push(MarkerSpec { id: marker_id(ns, end, &route.route_id), position, image });
            }
        }
    }

    plan.sources = vec![(SourceRole::Base, data)];
    plan.layers = layers(ns);
    plan
}

/// Route layers, bottom to top: casing under line.
#[must_use]
pub fn layers(ns: Namespace) -> Vec<LayerSpec> {
    let source = ns.source_id(SourceRole::Base);
    vec![
        LayerSpec::new(ns.layer_id(LayerRole::RouteCasing), &source, LayerKind::Line)
            .filter(Filter::lines())
            .layout("line-cap", Expr::literal("round"))
            .layout("line-join", Expr::literal("round"))
            .paint("line-color", Expr::get("colorSelect"))
            .paint("line-width", Expr::state(Expr::literal(12), Expr::literal(12), Expr::literal(10)))
            .paint("line-opacity", Expr::state(Expr::literal(0.6), Expr::literal(0.6), Expr::literal(0.35))),
        LayerSpec::new(ns.layer_id(LayerRole::RouteLine), &source, LayerKind::Line)
            .filter(Filter::lines())
            .layout("line-cap", Expr::literal("round"))
            .layout("line-join", Expr::literal("round"))
            .paint("line-color", Expr::state(Expr::get("colorHover"), Expr::get("colorSelect"), Expr::get("colorBase")))
            .paint("line-width", Expr::state(Expr::literal(6), Expr::literal(6), Expr::literal(4))),
    ]
}
