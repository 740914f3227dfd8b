//! Place overlay plans: polygons, derived point markers, and their layers.
//!
//! A group renders as a polygon when it has a footprint and does not prefer a
//! marker, and as a point when it has a point or prefers a marker. Polygons
//! go into the namespace's base source; points into the derived points
//! source. Layers pick geometry with declarative filters, so one source can
//! carry mixed polygon types.
//!
//! Points render as two symbol layers: a collision-aware base layer and a
//! hover overlay with collision disabled whose opacity follows feature-state.
//! Collision-aware layout and "always show the hovered label" cannot share a
//! layer.

#[cfg(test)]
#[path = "places_test.rs"]
mod places_test;

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::color::shade;
use crate::geometry::Geometry;
use crate::group::PlaceGroup;
use crate::icon::{IconAtlas, IconSpec, TypeCatalog, resolve_icon};
use crate::layer_set::{LayerRole, Namespace, OverlayPlan, SourceRole};
use crate::normalize::RawGeometryInput;
use crate::style::{Expr, Filter, LayerKind, LayerSpec, SourceData, SourceFeature};

/// Multi-entity browse view or one focused entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceMode {
    Multi,
    Single,
}

impl PlaceMode {
    /// List input draws the browse view; anything else draws one entity.
    #[must_use]
    pub fn infer(input: &RawGeometryInput) -> Self {
        if input.is_list() { Self::Multi } else { Self::Single }
    }

    #[must_use]
    pub fn namespace(self) -> Namespace {
        match self {
            Self::Multi => Namespace::Places,
            Self::Single => Namespace::PlaceSingle,
        }
    }
}

/// Options for `draw_places`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceDrawOptions {
    /// `None` infers from the input shape.
    pub mode: Option<PlaceMode>,
    /// Fit the camera; `None` fits in single mode only.
    pub zoom: Option<bool>,
    pub show_polygon_labels: bool,
}

impl Default for PlaceDrawOptions {
    fn default() -> Self {
        Self { mode: None, zoom: None, show_polygon_labels: true }
    }
}

impl PlaceDrawOptions {
    #[must_use]
    pub fn should_fit(&self, mode: PlaceMode) -> bool {
        self.zoom.unwrap_or(mode == PlaceMode::Single)
    }
}

/// Inputs that shape how places look.
#[derive(Debug, Clone, Copy)]
pub struct PlaceStyle<'a> {
    pub atlas: &'a IconAtlas,
    pub catalog: &'a TypeCatalog,
    pub default_icon: &'a IconSpec,
    pub select_percent: f64,
}

fn inject(props: &Map<String, Value>, entity_id: &str, extra: [(&str, &str); 5]) -> Map<String, Value> {
    let mut out = props.clone();
    out.insert("entityId".into(), Value::String(entity_id.to_string()));
    for (k, v) in extra {
        out.insert(k.to_string(), Value::String(v.to_string()));
    }
    out
}

/// Build the full plan for a set of groups.
#[must_use]
pub fn plan(
    namespace: Namespace,
    groups: &BTreeMap<String, PlaceGroup>,
    options: &PlaceDrawOptions,
    style: &PlaceStyle<'_>,
) -> OverlayPlan {
    let mut plan = OverlayPlan::default();
    let mut polygons = SourceData::default();
    let mut points = SourceData::default();

    for group in groups.values() {
        let icon = resolve_icon(&group.merged_properties, style.catalog, style.default_icon);
        let keys = style.atlas.keys(&icon);
        let select = shade(&keys.color, style.select_percent);
        let props = inject(
            &group.merged_properties,
            &group.entity_id,
            [
                ("iconBase", keys.base.as_str()),
                ("iconHover", keys.hover.as_str()),
                ("colorBase", keys.color.as_str()),
                ("colorHover", keys.hover_color.as_str()),
                ("colorSelect", select.as_str()),
            ],
        );

        if group.renders_as_polygon() {
            for feature in &group.polygons {
                plan.bounds.union(&feature.geometry.bounds());
                polygons.features.push(SourceFeature {
                    id: group.entity_id.clone(),
                    geometry: feature.geometry.clone(),
                    properties: props.clone(),
                });
            }
        }
        if group.renders_as_point() {
            if let Some(position) = group.marker_position() {
                plan.bounds.extend(position);
                points.features.push(SourceFeature {
                    id: group.entity_id.clone(),
                    geometry: Geometry::Point(position),
                    properties: props.clone(),
                });
                plan.push_icon(icon);
            }
        }
        plan.entities.insert(group.entity_id.clone(), group.merged_properties.clone());
    }

    plan.sources = vec![(SourceRole::Base, polygons), (SourceRole::Points, points)];
    plan.layers = layers(namespace, options.show_polygon_labels);
    plan
}

fn state_color() -> Expr {
    Expr::state(Expr::get("colorHover"), Expr::get("colorSelect"), Expr::get("colorBase"))
}

fn label_text() -> Expr {
    Expr::Coalesce(vec![Expr::get("placeName"), Expr::get("name")])
}

/// Place layers, bottom to top.
#[must_use]
pub fn layers(ns: Namespace, show_polygon_labels: bool) -> Vec<LayerSpec> {
    let base = ns.source_id(SourceRole::Base);
    let points = ns.source_id(SourceRole::Points);
    let mut out = vec![
        LayerSpec::new(ns.layer_id(LayerRole::Fill), &base, LayerKind::Fill)
            .filter(Filter::polygons())
            .paint("fill-color", state_color())
            .paint("fill-opacity", Expr::state(Expr::literal(0.45), Expr::literal(0.55), Expr::literal(0.3))),
        LayerSpec::new(ns.layer_id(LayerRole::Outline), &base, LayerKind::Line)
            .filter(Filter::polygons())
            .paint("line-color", state_color())
            .paint("line-width", Expr::state(Expr::literal(3.0), Expr::literal(3.0), Expr::literal(1.5))),
    ];
    if show_polygon_labels {
        out.push(
            LayerSpec::new(ns.layer_id(LayerRole::Label), &base, LayerKind::Symbol)
                .filter(Filter::polygons())
                .layout("text-field", label_text())
                .layout("text-size", Expr::literal(12))
                .paint("text-color", Expr::literal("#1f2933"))
                .paint("text-halo-color", Expr::literal("#ffffff"))
                .paint("text-halo-width", Expr::literal(1.5)),
        );
    }
    out.push(
        LayerSpec::new(ns.layer_id(LayerRole::PointBase), &points, LayerKind::Symbol)
            .filter(Filter::points())
            .layout("icon-image", Expr::state(Expr::get("iconBase"), Expr::get("iconHover"), Expr::get("iconBase")))
            .layout("icon-allow-overlap", Expr::literal(false))
            .layout("icon-anchor", Expr::literal("bottom")),
    );
    out.push(
        LayerSpec::new(ns.layer_id(LayerRole::PointText), &points, LayerKind::Symbol)
            .filter(Filter::points())
            .layout("text-field", label_text())
            .layout("text-optional", Expr::literal(true))
            .layout("text-allow-overlap", Expr::literal(false))
            .layout("text-anchor", Expr::literal("top"))
            .paint("text-color", state_color()),
    );
    out.push(
        LayerSpec::new(ns.layer_id(LayerRole::PointHover), &points, LayerKind::Symbol)
            .filter(Filter::points())
            .layout("icon-image", Expr::get("iconHover"))
            .layout("text-field", label_text())
            .layout("icon-allow-overlap", Expr::literal(true))
            .layout("text-allow-overlap", Expr::literal(true))
            .layout("icon-anchor", Expr::literal("bottom"))
            .layout("text-anchor", Expr::literal("top"))
            .paint("icon-opacity", Expr::state(Expr::literal(1), Expr::literal(0), Expr::literal(0)))
            .paint("text-opacity", Expr::state(Expr::literal(1), Expr::literal(0), Expr::literal(0))),
    );
    out
}

