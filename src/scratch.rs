//! Scratch overlay: preview one user-authored geometry.
//!
//! Everything reads from a single source; a fill and outline pick polygons, a
//! line picks lines, a circle picks points. No interaction is bound.

#[cfg(test)]
#[path = "scratch_test.rs"]
mod scratch_test;

use crate::layer_set::{LayerRole, Namespace, OverlayPlan, SourceRole};
use crate::normalize::NormalizedFeature;
use crate::style::{Expr, Filter, LayerKind, LayerSpec, SourceData, SourceFeature};

const SCRATCH_COLOR: &str = "#e0542f";

/// Build the scratch plan. Feature ids are kept as normalized.
#[must_use]
pub fn plan(features: Vec<NormalizedFeature>) -> OverlayPlan {
    let ns = Namespace::Scratch;
    let mut plan = OverlayPlan::default();
    let mut data = SourceData::default();
    for feature in features {
        plan.bounds.union(&feature.geometry.bounds());
        plan.entities.insert(feature.id.clone(), feature.properties.clone());
        data.features.push(SourceFeature { id: feature.id, geometry: feature.geometry, properties: feature.properties });
    }

    let source = ns.source_id(SourceRole::Base);
    plan.sources = vec![(SourceRole::Base, data)];
    plan.layers = vec![
        LayerSpec::new(ns.layer_id(LayerRole::Fill), &source, LayerKind::Fill)
            .filter(Filter::polygons())
            .paint("fill-color", Expr::literal(SCRATCH_COLOR))
            .paint("fill-opacity", Expr::literal(0.25)),
        LayerSpec::new(ns.layer_id(LayerRole::Outline), &source, LayerKind::Line)
            .filter(Filter::polygons())
            .paint("line-color", Expr::literal(SCRATCH_COLOR))
            .paint("line-width", Expr::literal(2))
            .paint("line-dasharray", Expr::literal(vec![2, 1])),
        LayerSpec::new(ns.layer_id(LayerRole::Line), &source, LayerKind::Line)
            .filter(Filter::lines())
            .paint("line-color", Expr::literal(SCRATCH_COLOR))
            .paint("line-width", Expr::literal(3)),
        LayerSpec::new(ns.layer_id(LayerRole::Circle), &source, LayerKind::Circle)
            .filter(Filter::points())
            .paint("circle-color", Expr::literal(SCRATCH_COLOR))
            .paint("circle-radius", Expr::literal(6))
            .paint("circle-stroke-color", Expr::literal("#ffffff"))
            .paint("circle-stroke-width", Expr::literal(2)),
    ];
    plan
}
