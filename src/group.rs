//! Place grouping: fold normalized features into one group per entity.
//!
//! An entity may arrive as a polygon footprint, a point marker, or both. The
//! grouper keeps every representation; which one is drawn is a rendering
//! decision made in [`crate::places`].

#[cfg(test)]
#[path = "group_test.rs"]
mod group_test;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::geometry::LngLat;
use crate::normalize::NormalizedFeature;

/// Property that asks for a marker instead of a polygon footprint.
pub const PREFER_MARKER_PROP: &str = "preferMarker";

/// One logical place and all of its geometries.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceGroup {
    pub entity_id: String,
    /// Right-biased merge of every member's properties (later features win).
    pub merged_properties: Map<String, Value>,
    pub polygons: Vec<NormalizedFeature>,
    pub points: Vec<NormalizedFeature>,
}

impl PlaceGroup {
    fn new(entity_id: String) -> Self {
        Self { entity_id, merged_properties: Map::new(), polygons: Vec::new(), points: Vec::new() }
    }

    /// Whether the `preferMarker` flag is set (bool, `"true"`, or non-zero number).
    #[must_use]
    pub fn prefers_marker(&self) -> bool {
        match self.merged_properties.get(PREFER_MARKER_PROP) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            _ => false,
        }
    }

    /// Rendered as a point: it has a point, or it is polygon-only and prefers a marker.
    #[must_use]
    pub fn renders_as_point(&self) -> bool {
        !self.points.is_empty() || (!self.polygons.is_empty() && self.prefers_marker())
    }

    /// Rendered as a polygon: it has a polygon and does not prefer a marker.
    #[must_use]
    pub fn renders_as_polygon(&self) -> bool {
        !self.polygons.is_empty() && !self.prefers_marker()
    }

    /// Where the marker goes: the first point, else the first polygon's vertex centroid.
    #[must_use]
    pub fn marker_position(&self) -> Option<LngLat> {
        if let Some(point) = self.points.first() {
            return point.geometry.vertex_centroid();
        }
        self.polygons.iter().find_map(|f| f.geometry.vertex_centroid())
    }
}

/// Group features by entity id in a single pass.
///
/// Features that are neither polygonal nor points (lines) do not describe a
/// place and are dropped with a diagnostic.
#[must_use]
pub fn group(features: Vec<NormalizedFeature>) -> BTreeMap<String, PlaceGroup> {
    let mut groups: BTreeMap<String, PlaceGroup> = BTreeMap::new();
    for feature in features {
        let kind = feature.geometry_type();
        if kind.is_linear() {
            debug!(id = %feature.id, geometry = kind.as_str(), "line geometry is not a place; skipping");
            continue;
        }
        let group = groups
            .entry(feature.id.clone())
            .or_insert_with(|| PlaceGroup::new(feature.id.clone()));
        for (k, v) in &feature.properties {
            group.merged_properties.insert(k.clone(), v.clone());
        }
        if kind.is_polygonal() {
            group.polygons.push(feature);
        } else {
            group.points.push(feature);
        }
    }
    groups
}
