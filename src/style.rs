//! Style model: source data, layer specs, and the small expression language
//! layers use to read feature properties and feature-state.

#[cfg(test)]
#[path = "style_test.rs"]
mod style_test;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::geometry::{Geometry, GeometryType};

// =============================================================
// Sources
// =============================================================

/// One feature inside a source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeature {
    pub id: String,
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
}

/// The data held by one source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceData {
    pub features: Vec<SourceFeature>,
}

impl SourceData {
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Render as a GeoJSON `FeatureCollection`.
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|f| {
                json!({
                    "type": "Feature",
                    "id": f.id,
                    "geometry": f.geometry.to_geojson(),
                    "properties": f.properties,
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }
}

// =============================================================
// Feature-state
// =============================================================

/// Feature-state keys the engine writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateKey {
    Hover,
    Selected,
}

impl StateKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hover => "hover",
            Self::Selected => "selected",
        }
    }
}

/// The feature-state flags of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FeatureFlags {
    pub hover: bool,
    pub selected: bool,
}

impl FeatureFlags {
    pub fn set(&mut self, key: StateKey, value: bool) {
        match key {
            StateKey::Hover => self.hover = value,
            StateKey::Selected => self.selected = value,
        }
    }

    #[must_use]
    pub fn is_clear(self) -> bool {
        !self.hover && !self.selected
    }
}

// =============================================================
// Expressions
// =============================================================

/// A layer property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Value),
    /// Read a feature property.
    Get(String),
    /// First non-null result.
    Coalesce(Vec<Expr>),
    /// Branch on feature-state. `hover` takes precedence over `selected`.
    FeatureState { hover: Box<Expr>, selected: Box<Expr>, otherwise: Box<Expr> },
}

impl Expr {
    pub fn literal(v: impl Into<Value>) -> Self {
        Self::Literal(v.into())
    }

    pub fn get(key: impl Into<String>) -> Self {
        Self::Get(key.into())
    }

    #[must_use]
    pub fn state(hover: Self, selected: Self, otherwise: Self) -> Self {
        Self::FeatureState { hover: Box::new(hover), selected: Box::new(selected), otherwise: Box::new(otherwise) }
    }

    /// Evaluate against a feature's properties and flags.
    #[must_use]
    pub fn evaluate(&self, properties: &Map<String, Value>, flags: FeatureFlags) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Get(key) => properties.get(key).cloned().unwrap_or(Value::Null),
            Self::Coalesce(options) => options
                .iter()
                .map(|e| e.evaluate(properties, flags))
                .find(|v| !v.is_null())
                .unwrap_or(Value::Null),
            Self::FeatureState { hover, selected, otherwise } => {
                if flags.hover {
                    hover.evaluate(properties, flags)
                } else if flags.selected {
                    selected.evaluate(properties, flags)
                } else {
                    otherwise.evaluate(properties, flags)
                }
            }
        }
    }

    /// Whether this expression reads feature-state.
    #[cfg(test)]
    pub(crate) fn uses_feature_state(&self) -> bool {
        match self {
            Self::Literal(_) | Self::Get(_) => false,
            Self::Coalesce(options) => options.iter().any(Self::uses_feature_state),
            Self::FeatureState { .. } => true,
        }
    }
}

/// A layer filter.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    #[default]
    Always,
    GeometryTypeIn(Vec<GeometryType>),
    Has(String),
    Eq(String, Value),
    All(Vec<Filter>),
}

impl Filter {
    #[must_use]
    pub fn polygons() -> Self {
        Self::GeometryTypeIn(vec![GeometryType::Polygon, GeometryType::MultiPolygon])
    }

    #[must_use]
    pub fn lines() -> Self {
        Self::GeometryTypeIn(vec![GeometryType::LineString, GeometryType::MultiLineString])
    }

    #[must_use]
    pub fn points() -> Self {
        Self::GeometryTypeIn(vec![GeometryType::Point])
    }

    #[must_use]
    pub fn matches(&self, kind: GeometryType, properties: &Map<String, Value>) -> bool {
        match self {
            Self::Always => true,
            Self::GeometryTypeIn(kinds) => kinds.contains(&kind),
            Self::Has(key) => properties.contains_key(key),
            Self::Eq(key, value) => properties.get(key) == Some(value),
            Self::All(filters) => filters.iter().all(|f| f.matches(kind, properties)),
        }
    }
}

// =============================================================
// Layers
// =============================================================

/// Rendering primitive of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LayerKind {
    Fill,
    Line,
    Symbol,
    Circle,
}

/// A rendering rule reading from one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub kind: LayerKind,
    pub filter: Filter,
    pub paint: BTreeMap<&'static str, Expr>,
    pub layout: BTreeMap<&'static str, Expr>,
}

impl LayerSpec {
    pub fn new(id: impl Into<String>, source: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            kind,
            filter: Filter::Always,
            paint: BTreeMap::new(),
            layout: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn paint(mut self, name: &'static str, value: Expr) -> Self {
        self.paint.insert(name, value);
        self
    }

    #[must_use]
    pub fn layout(mut self, name: &'static str, value: Expr) -> Self {
        self.layout.insert(name, value);
        self
    }

    /// Look up a paint or layout property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Expr> {
        self.paint.get(name).or_else(|| self.layout.get(name))
    }
}
