//! Input normalization: arbitrary GeoJSON-shaped input → flat tagged features.
//!
//! DESIGN
//! ======
//! Hosts hand the engine whatever the backend returned: a bare geometry, a
//! feature, a feature collection, a list of any of those, or the raw document
//! text. [`RawGeometryInput`] models those shapes as a tagged union and
//! [`normalize`] flattens it into [`NormalizedFeature`]s in input order.
//!
//! ERROR HANDLING
//! ==============
//! A bad record never aborts the batch. Unparseable text, unknown shapes, and
//! features with missing or invalid coordinates are logged at `debug`/`warn`
//! and skipped.

#[cfg(test)]
#[path = "normalize_test.rs"]
mod normalize_test;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::InputError;
use crate::geometry::{Geometry, GeometryType, LngLat};

/// GeoJSON geometry as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum RawGeometry {
    Point { coordinates: Vec<f64> },
    MultiPoint { coordinates: Vec<Vec<f64>> },
    LineString { coordinates: Vec<Vec<f64>> },
    MultiLineString { coordinates: Vec<Vec<Vec<f64>>> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    GeometryCollection { geometries: Vec<RawGeometry> },
}

/// GeoJSON feature as it arrives on the wire. Geometry stays untyped until
/// normalization so one malformed geometry only costs its own feature.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RawFeature {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

/// GeoJSON feature collection; members are parsed one at a time.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RawFeatureCollection {
    #[serde(default)]
    pub features: Vec<Value>,
}

/// Everything a host may pass to a draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum RawGeometryInput {
    Geometry(RawGeometry),
    Feature(RawFeature),
    FeatureCollection(RawFeatureCollection),
    List(Vec<RawGeometryInput>),
    /// Unparsed document text.
    Text(String),
}

impl RawGeometryInput {
    /// Classify an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Shape`] when the value is not one of the
    /// recognized shapes, or [`InputError::Parse`] when a recognized shape
    /// has the wrong field types.
    pub fn from_value(value: Value) -> Result<Self, InputError> {
        match value {
            Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    match Self::from_value(item) {
                        Ok(entry) => list.push(entry),
                        Err(e) => debug!(error = %e, "skipping list entry"),
                    }
                }
                Ok(Self::List(list))
            }
            Value::String(text) => Ok(Self::Text(text)),
            Value::Object(obj) => {
                let kind = obj.get("type").and_then(Value::as_str).map(str::to_owned);
                let value = Value::Object(obj);
                match kind.as_deref() {
                    Some("Feature") => Ok(Self::Feature(serde_json::from_value(value)?)),
                    Some("FeatureCollection") => Ok(Self::FeatureCollection(serde_json::from_value(value)?)),
                    Some(_) => Ok(Self::Geometry(serde_json::from_value(value)?)),
                    None => Err(InputError::Shape("object without a `type` field".into())),
                }
            }
            other => Err(InputError::Shape(format!("unexpected JSON {}", json_kind(&other)))),
        }
    }

    /// Parse document text and classify it.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Parse`] if the text is not JSON, or any error
    /// [`RawGeometryInput::from_value`] reports.
    pub fn from_text(text: &str) -> Result<Self, InputError> {
        let value: Value = serde_json::from_str(text)?;
        match value {
            // Doubly-encoded text is not unwrapped again.
            Value::String(_) => Err(InputError::Shape("string inside document text".into())),
            other => Self::from_value(other),
        }
    }

    /// Whether the input is a list (drives `multi` mode inference).
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

impl From<Value> for RawGeometryInput {
    /// Infallible conversion: unrecognized values become an empty list, which
    /// normalizes to nothing.
    fn from(value: Value) -> Self {
        Self::from_value(value).unwrap_or_else(|e| {
            warn!(error = %e, "unrecognized geometry input");
            Self::List(Vec::new())
        })
    }
}

impl From<&str> for RawGeometryInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A feature with a guaranteed non-empty id and a normalized geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFeature {
    pub id: String,
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
    /// The input carried no id; `id` is only meaningful within this draw.
    pub synthetic_id: bool,
}

impl NormalizedFeature {
    #[must_use]
    pub fn geometry_type(&self) -> GeometryType {
        self.geometry.geometry_type()
    }
}

/// Flatten `input` into features, preserving input order.
///
/// Features without an id get `{namespace}-{seq}`; the sequence restarts on
/// every call, so synthesized ids are only stable within one draw.
#[must_use]
pub fn normalize(input: &RawGeometryInput, namespace: &str) -> Vec<NormalizedFeature> {
    let mut ctx = Normalizer { namespace, seq: 0, out: Vec::new() };
    ctx.visit(input, true);
    ctx.out
}

struct Normalizer<'a> {
    namespace: &'a str,
    seq: usize,
    out: Vec<NormalizedFeature>,
}

impl Normalizer<'_> {
    fn visit(&mut self, input: &RawGeometryInput, allow_text: bool) {
        match input {
            RawGeometryInput::Geometry(raw) => self.push(None, raw, Map::new()),
            RawGeometryInput::Feature(feature) => self.visit_feature(feature),
            RawGeometryInput::FeatureCollection(fc) => {
                for (index, member) in fc.features.iter().enumerate() {
                    match serde_json::from_value::<RawFeature>(member.clone()) {
                        Ok(feature) => self.visit_feature(&feature),
                        Err(e) => debug!(namespace = self.namespace, index, error = %e, "skipping malformed feature"),
                    }
                }
            }
            RawGeometryInput::List(items) => {
                for item in items {
                    self.visit(item, allow_text);
                }
            }
            RawGeometryInput::Text(text) if allow_text => match RawGeometryInput::from_text(text) {
                Ok(parsed) => self.visit(&parsed, false),
                Err(e) => warn!(namespace = self.namespace, error = %e, "unparseable geometry document"),
            },
            RawGeometryInput::Text(_) => debug!(namespace = self.namespace, "skipping nested document text"),
        }
    }

    fn visit_feature(&mut self, feature: &RawFeature) {
        let properties = feature.properties.clone().unwrap_or_default();
        let Some(geometry) = feature.geometry.as_ref().filter(|g| !g.is_null()) else {
            debug!(namespace = self.namespace, error = %InputError::MissingGeometry, "skipping feature");
            return;
        };
        match serde_json::from_value::<RawGeometry>(geometry.clone()) {
            Ok(raw) => {
                let id = feature_id(feature.id.as_ref(), &properties);
                self.push(id, &raw, properties);
            }
            Err(e) => debug!(namespace = self.namespace, error = %e, "skipping feature with malformed geometry"),
        }
    }

    fn push(&mut self, id: Option<String>, raw: &RawGeometry, properties: Map<String, Value>) {
        let geometries = match convert(raw) {
            Ok(g) if !g.is_empty() => g,
            Ok(_) => {
                debug!(namespace = self.namespace, "skipping empty geometry");
                return;
            }
            Err(e) => {
                debug!(namespace = self.namespace, error = %e, "skipping feature");
                return;
            }
        };
        let synthetic_id = id.is_none();
        let id = id.unwrap_or_else(|| {
            let synthesized = format!("{}-{}", self.namespace, self.seq);
            self.seq += 1;
            synthesized
        });
        for geometry in geometries {
            self.out.push(NormalizedFeature { id: id.clone(), geometry, properties: properties.clone(), synthetic_id });
        }
    }
}

/// Resolve an entity id: `feature.id`, then `properties.id`, then `properties.placeId`.
fn feature_id(explicit: Option<&Value>, properties: &Map<String, Value>) -> Option<String> {
    [explicit, properties.get("id"), properties.get("placeId")]
        .into_iter()
        .flatten()
        .find_map(id_string)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn position(raw: &[f64]) -> Result<LngLat, InputError> {
    LngLat::from_position(raw).ok_or_else(|| InputError::Coordinates(format!("bad position {raw:?}")))
}

fn line(raw: &[Vec<f64>], min_len: usize) -> Result<Vec<LngLat>, InputError> {
    if raw.len() < min_len {
        return Err(InputError::Coordinates(format!("expected at least {min_len} positions, got {}", raw.len())));
    }
    raw.iter().map(|p| position(p)).collect()
}

fn rings(raw: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<LngLat>>, InputError> {
    if raw.is_empty() {
        return Err(InputError::Coordinates("polygon without rings".into()));
    }
    raw.iter().map(|r| line(r, 3)).collect()
}

/// Convert a raw geometry into zero or more normalized geometries.
///
/// `MultiPoint` explodes into points and `GeometryCollection` flattens into
/// its members; everything else maps one-to-one.
fn convert(raw: &RawGeometry) -> Result<Vec<Geometry>, InputError> {
    Ok(match raw {
        RawGeometry::Point { coordinates } => vec![Geometry::Point(position(coordinates)?)],
        RawGeometry::MultiPoint { coordinates } => coordinates
            .iter()
            .map(|p| position(p).map(Geometry::Point))
            .collect::<Result<_, _>>()?,
        RawGeometry::LineString { coordinates } => vec![Geometry::LineString(line(coordinates, 2)?)],
        RawGeometry::MultiLineString { coordinates } => {
            let lines = coordinates.iter().map(|l| line(l, 2)).collect::<Result<Vec<_>, _>>()?;
            if lines.is_empty() {
                return Ok(Vec::new());
            }
            vec![Geometry::MultiLineString(lines)]
        }
        RawGeometry::Polygon { coordinates } => vec![Geometry::Polygon(rings(coordinates)?)],
        RawGeometry::MultiPolygon { coordinates } => {
            let polys = coordinates.iter().map(|p| rings(p)).collect::<Result<Vec<_>, _>>()?;
            if polys.is_empty() {
                return Ok(Vec::new());
            }
            vec![Geometry::MultiPolygon(polys)]
        }
        RawGeometry::GeometryCollection { geometries } => {
            let mut out = Vec::new();
            for g in geometries {
                out.extend(convert(g)?);
            }
            out
        }
    })
}
