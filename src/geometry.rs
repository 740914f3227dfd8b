//! Geographic primitives: positions, bounds, and the normalized geometry enum.
//!
//! Coordinates are plain longitude/latitude degrees. The distance and
//! containment helpers work in that planar degree space; they are only used
//! for hit-testing at street scale, where the distortion does not matter.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A longitude/latitude position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    #[must_use]
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Build from a GeoJSON position (`[lng, lat, ...]`). Extra ordinates are ignored.
    #[must_use]
    pub fn from_position(raw: &[f64]) -> Option<Self> {
        match raw {
            [lng, lat, ..] if lng.is_finite() && lat.is_finite() => Some(Self::new(*lng, *lat)),
            _ => None,
        }
    }

    fn to_position(self) -> Value {
        json!([self.lng, self.lat])
    }
}

/// Geometry kinds the engine renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPolygon,
    MultiLineString,
}

impl GeometryType {
    /// The GeoJSON `type` string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPolygon => "MultiPolygon",
            Self::MultiLineString => "MultiLineString",
        }
    }

    #[must_use]
    pub fn is_polygonal(self) -> bool {
        matches!(self, Self::Polygon | Self::MultiPolygon)
    }

    #[must_use]
    pub fn is_linear(self) -> bool {
        matches!(self, Self::LineString | Self::MultiLineString)
    }
}

/// Axis-aligned bounding box. The default value is empty and absorbs the first
/// position it is extended with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            west: f64::INFINITY,
            south: f64::INFINITY,
            east: f64::NEG_INFINITY,
            north: f64::NEG_INFINITY,
        }
    }
}

impl Bounds {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.west > self.east || self.south > self.north
    }

    pub fn extend(&mut self, p: LngLat) {
        self.west = self.west.min(p.lng);
        self.south = self.south.min(p.lat);
        self.east = self.east.max(p.lng);
        self.north = self.north.max(p.lat);
    }

    pub fn union(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        self.extend(LngLat::new(other.west, other.south));
        self.extend(LngLat::new(other.east, other.north));
    }
}

/// A normalized geometry.
///
/// Polygon rings are stored as given; the first ring is the exterior and the
/// rest are holes.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(LngLat),
    LineString(Vec<LngLat>),
    Polygon(Vec<Vec<LngLat>>),
    MultiPolygon(Vec<Vec<Vec<LngLat>>>),
    MultiLineString(Vec<Vec<LngLat>>),
}

impl Geometry {
    #[must_use]
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Self::Point(_) => GeometryType::Point,
            Self::LineString(_) => GeometryType::LineString,
            Self::Polygon(_) => GeometryType::Polygon,
            Self::MultiPolygon(_) => GeometryType::MultiPolygon,
            Self::MultiLineString(_) => GeometryType::MultiLineString,
        }
    }

    /// All positions, in storage order.
    #[must_use]
    pub fn positions(&self) -> Vec<LngLat> {
        match self {
            Self::Point(p) => vec![*p],
            Self::LineString(line) => line.clone(),
            Self::Polygon(rings) | Self::MultiLineString(rings) => rings.iter().flatten().copied().collect(),
            Self::MultiPolygon(polys) => polys.iter().flatten().flatten().copied().collect(),
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Bounds {
        let mut b = Bounds::default();
        for p in self.positions() {
            b.extend(p);
        }
        b
    }

    /// First position of a linear geometry (the route origin).
    #[must_use]
    pub fn first_position(&self) -> Option<LngLat> {
        match self {
            Self::LineString(line) => line.first().copied(),
            Self::MultiLineString(lines) => lines.iter().find_map(|l| l.first().copied()),
            _ => None,
        }
    }

    /// Last position of a linear geometry (the route destination).
    #[must_use]
    pub fn last_position(&self) -> Option<LngLat> {
        match self {
            Self::LineString(line) => line.last().copied(),
            Self::MultiLineString(lines) => lines.iter().rev().find_map(|l| l.last().copied()),
            _ => None,
        }
    }

    /// Arithmetic mean of exterior-ring vertices.
    ///
    /// This is a vertex average, not an area-weighted centroid: fine for small
    /// convex building footprints, drifts for concave or large shapes. The
    /// closing vertex of a closed ring is counted once.
    #[must_use]
    pub fn vertex_centroid(&self) -> Option<LngLat> {
        let exteriors: Vec<&Vec<LngLat>> = match self {
            Self::Point(p) => return Some(*p),
            Self::Polygon(rings) => rings.first().into_iter().collect(),
            Self::MultiPolygon(polys) => polys.iter().filter_map(|rings| rings.first()).collect(),
            Self::LineString(_) | Self::MultiLineString(_) => return None,
        };

        let mut sum_lng = 0.0;
        let mut sum_lat = 0.0;
        let mut count = 0_usize;
        for ring in exteriors {
            let open = match (ring.first(), ring.last()) {
                (Some(a), Some(b)) if ring.len() > 1 && a == b => &ring[..ring.len() - 1],
                _ => &ring[..],
            };
            for p in open {
                sum_lng += p.lng;
                sum_lat += p.lat;
                count += 1;
            }
        }
        if count == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = count as f64;
        Some(LngLat::new(sum_lng / n, sum_lat / n))
    }

    /// Whether `p` lies inside a polygonal geometry (holes excluded).
    #[must_use]
    pub fn contains(&self, p: LngLat) -> bool {
        match self {
            Self::Polygon(rings) => polygon_contains(rings, p),
            Self::MultiPolygon(polys) => polys.iter().any(|rings| polygon_contains(rings, p)),
            _ => false,
        }
    }

    /// Planar distance in degrees from `p` to the nearest vertex or edge.
    ///
    /// Polygons measure to their ring edges, not their interior; use
    /// [`Geometry::contains`] for area hits.
    #[must_use]
    pub fn distance_to(&self, p: LngLat) -> f64 {
        match self {
            Self::Point(q) => distance(*q, p),
            Self::LineString(line) => polyline_distance(line, p),
            Self::Polygon(rings) | Self::MultiLineString(rings) => {
                rings.iter().map(|r| polyline_distance(r, p)).fold(f64::INFINITY, f64::min)
            }
            Self::MultiPolygon(polys) => polys
                .iter()
                .flatten()
                .map(|r| polyline_distance(r, p))
                .fold(f64::INFINITY, f64::min),
        }
    }

    /// Render as a GeoJSON geometry object.
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let line = |l: &Vec<LngLat>| Value::Array(l.iter().map(|p| p.to_position()).collect());
        let rings = |rs: &Vec<Vec<LngLat>>| Value::Array(rs.iter().map(line).collect());
        let coordinates = match self {
            Self::Point(p) => p.to_position(),
            Self::LineString(l) => line(l),
            Self::Polygon(rs) | Self::MultiLineString(rs) => rings(rs),
            Self::MultiPolygon(polys) => Value::Array(polys.iter().map(rings).collect()),
        };
        json!({ "type": self.geometry_type().as_str(), "coordinates": coordinates })
    }
}

fn distance(a: LngLat, b: LngLat) -> f64 {
    (a.lng - b.lng).hypot(a.lat - b.lat)
}

fn segment_distance(a: LngLat, b: LngLat, p: LngLat) -> f64 {
    let dx = b.lng - a.lng;
    let dy = b.lat - a.lat;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance(a, p);
    }
    let t = (((p.lng - a.lng) * dx + (p.lat - a.lat) * dy) / len_sq).clamp(0.0, 1.0);
    distance(LngLat::new(a.lng + t * dx, a.lat + t * dy), p)
}

fn polyline_distance(line: &[LngLat], p: LngLat) -> f64 {
    match line {
        [] => f64::INFINITY,
        [only] => distance(*only, p),
        _ => line
            .windows(2)
            .map(|w| segment_distance(w[0], w[1], p))
            .fold(f64::INFINITY, f64::min),
    }
}

/// A point in some plane, for ring tests.
pub(crate) trait Planar: Copy {
    fn xy(self) -> (f64, f64);
}

impl Planar for LngLat {
    fn xy(self) -> (f64, f64) {
        (self.lng, self.lat)
    }
}

/// Even-odd ray cast against one ring.
pub(crate) fn ring_contains<P: Planar>(ring: &[P], p: P) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let (px, py) = p.xy();
    let mut j = n - 1;
    for i in 0..n {
        let ((ax, ay), (bx, by)) = (ring[i].xy(), ring[j].xy());
        if (ay > py) != (by > py) && px < (bx - ax) * (py - ay) / (by - ay) + ax {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn polygon_contains(rings: &[Vec<LngLat>], p: LngLat) -> bool {
    let Some((exterior, holes)) = rings.split_first() else {
        return false;
    };
    ring_contains(exterior, p) && !holes.iter().any(|h| ring_contains(h, p))
}
