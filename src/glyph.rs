//! Built-in vector glyphs and the coverage rasterizer behind the icon atlas.
//!
//! Glyphs live in a unit square (x right, y down). Each glyph is a union of
//! shapes; a shape is an outer ring minus optional holes.

#[cfg(test)]
#[path = "glyph_test.rs"]
mod glyph_test;

use std::f64::consts::TAU;

use crate::geometry::{Planar, ring_contains};

/// Glyph used when a name is not in the built-in set.
pub const FALLBACK_GLYPH: &str = "pin";

/// Samples per axis per pixel (4 coverage samples per pixel).
const SUPERSAMPLE: u32 = 2;

/// A point in glyph space.
#[derive(Debug, Clone, Copy)]
struct Px {
    x: f64,
    y: f64,
}

impl Planar for Px {
    fn xy(self) -> (f64, f64) {
        (self.x, self.y)
    }
}

struct Shape {
    outer: Vec<Px>,
    holes: Vec<Vec<Px>>,
}

impl Shape {
    fn solid(outer: Vec<Px>) -> Self {
        Self { outer, holes: Vec::new() }
    }

    fn with_hole(mut self, hole: Vec<Px>) -> Self {
        self.holes.push(hole);
        self
    }

    fn covers(&self, p: Px) -> bool {
        ring_contains(&self.outer, p) && !self.holes.iter().any(|h| ring_contains(h, p))
    }
}

fn poly(points: &[(f64, f64)]) -> Vec<Px> {
    points.iter().map(|&(x, y)| Px { x, y }).collect()
}

fn circle(cx: f64, cy: f64, r: f64) -> Vec<Px> {
    const SEGMENTS: u32 = 32;
    (0..SEGMENTS)
        .map(|i| {
            let a = TAU * f64::from(i) / f64::from(SEGMENTS);
            Px { x: cx + r * a.cos(), y: cy + r * a.sin() }
        })
        .collect()
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Px> {
    poly(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
}

/// Whether `name` is one of the built-in glyphs.
#[must_use]
pub fn is_known(name: &str) -> bool {
    shapes(name).is_some()
}

fn shapes(name: &str) -> Option<Vec<Shape>> {
    let shapes = match name {
        "home" => vec![
            Shape::solid(poly(&[
                (0.5, 0.08),
                (0.94, 0.48),
                (0.8, 0.48),
                (0.8, 0.92),
                (0.2, 0.92),
                (0.2, 0.48),
                (0.06, 0.48),
            ]))
            .with_hole(rect(0.42, 0.64, 0.58, 0.93)),
        ],
        "flag" => vec![
            Shape::solid(rect(0.18, 0.06, 0.27, 0.94)),
            Shape::solid(poly(&[(0.27, 0.08), (0.88, 0.28), (0.27, 0.5)])),
        ],
        "origin" => vec![
            Shape::solid(circle(0.5, 0.5, 0.44)).with_hole(circle(0.5, 0.5, 0.28)),
            Shape::solid(circle(0.5, 0.5, 0.14)),
        ],
        "pin" => vec![
            Shape::solid(circle(0.5, 0.38, 0.32)).with_hole(circle(0.5, 0.38, 0.12)),
            Shape::solid(poly(&[(0.22, 0.52), (0.78, 0.52), (0.5, 0.96)])),
        ],
        "book" => vec![
            Shape::solid(rect(0.12, 0.18, 0.48, 0.84)),
            Shape::solid(rect(0.52, 0.18, 0.88, 0.84)),
        ],
        "food" => vec![
            Shape::solid(rect(0.22, 0.08, 0.3, 0.92)),
            Shape::solid(poly(&[(0.6, 0.08), (0.78, 0.08), (0.78, 0.92), (0.7, 0.92), (0.7, 0.5), (0.6, 0.45)])),
        ],
        "parking" => vec![
            Shape::solid(rect(0.08, 0.08, 0.92, 0.92))
                .with_hole(poly(&[(0.36, 0.22), (0.62, 0.22), (0.7, 0.36), (0.62, 0.5), (0.36, 0.5)]))
                .with_hole(rect(0.36, 0.5, 0.46, 0.8)),
        ],
        "info" => vec![
            Shape::solid(circle(0.5, 0.5, 0.44))
                .with_hole(rect(0.44, 0.42, 0.56, 0.76))
                .with_hole(circle(0.5, 0.3, 0.07)),
        ],
        _ => return None,
    };
    Some(shapes)
}

/// Rasterize `glyph` into a `side × side` RGBA buffer tinted with `rgb`.
///
/// Alpha is the fraction of supersamples covered; color channels are not
/// premultiplied. Unknown glyphs draw [`FALLBACK_GLYPH`].
#[must_use]
pub fn rasterize(glyph: &str, side: u32, rgb: (u8, u8, u8)) -> Vec<u8> {
    let shapes = shapes(glyph).or_else(|| shapes(FALLBACK_GLYPH)).unwrap_or_default();
    let mut data = Vec::with_capacity((side * side * 4) as usize);
    let samples = SUPERSAMPLE * SUPERSAMPLE;
    let step = 1.0 / f64::from(side * SUPERSAMPLE);

    for py in 0..side {
        for px in 0..side {
            let mut covered = 0_u32;
            for sy in 0..SUPERSAMPLE {
                for sx in 0..SUPERSAMPLE {
                    let x = f64::from(px * SUPERSAMPLE + sx) * step + step / 2.0;
                    let y = f64::from(py * SUPERSAMPLE + sy) * step + step / 2.0;
                    let p = Px { x, y };
                    if shapes.iter().any(|s| s.covers(p)) {
                        covered += 1;
                    }
                }
            }
            #[allow(clippy::cast_possible_truncation)]
            let alpha = (covered * 255 / samples) as u8;
            data.extend_from_slice(&[rgb.0, rgb.1, rgb.2, alpha]);
        }
    }
    data
}
