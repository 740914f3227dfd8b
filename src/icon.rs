//! Icon resolution and the surface-registered icon atlas.
//!
//! DESIGN
//! ======
//! Every place marker shows a tinted glyph. The spec for a group is resolved
//! from the feature's own `icon`/`color` properties first, then from the
//! host's type catalog via `typeId`, then from the configured default.
//!
//! The atlas derives two keys per spec (base tint and hover tint) and
//! rasterizes each at most once per surface. The surface's image registry is
//! the cache: `ensure` checks `has_image` before doing any work, so redraws
//! and multiple namespaces share rasters without engine-side bookkeeping.

#[cfg(test)]
#[path = "icon_test.rs"]
mod icon_test;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::color::{normalize_hex_color, parse_hex_rgb, shade};
use crate::error::{InputError, SurfaceError};
use crate::glyph;
use crate::surface::Surface;

/// Property carrying an explicit glyph name.
pub const ICON_PROP: &str = "icon";
/// Property carrying an explicit tint.
pub const COLOR_PROP: &str = "color";

/// A decoded RGBA raster ready for registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: u32,
    /// Row-major RGBA, `width * height * 4` bytes.
    pub data: Vec<u8>,
}

/// Which glyph to draw and in which color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconSpec {
    pub glyph: String,
    pub color: String,
}

impl IconSpec {
    pub fn new(glyph: impl Into<String>, color: impl Into<String>) -> Self {
        Self { glyph: glyph.into(), color: color.into() }
    }
}

/// Render a property value usable as a lookup key (trimmed string or number).
pub(crate) fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_str<'a>(props: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    props.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

// =============================================================
// Type catalog
// =============================================================

/// One host catalog record.
#[derive(Debug, Deserialize)]
pub struct CatalogRecord {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

/// Entity-type catalog: `typeId` to glyph/color, supplied by the host.
///
/// Deserializes from the host's array of `{ id, icon, color }` records.
/// Records with an unusable id are dropped.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Vec<CatalogRecord>")]
pub struct TypeCatalog {
    entries: BTreeMap<String, (Option<String>, Option<String>)>,
}

impl From<Vec<CatalogRecord>> for TypeCatalog {
    fn from(records: Vec<CatalogRecord>) -> Self {
        let mut catalog = Self::default();
        for record in records {
            match key_string(&record.id) {
                Some(id) => {
                    catalog.entries.insert(id, (record.icon, record.color));
                }
                None => debug!(id = %record.id, "catalog record without usable id; skipping"),
            }
        }
        catalog
    }
}

impl TypeCatalog {
    /// Parse the host's catalog document.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Parse`] when the text is not a JSON array of records.
    pub fn from_json(text: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn insert(&mut self, type_id: impl Into<String>, spec: IconSpec) {
        self.entries.insert(type_id.into(), (Some(spec.glyph), Some(spec.color)));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, props: &Map<String, Value>) -> Option<&(Option<String>, Option<String>)> {
        let id = ["typeId", "type_id"].iter().find_map(|k| props.get(*k).and_then(key_string))?;
        self.entries.get(&id)
    }
}

/// Resolve the icon for a group's merged properties.
///
/// Glyph and color resolve independently: feature property, then catalog
/// entry, then `default`.
#[must_use]
pub fn resolve_icon(props: &Map<String, Value>, catalog: &TypeCatalog, default: &IconSpec) -> IconSpec {
    let entry = catalog.lookup(props);
    let glyph = non_empty_str(props, ICON_PROP)
        .or_else(|| entry.and_then(|(icon, _)| icon.as_deref()))
        .unwrap_or(default.glyph.as_str());
    let color = non_empty_str(props, COLOR_PROP)
        .or_else(|| entry.and_then(|(_, color)| color.as_deref()))
        .unwrap_or(default.color.as_str());
    IconSpec::new(glyph, color)
}

// =============================================================
// Atlas
// =============================================================

/// Image keys for one spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconKeys {
    pub base: String,
    pub hover: String,
    /// Normalized base tint.
    pub color: String,
    /// Normalized hover tint.
    pub hover_color: String,
}

/// Derives icon keys and registers rasters with a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct IconAtlas {
    size: u32,
    pixel_ratio: u32,
    hover_percent: f64,
}

impl IconAtlas {
    #[must_use]
    pub fn new(size: u32, pixel_ratio: u32, hover_percent: f64) -> Self {
        Self { size: size.max(1), pixel_ratio: pixel_ratio.max(1), hover_percent }
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    fn glyph_name(name: &str) -> &str {
        if glyph::is_known(name) { name } else { glyph::FALLBACK_GLYPH }
    }

    fn key(&self, glyph: &str, color: &str) -> String {
        format!("{}-{}-{}", Self::glyph_name(glyph), color, self.size)
    }

    /// Derive the base and hover keys without touching any surface.
    #[must_use]
    pub fn keys(&self, spec: &IconSpec) -> IconKeys {
        let color = normalize_hex_color(&spec.color, "#0176de");
        let hover_color = shade(&color, self.hover_percent);
        IconKeys {
            base: self.key(&spec.glyph, &color),
            hover: self.key(&spec.glyph, &hover_color),
            color,
            hover_color,
        }
    }

    /// Make sure both tints of `spec` are registered with `surface`.
    ///
    /// # Errors
    ///
    /// Propagates the surface's failure to register an image.
    pub fn ensure(&self, surface: &mut dyn Surface, spec: &IconSpec) -> Result<IconKeys, SurfaceError> {
        let keys = self.keys(spec);
        self.register(surface, &keys.base, &spec.glyph, &keys.color)?;
        self.register(surface, &keys.hover, &spec.glyph, &keys.hover_color)?;
        Ok(keys)
    }

    fn register(&self, surface: &mut dyn Surface, key: &str, glyph_name: &str, color: &str) -> Result<(), SurfaceError> {
        if surface.has_image(key) {
            return Ok(());
        }
        let side = self.size * self.pixel_ratio;
        let rgb = parse_hex_rgb(color).unwrap_or((1, 118, 222));
        let image = RasterImage {
            width: side,
            height: side,
            pixel_ratio: self.pixel_ratio,
            data: glyph::rasterize(Self::glyph_name(glyph_name), side, rgb),
        };
        debug!(key, side, "registering icon");
        surface.add_image(key, image)
    }
}
