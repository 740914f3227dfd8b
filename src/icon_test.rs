use serde_json::json;

use super::*;
use crate::memory::MemorySurface;

fn props(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn default_icon() -> IconSpec {
    IconSpec::new("home", "#0176DE")
}

// =============================================================
// Keys
// =============================================================

#[test]
fn keys_use_glyph_normalized_color_and_size() {
    let atlas = IconAtlas::new(28, 2, 20.0);
    let keys = atlas.keys(&IconSpec::new("home", "#0176DE"));
    assert_eq!(keys.base, "home-#0176de-28");
    assert_eq!(keys.hover, "home-#015eb2-28");
    assert_eq!(keys.color, "#0176de");
    assert_eq!(keys.hover_color, "#015eb2");
}

#[test]
fn unknown_glyph_keys_as_fallback() {
    let atlas = IconAtlas::new(28, 2, 20.0);
    assert_eq!(atlas.keys(&IconSpec::new("rocket", "#000000")).base, "pin-#000000-28");
}

#[test]
fn bad_color_keys_as_default_blue() {
    let atlas = IconAtlas::new(28, 2, 20.0);
    assert_eq!(atlas.keys(&IconSpec::new("home", "teal")).base, "home-#0176de-28");
}

// =============================================================
// Ensure
// =============================================================

#[test]
fn ensure_registers_base_and_hover_once() {
    let atlas = IconAtlas::new(28, 2, 20.0);
    let mut surface = MemorySurface::new();
    let spec = IconSpec::new("home", "#0176DE");

    let first = atlas.ensure(&mut surface, &spec);
    let second = atlas.ensure(&mut surface, &spec);

    assert_eq!(first, second);
    assert_eq!(surface.image_registrations(), 2);
    assert_eq!(surface.image_keys(), vec!["home-#015eb2-28".to_string(), "home-#0176de-28".to_string()]);
}

#[test]
fn ensure_rasterizes_at_pixel_ratio() {
    let atlas = IconAtlas::new(28, 2, 20.0);
    let mut surface = MemorySurface::new();
    let keys = atlas.ensure(&mut surface, &default_icon()).unwrap_or_else(|e| panic!("{e}"));
    let Some(image) = surface.image(&keys.base) else {
        panic!("base image missing");
    };
    assert_eq!((image.width, image.height, image.pixel_ratio), (56, 56, 2));
    assert_eq!(image.data.len(), 56 * 56 * 4);
}

#[test]
fn ensure_propagates_surface_failure() {
    let atlas = IconAtlas::new(28, 2, 20.0);
    let mut surface = MemorySurface::loading();
    assert_eq!(atlas.ensure(&mut surface, &default_icon()), Err(SurfaceError::StyleNotLoaded));
}

// =============================================================
// Resolution
// =============================================================

#[test]
fn explicit_properties_win() {
    let mut catalog = TypeCatalog::default();
    catalog.insert("3", IconSpec::new("book", "#ff0000"));
    let spec = resolve_icon(&props(json!({ "icon": "info", "color": "#00ff00", "typeId": 3 })), &catalog, &default_icon());
    assert_eq!(spec, IconSpec::new("info", "#00ff00"));
}

#[test]
fn catalog_fills_in_by_type_id() {
    let mut catalog = TypeCatalog::default();
    catalog.insert("3", IconSpec::new("book", "#ff0000"));
    assert_eq!(resolve_icon(&props(json!({ "typeId": 3 })), &catalog, &default_icon()), IconSpec::new("book", "#ff0000"));
    assert_eq!(resolve_icon(&props(json!({ "type_id": "3" })), &catalog, &default_icon()), IconSpec::new("book", "#ff0000"));
}

#[test]
fn glyph_and_color_resolve_independently() {
    let mut catalog = TypeCatalog::default();
    catalog.insert("3", IconSpec::new("book", "#ff0000"));
    let spec = resolve_icon(&props(json!({ "typeId": 3, "color": "#123456" })), &catalog, &default_icon());
    assert_eq!(spec, IconSpec::new("book", "#123456"));
}

#[test]
fn nothing_resolves_to_default() {
    let spec = resolve_icon(&props(json!({ "typeId": 99, "icon": "  " })), &TypeCatalog::default(), &default_icon());
    assert_eq!(spec, default_icon());
}

#[test]
fn catalog_parses_host_records() {
    let catalog = TypeCatalog::from_json(
        r##"[{"id": 3, "icon": "book", "color": "#ff0000"}, {"id": "food", "icon": "food"}, {"id": null}]"##,
    )
    .unwrap_or_default();
    assert_eq!(catalog.len(), 2);
    let spec = resolve_icon(&props(json!({ "typeId": "food" })), &catalog, &default_icon());
    assert_eq!(spec, IconSpec::new("food", "#0176DE"));
}

#[test]
fn catalog_rejects_non_array_documents() {
    assert!(TypeCatalog::from_json(r#"{"id": 3}"#).is_err());
}
