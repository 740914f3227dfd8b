use serde_json::json;

use super::*;
use crate::geometry::Geometry;
use crate::style::{Expr, Filter, SourceFeature};

// =============================================================
// Helpers
// =============================================================

fn square_feature(id: &str) -> SourceFeature {
    let ring = vec![
        LngLat::new(0.0, 0.0),
        LngLat::new(1.0, 0.0),
        LngLat::new(1.0, 1.0),
        LngLat::new(0.0, 1.0),
        LngLat::new(0.0, 0.0),
    ];
    SourceFeature { id: id.into(), geometry: Geometry::Polygon(vec![ring]), properties: Map::new() }
}

fn point_feature(id: &str, lng: f64, lat: f64) -> SourceFeature {
    SourceFeature { id: id.into(), geometry: Geometry::Point(LngLat::new(lng, lat)), properties: Map::new() }
}

fn data(features: Vec<SourceFeature>) -> SourceData {
    SourceData { features }
}

fn surface_with_square() -> MemorySurface {
    let mut s = MemorySurface::new();
    assert!(s.add_source("src", data(vec![square_feature("a")])).is_ok());
    assert!(s.add_layer(LayerSpec::new("fill", "src", LayerKind::Fill).filter(Filter::polygons()), None).is_ok());
    s
}

// =============================================================
// Registries
// =============================================================

#[test]
fn duplicate_and_missing_ids_are_errors() {
    let mut s = surface_with_square();
    assert_eq!(s.add_source("src", SourceData::default()), Err(SurfaceError::DuplicateSource("src".into())));
    assert_eq!(
        s.add_layer(LayerSpec::new("fill", "src", LayerKind::Fill), None),
        Err(SurfaceError::DuplicateLayer("fill".into()))
    );
    assert_eq!(s.remove_layer("nope"), Err(SurfaceError::MissingLayer("nope".into())));
    assert_eq!(s.set_source_data("nope", SourceData::default()), Err(SurfaceError::MissingSource("nope".into())));
    assert_eq!(
        s.add_layer(LayerSpec::new("x", "missing", LayerKind::Fill), None),
        Err(SurfaceError::MissingSource("missing".into()))
    );
}

#[test]
fn source_in_use_cannot_be_removed() {
    let mut s = surface_with_square();
    assert!(matches!(s.remove_source("src"), Err(SurfaceError::Backend(_))));
    assert!(s.remove_layer("fill").is_ok());
    assert!(s.remove_source("src").is_ok());
    assert!(!s.has_source("src"));
}

#[test]
fn nothing_mutates_before_style_load() {
    let mut s = MemorySurface::loading();
    assert_eq!(s.add_source("src", SourceData::default()), Err(SurfaceError::StyleNotLoaded));
    s.finish_style_load();
    assert!(s.add_source("src", SourceData::default()).is_ok());
}

#[test]
fn injected_failure_hits_next_mutation_only() {
    let mut s = MemorySurface::new();
    s.inject_failure(SurfaceError::Backend("boom".into()));
    assert_eq!(s.add_source("a", SourceData::default()), Err(SurfaceError::Backend("boom".into())));
    assert!(s.add_source("a", SourceData::default()).is_ok());
}

#[test]
fn layers_insert_before_anchor_and_move() {
    let mut s = MemorySurface::new().with_base_layers(&[("road", LayerKind::Line), ("road-label", LayerKind::Symbol)]);
    assert!(s.add_source("src", SourceData::default()).is_ok());
    assert!(s.add_layer(LayerSpec::new("a", "src", LayerKind::Fill), Some("road-label")).is_ok());
    assert!(s.add_layer(LayerSpec::new("b", "src", LayerKind::Line), Some("road-label")).is_ok());
    assert_eq!(s.layer_ids(), vec!["road", "a", "b", "road-label"]);

    assert!(s.move_layer("a", Some("road-label")).is_ok());
    assert_eq!(s.layer_ids(), vec!["road", "b", "a", "road-label"]);
    assert!(s.move_layer("b", None).is_ok());
    assert_eq!(s.layer_ids(), vec!["road", "a", "road-label", "b"]);
}

#[test]
fn update_layer_keeps_position() {
    let mut s = surface_with_square();
    assert!(s.update_layer(LayerSpec::new("fill", "src", LayerKind::Fill).paint("fill-opacity", Expr::literal(0.5))).is_ok());
    assert_eq!(s.paint_value("fill", "a", "fill-opacity"), Some(json!(0.5)));
    assert_eq!(s.layer_ids(), vec!["fill"]);
}

#[test]
fn feature_state_drives_paint_values() {
    let mut s = MemorySurface::new();
    assert!(s.add_source("src", data(vec![square_feature("a")])).is_ok());
    let layer = LayerSpec::new("fill", "src", LayerKind::Fill)
        .paint("fill-opacity", Expr::state(Expr::literal(1), Expr::literal(0.5), Expr::literal(0)));
    assert!(s.add_layer(layer, None).is_ok());

    assert_eq!(s.paint_value("fill", "a", "fill-opacity"), Some(json!(0)));
    assert!(s.set_feature_state("src", "a", StateKey::Selected, true).is_ok());
    assert_eq!(s.paint_value("fill", "a", "fill-opacity"), Some(json!(0.5)));
    assert!(s.set_feature_state("src", "a", StateKey::Hover, true).is_ok());
    assert_eq!(s.paint_value("fill", "a", "fill-opacity"), Some(json!(1)));

    assert!(s.clear_feature_state("src").is_ok());
    assert!(s.flagged_features().is_empty());
}

#[test]
fn markers_need_registered_images() {
    let mut s = MemorySurface::new();
    let marker = MarkerSpec { id: "m".into(), position: LngLat::new(0.0, 0.0), image: "img".into() };
    assert!(s.add_marker(marker.clone()).is_err());
    let image = RasterImage { width: 1, height: 1, pixel_ratio: 1, data: vec![0, 0, 0, 0] };
    assert!(s.add_image("img", image).is_ok());
    assert!(s.add_marker(marker).is_ok());
    assert_eq!(s.marker_ids(), vec!["m"]);
}

// =============================================================
// Hit-testing and pointer input
// =============================================================

#[test]
fn query_hits_polygon_interiors_and_nearby_points() {
    let mut s = surface_with_square();
    assert!(s.add_source("pts", data(vec![point_feature("p", 5.0, 5.0)])).is_ok());
    assert!(s.add_layer(LayerSpec::new("dots", "pts", LayerKind::Symbol), None).is_ok());
    let layers = vec!["fill".to_string(), "dots".to_string()];

    let inside = s.query_rendered_features(LngLat::new(0.5, 0.5), &layers);
    assert_eq!(inside.len(), 1);
    assert_eq!(inside[0].id, "a");

    let near = s.query_rendered_features(LngLat::new(5.0001, 5.0), &layers);
    assert_eq!(near.len(), 1);
    assert_eq!(near[0].layer, "dots");

    assert!(s.query_rendered_features(LngLat::new(3.0, 3.0), &layers).is_empty());
}

#[test]
fn query_respects_layer_filters() {
    let mut s = MemorySurface::new();
    assert!(s.add_source("src", data(vec![square_feature("a")])).is_ok());
    assert!(s.add_layer(LayerSpec::new("lines", "src", LayerKind::Line).filter(Filter::lines()), None).is_ok());
    assert!(s.query_rendered_features(LngLat::new(0.0, 0.5), &["lines".to_string()]).is_empty());
}

#[test]
fn pointer_move_fires_layer_move_then_leave() {
    let mut s = surface_with_square();
    let on_move = s.subscribe(PointerEventKind::Move, Some("fill"));
    let on_leave = s.subscribe(PointerEventKind::Leave, Some("fill"));
    let guard = s.subscribe(PointerEventKind::Move, None);

    let events = s.pointer_move(LngLat::new(0.5, 0.5));
    let handlers: Vec<HandlerId> = events.iter().map(|e| e.handler).collect();
    assert_eq!(handlers, vec![on_move, guard]);
    assert_eq!(events[0].features[0].id, "a");

    let events = s.pointer_move(LngLat::new(3.0, 3.0));
    let handlers: Vec<HandlerId> = events.iter().map(|e| e.handler).collect();
    assert_eq!(handlers, vec![on_leave, guard]);
}

#[test]
fn pointer_exit_fires_leave_without_point() {
    let mut s = surface_with_square();
    let on_leave = s.subscribe(PointerEventKind::Leave, Some("fill"));
    s.pointer_move(LngLat::new(0.5, 0.5));
    let events = s.pointer_exit();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].handler, on_leave);
    assert_eq!(events[0].point, None);
    assert!(s.pointer_exit().is_empty());
}

#[test]
fn click_fires_only_on_hit_layers() {
    let mut s = surface_with_square();
    let click = s.subscribe(PointerEventKind::Click, Some("fill"));
    let hits: Vec<PointerEvent> = s.pointer_click(LngLat::new(0.5, 0.5));
    assert!(hits.iter().any(|e| e.handler == click && e.kind == PointerEventKind::Click));
    let misses = s.pointer_click(LngLat::new(4.0, 4.0));
    assert!(misses.iter().all(|e| e.kind != PointerEventKind::Click));
}

#[test]
fn unsubscribe_removes_handler() {
    let mut s = MemorySurface::new();
    let id = s.subscribe(PointerEventKind::Move, None);
    assert_eq!(s.handler_count(), 1);
    s.unsubscribe(id);
    assert_eq!(s.handler_count(), 0);
    assert!(s.pointer_move(LngLat::new(0.0, 0.0)).is_empty());
}

#[test]
fn snapshot_lists_registries() {
    let s = surface_with_square();
    let snap = s.snapshot();
    assert_eq!(snap["layers"][0]["id"], "fill");
    assert_eq!(snap["sources"]["src"]["type"], "FeatureCollection");
    assert_eq!(snap["cursor"], "Default");
}
