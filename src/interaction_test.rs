use super::*;
use crate::geometry::Geometry;
use crate::memory::MemorySurface;
use crate::style::{Filter, LayerKind, LayerSpec, SourceData, SourceFeature};

// =============================================================
// Helpers
// =============================================================

fn square(id: &str, x: f64) -> SourceFeature {
    let ring = vec![
        LngLat::new(x, 0.0),
        LngLat::new(x + 1.0, 0.0),
        LngLat::new(x + 1.0, 1.0),
        LngLat::new(x, 1.0),
        LngLat::new(x, 0.0),
    ];
    let mut properties = Map::new();
    properties.insert("name".into(), Value::String(format!("Square {id}")));
    SourceFeature { id: id.into(), geometry: Geometry::Polygon(vec![ring]), properties }
}

fn point(id: &str, lng: f64, lat: f64) -> SourceFeature {
    SourceFeature { id: id.into(), geometry: Geometry::Point(LngLat::new(lng, lat)), properties: Map::new() }
}

/// Two squares on the fill layer and one point marker sitting inside square `a`.
fn places_surface() -> MemorySurface {
    let mut s = MemorySurface::new();
    let base = SourceData { features: vec![square("a", 0.0), square("b", 2.0)] };
    let points = SourceData { features: vec![point("p", 0.5, 0.5)] };
    assert!(s.add_source("places-source", base).is_ok());
    assert!(s.add_source("places-points", points).is_ok());
    let fill = LayerSpec::new("places-fill", "places-source", LayerKind::Fill).filter(Filter::polygons());
    let marks = LayerSpec::new("places-point-base", "places-points", LayerKind::Symbol).filter(Filter::points());
    assert!(s.add_layer(fill, None).is_ok());
    assert!(s.add_layer(marks, None).is_ok());
    s
}

fn bound(surface: &mut MemorySurface) -> InteractionController {
    let mut controller = InteractionController::new(Namespace::Places);
    controller.bind(surface);
    controller
}

fn feed(
    controller: &mut InteractionController,
    surface: &mut MemorySurface,
    events: Vec<PointerEvent>,
) -> Vec<Activation> {
    let entities = BTreeMap::new();
    let mut out = Vec::new();
    for event in &events {
        match controller.handle(surface, event, &entities) {
            Ok(Some(activation)) => out.push(activation),
            Ok(None) => {}
            Err(e) => panic!("handler failed: {e}"),
        }
    }
    out
}

fn hover(controller: &mut InteractionController, surface: &mut MemorySurface, lng: f64, lat: f64) {
    let events = surface.pointer_move(LngLat::new(lng, lat));
    feed(controller, surface, events);
}

fn click(controller: &mut InteractionController, surface: &mut MemorySurface, lng: f64, lat: f64) -> Vec<Activation> {
    let events = surface.pointer_click(LngLat::new(lng, lat));
    feed(controller, surface, events)
}

// =============================================================
// Binding
// =============================================================

#[test]
fn bind_subscribes_each_interactive_layer_and_a_guard() {
    let mut surface = places_surface();
    let controller = bound(&mut surface);
    assert!(controller.is_bound());
    assert_eq!(surface.handler_count(), 7);
    assert_eq!(surface.handlers_on("places-point-base"), 3);
}

#[test]
fn bind_twice_registers_once() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    controller.bind(&mut surface);
    assert_eq!(surface.handler_count(), 7);
}

#[test]
fn dispose_unsubscribes_everything() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    controller.dispose(&mut surface);
    assert!(!controller.is_bound());
    assert_eq!(surface.handler_count(), 0);
    controller.dispose(&mut surface);
}

#[test]
fn scratch_has_nothing_to_bind() {
    let mut surface = MemorySurface::new();
    let mut controller = InteractionController::new(Namespace::Scratch);
    controller.bind(&mut surface);
    assert!(!controller.is_bound());
    assert_eq!(surface.handler_count(), 0);
}

#[test]
fn foreign_handlers_are_ignored() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    let other = surface.subscribe(PointerEventKind::Click, Some("places-fill"));
    assert!(!controller.owns(other));
    let event = PointerEvent { handler: other, kind: PointerEventKind::Click, point: Some(LngLat::new(2.5, 0.5)), features: Vec::new() };
    assert_eq!(controller.handle(&mut surface, &event, &BTreeMap::new()), Ok(None));
    assert_eq!(controller.selected(), None);
}

// =============================================================
// Hover
// =============================================================

#[test]
fn hover_follows_the_pointer() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);

    hover(&mut controller, &mut surface, 2.5, 0.5);
    assert_eq!(controller.hovered(), Some("b"));
    assert!(surface.feature_state("places-source", "b").hover);

    hover(&mut controller, &mut surface, 0.2, 0.8);
    assert_eq!(controller.hovered(), Some("a"));
    assert!(!surface.feature_state("places-source", "b").hover);
    assert!(surface.feature_state("places-source", "a").hover);
}

#[test]
fn at_most_one_entity_is_hovered() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    for (lng, lat) in [(0.2, 0.2), (2.2, 0.2), (0.8, 0.8), (2.8, 0.9)] {
        hover(&mut controller, &mut surface, lng, lat);
        let hovered = surface.flagged_features().iter().filter(|(_, _, f)| f.hover).count();
        assert_eq!(hovered, 1);
    }
}

#[test]
fn hover_clears_on_empty_map() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    hover(&mut controller, &mut surface, 2.5, 0.5);
    hover(&mut controller, &mut surface, 9.0, 9.0);
    assert_eq!(controller.hovered(), None);
    assert!(surface.flagged_features().is_empty());
}

#[test]
fn hover_clears_when_pointer_leaves_the_map() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    hover(&mut controller, &mut surface, 2.5, 0.5);
    let events = surface.pointer_exit();
    assert!(!events.is_empty());
    feed(&mut controller, &mut surface, events);
    assert_eq!(controller.hovered(), None);
    assert!(surface.flagged_features().is_empty());
}

#[test]
fn guard_clears_hover_without_a_layer_leave() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    hover(&mut controller, &mut surface, 2.5, 0.5);

    // Only the global guard reaches the controller.
    let events: Vec<PointerEvent> = surface
        .pointer_move(LngLat::new(9.0, 9.0))
        .into_iter()
        .filter(|e| controller.subscription.as_ref().and_then(|s| s.binding(e.handler)) == Some(&Binding::Guard))
        .collect();
    assert_eq!(events.len(), 1);
    feed(&mut controller, &mut surface, events);
    assert_eq!(controller.hovered(), None);
}

#[test]
fn hover_prefers_the_topmost_layer() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    // The point marker sits on top of square a.
    hover(&mut controller, &mut surface, 0.5, 0.5);
    assert_eq!(controller.hovered(), Some("p"));
}

// =============================================================
// Selection
// =============================================================

#[test]
fn click_selects_and_reports_activation() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    let activations = click(&mut controller, &mut surface, 2.5, 0.5);

    assert_eq!(activations.len(), 1);
    let activation = &activations[0];
    assert_eq!(activation.entity_id, "b");
    assert!(activation.selected);
    assert_eq!(activation.geometry_type, GeometryType::Polygon);
    assert_eq!(activation.properties.get("name"), Some(&Value::String("Square b".into())));
    assert_eq!(controller.selected(), Some("b"));
    assert!(surface.feature_state("places-source", "b").selected);
}

#[test]
fn selection_is_exclusive() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    click(&mut controller, &mut surface, 2.5, 0.5);
    click(&mut controller, &mut surface, 0.2, 0.8);

    let selected: Vec<String> =
        surface.flagged_features().into_iter().filter(|(_, _, f)| f.selected).map(|(_, id, _)| id).collect();
    assert_eq!(selected, vec!["a"]);
    assert_eq!(controller.selected(), Some("a"));
}

#[test]
fn second_click_deselects() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    click(&mut controller, &mut surface, 2.5, 0.5);
    let activations = click(&mut controller, &mut surface, 2.5, 0.5);
    assert_eq!(activations.len(), 1);
    assert!(!activations[0].selected);
    assert_eq!(controller.selected(), None);
    assert!(!surface.feature_state("places-source", "b").selected);
}

#[test]
fn overlapping_layers_toggle_once() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    // Both the fill and the point layer fire a click here.
    let activations = click(&mut controller, &mut surface, 0.5, 0.5);
    assert_eq!(activations.len(), 1);
    assert_eq!(activations[0].entity_id, "p");
    assert_eq!(controller.selected(), Some("p"));
}

#[test]
fn click_on_empty_map_changes_nothing() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    click(&mut controller, &mut surface, 2.5, 0.5);
    assert!(click(&mut controller, &mut surface, 9.0, 9.0).is_empty());
    assert_eq!(controller.selected(), Some("b"));
}

#[test]
fn entity_table_supplies_properties() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    let mut entities = BTreeMap::new();
    let mut merged = Map::new();
    merged.insert("placeName".into(), Value::String("Merged".into()));
    entities.insert("b".to_string(), merged.clone());

    let events = surface.pointer_click(LngLat::new(2.5, 0.5));
    let mut activations = Vec::new();
    for event in &events {
        if let Ok(Some(a)) = controller.handle(&mut surface, event, &entities) {
            activations.push(a);
        }
    }
    assert_eq!(activations.len(), 1);
    assert_eq!(activations[0].properties, merged);
}

#[test]
fn clear_state_drops_both_flags() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    hover(&mut controller, &mut surface, 0.2, 0.8);
    click(&mut controller, &mut surface, 2.5, 0.5);
    assert_eq!(controller.clear_state(&mut surface), Ok(()));
    assert_eq!(controller.hovered(), None);
    assert_eq!(controller.selected(), None);
    assert!(surface.flagged_features().is_empty());
}

#[test]
fn flags_written_to_every_live_namespace_source() {
    let mut surface = places_surface();
    let mut controller = bound(&mut surface);
    assert_eq!(controller.toggle_selected(&mut surface, "a"), Ok(true));
    assert!(surface.feature_state("places-source", "a").selected);
    assert!(surface.feature_state("places-points", "a").selected);
}
