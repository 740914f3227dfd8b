use serde_json::json;

use super::*;
use crate::geometry::LngLat;
use crate::group::group;
use crate::normalize::normalize;
use crate::style::FeatureFlags;

// =============================================================
// Helpers
// =============================================================

fn square_feature(id: Value, props: Value) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]] },
        "properties": props,
    })
}

fn point_feature(id: Value, lng: f64, lat: f64, props: Value) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "geometry": { "type": "Point", "coordinates": [lng, lat] },
        "properties": props,
    })
}

fn groups_of(input: Value) -> BTreeMap<String, PlaceGroup> {
    group(normalize(&RawGeometryInput::from(input), "places"))
}

struct Fixture {
    atlas: IconAtlas,
    catalog: TypeCatalog,
    default_icon: IconSpec,
}

impl Fixture {
    fn new() -> Self {
        Self {
            atlas: IconAtlas::new(28, 2, 20.0),
            catalog: TypeCatalog::default(),
            default_icon: IconSpec::new("pin", "#0176de"),
        }
    }

    fn style(&self) -> PlaceStyle<'_> {
        PlaceStyle { atlas: &self.atlas, catalog: &self.catalog, default_icon: &self.default_icon, select_percent: 35.0 }
    }

    fn plan(&self, input: Value, options: &PlaceDrawOptions) -> OverlayPlan {
        plan(Namespace::Places, &groups_of(input), options, &self.style())
    }
}

fn source<'a>(plan: &'a OverlayPlan, role: SourceRole) -> &'a SourceData {
    match plan.sources.iter().find(|(r, _)| *r == role) {
        Some((_, data)) => data,
        None => panic!("missing {role:?} source"),
    }
}

fn ids(data: &SourceData) -> Vec<&str> {
    data.features.iter().map(|f| f.id.as_str()).collect()
}

// =============================================================
// Mode
// =============================================================

#[test]
fn list_input_is_multi_everything_else_single() {
    assert_eq!(PlaceMode::infer(&RawGeometryInput::from(json!([]))), PlaceMode::Multi);
    let fc = json!({ "type": "FeatureCollection", "features": [] });
    assert_eq!(PlaceMode::infer(&RawGeometryInput::from(fc)), PlaceMode::Single);
    assert_eq!(PlaceMode::Multi.namespace(), Namespace::Places);
    assert_eq!(PlaceMode::Single.namespace(), Namespace::PlaceSingle);
}

#[test]
fn zoom_defaults_to_single_mode_only() {
    let options = PlaceDrawOptions::default();
    assert!(options.should_fit(PlaceMode::Single));
    assert!(!options.should_fit(PlaceMode::Multi));
    let forced = PlaceDrawOptions { zoom: Some(true), ..options };
    assert!(forced.should_fit(PlaceMode::Multi));
    let never = PlaceDrawOptions { zoom: Some(false), ..options };
    assert!(!never.should_fit(PlaceMode::Single));
}

// =============================================================
// Plan
// =============================================================

#[test]
fn polygon_only_entity_draws_polygon_without_marker() {
    let fixture = Fixture::new();
    let plan = fixture.plan(json!([square_feature(json!(1), json!({ "name": "Hall" }))]), &PlaceDrawOptions::default());

    assert_eq!(ids(source(&plan, SourceRole::Base)), vec!["1"]);
    assert!(source(&plan, SourceRole::Points).is_empty());
    assert!(plan.icons.is_empty());
    assert_eq!(plan.feature_count(), 1);
}

#[test]
fn point_entity_draws_marker_and_requests_icon() {
    let fixture = Fixture::new();
    let plan = fixture.plan(json!([point_feature(json!("p1"), 5.0, 6.0, json!({}))]), &PlaceDrawOptions::default());

    let points = source(&plan, SourceRole::Points);
    assert_eq!(ids(points), vec!["p1"]);
    assert_eq!(points.features[0].geometry, Geometry::Point(LngLat::new(5.0, 6.0)));
    assert_eq!(plan.icons, vec![IconSpec::new("pin", "#0176de")]);
}

#[test]
fn point_and_polygon_of_one_entity_both_render() {
    let fixture = Fixture::new();
    let input = json!([
        point_feature(json!(7), 1.0, 1.0, json!({ "name": "Library" })),
        square_feature(json!(7), json!({ "placeName": "Central Library" })),
    ]);
    let plan = fixture.plan(input, &PlaceDrawOptions::default());
    assert_eq!(ids(source(&plan, SourceRole::Base)), vec!["7"]);
    assert_eq!(ids(source(&plan, SourceRole::Points)), vec!["7"]);
    assert_eq!(plan.entities.len(), 1);
    assert_eq!(plan.entities["7"]["placeName"], "Central Library");
    assert_eq!(plan.entities["7"]["name"], "Library");
}

#[test]
fn prefer_marker_swaps_polygon_for_centroid_marker() {
    let fixture = Fixture::new();
    let plan = fixture.plan(
        json!([square_feature(json!(3), json!({ "preferMarker": true }))]),
        &PlaceDrawOptions::default(),
    );
    assert!(source(&plan, SourceRole::Base).is_empty());
    let points = source(&plan, SourceRole::Points);
    assert_eq!(ids(points), vec!["3"]);
    assert_eq!(points.features[0].geometry, Geometry::Point(LngLat::new(1.0, 1.0)));
}

#[test]
fn rendered_features_carry_injected_style_properties() {
    let fixture = Fixture::new();
    let plan = fixture.plan(json!([point_feature(json!(9), 0.0, 0.0, json!({ "color": "#FF0000" }))]), &PlaceDrawOptions::default());
    let props = &source(&plan, SourceRole::Points).features[0].properties;

    assert_eq!(props["entityId"], "9");
    assert_eq!(props["iconBase"], "pin-#ff0000-28");
    assert_eq!(props["colorBase"], "#ff0000");
    assert!(props["iconHover"].as_str().is_some_and(|k| k.starts_with("pin-#") && k != "pin-#ff0000-28"));
    assert!(props["colorSelect"].as_str().is_some_and(|c| c != "#ff0000"));
    assert!(props.contains_key("colorHover"));
}

#[test]
fn entities_keep_properties_without_injected_keys() {
    let fixture = Fixture::new();
    let plan = fixture.plan(json!([point_feature(json!(9), 0.0, 0.0, json!({ "name": "Kiosk" }))]), &PlaceDrawOptions::default());
    assert_eq!(Value::Object(plan.entities["9"].clone()), json!({ "name": "Kiosk" }));
}

#[test]
fn identical_icons_are_requested_once() {
    let fixture = Fixture::new();
    let input = json!([
        point_feature(json!(1), 0.0, 0.0, json!({ "icon": "book" })),
        point_feature(json!(2), 1.0, 0.0, json!({ "icon": "book" })),
        point_feature(json!(3), 2.0, 0.0, json!({ "icon": "food" })),
    ]);
    let plan = fixture.plan(input, &PlaceDrawOptions::default());
    assert_eq!(plan.icons.len(), 2);
}

#[test]
fn catalog_drives_icons_by_type() {
    let mut fixture = Fixture::new();
    fixture.catalog.insert("12", IconSpec::new("parking", "#336699"));
    let plan = fixture.plan(json!([point_feature(json!(1), 0.0, 0.0, json!({ "typeId": 12 }))]), &PlaceDrawOptions::default());
    assert_eq!(plan.icons, vec![IconSpec::new("parking", "#336699")]);
}

#[test]
fn bounds_cover_polygons_and_markers() {
    let fixture = Fixture::new();
    let input = json!([
        square_feature(json!(1), json!({})),
        point_feature(json!(2), 10.0, -3.0, json!({})),
    ]);
    let plan = fixture.plan(input, &PlaceDrawOptions::default());
    assert_eq!((plan.bounds.west, plan.bounds.south), (0.0, -3.0));
    assert_eq!((plan.bounds.east, plan.bounds.north), (10.0, 2.0));
}

#[test]
fn empty_input_plans_empty_sources() {
    let fixture = Fixture::new();
    let plan = fixture.plan(json!([]), &PlaceDrawOptions::default());
    assert_eq!(plan.sources.len(), 2);
    assert_eq!(plan.feature_count(), 0);
    assert!(plan.bounds.is_empty());
}

// =============================================================
// Layers
// =============================================================

#[test]
fn layers_stack_polygons_under_points() {
    let ids: Vec<String> = layers(Namespace::PlaceSingle, true).into_iter().map(|l| l.id).collect();
    assert_eq!(
        ids,
        vec![
            "place-single-fill",
            "place-single-outline",
            "place-single-label",
            "place-single-point-base",
            "place-single-point-text",
            "place-single-point-hover",
        ]
    );
}

#[test]
fn polygon_labels_can_be_switched_off() {
    let ids: Vec<String> = layers(Namespace::Places, false).into_iter().map(|l| l.id).collect();
    assert!(!ids.iter().any(|id| id == "places-label"));
    assert_eq!(ids.len(), 5);
}

#[test]
fn point_base_is_collision_aware_and_hover_is_not() {
    let layers = layers(Namespace::Places, true);
    let find = |id: &str| layers.iter().find(|l| l.id == id).cloned();
    let (Some(base), Some(hover)) = (find("places-point-base"), find("places-point-hover")) else {
        panic!("point layers missing");
    };
    assert_eq!(base.property("icon-allow-overlap"), Some(&Expr::literal(false)));
    assert_eq!(hover.property("icon-allow-overlap"), Some(&Expr::literal(true)));
}

#[test]
fn hover_layer_is_only_visible_while_hovered() {
    let layers = layers(Namespace::Places, true);
    let Some(hover) = layers.iter().find(|l| l.id == "places-point-hover") else {
        panic!("hover layer missing");
    };
    let Some(opacity) = hover.property("icon-opacity") else {
        panic!("no icon-opacity");
    };
    let props = Map::new();
    assert_eq!(opacity.evaluate(&props, FeatureFlags { hover: true, selected: false }), json!(1));
    assert_eq!(opacity.evaluate(&props, FeatureFlags { hover: false, selected: true }), json!(0));
    assert_eq!(opacity.evaluate(&props, FeatureFlags::default()), json!(0));
}

#[test]
fn fill_color_follows_feature_state() {
    let layers = layers(Namespace::Places, true);
    let Some(fill) = layers.iter().find(|l| l.id == "places-fill").and_then(|l| l.property("fill-color")) else {
        panic!("fill-color missing");
    };
    let props: Map<String, Value> = json!({ "colorBase": "#111111", "colorHover": "#222222", "colorSelect": "#333333" })
        .as_object()
        .cloned()
        .unwrap_or_default();
    assert_eq!(fill.evaluate(&props, FeatureFlags::default()), json!("#111111"));
    assert_eq!(fill.evaluate(&props, FeatureFlags { hover: true, selected: true }), json!("#222222"));
    assert_eq!(fill.evaluate(&props, FeatureFlags { hover: false, selected: true }), json!("#333333"));
}

#[test]
fn labels_prefer_place_name() {
    let layers = layers(Namespace::Places, true);
    let Some(text) = layers.iter().find(|l| l.id == "places-label").and_then(|l| l.property("text-field")) else {
        panic!("label text missing");
    };
    let both: Map<String, Value> =
        json!({ "placeName": "Hall A", "name": "hall" }).as_object().cloned().unwrap_or_default();
    let name_only: Map<String, Value> = json!({ "name": "hall" }).as_object().cloned().unwrap_or_default();
    assert_eq!(text.evaluate(&both, FeatureFlags::default()), json!("Hall A"));
    assert_eq!(text.evaluate(&name_only, FeatureFlags::default()), json!("hall"));
}
