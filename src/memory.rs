//! `MemorySurface`: a headless [`Surface`] with real registries.
//!
//! It keeps layers in z-order, stores source data, evaluates filters and
//! feature-state expressions, hit-tests geometry, and turns synthetic pointer
//! input into [`PointerEvent`]s for the handlers the engine subscribed. The
//! tests and the preview binary draw into it; a browser host would implement
//! [`Surface`] over its map library instead.
//!
//! It is strict where a real rendering library is strict: duplicates and
//! missing ids are errors, a source cannot be removed while a layer reads
//! from it, and nothing mutates before the style has loaded.

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value, json};

use crate::error::SurfaceError;
use crate::geometry::{Bounds, LngLat};
use crate::icon::RasterImage;
use crate::style::{FeatureFlags, LayerKind, LayerSpec, SourceData, StateKey};
use crate::surface::{
    Cursor, FitOptions, HandlerId, MarkerSpec, PointerEvent, PointerEventKind, RenderedFeature, StyleLayer, Surface,
    SurfaceId,
};

/// Source id used for layers that belong to the base map style.
pub const BASEMAP_SOURCE: &str = "basemap";

/// Default hit radius for lines and points, in degrees (~50 m at mid latitudes).
pub const DEFAULT_HIT_TOLERANCE: f64 = 0.0005;

#[derive(Debug, Clone)]
struct Handler {
    kind: PointerEventKind,
    layer: Option<String>,
}

/// In-memory map surface.
#[derive(Debug)]
pub struct MemorySurface {
    id: SurfaceId,
    style_loaded: bool,
    layers: Vec<LayerSpec>,
    sources: BTreeMap<String, SourceData>,
    images: BTreeMap<String, RasterImage>,
    image_registrations: usize,
    feature_state: BTreeMap<(String, String), FeatureFlags>,
    markers: BTreeMap<String, MarkerSpec>,
    handlers: BTreeMap<HandlerId, Handler>,
    next_handler: u64,
    pointer_over: BTreeSet<String>,
    cursor: Cursor,
    last_fit: Option<(Bounds, FitOptions)>,
    hit_tolerance: f64,
    pending_failure: Option<SurfaceError>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySurface {
    /// A surface whose style is already loaded and has no base layers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SurfaceId::next(),
            style_loaded: true,
            layers: Vec::new(),
            sources: BTreeMap::new(),
            images: BTreeMap::new(),
            image_registrations: 0,
            feature_state: BTreeMap::new(),
            markers: BTreeMap::new(),
            handlers: BTreeMap::new(),
            next_handler: 1,
            pointer_over: BTreeSet::new(),
            cursor: Cursor::Default,
            last_fit: None,
            hit_tolerance: DEFAULT_HIT_TOLERANCE,
            pending_failure: None,
        }
    }

    /// A surface whose style is still loading. Call [`Self::finish_style_load`]
    /// and then the engine's `on_style_ready`.
    #[must_use]
    pub fn loading() -> Self {
        Self { style_loaded: false, ..Self::new() }
    }

    /// Seed base-map layers, bottom to top.
    #[must_use]
    pub fn with_base_layers(mut self, layers: &[(&str, LayerKind)]) -> Self {
        for (id, kind) in layers {
            self.layers.push(LayerSpec::new(*id, BASEMAP_SOURCE, *kind));
        }
        self
    }

    pub fn finish_style_load(&mut self) {
        self.style_loaded = true;
    }

    pub fn set_hit_tolerance(&mut self, degrees: f64) {
        self.hit_tolerance = degrees.max(0.0);
    }

    /// Make the next mutating call fail with `error`.
    pub fn inject_failure(&mut self, error: SurfaceError) {
        self.pending_failure = Some(error);
    }

    fn check_mutation(&mut self) -> Result<(), SurfaceError> {
        if let Some(error) = self.pending_failure.take() {
            return Err(error);
        }
        if !self.style_loaded {
            return Err(SurfaceError::StyleNotLoaded);
        }
        Ok(())
    }

    fn layer_index(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    fn insert_index(&self, before: Option<&str>) -> Result<usize, SurfaceError> {
        match before {
            None => Ok(self.layers.len()),
            Some(anchor) => self.layer_index(anchor).ok_or_else(|| SurfaceError::MissingLayer(anchor.to_string())),
        }
    }

    // =============================================================
    // Inspection
    // =============================================================

    /// Every layer id, bottom to top.
    #[must_use]
    pub fn layer_ids(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.id.clone()).collect()
    }

    #[must_use]
    pub fn source_ids(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    #[must_use]
    pub fn source(&self, id: &str) -> Option<&SourceData> {
        self.sources.get(id)
    }

    #[must_use]
    pub fn image(&self, key: &str) -> Option<&RasterImage> {
        self.images.get(key)
    }

    #[must_use]
    pub fn image_keys(&self) -> Vec<String> {
        self.images.keys().cloned().collect()
    }

    /// Total successful `add_image` calls over the surface's lifetime.
    #[must_use]
    pub fn image_registrations(&self) -> usize {
        self.image_registrations
    }

    #[must_use]
    pub fn marker(&self, id: &str) -> Option<&MarkerSpec> {
        self.markers.get(id)
    }

    #[must_use]
    pub fn marker_ids(&self) -> Vec<String> {
        self.markers.keys().cloned().collect()
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Handlers scoped to `layer`.
    #[must_use]
    pub fn handlers_on(&self, layer: &str) -> usize {
        self.handlers.values().filter(|h| h.layer.as_deref() == Some(layer)).count()
    }

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    #[must_use]
    pub fn last_fit(&self) -> Option<(Bounds, FitOptions)> {
        self.last_fit
    }

    /// `(source, feature id)` pairs with any flag set, and their flags.
    #[must_use]
    pub fn flagged_features(&self) -> Vec<(String, String, FeatureFlags)> {
        self.feature_state
            .iter()
            .filter(|(_, flags)| !flags.is_clear())
            .map(|((source, id), flags)| (source.clone(), id.clone(), *flags))
            .collect()
    }

    /// Evaluate a paint or layout property of `layer` for one feature.
    #[must_use]
    pub fn paint_value(&self, layer: &str, feature_id: &str, property: &str) -> Option<Value> {
        let spec = self.layer(layer)?;
        let expr = spec.property(property)?;
        let feature = self.sources.get(&spec.source)?.features.iter().find(|f| f.id == feature_id)?;
        Some(expr.evaluate(&feature.properties, self.feature_state(&spec.source, feature_id)))
    }

    /// Feature ids a layer renders (its filter applied), in source order.
    #[must_use]
    pub fn rendered_ids(&self, layer: &str) -> Vec<String> {
        let Some(spec) = self.layer(layer) else {
            return Vec::new();
        };
        let Some(data) = self.sources.get(&spec.source) else {
            return Vec::new();
        };
        data.features
            .iter()
            .filter(|f| spec.filter.matches(f.geometry.geometry_type(), &f.properties))
            .map(|f| f.id.clone())
            .collect()
    }

    /// Non-empty `text-field` values of a symbol layer.
    #[must_use]
    pub fn rendered_labels(&self, layer: &str) -> Vec<String> {
        let Some(spec) = self.layer(layer) else {
            return Vec::new();
        };
        let Some(expr) = spec.property("text-field") else {
            return Vec::new();
        };
        let Some(data) = self.sources.get(&spec.source) else {
            return Vec::new();
        };
        data.features
            .iter()
            .filter(|f| spec.filter.matches(f.geometry.geometry_type(), &f.properties))
            .filter_map(|f| match expr.evaluate(&f.properties, self.feature_state(&spec.source, &f.id)) {
                Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .collect()
    }

    /// The whole registry as JSON.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        let sources: Map<String, Value> =
            self.sources.iter().map(|(id, data)| (id.clone(), data.to_geojson())).collect();
        let states: Vec<Value> = self
            .flagged_features()
            .into_iter()
            .map(|(source, id, flags)| json!({ "source": source, "id": id, "state": flags }))
            .collect();
        let fit = self.last_fit.map(|(b, o)| {
            json!({ "bounds": [b.west, b.south, b.east, b.north], "padding": o.padding, "maxZoom": o.max_zoom })
        });
        json!({
            "styleLoaded": self.style_loaded,
            "layers": self.layers,
            "sources": sources,
            "images": self.image_keys(),
            "markers": self.markers.values().collect::<Vec<_>>(),
            "handlers": self.handlers.len(),
            "featureState": states,
            "cursor": self.cursor,
            "fit": fit,
        })
    }

    // =============================================================
    // Pointer input
    // =============================================================

    fn hits_on(&self, point: LngLat, layer: &str) -> Vec<RenderedFeature> {
        self.query_rendered_features(point, &[layer.to_string()])
    }

    /// Move the pointer to `point`; returns the events handlers receive.
    ///
    /// Layer `Move` fires for layers under the pointer, layer `Leave` for
    /// layers the pointer was over and no longer is, and global `Move` always.
    pub fn pointer_move(&mut self, point: LngLat) -> Vec<PointerEvent> {
        let scoped: BTreeSet<&String> = self.handlers.values().filter_map(|h| h.layer.as_ref()).collect();
        let mut over: BTreeMap<String, Vec<RenderedFeature>> = BTreeMap::new();
        for layer in scoped {
            let hits = self.hits_on(point, layer);
            if !hits.is_empty() {
                over.insert(layer.clone(), hits);
            }
        }

        let mut events = Vec::new();
        for (id, handler) in &self.handlers {
            let event = |kind, features| PointerEvent { handler: *id, kind, point: Some(point), features };
            match (&handler.layer, handler.kind) {
                (None, PointerEventKind::Move) => events.push(event(PointerEventKind::Move, Vec::new())),
                (Some(layer), PointerEventKind::Move) => {
                    if let Some(hits) = over.get(layer) {
                        events.push(event(PointerEventKind::Move, hits.clone()));
                    }
                }
                (Some(layer), PointerEventKind::Leave) => {
                    if self.pointer_over.contains(layer) && !over.contains_key(layer) {
                        events.push(event(PointerEventKind::Leave, Vec::new()));
                    }
                }
                _ => {}
            }
        }
        self.pointer_over = over.into_keys().collect();
        events
    }

    /// Click at `point`.
    pub fn pointer_click(&mut self, point: LngLat) -> Vec<PointerEvent> {
        let mut events = self.pointer_move(point);
        for (id, handler) in &self.handlers {
            if handler.kind != PointerEventKind::Click {
                continue;
            }
            let features = match &handler.layer {
                Some(layer) => {
                    let hits = self.hits_on(point, layer);
                    if hits.is_empty() {
                        continue;
                    }
                    hits
                }
                None => Vec::new(),
            };
            events.push(PointerEvent { handler: *id, kind: PointerEventKind::Click, point: Some(point), features });
        }
        events
    }

    /// The pointer left the map canvas.
    pub fn pointer_exit(&mut self) -> Vec<PointerEvent> {
        let events = self
            .handlers
            .iter()
            .filter(|(_, h)| h.kind == PointerEventKind::Leave)
            .filter(|(_, h)| h.layer.as_ref().is_none_or(|l| self.pointer_over.contains(l)))
            .map(|(id, _)| PointerEvent { handler: *id, kind: PointerEventKind::Leave, point: None, features: Vec::new() })
            .collect();
        self.pointer_over.clear();
        events
    }

    fn hit(&self, spec: &LayerSpec, geometry: &crate::geometry::Geometry, point: LngLat) -> bool {
        let kind = geometry.geometry_type();
        if kind.is_polygonal() && matches!(spec.kind, LayerKind::Fill | LayerKind::Symbol) {
            return geometry.contains(point);
        }
        geometry.distance_to(point) <= self.hit_tolerance
    }
}

impl Surface for MemorySurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn is_style_loaded(&self) -> bool {
        self.style_loaded
    }

    fn style_layers(&self) -> Vec<StyleLayer> {
        self.layers.iter().map(|l| StyleLayer { id: l.id.clone(), kind: l.kind }).collect()
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, data: SourceData) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        if self.sources.contains_key(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        self.sources.insert(id.to_string(), data);
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: SourceData) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        let slot = self.sources.get_mut(id).ok_or_else(|| SurfaceError::MissingSource(id.to_string()))?;
        *slot = data;
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        if let Some(layer) = self.layers.iter().find(|l| l.source == id) {
            return Err(SurfaceError::Backend(format!("source {id} is still used by layer {}", layer.id)));
        }
        if self.sources.remove(id).is_none() {
            return Err(SurfaceError::MissingSource(id.to_string()));
        }
        self.feature_state.retain(|(source, _), _| source != id);
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layer_index(id).is_some()
    }

    fn add_layer(&mut self, layer: LayerSpec, before: Option<&str>) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        if self.has_layer(&layer.id) {
            return Err(SurfaceError::DuplicateLayer(layer.id));
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(SurfaceError::MissingSource(layer.source));
        }
        let at = self.insert_index(before)?;
        self.layers.insert(at, layer);
        Ok(())
    }

    fn update_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        let at = self.layer_index(&layer.id).ok_or_else(|| SurfaceError::MissingLayer(layer.id.clone()))?;
        let slot = &mut self.layers[at];
        slot.filter = layer.filter;
        slot.paint = layer.paint;
        slot.layout = layer.layout;
        Ok(())
    }

    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        if before == Some(id) {
            return Ok(());
        }
        let from = self.layer_index(id).ok_or_else(|| SurfaceError::MissingLayer(id.to_string()))?;
        self.insert_index(before)?;
        let layer = self.layers.remove(from);
        let at = self.insert_index(before)?;
        self.layers.insert(at, layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        let at = self.layer_index(id).ok_or_else(|| SurfaceError::MissingLayer(id.to_string()))?;
        self.layers.remove(at);
        self.pointer_over.remove(id);
        Ok(())
    }

    fn has_image(&self, key: &str) -> bool {
        self.images.contains_key(key)
    }

    fn add_image(&mut self, key: &str, image: RasterImage) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        if self.images.contains_key(key) {
            return Err(SurfaceError::DuplicateImage(key.to_string()));
        }
        self.images.insert(key.to_string(), image);
        self.image_registrations += 1;
        Ok(())
    }

    fn set_feature_state(&mut self, source: &str, id: &str, key: StateKey, value: bool) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        if !self.sources.contains_key(source) {
            return Err(SurfaceError::MissingSource(source.to_string()));
        }
        let flags = self.feature_state.entry((source.to_string(), id.to_string())).or_default();
        flags.set(key, value);
        if flags.is_clear() {
            self.feature_state.remove(&(source.to_string(), id.to_string()));
        }
        Ok(())
    }

    fn feature_state(&self, source: &str, id: &str) -> FeatureFlags {
        self.feature_state.get(&(source.to_string(), id.to_string())).copied().unwrap_or_default()
    }

    fn clear_feature_state(&mut self, source: &str) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        if !self.sources.contains_key(source) {
            return Err(SurfaceError::MissingSource(source.to_string()));
        }
        self.feature_state.retain(|(s, _), _| s != source);
        Ok(())
    }

    fn query_rendered_features(&self, point: LngLat, layers: &[String]) -> Vec<RenderedFeature> {
        let mut out = Vec::new();
        for spec in self.layers.iter().rev() {
            if !layers.contains(&spec.id) {
                continue;
            }
            let Some(data) = self.sources.get(&spec.source) else {
                continue;
            };
            for feature in data.features.iter().rev() {
                let kind = feature.geometry.geometry_type();
                if !spec.filter.matches(kind, &feature.properties) || !self.hit(spec, &feature.geometry, point) {
                    continue;
                }
                out.push(RenderedFeature {
                    layer: spec.id.clone(),
                    source: spec.source.clone(),
                    id: feature.id.clone(),
                    geometry_type: kind,
                    properties: feature.properties.clone(),
                });
            }
        }
        out
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    fn fit_bounds(&mut self, bounds: Bounds, options: FitOptions) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        self.last_fit = Some((bounds, options));
        Ok(())
    }

    fn has_marker(&self, id: &str) -> bool {
        self.markers.contains_key(id)
    }

    fn add_marker(&mut self, marker: MarkerSpec) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        if self.markers.contains_key(&marker.id) {
            return Err(SurfaceError::Backend(format!("marker already exists: {}", marker.id)));
        }
        if !self.images.contains_key(&marker.image) {
            return Err(SurfaceError::Backend(format!("marker image not registered: {}", marker.image)));
        }
        self.markers.insert(marker.id.clone(), marker);
        Ok(())
    }

    fn remove_marker(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.check_mutation()?;
        if self.markers.remove(id).is_none() {
            return Err(SurfaceError::Backend(format!("marker not found: {id}")));
        }
        Ok(())
    }

    fn subscribe(&mut self, kind: PointerEventKind, layer: Option<&str>) -> HandlerId {
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;
        self.handlers.insert(id, Handler { kind, layer: layer.map(str::to_string) });
        id
    }

    fn unsubscribe(&mut self, handler: HandlerId) {
        self.handlers.remove(&handler);
    }
}
