//! The map surface boundary.
//!
//! [`Surface`] is everything the engine needs from the host's map: source and
//! layer mutation, image registration, feature-state, hit-testing, cursor,
//! camera, DOM-anchored markers, and pointer subscriptions. Camera control,
//! tiles, and rasterization stay on the other side of this trait.
//!
//! Mutating calls return `Result<_, SurfaceError>`. The engine existence-checks
//! before every create or remove, so an implementation may treat duplicates
//! and missing ids as errors.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SurfaceError;
use crate::geometry::{Bounds, GeometryType, LngLat};
use crate::icon::RasterImage;
use crate::style::{FeatureFlags, LayerKind, LayerSpec, SourceData, StateKey};

/// Identity of one surface instance. Engine bookkeeping is keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SurfaceId(pub u64);

impl SurfaceId {
    /// A fresh id, unique within the process.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Id of a pointer handler registered with the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HandlerId(pub u64);

/// Pointer events the engine listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PointerEventKind {
    Move,
    Leave,
    Click,
}

/// A pointer event delivered to one handler.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub handler: HandlerId,
    pub kind: PointerEventKind,
    /// Pointer location; `None` when the pointer left the map entirely.
    pub point: Option<LngLat>,
    /// Features under the pointer on the handler's layer (empty for global handlers).
    pub features: Vec<RenderedFeature>,
}

/// A feature returned by hit-testing.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    pub layer: String,
    pub source: String,
    pub id: String,
    pub geometry_type: GeometryType,
    pub properties: Map<String, Value>,
}

/// A layer already present in the style, bottom to top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleLayer {
    pub id: String,
    pub kind: LayerKind,
}

/// Mouse cursor affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Cursor {
    #[default]
    Default,
    Pointer,
}

/// Camera framing options for [`Surface::fit_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitOptions {
    /// Screen padding around the box, in pixels.
    pub padding: f64,
    /// Zoom ceiling so a single point does not zoom to street-furniture level.
    pub max_zoom: f64,
}

/// A DOM-anchored marker showing a registered image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub id: String,
    pub position: LngLat,
    /// Image key registered through the icon atlas.
    pub image: String,
}

/// The host map surface.
pub trait Surface {
    /// Stable for the lifetime of the surface and distinct from every other
    /// live surface.
    fn id(&self) -> SurfaceId;

    /// Whether the rendering style has finished loading.
    fn is_style_loaded(&self) -> bool;

    /// All style layers, bottom to top.
    fn style_layers(&self) -> Vec<StyleLayer>;

    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, data: SourceData) -> Result<(), SurfaceError>;
    fn set_source_data(&mut self, id: &str, data: SourceData) -> Result<(), SurfaceError>;
    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError>;

    fn has_layer(&self, id: &str) -> bool;
    /// Insert `layer` below `before`, or on top when `before` is `None`.
    fn add_layer(&mut self, layer: LayerSpec, before: Option<&str>) -> Result<(), SurfaceError>;
    /// Replace the paint, layout, and filter of an existing layer in place.
    fn update_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError>;
    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), SurfaceError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;

    fn has_image(&self, key: &str) -> bool;
    fn add_image(&mut self, key: &str, image: RasterImage) -> Result<(), SurfaceError>;

    fn set_feature_state(&mut self, source: &str, id: &str, key: StateKey, value: bool) -> Result<(), SurfaceError>;
    fn feature_state(&self, source: &str, id: &str) -> FeatureFlags;
    /// Drop every feature-state entry for `source`.
    fn clear_feature_state(&mut self, source: &str) -> Result<(), SurfaceError>;

    /// Features under `point` on the given layers, topmost first.
    fn query_rendered_features(&self, point: LngLat, layers: &[String]) -> Vec<RenderedFeature>;

    fn set_cursor(&mut self, cursor: Cursor);
    fn fit_bounds(&mut self, bounds: Bounds, options: FitOptions) -> Result<(), SurfaceError>;

    fn has_marker(&self, id: &str) -> bool;
    fn add_marker(&mut self, marker: MarkerSpec) -> Result<(), SurfaceError>;
    fn remove_marker(&mut self, id: &str) -> Result<(), SurfaceError>;

    /// Register a pointer handler, optionally scoped to one layer.
    fn subscribe(&mut self, kind: PointerEventKind, layer: Option<&str>) -> HandlerId;
    fn unsubscribe(&mut self, handler: HandlerId);
}
